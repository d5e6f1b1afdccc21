// ─── Progress Events ───
// Serializable events an embedding shell can forward to its UI. The
// pipeline never blocks on observers: sends into the unbounded channel
// are fire-and-forget and a dropped receiver is silently tolerated.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::pipeline::PipelineStage;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModpackEvent {
    StageStarted { stage: PipelineStage },
    SyncProgress { processed: usize, total: usize },
}

/// Event emitter handed through the pipeline.
#[derive(Clone)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<ModpackEvent>>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<ModpackEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// An emitter that swallows everything, for callers without observers.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn stage_started(&self, stage: PipelineStage) {
        self.send(ModpackEvent::StageStarted { stage });
    }

    pub fn sync_progress(&self, processed: usize, total: usize) {
        self.send(ModpackEvent::SyncProgress { processed, total });
    }

    fn send(&self, event: ModpackEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Build a connected sender/receiver pair.
pub fn channel() -> (EventSender, mpsc::UnboundedReceiver<ModpackEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender::new(tx), rx)
}
