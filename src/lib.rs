pub mod core;

pub use crate::core::error::{ModpackError, ModpackResult};
pub use crate::core::http::build_http_client;
pub use crate::core::manifest::{load_manifest, ManifestService, ModpackManifest};
pub use crate::core::marker::{is_installed, InstallMarker};
pub use crate::core::pipeline::{CancelFlag, InstallRequest, ModpackService, PipelineStage};
pub use crate::core::progress::{EventSender, ModpackEvent};
pub use crate::core::status::{ServerStatus, ServerStatusService};
