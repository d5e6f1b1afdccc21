// ─── Packhaul Core ───
// Modular backend for modpack provisioning.
//
// Architecture:
//   core/
//     manifest/  — Remote pack descriptor + cached refresh service
//     resolver/  — Indirect download URL resolution (Yandex Disk)
//     fetch/     — Streaming archive download with digest validation
//     archive/   — Format sniffing + zip/rar extraction
//     layout/    — Content root discovery in extracted trees
//     sync/      — Install/update synchronization into the target
//     marker/    — Install marker persistence
//     workspace/ — Per-run scratch directories
//     pipeline/  — Stage composition + cancellation
//     progress/  — Event stream for embedding shells
//     status/    — Minecraft server list ping service

pub mod archive;
pub mod error;
pub mod fetch;
pub mod http;
pub mod layout;
pub mod manifest;
pub mod marker;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod status;
pub mod sync;
pub mod workspace;
