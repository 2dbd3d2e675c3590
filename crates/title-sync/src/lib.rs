pub mod config;
pub mod engine;
pub mod host;
pub mod logging;
pub mod surfaces;

#[cfg(test)]
mod fake;

pub use config::{SettingsManager, SettingsStore};
pub use engine::{HostServices, SyncContext, TitleSync};
pub use host::{HostEvent, HostHooks};
pub use logging::init_logging;
pub use surfaces::{SurfaceState, Synchronizer};
