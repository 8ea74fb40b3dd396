pub mod allocation;
pub mod component;
pub mod config;
pub mod run;
pub mod status;
pub mod window;

pub use allocation::{Allocation, PortAllocation};
pub use component::{Component, ComponentCategory};
pub use config::DevConfig;
pub use run::{DownReport, RunPhase, RunRecord, SessionPolicy, UpReport, Warning};
pub use status::{ComponentStatus, DriftWarning, StatusSnapshot};
pub use window::WindowInfo;
