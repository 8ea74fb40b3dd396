pub mod cleanup;
pub mod config_loader;
pub mod orchestrator;
pub mod ports;
pub mod preflight;
pub mod readiness;
pub mod registry;
pub mod session;
pub mod state;
pub mod status;
pub mod tmux;
