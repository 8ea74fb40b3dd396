pub mod error;
pub mod models;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorCategory, OrchestratorError, Result};
