use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};
use crate::models::RunRecord;

pub struct RunStateStore {
    state_file_path: PathBuf,
}

impl RunStateStore {
    pub fn new(state_directory: &Path) -> Self {
        Self {
            state_file_path: state_directory.join("state.json"),
        }
    }

    pub async fn load(&self) -> Result<Option<RunRecord>> {
        if !self.state_file_path.exists() {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&self.state_file_path)
            .await
            .map_err(|e| self.error("read", e))?;
        let record: RunRecord = serde_json::from_str(&json)?;
        Ok(Some(record))
    }

    pub async fn save(&self, record: &RunRecord) -> Result<()> {
        if let Some(parent) = self.state_file_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                OrchestratorError::State(format!(
                    "failed to create run record directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&self.state_file_path, json)
            .await
            .map_err(|e| self.error("write", e))?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.state_file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.error("remove", e)),
        }
    }

    fn error(&self, action: &str, e: std::io::Error) -> OrchestratorError {
        OrchestratorError::State(format!(
            "failed to {action} run record {}: {e}",
            self.state_file_path.display()
        ))
    }
}
