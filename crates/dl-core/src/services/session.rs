//! Lifecycle of the single named session and its component windows.
//!
//! Existence checks always go to the multiplexer. Windows can disappear when
//! their process exits, so nothing here keeps an in-memory mirror.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};
use crate::models::WindowInfo;

/// Raw terminal-multiplexer operations. `TmuxMultiplexer` is the live backend.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    async fn has_session(&self, name: &str) -> Result<bool>;
    async fn new_session(&self, name: &str, window: &str, working_dir: &Path) -> Result<()>;
    async fn new_window(
        &self,
        session: &str,
        window: &str,
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<()>;
    /// Type `line` into the window and press Enter.
    async fn send_line(&self, session: &str, window: &str, line: &str) -> Result<()>;
    async fn send_interrupt(&self, session: &str, window: &str) -> Result<()>;
    /// Live windows in index order; empty when the session is absent.
    async fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>>;
    /// Succeeds when the session is already gone.
    async fn kill_session(&self, name: &str) -> Result<()>;
    async fn attach(&self, name: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn Multiplexer>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn Multiplexer>) -> Self {
        Self { backend }
    }

    pub async fn session_exists(&self, name: &str) -> Result<bool> {
        self.backend.has_session(name).await
    }

    /// Create the session with its initial window. Callers check existence
    /// first and decide what to do with a live session; this never replaces one.
    pub async fn create_session(
        &self,
        name: &str,
        initial_window: &str,
        working_dir: &Path,
    ) -> Result<()> {
        if self.backend.has_session(name).await? {
            return Err(OrchestratorError::SessionExists(name.to_string()));
        }
        tracing::info!(session = name, window = initial_window, "session_create");
        self.backend
            .new_session(name, initial_window, working_dir)
            .await
    }

    pub async fn create_window(
        &self,
        session: &str,
        window: &str,
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<()> {
        if !self.backend.has_session(session).await? {
            return Err(OrchestratorError::SessionNotFound(session.to_string()));
        }
        if self.window_exists(session, window).await? {
            return Err(OrchestratorError::WindowExists {
                session: session.to_string(),
                window: window.to_string(),
            });
        }
        tracing::info!(session, window, dir = %working_dir.display(), "window_create");
        self.backend
            .new_window(session, window, working_dir, env)
            .await
    }

    /// Send a command line to a window. Returns as soon as it is typed; the
    /// command runs asynchronously to the caller.
    pub async fn dispatch(&self, session: &str, window: &str, command: &str) -> Result<()> {
        self.require_window(session, window).await?;
        tracing::debug!(session, window, command, "window_dispatch");
        self.backend.send_line(session, window, command).await
    }

    pub async fn interrupt(&self, session: &str, window: &str) -> Result<()> {
        self.require_window(session, window).await?;
        tracing::debug!(session, window, "window_interrupt");
        self.backend.send_interrupt(session, window).await
    }

    pub async fn list_windows(&self, session: &str) -> Result<Vec<WindowInfo>> {
        self.backend.list_windows(session).await
    }

    /// Kill the session. A missing session is not an error.
    pub async fn destroy_session(&self, name: &str) -> Result<()> {
        if !self.backend.has_session(name).await? {
            tracing::debug!(session = name, "session_destroy_skipped");
            return Ok(());
        }
        tracing::info!(session = name, "session_destroy");
        self.backend.kill_session(name).await
    }

    pub async fn attach(&self, name: &str) -> Result<()> {
        if !self.backend.has_session(name).await? {
            return Err(OrchestratorError::SessionNotFound(name.to_string()));
        }
        self.backend.attach(name).await
    }

    async fn window_exists(&self, session: &str, window: &str) -> Result<bool> {
        Ok(self
            .backend
            .list_windows(session)
            .await?
            .iter()
            .any(|w| w.name == window))
    }

    async fn require_window(&self, session: &str, window: &str) -> Result<()> {
        if !self.backend.has_session(session).await? {
            return Err(OrchestratorError::SessionNotFound(session.to_string()));
        }
        if !self.window_exists(session, window).await? {
            return Err(OrchestratorError::WindowNotFound {
                session: session.to_string(),
                window: window.to_string(),
            });
        }
        Ok(())
    }
}
