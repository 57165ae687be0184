//! File Session Store - Atomic JSON Session Snapshots
//!
//! Saves the session to a JSON file using atomic writes
//! (write to a sibling tmp file, then rename), so a crash
//! mid-write never leaves a half-written session behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::ports::session_store::SessionStore;
use crate::usecases::session::Session;

/// Atomic JSON session store.
pub struct FileSessionStore {
  /// Path to the session file.
  state_path: PathBuf,
  /// Temporary path for atomic writes.
  tmp_path: PathBuf,
}

impl FileSessionStore {
  /// Create a store at `path`.
  ///
  /// Creates the parent directory if it doesn't exist.
  pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
    let state_path = path.as_ref().to_path_buf();
    if let Some(dir) = state_path.parent().filter(|d| !d.as_os_str().is_empty()) {
      fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
    }

    let mut tmp = state_path.clone().into_os_string();
    tmp.push(".tmp");

    Ok(Self {
      state_path,
      tmp_path: PathBuf::from(tmp),
    })
  }

  pub fn path(&self) -> &Path {
    &self.state_path
  }
}

#[async_trait]
impl SessionStore for FileSessionStore {
  #[instrument(skip(self), fields(path = %self.state_path.display()))]
  async fn load(&self) -> Result<Option<Session>> {
    if !fs::try_exists(&self.state_path).await.unwrap_or(false) {
      debug!("No session file found, starting fresh");
      return Ok(None);
    }

    let json = fs::read_to_string(&self.state_path)
      .await
      .context("Failed to read session file")?;

    let session: Session =
      serde_json::from_str(&json).context("Failed to parse session JSON")?;

    debug!(
      session = %session.id,
      phase = %session.phase,
      "Session loaded"
    );

    Ok(Some(session))
  }

  #[instrument(skip(self, session), fields(path = %self.state_path.display()))]
  async fn save(&self, session: &Session) -> Result<()> {
    let json =
      serde_json::to_string_pretty(session).context("Failed to serialize session")?;

    fs::write(&self.tmp_path, &json)
      .await
      .context("Failed to write tmp session file")?;

    fs::rename(&self.tmp_path, &self.state_path)
      .await
      .context("Failed to rename session file")?;

    debug!(session = %session.id, "Session saved");
    Ok(())
  }

  async fn clear(&self) -> Result<()> {
    if fs::try_exists(&self.state_path).await.unwrap_or(false) {
      fs::remove_file(&self.state_path)
        .await
        .context("Failed to remove session file")?;
      info!(path = %self.state_path.display(), "Session file removed");
    }
    Ok(())
  }

  async fn is_healthy(&self) -> bool {
    if !fs::try_exists(&self.state_path).await.unwrap_or(false) {
      return true; // First run is OK
    }
    fs::metadata(&self.state_path).await.is_ok()
  }
}
