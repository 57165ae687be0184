//! In-memory session store, used when no state file is configured.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::session_store::SessionStore;
use crate::usecases::session::Session;

/// Session store that lives as long as the process.
#[derive(Default)]
pub struct MemorySessionStore {
  session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
  async fn load(&self) -> Result<Option<Session>> {
    Ok(self.session.lock().await.clone())
  }

  async fn save(&self, session: &Session) -> Result<()> {
    *self.session.lock().await = Some(session.clone());
    Ok(())
  }

  async fn clear(&self) -> Result<()> {
    *self.session.lock().await = None;
    Ok(())
  }

  async fn is_healthy(&self) -> bool {
    true
  }
}
