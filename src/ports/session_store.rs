//! Session Store Port - Session Persistence Interface
//!
//! The advisor is stateless between commands; everything it
//! remembers lives in a `Session` snapshot loaded before and
//! saved after each interaction.

use async_trait::async_trait;

use crate::usecases::session::Session;

/// Trait for session persistence providers.
///
/// Implementations must replace the stored snapshot atomically:
/// a reader sees either the previous session or the new one.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
  /// Load the stored session, `None` on first use.
  async fn load(&self) -> anyhow::Result<Option<Session>>;

  /// Replace the stored session.
  async fn save(&self, session: &Session) -> anyhow::Result<()>;

  /// Remove the stored session.
  async fn clear(&self) -> anyhow::Result<()>;

  /// Check if the store is usable (path readable, permissions).
  async fn is_healthy(&self) -> bool;
}
