//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use-case layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `SessionStore`: Session snapshot persistence

pub mod session_store;

pub use session_store::SessionStore;
