//! Persistence Adapters - Session Storage
//!
//! Implements the `SessionStore` port with an atomic JSON file
//! (tmp write, then rename) and with process memory.
//! No database dependency.

pub mod file_store;
pub mod memory_store;

pub use file_store::FileSessionStore;
pub use memory_store::MemorySessionStore;
