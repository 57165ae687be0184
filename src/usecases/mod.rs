//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with the session store port to
//! implement the advisor's three-phase workflow. Each phase is
//! a self-contained use case; `Advisor` sequences them.
//!
//! Use cases:
//! - `AnchorPhase`: Pre-match anchor allocation (60%)
//! - `ComboPhase`: Two-leg combinations (31%)
//! - `LiveEngine`: In-play scenario rules (9%, capped at 12%)
//! - `Session`: Phase gating, reset and recovery
//! - `Advisor`: Command orchestration over the store

pub mod advisor;
pub mod anchors;
pub mod combos;
pub mod live;
pub mod session;

pub use advisor::{Advisor, AnchorsCommand, CombosCommand, LiveCommand};
pub use session::Session;
