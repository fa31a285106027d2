//! agora/crates/services/src/lib.rs
//!
//! Behavior of the voting core: deadline/phase math, client-side rate
//! limiting, derived-question authorization, question-tree assembly, the
//! vote engine with its optimistic cache, and the vote-button controller
//! state machine. All remote collaborators are consumed through the port
//! traits defined in `domains`.

pub mod access;
pub mod cache;
pub mod controller;
pub mod engine;
pub mod phase;
pub mod rate_limit;
pub mod tree;

pub use cache::VoteCache;
pub use controller::{ControllerState, VoteController};
pub use engine::{VoteEngine, VoteOutcome};
pub use rate_limit::{ActionKind, Quota, RateLimiter};
