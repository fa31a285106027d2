//! # VoteError
//!
//! Centralized error taxonomy for the voting core. Policy rejections are
//! detected locally before any cache mutation; remote and transport
//! failures always arrive after an optimistic apply and therefore trigger
//! a rollback in the engine. Nothing here is fatal to the process.

use thiserror::Error;

/// The primary error type for all voting operations.
#[derive(Error, Debug)]
pub enum VoteError {
    /// Client-side fixed-window limit hit. Advisory only — the store
    /// enforces its own limits — but saves a wasted round-trip.
    #[error("too many requests: retry in {reset_in_seconds}s")]
    RateLimited { reset_in_seconds: i64 },

    /// Derived-question gating or depth validation refused the action.
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The single allowed persuasion-phase vote change was already used.
    #[error("vote already changed once during the persuasion phase")]
    PersuasionChangeExhausted,

    /// A vote placed in the open phase is final until the persuasion
    /// window opens.
    #[error("vote can be changed only during the persuasion window")]
    VoteLocked,

    /// The deadline has passed.
    #[error("voting ended")]
    VotingClosed,

    /// Another submission for the same (question, actor) is still in
    /// flight; submissions are serialized per pair.
    #[error("a vote submission for this question is already in flight")]
    SubmissionInFlight,

    /// Declared nesting depth does not match parent.depth + 1, or the
    /// parent already sits at the nesting cap.
    #[error("invalid question depth {declared}, expected {expected}")]
    InvalidDepth { declared: u8, expected: u8 },

    /// The authoritative store refused the vote after the client's own
    /// gates had passed (e.g. concurrent deadline closure).
    #[error("vote rejected by server: {reason}")]
    RemoteRejected { reason: String },

    /// Collaborator/transport failure (network, timeout). Treated exactly
    /// like a remote rejection: rollback, surface, no retry here.
    #[error("data store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl VoteError {
    /// True for rejections decided locally, before any cache mutation.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            VoteError::RateLimited { .. }
                | VoteError::Unauthorized { .. }
                | VoteError::PersuasionChangeExhausted
                | VoteError::VoteLocked
                | VoteError::VotingClosed
                | VoteError::SubmissionInFlight
                | VoteError::InvalidDepth { .. }
        )
    }
}

/// A specialized Result type for voting logic.
pub type Result<T> = std::result::Result<T, VoteError>;
