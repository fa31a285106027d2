//! # Domain Models
//!
//! Core entities of the agora voting subsystem. Identity is UUID-based;
//! all timestamps are UTC. Aggregate counters are read-only projections
//! maintained by the remote store — the client never mutates them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on question nesting. A question at this depth may not have
/// derived children created under it.
pub const MAX_QUESTION_DEPTH: u8 = 3;

/// The two sides of every question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Agree,
    Disagree,
}

impl Choice {
    /// The numeric wire value used by the remote store (+1 / -1).
    pub fn as_i8(self) -> i8 {
        match self {
            Choice::Agree => 1,
            Choice::Disagree => -1,
        }
    }

    pub fn opposite(self) -> Choice {
        match self {
            Choice::Agree => Choice::Disagree,
            Choice::Disagree => Choice::Agree,
        }
    }
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Choice::Agree => write!(f, "agree"),
            Choice::Disagree => write!(f, "disagree"),
        }
    }
}

/// Discrete voting phase, derived from "now" vs. the question deadline.
/// Never stored; always recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Open,
    Persuasion,
    Closed,
}

/// Structured countdown toward a deadline, each component clamped >= 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub expired: bool,
}

impl TimeRemaining {
    /// The "never expires" descriptor used for questions without a deadline.
    pub fn unbounded() -> Self {
        TimeRemaining { days: 0, hours: 0, minutes: 0, seconds: 0, expired: false }
    }
}

/// Read-only aggregates projected by the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCounters {
    pub agree_votes: u32,
    pub disagree_votes: u32,
    pub comments: u32,
}

/// A postable, votable item. A question may be *derived*: nested under a
/// parent question and optionally gated to users who voted a specific way
/// on that parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub author_id: Uuid,
    /// `None` marks a root question.
    pub parent_id: Option<Uuid>,
    /// Nesting depth; invariant `depth == parent.depth + 1`, capped at
    /// [`MAX_QUESTION_DEPTH`].
    pub depth: u8,
    /// When set, only users whose vote on the *parent* matches may see or
    /// vote on this question. Requires `parent_id` to be set.
    pub target_choice: Option<Choice>,
    /// `None` means voting never closes.
    pub deadline: Option<DateTime<Utc>>,
    pub counters: QuestionCounters,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A recorded vote. At most one live vote per (question, voter); written
/// exclusively by the authoritative store. The client only ever holds a
/// cached copy of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub question_id: Uuid,
    pub voter_id: Uuid,
    pub choice: Choice,
    /// Set once the single allowed persuasion-phase change is consumed.
    pub changed_in_persuasion: bool,
    /// Snapshot of the pre-change choice, taken at the moment of that one
    /// allowed change. `None` until then.
    pub original_choice: Option<Choice>,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    /// A fresh first vote, change budget untouched.
    pub fn first(question_id: Uuid, voter_id: Uuid, choice: Choice, at: DateTime<Utc>) -> Self {
        Vote {
            question_id,
            voter_id,
            choice,
            changed_in_persuasion: false,
            original_choice: None,
            created_at: at,
        }
    }

    /// The one allowed persuasion-phase change applied to `self`.
    pub fn changed_to(&self, choice: Choice) -> Self {
        Vote {
            choice,
            changed_in_persuasion: true,
            original_choice: Some(self.choice),
            ..self.clone()
        }
    }
}

/// Outcome of an authoritative vote submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubmitOutcome {
    /// The store accepted the vote and returned the authoritative row.
    Accepted(Vote),
    /// The store refused the vote (its own gates are the source of truth
    /// and may disagree with the client's).
    Rejected { reason: String },
}

/// Per-question tally as the UI should render it right now, optimistic
/// entries included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub agree: u32,
    pub disagree: u32,
    /// The local actor's current (possibly provisional) choice.
    pub mine: Option<Choice>,
}
