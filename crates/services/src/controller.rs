//! # Vote Controller
//!
//! UI-facing state machine for the vote buttons and their confirmation
//! dialog: `Idle → Confirming → Submitting → Settled`. `Confirming` is
//! entered only when the tap would consume the single allowed
//! persuasion-phase change; the prompt is rendered from cached state
//! alone, so cancelling costs nothing — no rate-limit token, no
//! authorization lookup, no engine call.

use std::sync::Arc;

use domains::{Choice, Phase, Question, Result};
use uuid::Uuid;

use crate::engine::{VoteEngine, VoteOutcome};

/// A vote the user asked for but has not yet confirmed or sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingVote {
    pub question: Question,
    pub parent: Option<Question>,
    pub actor: Uuid,
    pub choice: Choice,
}

/// Where the vote UI is in its lifecycle.
#[derive(Debug)]
pub enum ControllerState {
    Idle,
    /// Waiting for the user to acknowledge an irreversible persuasion-phase
    /// change. No engine call has been made.
    Confirming(PendingVote),
    Submitting,
    Settled(Result<VoteOutcome>),
}

impl ControllerState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ControllerState::Idle)
    }

    pub fn is_confirming(&self) -> bool {
        matches!(self, ControllerState::Confirming(_))
    }
}

/// Drives one question's vote buttons against the engine.
pub struct VoteController {
    engine: Arc<VoteEngine>,
    state: ControllerState,
}

impl VoteController {
    pub fn new(engine: Arc<VoteEngine>) -> Self {
        VoteController { engine, state: ControllerState::Idle }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Handle a vote button tap.
    ///
    /// If the tap would overwrite an existing different vote during the
    /// persuasion phase, park in `Confirming` and wait for an explicit
    /// [`confirm`](Self::confirm) — that change is irreversible until the
    /// deadline. Everything else submits immediately.
    pub async fn request_vote(
        &mut self,
        question: Question,
        parent: Option<Question>,
        actor: Uuid,
        choice: Choice,
    ) -> &ControllerState {
        let pending = PendingVote { question, parent, actor, choice };
        if self.needs_confirmation(&pending) {
            self.state = ControllerState::Confirming(pending);
        } else {
            self.submit(pending).await;
        }
        &self.state
    }

    /// User acknowledged the confirmation prompt: execute the parked vote.
    pub async fn confirm(&mut self) -> &ControllerState {
        match std::mem::replace(&mut self.state, ControllerState::Idle) {
            ControllerState::Confirming(pending) => self.submit(pending).await,
            // confirm() outside Confirming is a UI bug; treat as a no-op.
            other => self.state = other,
        }
        &self.state
    }

    /// User dismissed the confirmation prompt. Returns to `Idle`; the
    /// engine was never involved.
    pub fn cancel(&mut self) -> &ControllerState {
        if self.state.is_confirming() {
            self.state = ControllerState::Idle;
        }
        &self.state
    }

    /// Clear a settled outcome once the UI has shown it.
    pub fn acknowledge(&mut self) -> &ControllerState {
        if matches!(self.state, ControllerState::Settled(_)) {
            self.state = ControllerState::Idle;
        }
        &self.state
    }

    /// Decided purely from the local cache and clock: an existing,
    /// different, not-yet-changed vote during the persuasion phase needs
    /// the irreversibility prompt.
    fn needs_confirmation(&self, pending: &PendingVote) -> bool {
        if self.engine.phase(&pending.question) != Phase::Persuasion {
            return false;
        }
        match self.engine.cache().vote_of(pending.question.id, pending.actor) {
            Some(existing) => {
                existing.choice != pending.choice && !existing.changed_in_persuasion
            }
            None => false,
        }
    }

    async fn submit(&mut self, pending: PendingVote) {
        self.state = ControllerState::Submitting;
        let result = self
            .engine
            .submit(&pending.question, pending.parent.as_ref(), pending.actor, pending.choice)
            .await;
        self.state = ControllerState::Settled(result);
    }
}
