//! # Core Traits (Ports)
//!
//! Contracts for the external collaborators the voting core depends on.
//! The remote store is the authoritative decision point for every vote;
//! everything the client decides locally is advisory UX optimization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Choice, SubmitOutcome, Vote};

/// Authoritative vote persistence and lookup.
///
/// Any fetch failure means "unknown state", never "no votes" — callers
/// must not treat an `Err` as an empty result.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// All live votes for a question.
    async fn fetch_votes(&self, question_id: Uuid) -> anyhow::Result<Vec<Vote>>;

    /// Submit a vote. The store applies its own gates and may reject even
    /// when the client believed the action was allowed.
    async fn submit_vote(
        &self,
        question_id: Uuid,
        voter_id: Uuid,
        choice: Choice,
    ) -> anyhow::Result<SubmitOutcome>;

    /// The actor's recorded choice on a parent question, if any. Used by
    /// derived-question gating.
    async fn fetch_parent_vote(
        &self,
        voter_id: Uuid,
        parent_question_id: Uuid,
    ) -> anyhow::Result<Option<Choice>>;
}

/// Time source. Injected so phase math, rate-limit windows, and sweeping
/// are testable against a manual clock.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used in production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Receives cache-invalidation signals so dependent read paths refetch.
/// Emitted after every settle and rollback.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait InvalidationSink: Send + Sync {
    fn invalidate(&self, question_id: Uuid);
}

/// Fire-and-forget background effects triggered by a settled vote.
/// Failures are logged and never affect the vote outcome.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SideEffects: Send + Sync {
    /// Check whether a "persuasion phase started" notification is due.
    async fn persuasion_started(&self, question_id: Uuid) -> anyhow::Result<()>;

    /// Check whether the voter's activity earned a spread reward.
    async fn spread_reward_check(&self, question_id: Uuid, voter_id: Uuid) -> anyhow::Result<()>;
}

/// No-op effects for consumers that do not wire notifications in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSideEffects;

#[async_trait]
impl SideEffects for NoopSideEffects {
    async fn persuasion_started(&self, _question_id: Uuid) -> anyhow::Result<()> {
        Ok(())
    }

    async fn spread_reward_check(&self, _question_id: Uuid, _voter_id: Uuid) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Discards invalidation signals; useful in tests and headless consumers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidationSink;

impl InvalidationSink for NoopInvalidationSink {
    fn invalidate(&self, _question_id: Uuid) {}
}

/// A hand-adjustable clock for tests.
#[cfg(any(test, feature = "testing"))]
pub mod test_clock {
    use std::sync::Mutex;

    use chrono::{DateTime, Duration, Utc};

    use super::Clock;

    /// Clock whose "now" only moves when told to.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn at(now: DateTime<Utc>) -> Self {
            ManualClock { now: Mutex::new(now) }
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }

        pub fn set(&self, to: DateTime<Utc>) {
            *self.now.lock().unwrap() = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
