//! # integration-tests support
//!
//! Shared fixtures for the scenario tests: question builders, an
//! in-memory `VoteStore` with server-like semantics, and a recording
//! invalidation sink. Test targets live under `tests/`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use domains::test_clock::ManualClock;
use domains::{
    Choice, Clock, InvalidationSink, NoopSideEffects, Question, QuestionCounters, SubmitOutcome,
    Vote, VoteStore,
};
use services::{ActionKind, Quota, RateLimiter, VoteCache, VoteEngine};
use tokio::sync::Notify;
use uuid::Uuid;

/// Fixed origin for deterministic clocks.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn root_question(deadline: Option<DateTime<Utc>>) -> Question {
    Question {
        id: Uuid::new_v4(),
        author_id: Uuid::new_v4(),
        parent_id: None,
        depth: 0,
        target_choice: None,
        deadline,
        counters: QuestionCounters::default(),
        created_at: base_time() - Duration::days(1),
    }
}

pub fn derived_question(parent: &Question, target: Option<Choice>) -> Question {
    Question {
        id: Uuid::new_v4(),
        author_id: Uuid::new_v4(),
        parent_id: Some(parent.id),
        depth: parent.depth + 1,
        target_choice: target,
        deadline: parent.deadline,
        counters: QuestionCounters::default(),
        created_at: base_time() - Duration::hours(12),
    }
}

/// In-memory authoritative store. Records votes keyed by
/// (question, voter) and mirrors the server's own change bookkeeping so
/// reconciliation sees realistic rows. Can be told to refuse or stall
/// submissions to exercise rollback and in-flight serialization.
#[derive(Default)]
pub struct InMemoryVoteStore {
    votes: Mutex<HashMap<(Uuid, Uuid), Vote>>,
    reject_with: Mutex<Option<String>>,
    fail_transport: Mutex<bool>,
    stall: Mutex<Option<Arc<Notify>>>,
}

impl InMemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next submissions fail with an authoritative rejection.
    pub fn reject_submissions(&self, reason: &str) {
        *self.reject_with.lock().unwrap() = Some(reason.to_string());
    }

    pub fn accept_submissions(&self) {
        *self.reject_with.lock().unwrap() = None;
    }

    /// Make submissions fail like a dropped connection.
    pub fn fail_transport(&self, fail: bool) {
        *self.fail_transport.lock().unwrap() = fail;
    }

    /// Park every submission until `release()` is notified.
    pub fn stall_submissions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.stall.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn recorded_vote(&self, question_id: Uuid, voter_id: Uuid) -> Option<Vote> {
        self.votes.lock().unwrap().get(&(question_id, voter_id)).cloned()
    }

    /// Seed a pre-existing vote, as if placed in an earlier session.
    pub fn seed_vote(&self, vote: Vote) {
        self.votes.lock().unwrap().insert((vote.question_id, vote.voter_id), vote);
    }
}

#[async_trait]
impl VoteStore for InMemoryVoteStore {
    async fn fetch_votes(&self, question_id: Uuid) -> anyhow::Result<Vec<Vote>> {
        Ok(self
            .votes
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn submit_vote(
        &self,
        question_id: Uuid,
        voter_id: Uuid,
        choice: Choice,
    ) -> anyhow::Result<SubmitOutcome> {
        let gate = self.stall.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if *self.fail_transport.lock().unwrap() {
            anyhow::bail!("connection reset by peer");
        }
        if let Some(reason) = self.reject_with.lock().unwrap().clone() {
            return Ok(SubmitOutcome::Rejected { reason });
        }

        let mut votes = self.votes.lock().unwrap();
        let vote = match votes.get(&(question_id, voter_id)) {
            Some(existing) if existing.choice != choice => existing.changed_to(choice),
            Some(existing) => existing.clone(),
            None => Vote::first(question_id, voter_id, choice, Utc::now()),
        };
        votes.insert((question_id, voter_id), vote.clone());
        Ok(SubmitOutcome::Accepted(vote))
    }

    async fn fetch_parent_vote(
        &self,
        voter_id: Uuid,
        parent_question_id: Uuid,
    ) -> anyhow::Result<Option<Choice>> {
        Ok(self
            .votes
            .lock()
            .unwrap()
            .get(&(parent_question_id, voter_id))
            .map(|v| v.choice))
    }
}

/// Counts invalidation signals per question.
#[derive(Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Uuid>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for(&self, question_id: Uuid) -> usize {
        self.seen.lock().unwrap().iter().filter(|&&q| q == question_id).count()
    }
}

impl InvalidationSink for RecordingSink {
    fn invalidate(&self, question_id: Uuid) {
        self.seen.lock().unwrap().push(question_id);
    }
}

/// Fully wired engine over the in-memory store and a manual clock, using
/// the default configuration policy.
pub struct TestRig {
    pub engine: Arc<VoteEngine>,
    pub store: Arc<InMemoryVoteStore>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingSink>,
}

pub fn rig() -> TestRig {
    let settings = configs::Settings::default();
    let store = Arc::new(InMemoryVoteStore::new());
    let clock = Arc::new(ManualClock::at(base_time()));
    let sink = Arc::new(RecordingSink::new());
    let limiter = Arc::new(RateLimiter::new(
        HashMap::from([
            (
                ActionKind::Vote,
                Quota {
                    capacity: settings.rate_limits.vote_capacity,
                    window: Duration::seconds(settings.rate_limits.vote_window_secs as i64),
                },
            ),
            (
                ActionKind::Comment,
                Quota {
                    capacity: settings.rate_limits.comment_capacity,
                    window: Duration::seconds(settings.rate_limits.comment_window_secs as i64),
                },
            ),
        ]),
        clock.clone() as Arc<dyn Clock>,
    ));
    let engine = Arc::new(VoteEngine::new(
        store.clone(),
        clock.clone(),
        limiter,
        Arc::new(VoteCache::new()),
        sink.clone(),
        Arc::new(NoopSideEffects),
        settings.voting.persuasion_window(),
    ));
    TestRig { engine, store, clock, sink }
}
