//! # Vote Engine
//!
//! Orchestrates one vote submission end to end: phase gate, rate check,
//! derived-question authorization, the single-change persuasion rule,
//! optimistic cache apply, authoritative submission, and reconciliation
//! or rollback. Per (question, actor) submissions are serialized with an
//! in-flight marker; everything else may interleave freely.
//!
//! The engine's local gates are advisory. The remote store re-checks
//! everything and its answer wins — a remote rejection after a passed
//! local gate is normal (stale cache, concurrent deadline closure) and
//! results in a clean rollback.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use domains::{
    Choice, Clock, InvalidationSink, Phase, Question, Result, SideEffects, SubmitOutcome, Vote,
    VoteError, VoteStore,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::access;
use crate::cache::VoteCache;
use crate::phase::phase_of;
use crate::rate_limit::{ActionKind, RateLimiter};

/// What a successful submission did.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    /// The store accepted and returned the authoritative row.
    Recorded(Vote),
    /// The actor already held this exact vote; nothing was sent.
    Unchanged(Vote),
}

impl VoteOutcome {
    pub fn vote(&self) -> &Vote {
        match self {
            VoteOutcome::Recorded(v) | VoteOutcome::Unchanged(v) => v,
        }
    }
}

/// The per-process voting orchestrator. Holds the optimistic cache and
/// the in-flight table; collaborators are injected behind ports.
pub struct VoteEngine {
    store: Arc<dyn VoteStore>,
    clock: Arc<dyn Clock>,
    limiter: Arc<RateLimiter>,
    cache: Arc<VoteCache>,
    sink: Arc<dyn InvalidationSink>,
    effects: Arc<dyn SideEffects>,
    persuasion_window: Duration,
    in_flight: DashMap<(Uuid, Uuid), ()>,
}

impl VoteEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn VoteStore>,
        clock: Arc<dyn Clock>,
        limiter: Arc<RateLimiter>,
        cache: Arc<VoteCache>,
        sink: Arc<dyn InvalidationSink>,
        effects: Arc<dyn SideEffects>,
        persuasion_window: Duration,
    ) -> Self {
        VoteEngine {
            store,
            clock,
            limiter,
            cache,
            sink,
            effects,
            persuasion_window,
            in_flight: DashMap::new(),
        }
    }

    /// Read access to the shared vote cache (tally display, controllers).
    pub fn cache(&self) -> &Arc<VoteCache> {
        &self.cache
    }

    /// Phase of `question` right now.
    pub fn phase(&self, question: &Question) -> Phase {
        phase_of(question.deadline, self.clock.now(), self.persuasion_window)
    }

    /// Submit `actor`'s vote on `question`. `parent` is the parent
    /// question when the caller has it (derived questions); it feeds the
    /// author exemption of the gating rules.
    #[instrument(skip_all, fields(question_id = %question.id, %actor, %choice))]
    pub async fn submit(
        &self,
        question: &Question,
        parent: Option<&Question>,
        actor: Uuid,
        choice: Choice,
    ) -> Result<VoteOutcome> {
        let phase = self.phase(question);
        if phase == Phase::Closed {
            return Err(VoteError::VotingClosed);
        }

        let _guard = self.claim_in_flight(question.id, actor)?;

        self.limiter.check(actor, ActionKind::Vote)?;
        access::can_act_on(actor, question, parent, self.store.as_ref()).await?;

        let vote = match self.plan_vote(question, actor, choice, phase).await? {
            Plan::Submit(vote) => vote,
            Plan::NoOp(existing) => return Ok(VoteOutcome::Unchanged(existing)),
        };

        // Optimistic apply happens strictly before the remote call.
        self.cache.apply_optimistic(vote.clone());

        match self.store.submit_vote(question.id, actor, choice).await {
            Ok(SubmitOutcome::Accepted(authoritative)) => {
                self.cache.reconcile(authoritative.clone());
                self.sink.invalidate(question.id);
                self.fire_background_effects(question.id, actor, phase);
                Ok(VoteOutcome::Recorded(authoritative))
            }
            Ok(SubmitOutcome::Rejected { reason }) => {
                debug!(%reason, "authoritative store rejected vote");
                self.cache.rollback(question.id, &reason);
                self.sink.invalidate(question.id);
                Err(VoteError::RemoteRejected { reason })
            }
            Err(err) => {
                warn!(error = %err, "vote submission transport failure");
                let reason = err.to_string();
                self.cache.rollback(question.id, &reason);
                self.sink.invalidate(question.id);
                Err(VoteError::Store(err))
            }
        }
    }

    /// The store signalled that a question's votes changed. Refetch and
    /// refresh the committed slot only; a live optimistic slot survives.
    pub async fn handle_invalidation(&self, question_id: Uuid) -> Result<()> {
        let votes = self.store.fetch_votes(question_id).await?;
        self.cache.refresh_committed(question_id, votes);
        Ok(())
    }

    /// Decide what this submission means for the actor's existing vote.
    async fn plan_vote(
        &self,
        question: &Question,
        actor: Uuid,
        choice: Choice,
        phase: Phase,
    ) -> Result<Plan> {
        // A fetch failure here is "unknown state": surface it rather than
        // assuming no votes exist.
        if !self.cache.contains(question.id) {
            let votes = self.store.fetch_votes(question.id).await?;
            self.cache.hydrate(question.id, votes);
        }

        let existing = self.cache.vote_of(question.id, actor);
        let now = self.clock.now();

        match existing {
            None => Ok(Plan::Submit(Vote::first(question.id, actor, choice, now))),
            Some(current) if current.choice == choice => Ok(Plan::NoOp(current)),
            Some(current) => match phase {
                // First vote is final until the persuasion window opens.
                Phase::Open => Err(VoteError::VoteLocked),
                Phase::Persuasion if current.changed_in_persuasion => {
                    Err(VoteError::PersuasionChangeExhausted)
                }
                Phase::Persuasion => Ok(Plan::Submit(current.changed_to(choice))),
                Phase::Closed => Err(VoteError::VotingClosed),
            },
        }
    }

    fn claim_in_flight(&self, question_id: Uuid, actor: Uuid) -> Result<InFlightGuard<'_>> {
        use dashmap::mapref::entry::Entry;
        match self.in_flight.entry((question_id, actor)) {
            Entry::Occupied(_) => Err(VoteError::SubmissionInFlight),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightGuard { map: &self.in_flight, key: (question_id, actor) })
            }
        }
    }

    /// Non-blocking follow-ups after a settled vote. Failures are logged
    /// and never reach the caller.
    fn fire_background_effects(&self, question_id: Uuid, actor: Uuid, phase: Phase) {
        let effects = Arc::clone(&self.effects);
        tokio::spawn(async move {
            if phase == Phase::Persuasion {
                if let Err(err) = effects.persuasion_started(question_id).await {
                    warn!(error = %err, %question_id, "persuasion notification check failed");
                }
            }
            if let Err(err) = effects.spread_reward_check(question_id, actor).await {
                warn!(error = %err, %question_id, "spread reward check failed");
            }
        });
    }
}

enum Plan {
    Submit(Vote),
    NoOp(Vote),
}

/// Marks a (question, actor) submission as in flight; released on drop
/// whether the submission settled or failed.
struct InFlightGuard<'a> {
    map: &'a DashMap<(Uuid, Uuid), ()>,
    key: (Uuid, Uuid),
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domains::test_clock::ManualClock;
    use domains::{
        MockInvalidationSink, MockVoteStore, NoopSideEffects, QuestionCounters,
    };
    use std::collections::HashMap;

    use crate::rate_limit::Quota;

    fn base_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn question_with_deadline(minutes_from_now: i64) -> Question {
        Question {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            parent_id: None,
            depth: 0,
            target_choice: None,
            deadline: Some(base_time() + Duration::minutes(minutes_from_now)),
            counters: QuestionCounters::default(),
            created_at: base_time() - Duration::days(1),
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        engine: VoteEngine,
    }

    fn harness(store: MockVoteStore, sink: MockInvalidationSink) -> Harness {
        let clock = Arc::new(ManualClock::at(base_time()));
        let limiter = Arc::new(RateLimiter::new(
            HashMap::from([(ActionKind::Vote, Quota::per_minute(10))]),
            clock.clone() as Arc<dyn Clock>,
        ));
        let engine = VoteEngine::new(
            Arc::new(store),
            clock.clone(),
            limiter,
            Arc::new(VoteCache::new()),
            Arc::new(sink),
            Arc::new(NoopSideEffects),
            Duration::seconds(crate::phase::DEFAULT_PERSUASION_WINDOW_SECS),
        );
        Harness { clock, engine }
    }

    fn accepting_store() -> MockVoteStore {
        let mut store = MockVoteStore::new();
        store.expect_fetch_votes().returning(|_| Ok(vec![]));
        store.expect_submit_vote().returning(|qid, actor, choice| {
            Ok(SubmitOutcome::Accepted(Vote::first(qid, actor, choice, Utc::now())))
        });
        store
    }

    fn counting_sink(expected: usize) -> MockInvalidationSink {
        let mut sink = MockInvalidationSink::new();
        sink.expect_invalidate().times(expected).return_const(());
        sink
    }

    #[tokio::test]
    async fn first_vote_in_open_phase_is_recorded() {
        let question = question_with_deadline(300); // deep in the open phase
        let actor = Uuid::new_v4();
        let h = harness(accepting_store(), counting_sink(1));

        let outcome = h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap();
        assert!(matches!(outcome, VoteOutcome::Recorded(_)));

        let tally = h.engine.cache().tally(question.id, actor);
        assert_eq!(tally.agree, 1);
        assert_eq!(tally.mine, Some(Choice::Agree));
    }

    #[tokio::test]
    async fn closed_phase_rejects_before_any_collaborator_call() {
        let question = question_with_deadline(-1);
        let mut store = MockVoteStore::new();
        store.expect_fetch_votes().never();
        store.expect_submit_vote().never();
        let h = harness(store, counting_sink(0));

        let err = h.engine.submit(&question, None, Uuid::new_v4(), Choice::Agree).await.unwrap_err();
        assert!(matches!(err, VoteError::VotingClosed));
    }

    #[tokio::test]
    async fn open_phase_change_attempt_is_locked() {
        let question = question_with_deadline(300);
        let actor = Uuid::new_v4();
        let h = harness(accepting_store(), counting_sink(1));

        h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap();
        let err = h.engine.submit(&question, None, actor, Choice::Disagree).await.unwrap_err();
        assert!(matches!(err, VoteError::VoteLocked));
    }

    #[tokio::test]
    async fn same_choice_resubmission_is_a_no_op() {
        let question = question_with_deadline(300);
        let actor = Uuid::new_v4();
        let h = harness(accepting_store(), counting_sink(1));

        h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap();
        let outcome = h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap();
        assert!(matches!(outcome, VoteOutcome::Unchanged(_)));
    }

    #[tokio::test]
    async fn persuasion_phase_allows_exactly_one_change() {
        let question = question_with_deadline(30); // inside the 60-minute window
        let actor = Uuid::new_v4();
        let mut store = MockVoteStore::new();
        store.expect_fetch_votes().returning(|_| Ok(vec![]));
        store.expect_submit_vote().returning(|qid, voter, choice| {
            // Echo back a row whose flag the client state machine drives;
            // the real store recomputes this itself.
            let mut vote = Vote::first(qid, voter, choice, Utc::now());
            if choice == Choice::Disagree {
                vote.changed_in_persuasion = true;
                vote.original_choice = Some(Choice::Agree);
            }
            Ok(SubmitOutcome::Accepted(vote))
        });
        let h = harness(store, counting_sink(2));

        h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap();
        let changed = h.engine.submit(&question, None, actor, Choice::Disagree).await.unwrap();
        assert!(changed.vote().changed_in_persuasion);
        assert_eq!(changed.vote().original_choice, Some(Choice::Agree));

        let err = h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap_err();
        assert!(matches!(err, VoteError::PersuasionChangeExhausted));

        // Cache still shows the settled change, untouched by the failure.
        assert_eq!(h.engine.cache().tally(question.id, actor).mine, Some(Choice::Disagree));
    }

    #[tokio::test]
    async fn remote_rejection_rolls_the_cache_back() {
        let question = question_with_deadline(300);
        let actor = Uuid::new_v4();
        let mut store = MockVoteStore::new();
        store.expect_fetch_votes().returning(|_| Ok(vec![]));
        store.expect_submit_vote().returning(|_, _, _| {
            Ok(SubmitOutcome::Rejected { reason: "deadline passed".into() })
        });
        let h = harness(store, counting_sink(1));

        let before = h.engine.cache().entry(question.id);
        let err = h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap_err();
        assert!(matches!(err, VoteError::RemoteRejected { .. }));

        let after = h.engine.cache().entry(question.id).unwrap();
        assert_eq!(
            after.vote_state(),
            before.map(|e| e.vote_state()).unwrap_or_default()
        );
        assert_eq!(after.error.as_deref(), Some("deadline passed"));
        assert_eq!(h.engine.cache().tally(question.id, actor).mine, None);
    }

    #[tokio::test]
    async fn transport_failure_rolls_back_and_surfaces_store_error() {
        let question = question_with_deadline(300);
        let actor = Uuid::new_v4();
        let mut store = MockVoteStore::new();
        store.expect_fetch_votes().returning(|_| Ok(vec![]));
        store
            .expect_submit_vote()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset")));
        let h = harness(store, counting_sink(1));

        let err = h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap_err();
        assert!(matches!(err, VoteError::Store(_)));
        assert_eq!(h.engine.cache().tally(question.id, actor).mine, None);
    }

    #[tokio::test]
    async fn rate_limit_rejects_without_touching_the_cache() {
        let question = question_with_deadline(300);
        let actor = Uuid::new_v4();
        let clock = Arc::new(ManualClock::at(base_time()));
        let limiter = Arc::new(RateLimiter::new(
            HashMap::from([(ActionKind::Vote, Quota::per_minute(1))]),
            clock.clone() as Arc<dyn Clock>,
        ));
        let engine = VoteEngine::new(
            Arc::new(accepting_store()),
            clock,
            limiter,
            Arc::new(VoteCache::new()),
            Arc::new(counting_sink(1)),
            Arc::new(NoopSideEffects),
            Duration::seconds(crate::phase::DEFAULT_PERSUASION_WINDOW_SECS),
        );

        engine.submit(&question, None, actor, Choice::Agree).await.unwrap();
        let err = engine.submit(&question, None, actor, Choice::Disagree).await.unwrap_err();
        assert!(matches!(err, VoteError::RateLimited { .. }));
        // No rollback artifacts: the settled state is untouched.
        assert!(engine.cache().entry(question.id).unwrap().error.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_is_unknown_state_not_no_votes() {
        let question = question_with_deadline(300);
        let mut store = MockVoteStore::new();
        store
            .expect_fetch_votes()
            .returning(|_| Err(anyhow::anyhow!("timeout")));
        store.expect_submit_vote().never();
        let h = harness(store, counting_sink(0));

        let err = h.engine.submit(&question, None, Uuid::new_v4(), Choice::Agree).await.unwrap_err();
        assert!(matches!(err, VoteError::Store(_)));
        assert!(h.engine.cache().entry(question.id).is_none());
    }

    #[tokio::test]
    async fn questions_without_deadlines_never_close() {
        let mut question = question_with_deadline(0);
        question.deadline = None;
        let actor = Uuid::new_v4();
        let h = harness(accepting_store(), counting_sink(1));

        h.clock.advance(Duration::days(365 * 10));
        assert_eq!(h.engine.phase(&question), Phase::Open);
        h.engine.submit(&question, None, actor, Choice::Agree).await.unwrap();
    }

    #[tokio::test]
    async fn invalidation_refresh_updates_committed_slot() {
        let question = question_with_deadline(300);
        let other = Uuid::new_v4();
        let qid = question.id;
        let mut store = MockVoteStore::new();
        store.expect_fetch_votes().returning(move |q| {
            Ok(vec![Vote::first(q, other, Choice::Disagree, Utc::now())])
        });
        let h = harness(store, counting_sink(0));

        h.engine.handle_invalidation(qid).await.unwrap();
        let tally = h.engine.cache().tally(qid, Uuid::new_v4());
        assert_eq!(tally.disagree, 1);
    }
}
