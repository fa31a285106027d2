//! # Vote Cache
//!
//! Local, per-question copy of the authoritative vote state, used for
//! optimistic display. Each entry holds three slots: the `committed`
//! vote list as last confirmed by the store, an `optimistic` provisional
//! vote for an in-flight submission, and the last surfaced `error`.
//! The committed slot is written only by reconcile and by
//! invalidation-driven refreshes; rollback just drops the optimistic
//! slot, so a refresh that lands mid-flight is never undone.

use dashmap::DashMap;
use domains::{Choice, Tally, Vote};
use uuid::Uuid;

/// One question's cached vote state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    /// Votes as last confirmed by the authoritative store.
    pub committed: Vec<Vote>,
    /// Provisional vote applied before the remote call resolves.
    pub optimistic: Option<Vote>,
    /// Message from the last failed submission, for the UI to surface.
    pub error: Option<String>,
}

impl CacheEntry {
    /// The vote state the UI should treat as current: committed votes
    /// with the optimistic one (if any) overriding that voter's row.
    pub fn effective_votes(&self) -> Vec<Vote> {
        let mut votes = self.committed.clone();
        if let Some(opt) = &self.optimistic {
            match votes.iter_mut().find(|v| v.voter_id == opt.voter_id) {
                Some(slot) => *slot = opt.clone(),
                None => votes.push(opt.clone()),
            }
        }
        votes
    }

    /// The (committed, optimistic) pair, ignoring the error slot. This is
    /// the tally-effective state the rollback guarantee is stated over.
    pub fn vote_state(&self) -> (Vec<Vote>, Option<Vote>) {
        (self.committed.clone(), self.optimistic.clone())
    }

    pub fn vote_of(&self, voter_id: Uuid) -> Option<Vote> {
        self.effective_votes().into_iter().find(|v| v.voter_id == voter_id)
    }
}

/// Keyed by question id. The only shared mutable state in the subsystem;
/// written by the engine's optimistic-apply/reconcile/rollback steps and
/// by invalidation refreshes, read by everything else.
#[derive(Debug, Default)]
pub struct VoteCache {
    entries: DashMap<Uuid, CacheEntry>,
}

impl VoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, question_id: Uuid) -> Option<CacheEntry> {
        self.entries.get(&question_id).map(|e| e.clone())
    }

    pub fn contains(&self, question_id: Uuid) -> bool {
        self.entries.contains_key(&question_id)
    }

    /// The actor's current effective vote on a question, if cached.
    pub fn vote_of(&self, question_id: Uuid, voter_id: Uuid) -> Option<Vote> {
        self.entries.get(&question_id).and_then(|e| e.vote_of(voter_id))
    }

    /// Current tally including any optimistic entry.
    pub fn tally(&self, question_id: Uuid, viewer_id: Uuid) -> Tally {
        let Some(entry) = self.entries.get(&question_id) else {
            return Tally::default();
        };
        let mut tally = Tally::default();
        for vote in entry.effective_votes() {
            match vote.choice {
                Choice::Agree => tally.agree += 1,
                Choice::Disagree => tally.disagree += 1,
            }
            if vote.voter_id == viewer_id {
                tally.mine = Some(vote.choice);
            }
        }
        tally
    }

    /// Seed the committed slot from a fresh fetch, only if nothing is
    /// cached yet for this question.
    pub fn hydrate(&self, question_id: Uuid, votes: Vec<Vote>) {
        self.entries
            .entry(question_id)
            .or_insert_with(|| CacheEntry { committed: votes, ..CacheEntry::default() });
    }

    /// Apply `vote` to the optimistic slot. Clears any stale error from a
    /// previous attempt.
    pub fn apply_optimistic(&self, vote: Vote) {
        let mut entry = self.entries.entry(vote.question_id).or_default();
        entry.optimistic = Some(vote);
        entry.error = None;
    }

    /// Replace provisional state with the authoritative row: upsert it
    /// into the committed list and drop the optimistic slot.
    pub fn reconcile(&self, vote: Vote) {
        let mut entry = self.entries.entry(vote.question_id).or_default();
        match entry.committed.iter_mut().find(|v| v.voter_id == vote.voter_id) {
            Some(slot) => *slot = vote,
            None => entry.committed.push(vote),
        }
        entry.optimistic = None;
        entry.error = None;
    }

    /// Drop the optimistic slot and record the failure. The committed
    /// slot is untouched, so the entry reads exactly as it did before the
    /// optimistic apply — including any refresh that landed in between.
    pub fn rollback(&self, question_id: Uuid, reason: &str) {
        let mut entry = self.entries.entry(question_id).or_default();
        entry.optimistic = None;
        entry.error = Some(reason.to_string());
    }

    /// Invalidation-driven refresh: overwrite the committed slot with the
    /// refetched list. Idempotent, and must never clobber a live
    /// optimistic slot — an in-flight submission's provisional state
    /// survives any number of concurrent refreshes.
    pub fn refresh_committed(&self, question_id: Uuid, votes: Vec<Vote>) {
        let mut entry = self.entries.entry(question_id).or_default();
        entry.committed = votes;
    }
}
