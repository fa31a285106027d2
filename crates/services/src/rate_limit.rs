//! # Rate Limiter
//!
//! Fixed-window counters keyed by (actor, action class). Advisory only:
//! the remote store enforces its own limits; this guard exists to give
//! immediate feedback and avoid wasted round-trips. The table is a
//! `DashMap`, so per-entry updates are atomic on a multi-threaded runtime
//! and sweeping cannot race an in-flight window update.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use domains::{Clock, Result, VoteError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Class of limited action. Limits are configured per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Vote,
    Comment,
}

/// Capacity within a fixed window for one action class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub capacity: u32,
    pub window: Duration,
}

impl Quota {
    pub fn per_minute(capacity: u32) -> Self {
        Quota { capacity, window: Duration::seconds(60) }
    }
}

/// Granted check, with what is left of the window budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub remaining: u32,
    pub resets_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_ends: DateTime<Utc>,
}

/// Process-local fixed-window rate limiter.
///
/// Entries are created lazily on first action and reset atomically when
/// their window elapses. [`RateLimiter::sweep`] drops elapsed entries to
/// bound memory; a background sweeper can be spawned with
/// [`RateLimiter::spawn_sweeper`].
pub struct RateLimiter {
    entries: DashMap<(Uuid, ActionKind), WindowEntry>,
    quotas: HashMap<ActionKind, Quota>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(quotas: HashMap<ActionKind, Quota>, clock: Arc<dyn Clock>) -> Self {
        RateLimiter { entries: DashMap::new(), quotas, clock }
    }

    /// Limiter with the observed production defaults: 10 votes/minute,
    /// 5 comments/minute.
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        let quotas = HashMap::from([
            (ActionKind::Vote, Quota::per_minute(10)),
            (ActionKind::Comment, Quota::per_minute(5)),
        ]);
        Self::new(quotas, clock)
    }

    /// Count one action for `actor`. Rejects with a typed error carrying
    /// the seconds until the window resets; never panics in normal
    /// operation.
    ///
    /// An action class with no configured quota is unlimited.
    pub fn check(&self, actor: Uuid, kind: ActionKind) -> Result<RateLimitDecision> {
        let Some(quota) = self.quotas.get(&kind).copied() else {
            return Ok(RateLimitDecision {
                remaining: u32::MAX,
                resets_at: self.clock.now(),
            });
        };
        let now = self.clock.now();

        // The entry guard holds the shard lock, so read-modify-write of
        // one (actor, kind) window is atomic.
        let mut entry = self
            .entries
            .entry((actor, kind))
            .or_insert(WindowEntry { count: 0, window_ends: now + quota.window });

        if now >= entry.window_ends {
            entry.count = 0;
            entry.window_ends = now + quota.window;
        }

        if entry.count >= quota.capacity {
            let reset_in_seconds = (entry.window_ends - now).num_seconds().max(0);
            debug!(%actor, ?kind, reset_in_seconds, "rate limit hit");
            return Err(VoteError::RateLimited { reset_in_seconds });
        }

        entry.count += 1;
        Ok(RateLimitDecision {
            remaining: quota.capacity - entry.count,
            resets_at: entry.window_ends,
        })
    }

    /// Drop entries whose window has elapsed. Entries still inside their
    /// window are never removed.
    pub fn sweep(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| now < entry.window_ends);
    }

    /// Number of live window entries. Exposed for tests and diagnostics.
    pub fn tracked_entries(&self) -> usize {
        self.entries.len()
    }

    /// Spawn a periodic sweeper owning its own lifecycle. Dropping or
    /// shutting down the returned handle stops the task.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: StdDuration) -> SweeperHandle {
        let limiter = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        });
        SweeperHandle { handle }
    }
}

/// Owns the background sweep task; aborts it on shutdown or drop.
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            self.handle.abort();
            warn!("rate limiter sweeper aborted on drop");
        }
    }
}
