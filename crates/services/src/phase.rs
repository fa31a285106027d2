//! # Phase Calculator
//!
//! Pure deadline math: which phase a question is in and how long remains.
//! No side effects, no panics. When duration arithmetic cannot be
//! represented, the result fails safe toward `Closed`/expired — showing
//! "voting closed" is the harmless default.

use chrono::{DateTime, Duration, Utc};
use domains::{Phase, TimeRemaining};

/// Default length of the persuasion window preceding a deadline.
/// Deployments override this via `Settings`; call sites must take the
/// window as a parameter rather than reaching for this constant.
pub const DEFAULT_PERSUASION_WINDOW_SECS: i64 = 3600;

/// Phase of a question at `now`, given the persuasion window length.
///
/// A question without a deadline is open forever.
pub fn phase_of(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> Phase {
    let Some(deadline) = deadline else {
        return Phase::Open;
    };
    if now >= deadline {
        return Phase::Closed;
    }
    match deadline.checked_sub_signed(window) {
        Some(window_start) if now >= window_start => Phase::Persuasion,
        Some(_) => Phase::Open,
        // Window start underflows the representable range: the whole
        // lifetime of the question sits inside the window.
        None => Phase::Persuasion,
    }
}

/// Structured countdown toward `deadline`, components clamped >= 0.
pub fn remaining(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> TimeRemaining {
    let Some(deadline) = deadline else {
        return TimeRemaining::unbounded();
    };
    let left = deadline - now;
    if left <= Duration::zero() {
        return TimeRemaining { days: 0, hours: 0, minutes: 0, seconds: 0, expired: true };
    }
    let secs = left.num_seconds();
    TimeRemaining {
        days: secs / 86_400,
        hours: (secs % 86_400) / 3_600,
        minutes: (secs % 3_600) / 60,
        seconds: secs % 60,
        expired: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn window() -> Duration {
        Duration::seconds(DEFAULT_PERSUASION_WINDOW_SECS)
    }

    #[test]
    fn no_deadline_is_always_open() {
        assert_eq!(phase_of(None, t0(), window()), Phase::Open);
        assert_eq!(phase_of(None, t0() + Duration::days(10_000), window()), Phase::Open);
    }

    #[test]
    fn phase_boundaries() {
        let deadline = t0() + Duration::hours(2);
        // Well before the window
        assert_eq!(phase_of(Some(deadline), t0(), window()), Phase::Open);
        // Exactly at window start
        assert_eq!(
            phase_of(Some(deadline), deadline - window(), window()),
            Phase::Persuasion
        );
        // Just inside the window
        assert_eq!(
            phase_of(Some(deadline), deadline - Duration::minutes(30), window()),
            Phase::Persuasion
        );
        // Exactly at the deadline
        assert_eq!(phase_of(Some(deadline), deadline, window()), Phase::Closed);
        // After the deadline
        assert_eq!(
            phase_of(Some(deadline), deadline + Duration::seconds(1), window()),
            Phase::Closed
        );
    }

    #[test]
    fn phase_is_monotonic_over_time() {
        let deadline = t0() + Duration::hours(3);
        let mut last = Phase::Open;
        let mut now = t0();
        while now <= deadline + Duration::hours(1) {
            let phase = phase_of(Some(deadline), now, window());
            let rank = |p: Phase| match p {
                Phase::Open => 0,
                Phase::Persuasion => 1,
                Phase::Closed => 2,
            };
            assert!(rank(phase) >= rank(last), "phase regressed at {now}");
            last = phase;
            now += Duration::minutes(7);
        }
        assert_eq!(last, Phase::Closed);
    }

    #[test]
    fn remaining_breaks_down_components() {
        let deadline = t0() + Duration::days(2) + Duration::hours(3) + Duration::minutes(4) + Duration::seconds(5);
        let left = remaining(Some(deadline), t0());
        assert_eq!((left.days, left.hours, left.minutes, left.seconds), (2, 3, 4, 5));
        assert!(!left.expired);
    }

    #[test]
    fn remaining_clamps_after_deadline() {
        let left = remaining(Some(t0() - Duration::seconds(1)), t0());
        assert_eq!((left.days, left.hours, left.minutes, left.seconds), (0, 0, 0, 0));
        assert!(left.expired);
    }

    #[test]
    fn remaining_without_deadline_never_expires() {
        assert_eq!(remaining(None, t0()), TimeRemaining::unbounded());
    }
}
