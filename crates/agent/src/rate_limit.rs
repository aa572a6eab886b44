//! Sliding-window rate limiter, keyed by requester identity.

use aidog_core::message::Identity;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request was recorded and may proceed.
    Admitted,
    /// The window is full; retrying after this many seconds will succeed.
    Limited { retry_after_secs: u64 },
}

impl Admission {
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited { .. })
    }

    /// Seconds to wait before retrying; 0 when admitted.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::Admitted => 0,
            Self::Limited { retry_after_secs } => *retry_after_secs,
        }
    }
}

/// In-memory sliding-window rate limiter.
///
/// Tracks request timestamps per identity. Check-and-record happens under
/// one `std::sync::Mutex` (non-async, held briefly), so two concurrent
/// requests can never both take the last slot.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: Mutex<HashMap<Identity, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check `identity` against its window, recording the request if it is
    /// admitted.
    pub fn check(&self, identity: Identity) -> Admission {
        self.check_at(identity, Instant::now())
    }

    /// [`RateLimiter::check`] with an explicit clock reading.
    pub fn check_at(&self, identity: Identity, now: Instant) -> Admission {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let timestamps = windows.entry(identity).or_default();

        while timestamps
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) > self.window)
        {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_requests {
            let elapsed = timestamps
                .front()
                .map(|oldest| now.saturating_duration_since(*oldest))
                .unwrap_or_default();
            let remaining = self.window.saturating_sub(elapsed);
            let ceil_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Admission::Limited {
                retry_after_secs: ceil_secs + 1,
            };
        }

        timestamps.push_back(now);
        Admission::Admitted
    }

    /// Number of identities with recorded state.
    pub fn tracked_identities(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn allows_up_to_max_then_limits() {
        let limiter = RateLimiter::new(5, WINDOW);
        let t0 = Instant::now();
        for i in 0..5 {
            assert_eq!(
                limiter.check_at(Identity(1), t0 + Duration::from_secs(i)),
                Admission::Admitted
            );
        }
        let sixth = limiter.check_at(Identity(1), t0 + Duration::from_secs(10));
        assert!(sixth.is_limited());
        // oldest at t0, 10s elapsed: ceil(60 - 10) + 1
        assert_eq!(sixth.retry_after_secs(), 51);
    }

    #[test]
    fn retry_after_is_at_least_one() {
        let limiter = RateLimiter::new(1, WINDOW);
        let t0 = Instant::now();
        limiter.check_at(Identity(1), t0);
        let at_edge = limiter.check_at(Identity(1), t0 + WINDOW);
        assert_eq!(at_edge.retry_after_secs(), 1);
    }

    #[test]
    fn fractional_remaining_rounds_up() {
        let limiter = RateLimiter::new(1, WINDOW);
        let t0 = Instant::now();
        limiter.check_at(Identity(1), t0);
        let limited = limiter.check_at(Identity(1), t0 + Duration::from_millis(500));
        assert_eq!(limited.retry_after_secs(), 61);
    }

    #[test]
    fn spaced_traffic_is_never_limited() {
        let limiter = RateLimiter::new(1, WINDOW);
        let t0 = Instant::now();
        for i in 0..10u32 {
            let at = t0 + (WINDOW + Duration::from_millis(1)) * i;
            assert_eq!(limiter.check_at(Identity(1), at), Admission::Admitted);
        }
    }

    #[test]
    fn eviction_is_strictly_older_than_window() {
        let limiter = RateLimiter::new(1, WINDOW);
        let t0 = Instant::now();
        limiter.check_at(Identity(1), t0);
        // Exactly one window later the entry is still counted.
        assert!(limiter.check_at(Identity(1), t0 + WINDOW).is_limited());
        assert!(!limiter
            .check_at(Identity(1), t0 + WINDOW + Duration::from_millis(1))
            .is_limited());
    }

    #[test]
    fn identities_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        let t0 = Instant::now();
        assert!(!limiter.check_at(Identity(1), t0).is_limited());
        assert!(limiter.check_at(Identity(1), t0).is_limited());
        assert!(!limiter.check_at(Identity(2), t0).is_limited());
        assert_eq!(limiter.tracked_identities(), 2);
    }

    #[test]
    fn rejected_requests_do_not_consume_slots() {
        let limiter = RateLimiter::new(2, WINDOW);
        let t0 = Instant::now();
        limiter.check_at(Identity(1), t0);
        limiter.check_at(Identity(1), t0 + Duration::from_secs(30));
        for s in 31..50 {
            assert!(limiter.check_at(Identity(1), t0 + Duration::from_secs(s)).is_limited());
        }
        // First entry expires; second (t0+30) still counts, one slot frees up.
        assert!(!limiter.check_at(Identity(1), t0 + Duration::from_secs(61)).is_limited());
        assert!(limiter.check_at(Identity(1), t0 + Duration::from_secs(62)).is_limited());
    }

    #[test]
    fn concurrent_checks_admit_exactly_max() {
        let limiter = Arc::new(RateLimiter::new(5, WINDOW));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check(Identity(7)))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| !a.is_limited())
            .count();
        assert_eq!(admitted, 5);
    }
}
