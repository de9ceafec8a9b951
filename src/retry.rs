//! Reconnect pacing for gateway shards and voice connections.

use rand::Rng;
use std::time::Duration;

/// Policy governing how a dropped connection is retried.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Retry {
    /// Wait before the first reconnect attempt.
    ///
    /// *Defaults to 1s.*
    pub base: Duration,
    /// Ceiling on any single wait; the doubling run stops here.
    ///
    /// *Defaults to 60s.*
    pub cap: Duration,
    /// Fraction of random spread applied to each wait, so shards dropped
    /// by the same outage do not all reconnect in lockstep.
    ///
    /// Clamped into `0..=1`. *Defaults to `0.1`.*
    pub jitter: f32,
    /// Number of consecutive failures tolerated before the connection is
    /// abandoned.
    ///
    /// `None` retries forever, while `Some(0)` gives up after the first
    /// failure.
    ///
    /// *Defaults to `None`.*
    pub retry_limit: Option<usize>,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            jitter: 0.1,
            retry_limit: None,
        }
    }
}

/// Live back-off state for one connection's reconnect loop.
///
/// Each failure doubles the wait from [`Retry::base`] up to
/// [`Retry::cap`]; a session that reaches READY again clears the run
/// through [`reset`](Backoff::reset).
#[derive(Clone, Debug)]
pub(crate) struct Backoff {
    policy: Retry,
    failures: usize,
}

impl Backoff {
    pub(crate) fn new(policy: Retry) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Records one failed attempt, yielding how long to sleep before the
    /// next, or `None` once the retry budget is spent.
    pub(crate) fn next_wait(&mut self) -> Option<Duration> {
        if self
            .policy
            .retry_limit
            .is_some_and(|limit| self.failures >= limit)
        {
            return None;
        }

        // 2^31 doublings saturate any sane cap long before overflow.
        let doublings = u32::try_from(self.failures).unwrap_or(31).min(31);
        self.failures += 1;

        let cap = self.policy.cap.max(self.policy.base);
        let flat = self
            .policy
            .base
            .saturating_mul(1u32 << doublings)
            .min(cap);

        let jitter = self.policy.jitter.clamp(0.0, 1.0);
        let spread = 1.0 + jitter * rand::thread_rng().gen_range(-1.0f32..=1.0);

        Some(flat.mul_f32(spread).clamp(self.policy.base, cap))
    }

    /// Clears the failure run after a healthy session.
    pub(crate) fn reset(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn waits_double_from_base_to_cap_within_bounds() {
        let policy = Retry::default();
        let mut backoff = Backoff::new(policy);

        let mut waits = Vec::new();
        for _ in 0..12 {
            let wait = backoff.next_wait().expect("unlimited budget");
            assert!(wait >= policy.base);
            assert!(wait <= policy.cap);
            waits.push(wait);
        }

        // Early in the run the doubling dominates the jitter.
        assert!(waits[3] > waits[0]);
        // Late in the run every wait sits at the (jittered) cap.
        assert!(waits[11] >= policy.cap.mul_f32(1.0 - policy.jitter));
    }

    #[test]
    fn budget_runs_out_and_reset_restores_it() {
        let mut backoff = Backoff::new(Retry {
            retry_limit: Some(2),
            ..Retry::default()
        });

        assert!(backoff.next_wait().is_some());
        assert!(backoff.next_wait().is_some());
        assert!(backoff.next_wait().is_none());

        backoff.reset();
        let first_again = backoff.next_wait().expect("budget restored");
        assert!(first_again <= Duration::from_secs(2));
    }

    #[test]
    fn zero_budget_gives_up_immediately() {
        let mut backoff = Backoff::new(Retry {
            retry_limit: Some(0),
            ..Retry::default()
        });
        assert!(backoff.next_wait().is_none());
    }
}
