//! Per-provider circuit breaker.
//!
//! One breaker instance per registered provider, owned by the router and
//! shared across concurrent turns. This is the only mutable state in the
//! engine; every transition happens under the internal mutex. The clock is
//! `tokio::time::Instant` so paused-time tests can drive the cool-down.

use std::sync::Mutex;
use std::time::Duration;

use strum::Display;
use tokio::time::Instant;

/// Breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a trial call.
    pub open_interval: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_interval: Duration::from_secs(60),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// What a caller is allowed to do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerDecision {
    /// Proceed with the full retry budget.
    Allow,
    /// Proceed with exactly one trial attempt.
    Trial,
    /// Do not call this provider.
    Skip,
}

/// A `(from, to)` state transition, for event emission.
pub type BreakerTransition = (BreakerState, BreakerState);

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Decide whether a call may proceed, moving Open → HalfOpen when the
    /// cool-down has elapsed.
    pub fn acquire(&self) -> (BreakerDecision, Option<BreakerTransition>) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => (BreakerDecision::Allow, None),
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.open_interval)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    (
                        BreakerDecision::Trial,
                        Some((BreakerState::Open, BreakerState::HalfOpen)),
                    )
                } else {
                    (BreakerDecision::Skip, None)
                }
            }
            // A trial is already in flight on another turn.
            BreakerState::HalfOpen => (BreakerDecision::Skip, None),
        }
    }

    /// Record a successful call.
    pub fn on_success(&self) -> Option<BreakerTransition> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let from = inner.state;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.state = BreakerState::Closed;
        (from != BreakerState::Closed).then_some((from, BreakerState::Closed))
    }

    /// Release a trial that ended without a provider verdict (caller
    /// cancellation). Restores Open and keeps the original cool-down stamp,
    /// so the next `acquire` can grant a fresh trial instead of skipping
    /// forever.
    pub fn on_trial_abandoned(&self) -> Option<BreakerTransition> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            Some((BreakerState::HalfOpen, BreakerState::Open))
        } else {
            None
        }
    }

    /// Record a failed call (provider-caused only; cancellations never land
    /// here).
    pub fn on_failure(&self) -> Option<BreakerTransition> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    Some((BreakerState::Closed, BreakerState::Open))
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                // Failed trial reopens and restarts the cool-down.
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                Some((BreakerState::HalfOpen, BreakerState::Open))
            }
            BreakerState::Open => None,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }
}
