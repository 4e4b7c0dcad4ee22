//! Structured event emission for provider attempts, breaker transitions,
//! and handoffs. The sink is injected so tests can capture events in memory.

use std::time::Duration;

use strum::Display;
use tracing::{debug, warn};

use crate::context::AgentKind;
use crate::provider::ProviderId;
use crate::router::breaker::BreakerState;
use crate::types::CallKind;

/// Outcome of one provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    TransientError,
    FatalError,
    /// Provider skipped because its breaker was open.
    Skipped,
}

/// An observable event emitted by the engine.
#[derive(Debug, Clone)]
pub enum MetricsEvent {
    ProviderAttempt {
        provider: ProviderId,
        call: CallKind,
        outcome: AttemptOutcome,
        latency: Duration,
        /// 1-based attempt number within this provider; 0 for skipped.
        attempt: u32,
    },
    BreakerTransition {
        provider: ProviderId,
        from: BreakerState,
        to: BreakerState,
    },
    Handoff {
        from: AgentKind,
        to: AgentKind,
        reason: String,
    },
    HandoffLoopAborted {
        agent: AgentKind,
        handoff_count: u32,
    },
}

/// Sink for engine events.
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}

/// Default sink: structured logs through `tracing`.
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::ProviderAttempt {
                provider,
                call,
                outcome,
                latency,
                attempt,
            } => match outcome {
                AttemptOutcome::Success => debug!(
                    %provider, %call, attempt, latency_ms = latency.as_millis() as u64,
                    "provider attempt succeeded"
                ),
                AttemptOutcome::Skipped => {
                    warn!(%provider, %call, "provider skipped, breaker open")
                }
                _ => warn!(
                    %provider, %call, %outcome, attempt,
                    latency_ms = latency.as_millis() as u64,
                    "provider attempt failed"
                ),
            },
            MetricsEvent::BreakerTransition { provider, from, to } => {
                warn!(%provider, %from, %to, "circuit breaker transition")
            }
            MetricsEvent::Handoff { from, to, reason } => {
                debug!(%from, %to, reason, "agent handoff")
            }
            MetricsEvent::HandoffLoopAborted {
                agent,
                handoff_count,
            } => warn!(%agent, handoff_count, "handoff chain aborted at limit"),
        }
    }
}
