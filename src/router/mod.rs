//! Resilient model-call routing.
//!
//! [`ModelRouter`] fronts every registered provider with a circuit breaker
//! and a retry budget, and falls back through the caller-supplied provider
//! order until one succeeds or all are exhausted.

pub mod breaker;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::{AttemptOutcome, MetricsEvent, MetricsSink};
use crate::provider::{ProviderAdapter, ProviderId, ProviderReply};
use crate::types::{CallParams, ChatMessage};

use breaker::{BreakerDecision, BreakerState, CircuitBreaker, BreakerTransition};
use retry::RetryPolicy;

struct ProviderEntry {
    adapter: Arc<dyn ProviderAdapter>,
    breaker: CircuitBreaker,
}

/// Routes one logical model call across N providers with breaker gating,
/// retry with backoff, per-attempt timeouts, and ordered fallback.
pub struct ModelRouter {
    providers: HashMap<ProviderId, ProviderEntry>,
    retry: RetryPolicy,
    breaker_config: breaker::BreakerConfig,
    default_timeout: Duration,
    sink: Arc<dyn MetricsSink>,
}

impl ModelRouter {
    pub fn new(config: &EngineConfig, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            providers: HashMap::new(),
            retry: config.retry.clone(),
            breaker_config: config.breaker.clone(),
            default_timeout: config.reply_timeout,
            sink,
        }
    }

    /// Register an adapter. Each provider gets its own fresh breaker.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let id = adapter.id().clone();
        self.providers.insert(
            id,
            ProviderEntry {
                adapter,
                breaker: CircuitBreaker::new(self.breaker_config.clone()),
            },
        );
    }

    /// Current breaker state for a provider, if registered.
    pub fn breaker_state(&self, id: &ProviderId) -> Option<BreakerState> {
        self.providers.get(id).map(|e| e.breaker.state())
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Attempt providers strictly in `order` until one succeeds.
    ///
    /// A provider with an open breaker is skipped without consuming its retry
    /// budget. Caller cancellation aborts immediately and records no breaker
    /// failure.
    pub async fn generate(
        &self,
        order: &[ProviderId],
        messages: &[ChatMessage],
        params: &CallParams,
        cancel: &CancellationToken,
    ) -> Result<ProviderReply, EngineError> {
        let mut last: Option<(ProviderId, EngineError)> = None;
        let mut last_skipped: Option<ProviderId> = None;

        for id in order {
            let Some(entry) = self.providers.get(id) else {
                warn!(provider = %id, "provider in order but not registered, skipping");
                continue;
            };

            let (decision, transition) = entry.breaker.acquire();
            self.emit_transition(id, transition);

            let trial = match decision {
                BreakerDecision::Skip => {
                    self.sink.record(MetricsEvent::ProviderAttempt {
                        provider: id.clone(),
                        call: params.kind,
                        outcome: AttemptOutcome::Skipped,
                        latency: Duration::ZERO,
                        attempt: 0,
                    });
                    last_skipped = Some(id.clone());
                    continue;
                }
                BreakerDecision::Allow => false,
                BreakerDecision::Trial => true,
            };

            match self
                .attempt_provider(id, entry, messages, params, trial, cancel)
                .await
            {
                Ok(reply) => return Ok(reply),
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(err) => last = Some((id.clone(), err)),
            }
        }

        match (last, last_skipped) {
            (Some((provider, reason)), _) => Err(EngineError::AllProvidersExhausted {
                provider: provider.to_string(),
                reason: reason.to_string(),
            }),
            (None, Some(provider)) => Err(EngineError::AllProvidersExhausted {
                provider: provider.to_string(),
                reason: "circuit breaker open".to_string(),
            }),
            (None, None) => Err(EngineError::Configuration(
                "no usable provider in call order".to_string(),
            )),
        }
    }

    /// Run the retry loop against one provider. Returns the last error when
    /// the budget is exhausted or the breaker opens mid-loop.
    async fn attempt_provider(
        &self,
        id: &ProviderId,
        entry: &ProviderEntry,
        messages: &[ChatMessage],
        params: &CallParams,
        trial: bool,
        cancel: &CancellationToken,
    ) -> Result<ProviderReply, EngineError> {
        let max_attempts = if trial { 1 } else { self.retry.max_attempts.max(1) };
        let budget = params.timeout.unwrap_or(self.default_timeout);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let started = tokio::time::Instant::now();

            debug!(provider = %id, call = %params.kind, attempt, trial, "provider attempt");

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    // A trial that never resolved must not leave the breaker
                    // stuck in half-open.
                    if trial {
                        self.emit_transition(id, entry.breaker.on_trial_abandoned());
                    }
                    return Err(EngineError::Cancelled);
                }
                r = tokio::time::timeout(budget, entry.adapter.generate(messages, params)) => {
                    match r {
                        Ok(inner) => inner,
                        Err(_) => Err(EngineError::Timeout(budget.as_millis() as u64)),
                    }
                }
            };
            let latency = started.elapsed();

            match result {
                Ok(reply) => {
                    self.emit_transition(id, entry.breaker.on_success());
                    self.sink.record(MetricsEvent::ProviderAttempt {
                        provider: id.clone(),
                        call: params.kind,
                        outcome: AttemptOutcome::Success,
                        latency,
                        attempt,
                    });
                    return Ok(reply);
                }
                Err(err) => {
                    let transient = err.is_transient();
                    self.sink.record(MetricsEvent::ProviderAttempt {
                        provider: id.clone(),
                        call: params.kind,
                        outcome: if transient {
                            AttemptOutcome::TransientError
                        } else {
                            AttemptOutcome::FatalError
                        },
                        latency,
                        attempt,
                    });

                    let transition = entry.breaker.on_failure();
                    let opened = matches!(transition, Some((_, BreakerState::Open)));
                    self.emit_transition(id, transition);

                    if opened || !transient || attempt >= max_attempts {
                        return Err(err);
                    }

                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        provider = %id, attempt, max_attempts, error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "retrying provider after transient error"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn emit_transition(&self, id: &ProviderId, transition: Option<BreakerTransition>) {
        if let Some((from, to)) = transition {
            self.sink.record(MetricsEvent::BreakerTransition {
                provider: id.clone(),
                from,
                to,
            });
        }
    }
}
