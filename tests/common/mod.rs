//! Shared test doubles: a scripted provider adapter and a recording sink.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use prospecto::error::EngineError;
use prospecto::metrics::{AttemptOutcome, MetricsEvent, MetricsSink};
use prospecto::provider::{ProviderAdapter, ProviderId, ProviderReply};
use prospecto::types::{CallParams, ChatMessage};

/// Adapter that replays a queued script of results. When the script runs
/// out it returns `default_reply` if set, otherwise a transient 500.
pub struct ScriptedAdapter {
    id: ProviderId,
    script: Mutex<VecDeque<Result<ProviderReply, EngineError>>>,
    default_reply: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::new(id),
            script: Mutex::new(VecDeque::new()),
            default_reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Adapter that always succeeds with the same text.
    pub fn always_ok(id: &str, text: &str) -> Self {
        let mut adapter = Self::new(id);
        adapter.default_reply = Some(text.to_string());
        adapter
    }

    pub fn push_ok(&self, text: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(ProviderReply::text(text)));
        self
    }

    pub fn push_err(&self, err: EngineError) -> &Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _params: &CallParams,
    ) -> Result<ProviderReply, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.script.lock().unwrap().pop_front() {
            return result;
        }
        match &self.default_reply {
            Some(text) => Ok(ProviderReply::text(text.clone())),
            None => Err(EngineError::provider(
                self.id.as_str(),
                Some(500),
                "scripted failure",
            )),
        }
    }
}

/// Adapter whose calls never resolve, for cancellation and timeout tests.
pub struct PendingAdapter {
    id: ProviderId,
}

impl PendingAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::new(id),
        }
    }
}

#[async_trait]
impl ProviderAdapter for PendingAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _params: &CallParams,
    ) -> Result<ProviderReply, EngineError> {
        tokio::time::sleep(std::time::Duration::from_secs(86_400)).await;
        Err(EngineError::Timeout(86_400_000))
    }
}

/// Sink that captures every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MetricsEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricsEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Provider-attempt outcomes in emission order, as (provider, outcome).
    pub fn attempt_log(&self) -> Vec<(String, AttemptOutcome)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MetricsEvent::ProviderAttempt {
                    provider, outcome, ..
                } => Some((provider.to_string(), outcome)),
                _ => None,
            })
            .collect()
    }

    pub fn breaker_transitions(&self) -> Vec<MetricsEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, MetricsEvent::BreakerTransition { .. }))
            .collect()
    }

    pub fn handoffs(&self) -> Vec<MetricsEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, MetricsEvent::Handoff { .. }))
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    fn record(&self, event: MetricsEvent) {
        self.events.lock().unwrap().push(event);
    }
}
