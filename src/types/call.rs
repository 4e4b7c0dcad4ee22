//! Model-call parameters.
//!
//! Each agent turn issues one of a small set of call kinds with its own
//! temperature and latency budget. The router forwards these untouched.

use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The kind of model call being made, used for budgets and telemetry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallKind {
    /// Structured field extraction: a JSON object of field values plus a
    /// drafted reply.
    Extraction,
    /// Free-form conversational reply.
    Reply,
    /// History compaction for the context window.
    Summary,
}

/// Parameters for a single model call.
#[derive(Debug, Clone, Builder)]
pub struct CallParams {
    pub kind: CallKind,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Per-call latency budget; falls back to the router default when absent.
    pub timeout: Option<Duration>,
    /// Ask the provider for a JSON object response where supported.
    #[builder(default)]
    pub json_response: bool,
}

impl CallParams {
    /// Low-temperature extraction requesting a JSON object response.
    pub fn extraction() -> Self {
        Self::builder()
            .kind(CallKind::Extraction)
            .temperature(0.1)
            .json_response(true)
            .build()
    }

    /// Free-form reply at a conversational temperature.
    pub fn reply() -> Self {
        Self::builder()
            .kind(CallKind::Reply)
            .temperature(0.7)
            .build()
    }

    /// History summarization: low temperature, short output.
    pub fn summary() -> Self {
        Self::builder()
            .kind(CallKind::Summary)
            .temperature(0.2)
            .max_tokens(300)
            .build()
    }

    /// Override the latency budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
