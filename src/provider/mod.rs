//! Provider adapter trait and implementations.
//!
//! A [`ProviderAdapter`] is the uniform call contract to a single model
//! backend. The crate ships one concrete adapter (OpenAI-compatible chat
//! completions); anything else is supplied by the embedding application.

pub mod http;
pub mod openai_compat;

pub use openai_compat::OpenAiCompatAdapter;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{CallParams, ChatMessage};

/// Opaque identifier for a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Token accounting reported by a provider, when available.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Response from a single provider call.
#[derive(Debug, Clone, Default)]
pub struct ProviderReply {
    pub text: String,
    pub usage: TokenUsage,
}

impl ProviderReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// Uniform call contract to one model backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier this adapter is registered under.
    fn id(&self) -> &ProviderId;

    /// Generate a reply for the given messages and parameters.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<ProviderReply, EngineError>;
}
