//! Context window management.
//!
//! Bounds the history passed to a model call. Overflow beyond the window is
//! compacted into a one-paragraph summary via a dedicated low-temperature
//! router call; if that call fails the overflow is simply dropped, never
//! failing the turn.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::provider::ProviderId;
use crate::router::ModelRouter;
use crate::types::{CallParams, ChatMessage, Role};

const SUMMARY_SYSTEM_PROMPT: &str = "Summarize the following sales conversation in one short \
paragraph. Keep every concrete fact the lead stated (names, numbers, places, credit remarks) \
and drop pleasantries. Reply with the summary only, in the conversation's language.";

/// The assembled prompt for one model call.
#[derive(Debug, Clone)]
pub struct PromptBundle {
    pub messages: Vec<ChatMessage>,
    /// Whether a summary block replaced older history.
    pub summarized: bool,
}

pub struct ContextWindowManager {
    router: Arc<ModelRouter>,
    provider_order: Vec<ProviderId>,
    window_size: usize,
    summary_timeout: std::time::Duration,
}

impl ContextWindowManager {
    pub fn new(config: &EngineConfig, router: Arc<ModelRouter>) -> Self {
        Self {
            router,
            provider_order: config.provider_order.clone(),
            window_size: config.window_size,
            summary_timeout: config.summary_timeout,
        }
    }

    /// Assemble `system + lead brief + (summary?) + recent history`.
    ///
    /// Only caller cancellation propagates as an error; summarization failure
    /// degrades to truncation.
    pub async fn build_prompt(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        lead_brief: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PromptBundle, EngineError> {
        let mut messages = vec![ChatMessage::system(system_prompt)];
        if let Some(brief) = lead_brief {
            messages.push(ChatMessage::system(brief));
        }

        if history.len() <= self.window_size {
            messages.extend(history.iter().cloned());
            return Ok(PromptBundle {
                messages,
                summarized: false,
            });
        }

        let (overflow, tail) = history.split_at(history.len() - self.window_size);
        let mut summarized = false;

        match self.summarize(overflow, cancel).await {
            Ok(summary) if !summary.is_empty() => {
                messages.push(ChatMessage::system(format!(
                    "Conversation so far: {summary}"
                )));
                summarized = true;
            }
            Ok(_) => {
                warn!("summarizer returned empty text, truncating overflow");
            }
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => {
                warn!(error = %err, "summary call failed, truncating overflow");
            }
        }

        messages.extend(tail.iter().cloned());
        Ok(PromptBundle {
            messages,
            summarized,
        })
    }

    async fn summarize(
        &self,
        overflow: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        debug!(
            overflow_len = overflow.len(),
            cache_key = %summary_cache_key(overflow),
            "summarizing history overflow"
        );

        let transcript = render_transcript(overflow);
        let messages = vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(transcript),
        ];
        let params = CallParams::summary().with_timeout(self.summary_timeout);

        let reply = self
            .router
            .generate(&self.provider_order, &messages, &params, cancel)
            .await?;
        Ok(reply.text.trim().to_string())
    }
}

/// Stable fingerprint of an overflow slice, usable as a summary cache key.
pub fn summary_cache_key(overflow: &[ChatMessage]) -> String {
    let mut hasher = Sha256::new();
    for message in overflow {
        hasher.update(role_label(message.role).as_bytes());
        hasher.update(b":");
        hasher.update(message.text.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "lead",
        Role::Agent => "agent",
    }
}
