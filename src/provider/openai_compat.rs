//! OpenAI-compatible Chat Completions adapter.
//!
//! Works against any backend exposing the `/chat/completions` surface
//! (OpenAI, Azure-style gateways, most self-hosted inference servers).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::EngineError;
use crate::types::{CallParams, ChatMessage, Role};

use super::http::{bearer_headers, shared_client, status_to_error};
use super::{ProviderAdapter, ProviderId, ProviderReply, TokenUsage};

pub struct OpenAiCompatAdapter {
    id: ProviderId,
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatAdapter {
    pub fn new(
        id: impl Into<ProviderId>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn build_request_body(&self, messages: &[ChatMessage], params: &CallParams) -> serde_json::Value {
        let messages = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Agent => "assistant",
                    },
                    "content": m.text,
                })
            })
            .collect::<Vec<_>>();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        let obj = body.as_object_mut().expect("body is an object");

        if let Some(temp) = params.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(max) = params.max_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if params.json_response {
            obj.insert(
                "response_format".into(),
                serde_json::json!({"type": "json_object"}),
            );
        }

        body
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<ProviderReply, EngineError> {
        let body = self.build_request_body(messages, params);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(provider = %self.id, model = %self.model, call = %params.kind, "chat completion request");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(self.id.as_str(), status, &body_text));
        }

        let data: ChatResponse = resp.json().await?;
        let choice = data.choices.into_iter().next().ok_or_else(|| {
            EngineError::provider(self.id.as_str(), None, "no choices in response")
        })?;

        Ok(ProviderReply {
            text: choice.message.content.unwrap_or_default(),
            usage: data
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                })
                .unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
