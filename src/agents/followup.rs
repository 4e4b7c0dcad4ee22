//! Follow-up agent: post-appointment care, satisfaction and referrals.
//! Terminal for this pipeline topology; it never hands off.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::EngineConfig;
use crate::context::{AgentContext, AgentKind, PipelineStage};
use crate::error::EngineError;
use crate::provider::ProviderId;
use crate::router::ModelRouter;
use crate::types::{CallParams, ChatMessage};
use crate::window::ContextWindowManager;

use super::{fallback_response, AgentResponse, SpecialistAgent};

const SYSTEM_PROMPT: &str = "You follow up with mortgage leads who already have an \
appointment scheduled or completed. Reply in the lead's language (Spanish or English). \
Check in on how things went, answer questions, and when the moment is right, kindly ask \
whether they know someone else looking for a property. Keep replies short and warm.";

const SCRIPTED_CHECK_IN: &str = "¡Hola! ¿Cómo te fue con tu cita? ¿Hay algo más en que \
podamos ayudarte? / Hi! How did your appointment go? Is there anything else we can help with?";

pub struct FollowUpAgent {
    router: Arc<ModelRouter>,
    window: Arc<ContextWindowManager>,
    provider_order: Vec<ProviderId>,
    reply_timeout: std::time::Duration,
}

impl FollowUpAgent {
    pub fn new(
        config: &EngineConfig,
        router: Arc<ModelRouter>,
        window: Arc<ContextWindowManager>,
    ) -> Self {
        Self {
            router,
            window,
            provider_order: config.provider_order.clone(),
            reply_timeout: config.reply_timeout,
        }
    }
}

#[async_trait]
impl SpecialistAgent for FollowUpAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::FollowUp
    }

    fn should_handle(&self, ctx: &AgentContext) -> bool {
        matches!(
            ctx.pipeline_stage(),
            PipelineStage::Agendado | PipelineStage::Seguimiento | PipelineStage::Referidos
        )
    }

    async fn process(
        &self,
        ctx: &AgentContext,
        user_message: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, EngineError> {
        let brief = ctx.lead_data().brief();
        let bundle = self
            .window
            .build_prompt(SYSTEM_PROMPT, ctx.message_history(), brief.as_deref(), cancel)
            .await?;

        let mut messages = bundle.messages;
        if !user_message.is_empty() {
            messages.push(ChatMessage::user(user_message));
        }

        let params = CallParams::reply().with_timeout(self.reply_timeout);
        let text = match self
            .router
            .generate(&self.provider_order, &messages, &params, cancel)
            .await
        {
            Ok(reply) if !reply.text.trim().is_empty() => reply.text,
            Ok(_) => SCRIPTED_CHECK_IN.to_string(),
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => {
                warn!(lead = ctx.lead_id(), error = %err, "follow-up call failed, degrading");
                return Ok(fallback_response());
            }
        };

        Ok(AgentResponse {
            text,
            ..AgentResponse::default()
        })
    }
}
