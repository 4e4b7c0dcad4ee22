//! Scheduler agent: proposes visit slots and detects mutual confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::EngineConfig;
use crate::context::{AgentContext, AgentKind, PipelineStage};
use crate::error::EngineError;
use crate::provider::ProviderId;
use crate::router::ModelRouter;
use crate::types::{CallParams, ChatMessage, Role};
use crate::window::ContextWindowManager;

use super::{fallback_response, AgentResponse, HandoffSignal, SpecialistAgent};

const SYSTEM_PROMPT: &str = "You schedule property-visit appointments for qualified \
mortgage leads. Reply in the lead's language (Spanish or English). Propose concrete \
weekday time slots, confirm the lead's preference, and restate the agreed slot clearly. \
Keep replies to two or three sentences.";

const SCRIPTED_PROPOSAL: &str = "¡Excelente! ¿Te acomoda una visita esta semana, por ejemplo \
el martes o el jueves por la tarde? / Great! Would a visit this week work for you, say \
Tuesday or Thursday afternoon?";

/// Confirmation words we accept from the lead. A lone "ok" is deliberately
/// not in this list.
const USER_CONFIRMATION: [&str; 12] = [
    "confirmo",
    "confirmado",
    "me parece bien",
    "nos vemos",
    "ahí estaré",
    "ahi estare",
    "de acuerdo",
    "confirmed",
    "that works",
    "see you",
    "i'll be there",
    "sounds good",
];

/// Scheduling language we require in the agent's own previous reply.
const AGENT_SCHEDULING: [&str; 10] = [
    "cita",
    "visita",
    "agendar",
    "agendamos",
    "horario",
    "appointment",
    "schedule",
    "visit",
    "slot",
    "availability",
];

/// Both sides must speak scheduling: the lead confirms, and our previous
/// reply actually proposed something. Prevents a stray "ok" from advancing
/// the funnel.
pub(crate) fn is_confirmed_exchange(user_message: &str, prior_agent_reply: Option<&str>) -> bool {
    let user = user_message.to_lowercase();
    let confirmed = USER_CONFIRMATION.iter().any(|w| user.contains(w));
    let proposed = prior_agent_reply
        .map(|reply| {
            let reply = reply.to_lowercase();
            AGENT_SCHEDULING.iter().any(|w| reply.contains(w))
        })
        .unwrap_or(false);
    confirmed && proposed
}

fn last_agent_reply(ctx: &AgentContext) -> Option<&str> {
    ctx.message_history()
        .iter()
        .rev()
        .find(|m| m.role == Role::Agent)
        .map(|m| m.text.as_str())
}

pub struct SchedulerAgent {
    router: Arc<ModelRouter>,
    window: Arc<ContextWindowManager>,
    provider_order: Vec<ProviderId>,
    reply_timeout: std::time::Duration,
}

impl SchedulerAgent {
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
impl SpecialistAgent for SchedulerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Scheduler
    }

    fn should_handle(&self, ctx: &AgentContext) -> bool {
        ctx.pipeline_stage() == PipelineStage::CalificacionFinanciera
    }

    async fn process(
        &self,
        ctx: &AgentContext,
        user_message: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, EngineError> {
        // Confirmation is judged against the reply the lead was answering,
        // not against the reply we are about to produce.
        let confirmed = is_confirmed_exchange(user_message, last_agent_reply(ctx));

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
            Ok(_) => SCRIPTED_PROPOSAL.to_string(),
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => {
                warn!(lead = ctx.lead_id(), error = %err, "scheduling call failed, degrading");
                return Ok(fallback_response());
            }
        };

        let handoff = confirmed.then(|| {
            HandoffSignal::to(
                AgentKind::FollowUp,
                "appointment confirmed by lead and agent",
            )
        });

        Ok(AgentResponse {
            text,
            context_updates: Default::default(),
            handoff,
        })
    }
}
