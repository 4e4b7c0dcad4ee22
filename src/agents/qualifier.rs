//! Qualifier agent: collects the required fields and gates on credit status.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::context::{AgentContext, AgentKind, LeadField, PipelineStage};
use crate::error::EngineError;
use crate::provider::ProviderId;
use crate::router::ModelRouter;
use crate::types::{CallParams, ChatMessage};
use crate::window::ContextWindowManager;

use super::extraction::parse_extraction;
use super::{fallback_response, AgentResponse, HandoffSignal, SpecialistAgent};

const SYSTEM_PROMPT: &str = "You qualify inbound real-estate mortgage leads for a brokerage. \
Reply in the lead's language (Spanish or English). From the lead's latest message, extract any \
of: name, phone, email, income, location, credit_status (use \"negative\" for DICOM, morosidad \
or derogatory marks, \"clear\" otherwise). Respond ONLY with a JSON object of the form \
{\"name\":...,\"phone\":...,\"email\":...,\"income\":...,\"location\":...,\"credit_status\":...,\
\"reply\":\"<your next message to the lead>\"}. Omit fields the lead did not state. In \"reply\", \
warmly ask for one missing piece of information at a time; never re-ask for something already known.";

pub struct QualifierAgent {
    router: Arc<ModelRouter>,
    window: Arc<ContextWindowManager>,
    provider_order: Vec<ProviderId>,
    extraction_timeout: std::time::Duration,
}

impl QualifierAgent {
    pub fn new(
        config: &EngineConfig,
        router: Arc<ModelRouter>,
        window: Arc<ContextWindowManager>,
    ) -> Self {
        Self {
            router,
            window,
            provider_order: config.provider_order.clone(),
            extraction_timeout: config.extraction_timeout,
        }
    }

    /// Scripted question for the highest-priority missing field, used when
    /// the model's drafted reply is empty.
    fn scripted_question(ctx: &AgentContext) -> String {
        match ctx.missing_fields().first() {
            Some(LeadField::Name) => "¡Hola! Para ayudarte mejor, ¿me dices tu nombre? / \
                Hi! To help you better, what's your name?"
                .to_string(),
            Some(LeadField::Phone) => "¿A qué número de teléfono te podemos contactar? / \
                What phone number can we reach you at?"
                .to_string(),
            Some(LeadField::Income) => "¿Cuál es tu ingreso mensual aproximado? / \
                What's your approximate monthly income?"
                .to_string(),
            Some(LeadField::CreditStatus) => "¿Tienes deudas vigentes o registros en DICOM? / \
                Do you have outstanding debts or credit marks?"
                .to_string(),
            _ => "¡Gracias! ¿En qué sector estás buscando propiedad? / \
                Thanks! Which area are you looking in?"
                .to_string(),
        }
    }
}

#[async_trait]
impl SpecialistAgent for QualifierAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Qualifier
    }

    fn should_handle(&self, ctx: &AgentContext) -> bool {
        matches!(
            ctx.pipeline_stage(),
            PipelineStage::Entrada | PipelineStage::Perfilamiento
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

        let params = CallParams::extraction().with_timeout(self.extraction_timeout);
        let reply = match self
            .router
            .generate(&self.provider_order, &messages, &params, cancel)
            .await
        {
            Ok(reply) => reply,
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => {
                warn!(lead = ctx.lead_id(), error = %err, "qualification call failed, degrading");
                return Ok(fallback_response());
            }
        };

        let extracted = match parse_extraction(&reply.text) {
            Ok(extracted) => extracted,
            Err(err) => {
                // Treat unparseable output as a plain reply with no progress.
                warn!(lead = ctx.lead_id(), error = %err, "extraction output not parseable");
                let text = if reply.text.trim().is_empty() {
                    Self::scripted_question(ctx)
                } else {
                    reply.text
                };
                return Ok(AgentResponse {
                    text,
                    ..AgentResponse::default()
                });
            }
        };

        let (updates, drafted_reply) = extracted.into_updates();
        let updated = ctx.with_updates(&updates);

        debug!(
            lead = ctx.lead_id(),
            extracted = updates.len(),
            qualified = updated.is_qualified(),
            "qualification extraction merged"
        );

        // The credit gate runs after every merge so a late negative finding
        // can never be bypassed by earlier completeness.
        let handoff = if updated.is_appointment_ready() && !updated.lead_data().credit_negative() {
            Some(HandoffSignal::to(
                AgentKind::Scheduler,
                "lead qualified with location known",
            ))
        } else {
            None
        };

        let text = drafted_reply
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Self::scripted_question(&updated));

        Ok(AgentResponse {
            text,
            context_updates: updates,
            handoff,
        })
    }
}
