//! Top-level turn orchestration.
//!
//! The supervisor selects an agent for each inbound message (sticky to the
//! previous agent when it still claims the context, otherwise most-specific
//! first), applies the handoff protocol with loop guarding, and guarantees
//! the caller always gets either an error or a response with non-empty text.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::agents::{
    AgentKind, AgentResponse, FollowUpAgent, QualifierAgent, SchedulerAgent, SpecialistAgent,
    FALLBACK_TEXT,
};
use crate::config::EngineConfig;
use crate::context::{AgentContext, LeadData};
use crate::error::EngineError;
use crate::metrics::{MetricsEvent, MetricsSink};
use crate::router::ModelRouter;
use crate::window::ContextWindowManager;

pub struct AgentSupervisor {
    qualifier: Box<dyn SpecialistAgent>,
    scheduler: Box<dyn SpecialistAgent>,
    followup: Box<dyn SpecialistAgent>,
    max_handoffs: u32,
    max_message_chars: usize,
    sink: Arc<dyn MetricsSink>,
}

impl AgentSupervisor {
    /// Build the standard three-agent pipeline on top of a router.
    pub fn new(
        config: &EngineConfig,
        router: Arc<ModelRouter>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let window = Arc::new(ContextWindowManager::new(config, router.clone()));
        Self::with_agents(
            config,
            sink,
            Box::new(QualifierAgent::new(config, router.clone(), window.clone())),
            Box::new(SchedulerAgent::new(config, router.clone(), window.clone())),
            Box::new(FollowUpAgent::new(config, router, window)),
        )
    }

    /// Assemble from explicit agents. Tests use this to inject probes.
    pub fn with_agents(
        config: &EngineConfig,
        sink: Arc<dyn MetricsSink>,
        qualifier: Box<dyn SpecialistAgent>,
        scheduler: Box<dyn SpecialistAgent>,
        followup: Box<dyn SpecialistAgent>,
    ) -> Self {
        Self {
            qualifier,
            scheduler,
            followup,
            max_handoffs: config.max_handoffs,
            max_message_chars: config.max_message_chars,
            sink,
        }
    }

    /// Handle one inbound message.
    pub async fn process(
        &self,
        ctx: &AgentContext,
        user_message: &str,
    ) -> Result<AgentResponse, EngineError> {
        self.process_cancellable(ctx, user_message, &CancellationToken::new())
            .await
    }

    /// Handle one inbound message with caller-controlled cancellation.
    pub async fn process_cancellable(
        &self,
        ctx: &AgentContext,
        user_message: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, EngineError> {
        if ctx.lead_id().trim().is_empty() {
            return Err(EngineError::InvalidContext("empty lead_id".to_string()));
        }
        if ctx.broker_id().trim().is_empty() {
            return Err(EngineError::InvalidContext("empty broker_id".to_string()));
        }

        let turn_id = Uuid::new_v4();
        let span = tracing::debug_span!("turn", %turn_id, lead = ctx.lead_id());
        self.run_turn(ctx, user_message, cancel).instrument(span).await
    }

    async fn run_turn(
        &self,
        ctx: &AgentContext,
        user_message: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, EngineError> {
        let message = truncate_chars(user_message, self.max_message_chars);

        let mut current_ctx = ctx.clone();
        let mut agent = self.select_agent(&current_ctx);
        let mut accumulated = LeadData::new();
        let mut message = message.to_string();

        debug!(agent = %agent.kind(), stage = %current_ctx.pipeline_stage(), "dispatching turn");

        let mut response;
        loop {
            response = agent.process(&current_ctx, &message, cancel).await?;
            accumulated = accumulated.merged(&response.context_updates);
            current_ctx = current_ctx.with_updates(&response.context_updates);

            let Some(handoff) = response.handoff.clone() else {
                break;
            };

            if handoff.target == agent.kind() {
                warn!(agent = %agent.kind(), "agent signaled handoff to itself, ignoring");
                response.handoff = None;
                break;
            }
            if handoff.target.funnel_rank() < agent.kind().funnel_rank() {
                warn!(
                    from = %agent.kind(), to = %handoff.target,
                    "backwards handoff is not allowed, ignoring"
                );
                response.handoff = None;
                break;
            }

            self.sink.record(MetricsEvent::Handoff {
                from: agent.kind(),
                to: handoff.target,
                reason: handoff.reason.clone(),
            });

            accumulated = accumulated.merged(&handoff.context_updates);
            current_ctx = current_ctx
                .with_updates(&handoff.context_updates)
                .with_current_agent(handoff.target)
                .with_incremented_handoffs();

            if current_ctx.handoff_count() >= self.max_handoffs {
                // Turn still succeeds; the recorded handoff routes the next
                // inbound message to the target agent.
                warn!(
                    handoff_count = current_ctx.handoff_count(),
                    target = %handoff.target,
                    "handoff limit reached, stopping chain"
                );
                self.sink.record(MetricsEvent::HandoffLoopAborted {
                    agent: handoff.target,
                    handoff_count: current_ctx.handoff_count(),
                });
                break;
            }

            debug!(to = %handoff.target, "re-dispatching after handoff");
            agent = self.agent_for(handoff.target);
            // Synthetic continuation: the target agent opens on its own.
            message = String::new();
        }

        response.context_updates = accumulated;
        if response.text.trim().is_empty() {
            response.text = FALLBACK_TEXT.to_string();
        }
        Ok(response)
    }

    /// Sticky to the previous agent when it still claims the context;
    /// otherwise most specific first, with the qualifier as last resort.
    fn select_agent(&self, ctx: &AgentContext) -> &dyn SpecialistAgent {
        if let Some(kind) = ctx.current_agent() {
            let sticky = self.agent_for(kind);
            if sticky.should_handle(ctx) {
                return sticky;
            }
        }
        for agent in [&self.followup, &self.scheduler, &self.qualifier] {
            if agent.should_handle(ctx) {
                return agent.as_ref();
            }
        }
        self.qualifier.as_ref()
    }

    fn agent_for(&self, kind: AgentKind) -> &dyn SpecialistAgent {
        match kind {
            AgentKind::Qualifier => self.qualifier.as_ref(),
            AgentKind::Scheduler => self.scheduler.as_ref(),
            AgentKind::FollowUp => self.followup.as_ref(),
        }
    }
}

fn truncate_chars(message: &str, max_chars: usize) -> &str {
    match message.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &message[..byte_index],
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("hola", 10), "hola");
        assert_eq!(truncate_chars("hola", 2), "ho");
        // Multi-byte characters must not be split.
        assert_eq!(truncate_chars("áéíóú", 3), "áéí");
    }
}
