//! Specialist agents and the handoff protocol types.
//!
//! Exactly three agents exist for this pipeline topology. Each one owns a
//! slice of the funnel, may call the model router through the context window
//! manager, and may signal that conversation ownership should move forward.

pub mod extraction;
pub mod followup;
pub mod qualifier;
pub mod scheduler;

pub use followup::FollowUpAgent;
pub use qualifier::QualifierAgent;
pub use scheduler::SchedulerAgent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use crate::context::AgentKind;
use crate::context::{AgentContext, LeadData};
use crate::error::EngineError;

/// A structured signal that conversation ownership should move to another
/// agent. The reason is audit-only; business logic never branches on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandoffSignal {
    pub target: AgentKind,
    pub reason: String,
    /// Fields to merge into the context before the target agent runs.
    #[serde(default)]
    pub context_updates: LeadData,
}

impl HandoffSignal {
    pub fn to(target: AgentKind, reason: impl Into<String>) -> Self {
        Self {
            target,
            reason: reason.into(),
            context_updates: LeadData::new(),
        }
    }
}

/// Result of one agent turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    /// Message to send back to the lead.
    pub text: String,
    /// Fields the caller should persist into the lead store.
    #[serde(default)]
    pub context_updates: LeadData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<HandoffSignal>,
}

/// Common contract for the three specialists.
#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Whether this agent claims the given context.
    fn should_handle(&self, ctx: &AgentContext) -> bool;

    /// Handle one turn. `user_message` is empty for a synthetic continuation
    /// after a handoff. Provider-layer failures are absorbed into a scripted
    /// fallback; only cancellation and context errors propagate.
    async fn process(
        &self,
        ctx: &AgentContext,
        user_message: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, EngineError>;
}

/// Scripted degradation message when no provider could answer.
pub const FALLBACK_TEXT: &str = "Estamos teniendo un problema técnico en este momento, \
por favor inténtalo de nuevo en unos minutos. / We're having trouble right now, \
please try again shortly.";

/// A turn that claims no progress: fallback text, no updates, no handoff.
pub(crate) fn fallback_response() -> AgentResponse {
    AgentResponse {
        text: FALLBACK_TEXT.to_string(),
        ..AgentResponse::default()
    }
}
