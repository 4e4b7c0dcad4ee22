//! Convenience re-exports for common use.

pub use crate::agents::{AgentResponse, HandoffSignal, SpecialistAgent};
pub use crate::config::EngineConfig;
pub use crate::context::{AgentContext, AgentKind, LeadData, LeadField, PipelineStage};
pub use crate::error::{EngineError, Result};
pub use crate::metrics::{MetricsSink, TracingSink};
pub use crate::provider::{ProviderAdapter, ProviderId, ProviderReply};
pub use crate::router::ModelRouter;
pub use crate::supervisor::AgentSupervisor;
pub use crate::types::{CallKind, CallParams, ChatMessage, Role};
pub use crate::window::{ContextWindowManager, PromptBundle};
