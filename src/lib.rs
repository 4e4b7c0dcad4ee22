//! Prospecto — conversation orchestration engine for lead qualification.
//!
//! Qualifies inbound sales leads through multi-turn conversation: a
//! supervisor routes each message to one of three specialist agents
//! (qualifier, scheduler, follow-up), agents hand the conversation forward
//! through a loop-guarded handoff protocol, and every model call goes
//! through a resilient router (per-provider circuit breakers, retry with
//! backoff, ordered fallback).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use prospecto::prelude::*;
//! use prospecto::provider::openai_compat::OpenAiCompatAdapter;
//!
//! # async fn example() -> prospecto::error::Result<()> {
//! let config = EngineConfig::from_env()
//!     .with_provider_order(vec![ProviderId::new("primary")]);
//!
//! let sink: Arc<dyn MetricsSink> = Arc::new(TracingSink);
//! let mut router = ModelRouter::new(&config, sink.clone());
//! router.register(Arc::new(OpenAiCompatAdapter::new(
//!     "primary", "gpt-4o-mini", "sk-...", "https://api.openai.com/v1",
//! )));
//!
//! let supervisor = AgentSupervisor::new(&config, Arc::new(router), sink);
//!
//! let ctx = AgentContext::new("lead-42", "broker-7");
//! let response = supervisor.process(&ctx, "Hola, busco casa en el sector norte").await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod prelude;
pub mod provider;
pub mod router;
pub mod supervisor;
pub mod types;
pub mod window;
