//! End-to-end agent behavior over a scripted provider.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use prospecto::agents::{FollowUpAgent, QualifierAgent, SchedulerAgent, SpecialistAgent, FALLBACK_TEXT};
use prospecto::config::EngineConfig;
use prospecto::context::{AgentContext, AgentKind, LeadData, LeadField, PipelineStage};
use prospecto::error::EngineError;
use prospecto::provider::ProviderId;
use prospecto::router::retry::RetryPolicy;
use prospecto::router::ModelRouter;
use prospecto::types::ChatMessage;
use prospecto::window::ContextWindowManager;

use common::{PendingAdapter, RecordingSink, ScriptedAdapter};

fn engine(adapter: Arc<ScriptedAdapter>) -> (EngineConfig, Arc<ModelRouter>, Arc<ContextWindowManager>) {
    let config = EngineConfig::default()
        .with_provider_order(vec![ProviderId::new("mock")])
        .with_retry(RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        });
    let mut router = ModelRouter::new(&config, Arc::new(RecordingSink::new()));
    router.register(adapter);
    let router = Arc::new(router);
    let window = Arc::new(ContextWindowManager::new(&config, router.clone()));
    (config, router, window)
}

fn profiling_ctx() -> AgentContext {
    AgentContext::new("lead-1", "broker-1")
        .with_stage(PipelineStage::Perfilamiento)
        .with_lead_data(
            LeadData::new()
                .with(LeadField::Name, "Ana Rojas")
                .with(LeadField::Phone, "+56912345678"),
        )
}

#[tokio::test(start_paused = true)]
async fn qualifier_extracts_fields_and_hands_off() {
    let adapter = Arc::new(ScriptedAdapter::new("mock"));
    adapter.push_ok(
        r#"{"income":"1.2M","location":"sector norte","credit_status":"sin deudas",
            "reply":"¡Perfecto, Ana! Con eso podemos avanzar."}"#,
    );
    let (config, router, window) = engine(adapter);
    let agent = QualifierAgent::new(&config, router, window);

    let ctx = profiling_ctx();
    assert!(agent.should_handle(&ctx));

    let response = agent
        .process(&ctx, "Gano 1.2M y busco en el sector norte, sin deudas", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.context_updates.get(LeadField::Income), Some("1200000"));
    assert_eq!(
        response.context_updates.get(LeadField::Location),
        Some("sector norte")
    );
    assert_eq!(
        response.context_updates.get(LeadField::CreditStatus),
        Some("clear")
    );
    assert_eq!(
        response.handoff.as_ref().map(|h| h.target),
        Some(AgentKind::Scheduler)
    );
    assert_eq!(response.text, "¡Perfecto, Ana! Con eso podemos avanzar.");
}

#[tokio::test(start_paused = true)]
async fn negative_credit_suppresses_the_handoff() {
    let adapter = Arc::new(ScriptedAdapter::new("mock"));
    adapter.push_ok(
        r#"{"income":"900000","location":"sector sur","credit_status":"tengo DICOM",
            "reply":"Gracias por contarme."}"#,
    );
    let (config, router, window) = engine(adapter);
    let agent = QualifierAgent::new(&config, router, window);

    let response = agent
        .process(&profiling_ctx(), "Gano 900 mil pero tengo DICOM", &CancellationToken::new())
        .await
        .unwrap();

    // Fields are still recorded; only the funnel advance is blocked.
    assert_eq!(
        response.context_updates.get(LeadField::CreditStatus),
        Some("negative")
    );
    assert_eq!(response.context_updates.get(LeadField::Income), Some("900000"));
    assert!(response.handoff.is_none());
}

#[tokio::test(start_paused = true)]
async fn qualifier_degrades_when_all_providers_fail() {
    // Empty script: every call is a transient 500.
    let adapter = Arc::new(ScriptedAdapter::new("mock"));
    let (config, router, window) = engine(adapter);
    let agent = QualifierAgent::new(&config, router, window);

    let response = agent
        .process(&profiling_ctx(), "hola", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.text, FALLBACK_TEXT);
    assert!(response.context_updates.is_empty());
    assert!(response.handoff.is_none());
}

#[tokio::test(start_paused = true)]
async fn unparseable_extraction_is_passed_through_as_reply() {
    let adapter = Arc::new(ScriptedAdapter::new("mock"));
    adapter.push_ok("Hola Ana, ¿cuál es tu ingreso mensual aproximado?");
    let (config, router, window) = engine(adapter);
    let agent = QualifierAgent::new(&config, router, window);

    let response = agent
        .process(&profiling_ctx(), "hola", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.text, "Hola Ana, ¿cuál es tu ingreso mensual aproximado?");
    assert!(response.context_updates.is_empty());
    assert!(response.handoff.is_none());
}

#[tokio::test(start_paused = true)]
async fn qualifier_propagates_cancellation() {
    let config = EngineConfig::default().with_provider_order(vec![ProviderId::new("mock")]);
    let mut router = ModelRouter::new(&config, Arc::new(RecordingSink::new()));
    router.register(Arc::new(PendingAdapter::new("mock")));
    let router = Arc::new(router);
    let window = Arc::new(ContextWindowManager::new(&config, router.clone()));
    let agent = QualifierAgent::new(&config, router, window);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = agent
        .process(&profiling_ctx(), "hola", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
}

fn scheduling_ctx() -> AgentContext {
    AgentContext::new("lead-1", "broker-1")
        .with_stage(PipelineStage::CalificacionFinanciera)
        .with_history(vec![
            ChatMessage::user("Busco en el sector norte"),
            ChatMessage::agent("¿Te acomoda una visita el martes o el jueves por la tarde?"),
        ])
}

#[tokio::test(start_paused = true)]
async fn scheduler_hands_off_on_mutual_confirmation() {
    let adapter = Arc::new(ScriptedAdapter::new("mock"));
    adapter.push_ok("Quedamos el martes a las 16:00 entonces, ¡nos vemos!");
    let (config, router, window) = engine(adapter);
    let agent = SchedulerAgent::new(&config, router, window);

    let ctx = scheduling_ctx();
    assert!(agent.should_handle(&ctx));

    let response = agent
        .process(&ctx, "Confirmo, nos vemos el martes", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        response.handoff.as_ref().map(|h| h.target),
        Some(AgentKind::FollowUp)
    );
    assert_eq!(response.text, "Quedamos el martes a las 16:00 entonces, ¡nos vemos!");
}

#[tokio::test(start_paused = true)]
async fn ambiguous_ok_does_not_advance_the_funnel() {
    let adapter = Arc::new(ScriptedAdapter::new("mock"));
    adapter.push_ok("¿Prefieres el martes o el jueves?");
    let (config, router, window) = engine(adapter);
    let agent = SchedulerAgent::new(&config, router, window);

    let response = agent
        .process(&scheduling_ctx(), "ok", &CancellationToken::new())
        .await
        .unwrap();

    assert!(response.handoff.is_none());
}

#[tokio::test(start_paused = true)]
async fn scheduler_scripts_a_proposal_when_the_model_reply_is_empty() {
    let adapter = Arc::new(ScriptedAdapter::new("mock"));
    adapter.push_ok("   ");
    let (config, router, window) = engine(adapter);
    let agent = SchedulerAgent::new(&config, router, window);

    let response = agent
        .process(&scheduling_ctx(), "Me interesa agendar", &CancellationToken::new())
        .await
        .unwrap();

    assert!(response.text.contains("visita"), "text: {}", response.text);
}

#[tokio::test(start_paused = true)]
async fn followup_never_hands_off() {
    let adapter = Arc::new(ScriptedAdapter::new("mock"));
    adapter.push_ok("¡Qué bueno que te fue bien! ¿Conoces a alguien más buscando propiedad?");
    let (config, router, window) = engine(adapter);
    let agent = FollowUpAgent::new(&config, router, window);

    let ctx = AgentContext::new("lead-1", "broker-1").with_stage(PipelineStage::Agendado);
    assert!(agent.should_handle(&ctx));

    let response = agent
        .process(&ctx, "Fui a la visita, me encantó", &CancellationToken::new())
        .await
        .unwrap();

    assert!(response.handoff.is_none());
    assert!(!response.text.is_empty());
}
