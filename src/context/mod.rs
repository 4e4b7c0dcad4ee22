//! Immutable per-turn lead context and the derived qualification predicates.
//!
//! An [`AgentContext`] is built once per inbound message from whatever the
//! external lead store holds, flows through one supervisor invocation, and is
//! discarded. Nothing here mutates in place: every change produces a new value
//! through the `with_*` methods, so concurrent turns for different leads share
//! no state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::ChatMessage;

/// A lead's position in the sales funnel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    Entrada,
    Perfilamiento,
    CalificacionFinanciera,
    Agendado,
    Seguimiento,
    Referidos,
    Ganado,
    Perdido,
}

impl PipelineStage {
    /// Terminal stages: no agent will claim the conversation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ganado | Self::Perdido)
    }
}

/// The identity of a specialist agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentKind {
    Qualifier,
    Scheduler,
    FollowUp,
}

impl AgentKind {
    /// Position in the funnel ordering; handoffs must move strictly forward.
    pub fn funnel_rank(&self) -> u8 {
        match self {
            Self::Qualifier => 0,
            Self::Scheduler => 1,
            Self::FollowUp => 2,
        }
    }
}

/// The fixed vocabulary of fields collected about a lead.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeadField {
    Name,
    Phone,
    Email,
    Income,
    Location,
    CreditStatus,
}

/// Fields that must be present before a lead counts as qualified, in the
/// priority order they should be asked for.
pub const REQUIRED_FIELDS: [LeadField; 4] = [
    LeadField::Name,
    LeadField::Phone,
    LeadField::Income,
    LeadField::CreditStatus,
];

/// Collected field values for a lead. Keys are the fixed vocabulary; values
/// are normalized strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeadData(BTreeMap<LeadField, String>);

impl LeadData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable insert, for construction.
    pub fn with(mut self, field: LeadField, value: impl Into<String>) -> Self {
        self.0.insert(field, value.into());
        self
    }

    pub fn set(&mut self, field: LeadField, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub fn get(&self, field: LeadField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: LeadField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LeadField, &String)> {
        self.0.iter()
    }

    /// New map with `other` merged on top (last writer wins per field).
    pub fn merged(&self, other: &LeadData) -> LeadData {
        let mut out = self.0.clone();
        for (field, value) in &other.0 {
            out.insert(*field, value.clone());
        }
        LeadData(out)
    }

    /// Whether the recorded credit status counts as negative.
    pub fn credit_negative(&self) -> bool {
        self.get(LeadField::CreditStatus)
            .map(credit_value_is_negative)
            .unwrap_or(false)
    }

    /// Short human-readable digest of known fields, for returning leads.
    /// Kept under a ~100-token budget by truncating long values.
    pub fn brief(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, value)| {
                let v: String = value.chars().take(40).collect();
                format!("{field}: {v}")
            })
            .collect();
        Some(format!("Known lead data — {}.", parts.join("; ")))
    }
}

/// Classify a raw credit-status value. Checked in one place so extraction
/// normalization and the qualification gate cannot drift apart.
pub(crate) fn credit_value_is_negative(value: &str) -> bool {
    let v = value.to_lowercase();
    const CLEAR: [&str; 7] = [
        "clear", "clean", "limpio", "sin deuda", "no debt", "al dia", "al día",
    ];
    if CLEAR.iter().any(|m| v.contains(m)) {
        return false;
    }
    const NEGATIVE: [&str; 7] = [
        "negativ", "dicom", "moros", "derogatory", "deuda", "mora", "bad",
    ];
    NEGATIVE.iter().any(|m| v.contains(m))
}

/// Immutable snapshot of a lead's state for one supervisor turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentContext {
    lead_id: String,
    broker_id: String,
    pipeline_stage: PipelineStage,
    conversation_state: String,
    lead_data: LeadData,
    message_history: Vec<ChatMessage>,
    current_agent: Option<AgentKind>,
    handoff_count: u32,
}

impl AgentContext {
    pub fn new(lead_id: impl Into<String>, broker_id: impl Into<String>) -> Self {
        Self {
            lead_id: lead_id.into(),
            broker_id: broker_id.into(),
            pipeline_stage: PipelineStage::Entrada,
            conversation_state: String::new(),
            lead_data: LeadData::new(),
            message_history: Vec::new(),
            current_agent: None,
            handoff_count: 0,
        }
    }

    pub fn with_stage(mut self, stage: PipelineStage) -> Self {
        self.pipeline_stage = stage;
        self
    }

    pub fn with_conversation_state(mut self, state: impl Into<String>) -> Self {
        self.conversation_state = state.into();
        self
    }

    pub fn with_lead_data(mut self, data: LeadData) -> Self {
        self.lead_data = data;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.message_history = history;
        self
    }

    pub fn with_current_agent(mut self, agent: AgentKind) -> Self {
        self.current_agent = Some(agent);
        self
    }

    pub fn with_handoff_count(mut self, count: u32) -> Self {
        self.handoff_count = count;
        self
    }

    /// New context with `updates` merged into the lead data.
    pub fn with_updates(&self, updates: &LeadData) -> Self {
        let mut next = self.clone();
        next.lead_data = self.lead_data.merged(updates);
        next
    }

    /// New context after a handoff was accepted.
    pub fn with_incremented_handoffs(&self) -> Self {
        let mut next = self.clone();
        next.handoff_count = self.handoff_count.saturating_add(1);
        next
    }

    pub fn lead_id(&self) -> &str {
        &self.lead_id
    }

    pub fn broker_id(&self) -> &str {
        &self.broker_id
    }

    pub fn pipeline_stage(&self) -> PipelineStage {
        self.pipeline_stage
    }

    pub fn conversation_state(&self) -> &str {
        &self.conversation_state
    }

    pub fn lead_data(&self) -> &LeadData {
        &self.lead_data
    }

    pub fn message_history(&self) -> &[ChatMessage] {
        &self.message_history
    }

    pub fn current_agent(&self) -> Option<AgentKind> {
        self.current_agent
    }

    pub fn handoff_count(&self) -> u32 {
        self.handoff_count
    }

    /// All required fields present and credit status not negative.
    pub fn is_qualified(&self) -> bool {
        REQUIRED_FIELDS.iter().all(|f| self.lead_data.contains(*f))
            && !self.lead_data.credit_negative()
    }

    /// Qualified and we know where the lead is looking.
    pub fn is_appointment_ready(&self) -> bool {
        self.is_qualified() && self.lead_data.contains(LeadField::Location)
    }

    /// Required-but-absent fields, in priority order.
    pub fn missing_fields(&self) -> Vec<LeadField> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !self.lead_data.contains(*f))
            .collect()
    }
}
