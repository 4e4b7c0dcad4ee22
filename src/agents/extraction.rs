//! Parsing and normalization of structured extraction output.
//!
//! The qualifier asks the model for a JSON object carrying any fields it can
//! pull from the lead's message plus a drafted reply. Models wrap JSON in
//! code fences often enough that we strip them before parsing.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::context::{credit_value_is_negative, LeadData, LeadField};
use crate::error::EngineError;

/// Raw extraction payload as the model produces it.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExtractedFields {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub income: Option<String>,
    pub location: Option<String>,
    pub credit_status: Option<String>,
    pub reply: Option<String>,
}

impl ExtractedFields {
    /// Normalized lead-data delta plus the drafted reply, if any.
    pub fn into_updates(self) -> (LeadData, Option<String>) {
        let mut updates = LeadData::new();
        if let Some(v) = non_empty(self.name) {
            updates.set(LeadField::Name, v.trim());
        }
        if let Some(v) = non_empty(self.phone) {
            updates.set(LeadField::Phone, normalize_phone(&v));
        }
        if let Some(v) = non_empty(self.email) {
            updates.set(LeadField::Email, v.trim().to_lowercase());
        }
        if let Some(v) = non_empty(self.income) {
            updates.set(LeadField::Income, normalize_income(&v));
        }
        if let Some(v) = non_empty(self.location) {
            updates.set(LeadField::Location, v.trim());
        }
        if let Some(v) = non_empty(self.credit_status) {
            updates.set(LeadField::CreditStatus, normalize_credit_status(&v));
        }
        (updates, non_empty(self.reply))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse the model's extraction output, tolerating code fences.
pub(crate) fn parse_extraction(raw: &str) -> Result<ExtractedFields, EngineError> {
    let stripped = strip_code_fences(raw);
    Ok(serde_json::from_str(stripped)?)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening fence.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .trim_end_matches('`')
        .trim()
}

/// Keep a leading `+` and digits, drop everything else.
pub(crate) fn normalize_phone(raw: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^\d+]").expect("valid regex"));
    let cleaned = re.replace_all(raw.trim(), "");
    // Only a leading plus survives.
    let mut out = String::with_capacity(cleaned.len());
    for (i, c) in cleaned.chars().enumerate() {
        if c != '+' || i == 0 {
            out.push(c);
        }
    }
    out
}

/// Normalize an income expression to a plain integer string.
/// "1.2M" → "1200000", "900 mil" → "900000", "1,200,000" → "1200000".
/// Returns the trimmed input when nothing parseable is found.
pub(crate) fn normalize_income(raw: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Longest alternatives first: a bare "m" must not shadow "mil"/"millones".
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)([\d][\d.,]*)\s*(millones|millón|millon|million|mil|mm|m|k)?")
            .expect("valid regex")
    });

    let Some(caps) = re.captures(raw.trim()) else {
        return raw.trim().to_string();
    };
    let number = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let suffix = caps
        .get(2)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();

    // Commas are thousands separators; a dot is decimal only when a
    // multiplier suffix follows ("1.2M"), otherwise also a separator.
    let base = if suffix.is_empty() {
        number.replace([',', '.'], "")
    } else {
        number.replace(',', "")
    };
    let Ok(value) = base.parse::<f64>() else {
        return raw.trim().to_string();
    };

    let multiplier = match suffix.as_str() {
        "m" | "mm" | "millones" | "millón" | "millon" | "million" => 1_000_000.0,
        "mil" | "k" => 1_000.0,
        _ => 1.0,
    };
    format!("{}", (value * multiplier).round() as u64)
}

/// Collapse a free-text credit remark into "clear" or "negative"; anything
/// unrecognized is kept lowercased so a human can audit it later.
pub(crate) fn normalize_credit_status(raw: &str) -> String {
    let v = raw.trim().to_lowercase();
    if credit_value_is_negative(&v) {
        "negative".to_string()
    } else if !v.is_empty() {
        "clear".to_string()
    } else {
        v
    }
}
