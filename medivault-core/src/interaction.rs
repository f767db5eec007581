use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreResult;

/// Provider severity vocabulary. Anything the provider sends outside it parses as `Unknown`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    /// Only high and medium findings are reported back to callers.
    pub fn is_significant(self) -> bool {
        matches!(self, Severity::High | Severity::Medium)
    }

    pub fn rank(self) -> u8 {
        match self {
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Unknown => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }
}

impl From<&str> for Severity {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub title: String,
    pub snippet: String,
    pub source_uri: String,
    pub relevance_score: f64,
}

/// One finding returned by the lookup capability for a subject medication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    /// The reference medication the finding concerns, when the provider names it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<String>,
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl InteractionRecord {
    pub fn unknown(summary: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            counterpart: None,
            severity: Severity::Unknown,
            summary: summary.into(),
            description: description.into(),
            action: "Consult healthcare provider".to_string(),
            citations: Vec::new(),
        }
    }
}

/// External drug-interaction lookup.
#[async_trait]
pub trait InteractionLookup: Send + Sync {
    /// Ask whether `subject` interacts with any of `references`.
    ///
    /// Errors and timeouts are reported as `CoreError::LookupFailed`.
    async fn check(&self, subject: &str, references: &[String])
        -> CoreResult<Vec<InteractionRecord>>;
}
