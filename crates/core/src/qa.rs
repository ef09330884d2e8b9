//! Question/answer exchanges and safety flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A non-blocking (or, for contraindications, blocking) safety annotation.
///
/// Flags are attached, never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyFlag {
    /// Output names a medication absent from the patient's history.
    PossibleHallucination,
    /// Output contradicts a recorded allergy. Blocking for documents.
    ContraindicatedAdvice,
    /// A required warning-signs section was empty.
    MissingDisclaimer,
    /// The question falls outside the patient's clinical context.
    OutOfScopeRequest,
    /// Confidence fell below the configured floor.
    LowConfidence,
}

impl SafetyFlag {
    /// The stable kind string used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            SafetyFlag::PossibleHallucination => "possible-hallucination",
            SafetyFlag::ContraindicatedAdvice => "contraindicated-advice",
            SafetyFlag::MissingDisclaimer => "missing-disclaimer",
            SafetyFlag::OutOfScopeRequest => "out-of-scope-request",
            SafetyFlag::LowConfidence => "low-confidence",
        }
    }
}

/// One answered question. Ephemeral — owned by the caller's session; the
/// engine retains no conversation history across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QAExchange {
    pub id: uuid::Uuid,
    pub question: String,
    pub answer: String,
    /// In [0.0, 1.0].
    pub confidence: f64,
    #[serde(default)]
    pub safety_flags: Vec<SafetyFlag>,
    /// Names of the context sections that grounded the answer.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    pub answered_at: DateTime<Utc>,
}
