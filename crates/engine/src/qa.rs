//! Safety-constrained Q&A over a patient's clinical context.
//!
//! Questions are validated before any model call, scrubbed through the same
//! redaction boundary as the context, answered with a low-temperature
//! structured call, then scored and gated. An out-of-scope question is
//! answered with a flag and a disclaimer, never blocked; a contraindicated
//! answer is blocked outright. There is no canned fallback answer for any
//! failure.

use std::sync::Arc;

use aftercare_config::AppConfig;
use aftercare_core::error::{Error, Result};
use aftercare_core::model::GenerativeModel;
use aftercare_core::qa::{QAExchange, SafetyFlag};
use chrono::Utc;
use tracing::{info, warn};

use crate::context::ClinicalContext;
use crate::contract::{self, CORRECTIVE_INSTRUCTION, QaPayload, SAFETY_REINFORCEMENT};
use crate::redaction::{self, RedactionMap};
use crate::safety::SafetyValidator;

/// Questions longer than this are rejected before any model call.
const MAX_QUESTION_CHARS: usize = 2000;

/// Per-source confidence bonus, capped at four grounding sources.
const GROUNDING_BONUS: f64 = 0.05;

/// Phrases that make an answer clinically dangerous regardless of content.
/// Each occurrence costs a steep confidence penalty and forces a disclaimer.
const DANGEROUS_PHRASES: &[&str] = &[
    "stop taking",
    "stop your medication",
    "double the dose",
    "double your dose",
    "skip your",
    "no need to see",
    "don't call your doctor",
    "instead of your prescribed",
];
const DANGEROUS_PENALTY: f64 = 0.3;

/// Certainty language a model has no business using about a patient.
const OVERCONFIDENT_PHRASES: &[&str] = &[
    "definitely",
    "certainly will",
    "guaranteed",
    "100%",
    "always works",
    "never fails",
];
const OVERCONFIDENT_PENALTY: f64 = 0.1;

/// Question or answer content that always warrants the care-team disclaimer.
const DISCLAIMER_TOPICS: &[&str] = &[
    "dose", "dosage", "dosing", "emergency", "chest pain", "diagnos", "pregnan", "overdose",
];

const DISCLAIMER: &str = "This information is based on your discharge records. For medical \
advice specific to your situation, contact your care team.";

/// Answers patient questions against an assembled clinical context.
pub struct QaEngine {
    model: Arc<dyn GenerativeModel>,
    config: AppConfig,
}

impl QaEngine {
    pub fn new(model: Arc<dyn GenerativeModel>, config: AppConfig) -> Self {
        Self { model, config }
    }

    /// Answer one question. Stateless: each call stands alone.
    pub async fn answer(&self, context: &ClinicalContext, question: &str) -> Result<QAExchange> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidQuestion("question is empty".into()));
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(Error::InvalidQuestion(format!(
                "question exceeds {MAX_QUESTION_CHARS} characters"
            )));
        }

        let (redacted, mut map) = redaction::redact(context);
        // The question is patient-authored free text; scrub it like any other.
        let scrubbed_question = redaction::scrub_free_text(question, &context.patient, &mut map);
        let validator = SafetyValidator::for_context(context, &self.config.safety);

        let payload = self
            .generate_valid_payload(&redacted, &scrubbed_question, None)
            .await?;

        let payload = if validator.validate_answer(&payload.answer).is_blocked() {
            warn!(
                patient = %context.patient.patient_id,
                "Blocked answer, retrying with safety reinforcement"
            );
            let retry = self
                .generate_valid_payload(&redacted, &scrubbed_question, Some(SAFETY_REINFORCEMENT))
                .await?;
            let verdict = validator.validate_answer(&retry.answer);
            if verdict.is_blocked() {
                return Err(Error::UnsafeGenerationBlocked(verdict.notes.join("; ")));
            }
            retry
        } else {
            payload
        };

        let exchange = self.score(context, question, payload, &map);
        info!(
            patient = %context.patient.patient_id,
            confidence = exchange.confidence,
            flags = exchange.safety_flags.len(),
            sources = exchange.sources.len(),
            "Answered patient question"
        );
        Ok(exchange)
    }

    /// One generation attempt plus at most one corrective retry.
    /// [`Error::MalformedGeneration`] stays internal to this ladder; callers
    /// only ever see [`Error::GenerationFailed`].
    async fn generate_valid_payload(
        &self,
        redacted: &redaction::RedactedContext,
        question: &str,
        extra_instruction: Option<&str>,
    ) -> Result<QaPayload> {
        match self.generate_once(redacted, question, extra_instruction).await {
            Err(Error::MalformedGeneration(reason)) => {
                warn!(%reason, "Schema-invalid answer, retrying with correction");
                let mut instruction = CORRECTIVE_INSTRUCTION.to_string();
                if let Some(extra) = extra_instruction {
                    instruction.push_str("\n\n");
                    instruction.push_str(extra);
                }
                self.generate_once(redacted, question, Some(&instruction))
                    .await
                    .map_err(|err| match err {
                        Error::MalformedGeneration(reason) => Error::GenerationFailed(reason),
                        other => other,
                    })
            }
            outcome => outcome,
        }
    }

    /// A single model call; a schema-invalid response parses to
    /// [`Error::MalformedGeneration`].
    async fn generate_once(
        &self,
        redacted: &redaction::RedactedContext,
        question: &str,
        extra_instruction: Option<&str>,
    ) -> Result<QaPayload> {
        let request = contract::qa_request(&self.config.model, redacted, question, extra_instruction);
        let response = self.model.generate(request).await?;
        contract::parse_payload::<QaPayload>(&response.text).map_err(Error::MalformedGeneration)
    }

    /// Grounding, confidence arithmetic, flags, disclaimer, rehydration.
    fn score(
        &self,
        context: &ClinicalContext,
        question: &str,
        payload: QaPayload,
        map: &RedactionMap,
    ) -> QAExchange {
        let known_sections = context.section_names();
        // Keep only sources naming sections that actually exist in this
        // context; the model cannot claim grounding it never had.
        let sources: Vec<String> = payload
            .sources
            .into_iter()
            .filter(|s| known_sections.iter().any(|k| k.eq_ignore_ascii_case(s)))
            .collect();

        let mut flags = Vec::new();
        let answer_lower = payload.answer.to_lowercase();

        let mut confidence = payload.confidence.clamp(0.0, 1.0);
        if sources.is_empty() {
            // Nothing in the record grounds this answer.
            confidence = confidence.min(self.config.safety.ungrounded_confidence_ceiling);
            flags.push(SafetyFlag::OutOfScopeRequest);
        } else {
            confidence =
                (confidence + GROUNDING_BONUS * sources.len().min(4) as f64).clamp(0.0, 1.0);
        }

        for phrase in DANGEROUS_PHRASES {
            if answer_lower.contains(phrase) {
                confidence -= DANGEROUS_PENALTY;
            }
        }
        for phrase in OVERCONFIDENT_PHRASES {
            if answer_lower.contains(phrase) {
                confidence -= OVERCONFIDENT_PENALTY;
            }
        }
        let confidence = confidence.clamp(0.0, 1.0);

        if confidence < self.config.safety.low_confidence_threshold {
            flags.push(SafetyFlag::LowConfidence);
        }

        let question_lower = question.to_lowercase();
        let sensitive_topic = DISCLAIMER_TOPICS
            .iter()
            .any(|t| question_lower.contains(t) || answer_lower.contains(t));
        let dangerous_language = DANGEROUS_PHRASES.iter().any(|p| answer_lower.contains(p));
        let disclaimer = (sensitive_topic || dangerous_language || !flags.is_empty())
            .then(|| DISCLAIMER.to_string());

        QAExchange {
            id: uuid::Uuid::new_v4(),
            question: question.to_string(),
            answer: map.rehydrate(&payload.answer),
            confidence,
            safety_flags: flags,
            sources,
            disclaimer,
            answered_at: Utc::now(),
        }
    }
}
