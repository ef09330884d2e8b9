//! Prompt/schema contract — what the model is given and what it must return.
//!
//! For each operation this module defines (a) the structured fields projected
//! from the redacted context into the prompt and (b) the exact response shape.
//! Responses are parsed strictly into typed payloads; a response that fails
//! to parse is a malformed-generation failure, never a best-effort coercion.

use aftercare_config::ModelConfig;
use aftercare_core::instructions::{FollowUpReminder, MedicationScheduleEntry};
use aftercare_core::model::GenerationRequest;
use serde::Deserialize;

use crate::redaction::RedactedContext;

/// The schema the model must return for instruction synthesis.
///
/// Emergency contacts are deliberately absent: contact fields are reinserted
/// from structured patient data after validation, so anything the model
/// writes there would be discarded anyway.
#[derive(Debug, Clone, Deserialize)]
pub struct InstructionsPayload {
    #[serde(default)]
    pub medication_schedule: Vec<MedicationScheduleEntry>,
    #[serde(default)]
    pub lifestyle_recommendations: Vec<String>,
    #[serde(default)]
    pub follow_up_reminders: Vec<FollowUpReminder>,
    #[serde(default)]
    pub warning_signs: Vec<String>,
    #[serde(default)]
    pub activity_guidelines: Vec<String>,
    #[serde(default)]
    pub diet_recommendations: Vec<String>,
    #[serde(default)]
    pub wound_care_instructions: Option<Vec<String>>,
    pub summary: String,
}

/// The schema the model must return for a Q&A answer.
#[derive(Debug, Clone, Deserialize)]
pub struct QaPayload {
    pub answer: String,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are a specialized healthcare assistant that generates personalized, \
easy-to-understand discharge instructions for patients. Create clear, \
actionable, patient-friendly instructions that reduce confusion and prevent \
readmissions.

GUIDELINES:
1. Use simple, non-medical language that patients and caregivers understand
2. Be specific about medication schedules: exact names, dosages, and timing
3. Only reference medications that appear in the provided context
4. Include specific warning signs that require immediate medical attention
5. Create a realistic follow-up schedule
6. Consider the patient's age band, sex, history, and current condition
7. Refer to the patient as PATIENT_NAME; never invent names or contact details

Respond with ONLY a JSON object containing these keys:
- medication_schedule: array of {name, dosage, timing, special_instructions}
- lifestyle_recommendations: array of strings
- follow_up_reminders: array of {kind, timeframe, purpose}
- warning_signs: array of strings
- activity_guidelines: array of strings
- diet_recommendations: array of strings
- wound_care_instructions: array of strings (omit if not applicable)
- summary: a brief, encouraging summary of the key points";

const QA_SYSTEM_PROMPT: &str = "\
You are a healthcare assistant answering a patient's question about their \
discharge instructions and medical care.

CRITICAL SAFETY GUIDELINES:
1. Answer only from the provided clinical context
2. NEVER suggest stopping or changing medications without medical supervision
3. NEVER provide emergency medical advice; direct to emergency services
4. If unsure, state uncertainty clearly and recommend the care team
5. Refer to the patient as PATIENT_NAME; never invent names or contact details
6. Report which context sections you used in \"sources\"

Respond with ONLY a JSON object containing these keys:
- answer: string
- confidence: number between 0.0 and 1.0
- sources: array of context section names you actually used";

/// Appended when the first response failed schema parsing.
pub const CORRECTIVE_INSTRUCTION: &str = "\
IMPORTANT: your previous response was not valid JSON matching the required \
schema. Respond with ONLY the JSON object, no prose, no markdown fences.";

/// Appended when the first document failed a blocking safety check.
pub const SAFETY_REINFORCEMENT: &str = "\
IMPORTANT: only recommend medications that appear in the patient's current \
or discharge medication lists, and never anything conflicting with the \
recorded allergies.";

/// Build the synthesis request from a redacted context.
pub fn synthesis_request(
    config: &ModelConfig,
    context: &RedactedContext,
    extra_instruction: Option<&str>,
) -> GenerationRequest {
    let mut system = SYNTHESIS_SYSTEM_PROMPT.to_string();
    if let Some(extra) = extra_instruction {
        system.push_str("\n\n");
        system.push_str(extra);
    }

    let user = format!(
        "Generate comprehensive, personalized discharge instructions for this patient:\n\n{}",
        render_context(context)
    );

    GenerationRequest {
        model: config.model.clone(),
        system_prompt: system,
        user_prompt: user,
        temperature: config.synthesis_temperature,
        max_tokens: config.synthesis_max_tokens,
    }
}

/// Build the Q&A request from a redacted context and the (redacted) question.
pub fn qa_request(
    config: &ModelConfig,
    context: &RedactedContext,
    question: &str,
    extra_instruction: Option<&str>,
) -> GenerationRequest {
    let mut system = QA_SYSTEM_PROMPT.to_string();
    if let Some(extra) = extra_instruction {
        system.push_str("\n\n");
        system.push_str(extra);
    }

    let user = format!(
        "Patient question: \"{}\"\n\nCLINICAL CONTEXT:\n{}",
        question,
        render_context(context)
    );

    GenerationRequest {
        model: config.model.clone(),
        system_prompt: system,
        user_prompt: user,
        temperature: config.qa_temperature,
        max_tokens: config.qa_max_tokens,
    }
}

/// Render the redacted context as the structured prompt section. Only
/// clinically relevant attributes appear; identifiers are placeholders.
fn render_context(context: &RedactedContext) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "PATIENT:\n- Age band: {}\n- Sex: {:?}\n",
        context.age_band.label(),
        context.gender
    ));
    if !context.medical_history.is_empty() {
        out.push_str(&format!(
            "- Medical history: {}\n",
            context.medical_history.join(", ")
        ));
    }
    if !context.allergies.is_empty() {
        out.push_str("- Allergies:\n");
        for a in &context.allergies {
            out.push_str(&format!(
                "  - {} ({}, severity: {:?})\n",
                a.allergen, a.reaction, a.severity
            ));
        }
    }
    if !context.current_medications.is_empty() {
        out.push_str("- Current medications:\n");
        for m in &context.current_medications {
            out.push_str(&format!("  - {} {} {}\n", m.name, m.dosage, m.frequency));
        }
    }

    if let Some(record) = &context.record {
        out.push_str(&format!(
            "\nMEDICAL RECORD:\n- Primary diagnosis: {}\n- Severity: {:?}\n- Treatment summary: {}\n",
            record.primary_diagnosis, record.severity_level, record.treatment_summary
        ));
        if !record.secondary_diagnoses.is_empty() {
            out.push_str(&format!(
                "- Secondary diagnoses: {}\n",
                record.secondary_diagnoses.join(", ")
            ));
        }
        if !record.procedures_performed.is_empty() {
            out.push_str(&format!(
                "- Procedures: {}\n",
                record.procedures_performed.join(", ")
            ));
        }
        for lab in &record.lab_results {
            out.push_str(&format!(
                "- Lab: {} = {} {} ({})\n",
                lab.test_name, lab.value, lab.unit, lab.status
            ));
        }
    }

    if let Some(note) = &context.discharge_note {
        out.push_str(&format!(
            "\nDISCHARGE NOTE:\n- Summary: {}\n",
            note.discharge_summary
        ));
        if !note.medications_at_discharge.is_empty() {
            out.push_str("- Medications at discharge:\n");
            for m in &note.medications_at_discharge {
                out.push_str(&format!("  - {} {} {}\n", m.name, m.dosage, m.frequency));
            }
        }
        if let Some(t) = &note.follow_up_instructions {
            out.push_str(&format!("- Follow-up: {t}\n"));
        }
        if let Some(t) = &note.activity_restrictions {
            out.push_str(&format!("- Activity restrictions: {t}\n"));
        }
        if let Some(t) = &note.diet_instructions {
            out.push_str(&format!("- Diet: {t}\n"));
        }
        if let Some(t) = &note.warning_signs {
            out.push_str(&format!("- Warning signs: {t}\n"));
        }
    }

    if let Some(summary) = &context.history_summary {
        out.push_str(&format!("\nHISTORY:\n{summary}\n"));
    }

    out
}

/// Strictly parse a model response into a typed payload.
///
/// Tolerates a markdown fence around the JSON (models add them even when
/// told not to) but nothing else: the stripped text must itself be the JSON
/// object.
pub fn parse_payload<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, String> {
    let stripped = strip_fences(raw);
    if !stripped.starts_with('{') {
        return Err(format!(
            "response is not a JSON object (starts with {:?})",
            stripped.chars().next()
        ));
    }
    serde_json::from_str(stripped).map_err(|e| e.to_string())
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag ("json") after the opening fence.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest.trim())
}
