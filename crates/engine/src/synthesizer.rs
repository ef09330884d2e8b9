//! Instruction synthesis — one model call, strict parsing, safety
//! validation, repair, rehydration.
//!
//! Retry ladder, fixed and non-configurable: a schema-invalid response earns
//! exactly one corrective retry before `GenerationFailed`; a safety-blocked
//! document earns exactly one reinforced retry before
//! `UnsafeGenerationBlocked`. Nothing here ever substitutes a canned
//! document for a failure.

use std::sync::Arc;

use aftercare_config::AppConfig;
use aftercare_core::error::{Error, Result};
use aftercare_core::instructions::PersonalizedInstructions;
use aftercare_core::model::GenerativeModel;
use aftercare_core::patient::EmergencyContact;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::context::ClinicalContext;
use crate::contract::{
    self, CORRECTIVE_INSTRUCTION, InstructionsPayload, SAFETY_REINFORCEMENT,
};
use crate::redaction::{self, RedactionMap};
use crate::safety::{SafetyValidator, Verdict};

/// Synthesizes a personalized discharge instructions document from a
/// clinical context.
pub struct InstructionSynthesizer {
    model: Arc<dyn GenerativeModel>,
    config: AppConfig,
}

impl InstructionSynthesizer {
    pub fn new(model: Arc<dyn GenerativeModel>, config: AppConfig) -> Self {
        Self { model, config }
    }

    /// Run the full synthesis pipeline for one context.
    pub async fn synthesize(&self, context: &ClinicalContext) -> Result<PersonalizedInstructions> {
        let (redacted, map) = redaction::redact(context);
        let validator = SafetyValidator::for_context(context, &self.config.safety);

        let payload = self.generate_valid_payload(&redacted, None).await?;

        let verdict = validator.validate_instructions(&payload);
        let (payload, verdict) = if verdict.is_blocked() {
            warn!(
                patient = %context.patient.patient_id,
                findings = ?verdict.notes,
                "Blocked document, retrying with safety reinforcement"
            );
            let retry = self
                .generate_valid_payload(&redacted, Some(SAFETY_REINFORCEMENT))
                .await?;
            let retry_verdict = validator.validate_instructions(&retry);
            if retry_verdict.is_blocked() {
                return Err(Error::UnsafeGenerationBlocked(
                    retry_verdict.notes.join("; "),
                ));
            }
            (retry, retry_verdict)
        } else {
            (payload, verdict)
        };

        let mut doc = self.repair(payload, verdict);
        self.rehydrate(&mut doc, &map);
        doc.emergency_contacts = self.emergency_contacts(context);

        info!(
            patient = %context.patient.patient_id,
            medications = doc.medication_schedule.len(),
            warnings = doc.validation_warnings.len(),
            "Synthesized discharge instructions"
        );
        Ok(doc)
    }

    /// One generation attempt plus at most one corrective retry.
    /// [`Error::MalformedGeneration`] stays internal to this ladder; callers
    /// only ever see [`Error::GenerationFailed`].
    async fn generate_valid_payload(
        &self,
        redacted: &redaction::RedactedContext,
        extra_instruction: Option<&str>,
    ) -> Result<InstructionsPayload> {
        match self.generate_once(redacted, extra_instruction).await {
            Err(Error::MalformedGeneration(reason)) => {
                warn!(%reason, "Schema-invalid synthesis response, retrying with correction");
                let mut instruction = CORRECTIVE_INSTRUCTION.to_string();
                if let Some(extra) = extra_instruction {
                    instruction.push_str("\n\n");
                    instruction.push_str(extra);
                }
                self.generate_once(redacted, Some(&instruction))
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
        extra_instruction: Option<&str>,
    ) -> Result<InstructionsPayload> {
        let request = contract::synthesis_request(&self.config.model, redacted, extra_instruction);
        let response = self.model.generate(request).await?;
        contract::parse_payload::<InstructionsPayload>(&response.text)
            .map_err(Error::MalformedGeneration)
    }

    /// Structural repair: drop medication entries with no content, recording
    /// each drop. The delivered verdict's findings become the document's
    /// structured flags and prose warnings.
    fn repair(&self, payload: InstructionsPayload, verdict: Verdict) -> PersonalizedInstructions {
        let Verdict {
            flags, mut notes, ..
        } = verdict;
        let mut schedule = Vec::with_capacity(payload.medication_schedule.len());
        for entry in payload.medication_schedule {
            if entry.is_empty() {
                debug!("Dropping empty medication schedule entry");
                notes.push("dropped a medication entry with no name, dosage, or timing".into());
            } else {
                schedule.push(entry);
            }
        }

        PersonalizedInstructions {
            medication_schedule: schedule,
            lifestyle_recommendations: payload.lifestyle_recommendations,
            follow_up_reminders: payload.follow_up_reminders,
            warning_signs: payload.warning_signs,
            activity_guidelines: payload.activity_guidelines,
            diet_recommendations: payload.diet_recommendations,
            wound_care_instructions: payload.wound_care_instructions,
            emergency_contacts: Vec::new(),
            summary: payload.summary,
            generated_at: Utc::now(),
            safety_flags: flags,
            validation_warnings: notes,
        }
    }

    /// Replace placeholders with the real values they stood for. Runs over
    /// every patient-visible text field.
    fn rehydrate(&self, doc: &mut PersonalizedInstructions, map: &RedactionMap) {
        let fix = |s: &mut String| *s = map.rehydrate(s);
        fix(&mut doc.summary);
        for entry in &mut doc.medication_schedule {
            if let Some(special) = &mut entry.special_instructions {
                fix(special);
            }
        }
        for list in [
            &mut doc.lifestyle_recommendations,
            &mut doc.warning_signs,
            &mut doc.activity_guidelines,
            &mut doc.diet_recommendations,
        ] {
            for item in list.iter_mut() {
                fix(item);
            }
        }
        if let Some(wound) = &mut doc.wound_care_instructions {
            for item in wound.iter_mut() {
                fix(item);
            }
        }
        for reminder in &mut doc.follow_up_reminders {
            fix(&mut reminder.purpose);
        }
    }

    /// Emergency contacts come from structured registration data only, with
    /// emergency services always present as the final entry.
    fn emergency_contacts(&self, context: &ClinicalContext) -> Vec<EmergencyContact> {
        let mut contacts = Vec::new();
        if let Some(contact) = &context.patient.emergency_contact {
            contacts.push(contact.clone());
        }
        contacts.push(EmergencyContact {
            name: "Emergency Services".into(),
            relationship: "emergency".into(),
            phone: "911".into(),
            email: None,
        });
        contacts
    }
}
