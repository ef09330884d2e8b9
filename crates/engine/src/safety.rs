//! Post-generation safety validation.
//!
//! Checks run in a fixed order against the assembled context, never against
//! model output alone. Two outcomes: *flags* attach to the result and travel
//! with it; *blocks* reject the generation outright (a contraindication is
//! never delivered, not even annotated).

use aftercare_config::SafetyConfig;
use aftercare_core::patient::{Allergy, Severity};
use aftercare_core::qa::SafetyFlag;
use tracing::warn;

use crate::context::ClinicalContext;
use crate::contract::InstructionsPayload;

/// Outcome class of a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Pass,
    /// Deliver, with safety flags attached.
    Flagged,
    /// Do not deliver. The caller may retry once with reinforcement.
    Blocked,
}

/// The full result of validating one generation.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub status: ValidationStatus,
    pub flags: Vec<SafetyFlag>,
    /// Human-readable detail per finding, for logs and validation warnings.
    pub notes: Vec<String>,
}

impl Verdict {
    fn pass() -> Self {
        Self {
            status: ValidationStatus::Pass,
            flags: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.status == ValidationStatus::Blocked
    }

    fn flag(&mut self, flag: SafetyFlag, note: String) {
        if self.status == ValidationStatus::Pass {
            self.status = ValidationStatus::Flagged;
        }
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self.notes.push(note);
    }

    fn block(&mut self, flag: SafetyFlag, note: String) {
        self.status = ValidationStatus::Blocked;
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self.notes.push(note);
    }
}

/// Known cross-reactivity classes. An allergy to any member is treated as an
/// allergy to the whole class.
const DRUG_CLASSES: &[&[&str]] = &[
    &[
        "penicillin",
        "amoxicillin",
        "ampicillin",
        "augmentin",
        "amoxicillin-clavulanate",
    ],
    &[
        "sulfa",
        "sulfonamide",
        "sulfamethoxazole",
        "sulfasalazine",
        "bactrim",
        "septra",
    ],
    &["nsaid", "ibuprofen", "naproxen", "ketorolac", "aspirin"],
];

/// Verbs that turn a mention into a recommendation. A bare mention of an
/// allergen ("you are allergic to penicillin") is not advice.
const RECOMMENDATION_VERBS: &[&str] = &[
    "take", "taking", "use", "using", "start", "starting", "try", "recommend", "prescrib",
];

/// Validates generated documents and answers against the clinical context.
pub struct SafetyValidator {
    known_medications: Vec<String>,
    allergies: Vec<Allergy>,
    record_severity: Option<Severity>,
    warning_severity: Option<Severity>,
}

impl SafetyValidator {
    pub fn for_context(context: &ClinicalContext, config: &SafetyConfig) -> Self {
        Self {
            known_medications: context
                .known_medication_names()
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
            allergies: context.allergies().to_vec(),
            record_severity: context.record.as_ref().map(|r| r.severity_level),
            warning_severity: config.warning_severity(),
        }
    }

    /// Validate a synthesized instructions document. Checks run in order:
    /// hallucinated medications (flag), allergy contradictions (block),
    /// missing warning signs for severe cases (flag).
    pub fn validate_instructions(&self, payload: &InstructionsPayload) -> Verdict {
        let mut verdict = Verdict::pass();

        for entry in &payload.medication_schedule {
            let name = entry.name.trim();
            if name.is_empty() {
                continue;
            }
            if !self.is_known_medication(name) {
                verdict.flag(
                    SafetyFlag::PossibleHallucination,
                    format!("medication '{name}' does not appear in the patient's history"),
                );
            }
        }

        for entry in &payload.medication_schedule {
            if let Some(allergen) = self.contraindicated_by(entry.name.trim()) {
                verdict.block(
                    SafetyFlag::ContraindicatedAdvice,
                    format!(
                        "schedule includes '{}' but the patient has a recorded {} allergy",
                        entry.name.trim(),
                        allergen
                    ),
                );
            }
        }
        // Free text can also recommend an allergen ("take ibuprofen for pain").
        for text in free_text_fields(payload) {
            if let Some((term, allergen)) = self.recommended_allergen(text) {
                verdict.block(
                    SafetyFlag::ContraindicatedAdvice,
                    format!("text recommends '{term}' against a recorded {allergen} allergy"),
                );
            }
        }

        if payload.warning_signs.is_empty()
            && let (Some(severity), Some(threshold)) = (self.record_severity, self.warning_severity)
            && severity >= threshold
        {
            verdict.flag(
                SafetyFlag::MissingDisclaimer,
                format!("warning signs are empty for a {severity:?}-severity case"),
            );
        }

        if verdict.status != ValidationStatus::Pass {
            warn!(
                status = ?verdict.status,
                findings = verdict.notes.len(),
                "Instructions document failed safety checks"
            );
        }
        verdict
    }

    /// Validate a Q&A answer. Recommending an allergen (or a same-class
    /// medication) blocks, same as for documents. Scope and confidence
    /// findings are the Q&A engine's concern, not this validator's.
    pub fn validate_answer(&self, answer: &str) -> Verdict {
        let mut verdict = Verdict::pass();

        if let Some((term, allergen)) = self.recommended_allergen(answer) {
            verdict.block(
                SafetyFlag::ContraindicatedAdvice,
                format!("answer recommends '{term}' against a recorded {allergen} allergy"),
            );
        }

        if verdict.status != ValidationStatus::Pass {
            warn!(findings = verdict.notes.len(), "Answer failed safety checks");
        }
        verdict
    }

    fn is_known_medication(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.known_medications
            .iter()
            .any(|known| known.contains(&lower) || lower.contains(known.as_str()))
    }

    /// The recorded allergen contradicted by taking `medication`, if any.
    fn contraindicated_by(&self, medication: &str) -> Option<&str> {
        if medication.is_empty() {
            return None;
        }
        let med = medication.to_lowercase();
        self.allergies
            .iter()
            .find(|a| allergen_matches(&a.allergen.to_lowercase(), &med))
            .map(|a| a.allergen.as_str())
    }

    /// Scan free text for a recommendation of any contraindicated term:
    /// the allergen itself or any same-class medication, preceded within a
    /// short window by a recommendation verb.
    fn recommended_allergen(&self, text: &str) -> Option<(String, &str)> {
        let lower = text.to_lowercase();
        for allergy in &self.allergies {
            let allergen = allergy.allergen.to_lowercase();
            let mut terms: Vec<&str> = vec![allergen.as_str()];
            if let Some(class) = DRUG_CLASSES
                .iter()
                .find(|class| class.iter().any(|m| allergen.contains(m)))
            {
                terms.extend(class.iter().copied());
            }
            for term in terms {
                // Every occurrence: a benign first mention must not shadow
                // a recommendation later in the text.
                for (pos, _) in lower.match_indices(term) {
                    if recommendation_precedes(&lower, pos) {
                        return Some((term.to_string(), allergy.allergen.as_str()));
                    }
                }
            }
        }
        None
    }
}

fn allergen_matches(allergen: &str, medication: &str) -> bool {
    if medication.contains(allergen) || allergen.contains(medication) {
        return true;
    }
    DRUG_CLASSES.iter().any(|class| {
        class.iter().any(|m| allergen.contains(m)) && class.iter().any(|m| medication.contains(m))
    })
}

/// True when a recommendation verb appears in the 40 characters before `pos`.
fn recommendation_precedes(lower: &str, pos: usize) -> bool {
    let start = pos.saturating_sub(40);
    // Stay on a char boundary after the subtraction.
    let start = (start..=pos).find(|i| lower.is_char_boundary(*i)).unwrap_or(pos);
    let window = &lower[start..pos];
    RECOMMENDATION_VERBS.iter().any(|verb| window.contains(verb))
}

fn free_text_fields(payload: &InstructionsPayload) -> impl Iterator<Item = &str> {
    payload
        .lifestyle_recommendations
        .iter()
        .chain(payload.activity_guidelines.iter())
        .chain(payload.diet_recommendations.iter())
        .chain(payload.warning_signs.iter())
        .chain(payload.wound_care_instructions.iter().flatten())
        .map(String::as_str)
        .chain(std::iter::once(payload.summary.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aftercare_core::instructions::MedicationScheduleEntry;
    use aftercare_core::patient::{Gender, Medication, Patient};
    use chrono::{TimeZone, Utc};

    fn context_with(allergen: &str, meds: &[&str]) -> ClinicalContext {
        ClinicalContext {
            age_band: aftercare_core::patient::AgeBand::MiddleAged,
            patient: Patient {
                patient_id: "P001234".into(),
                first_name: "Maria".into(),
                last_name: "Garcia".into(),
                date_of_birth: Utc.with_ymd_and_hms(1970, 5, 1, 0, 0, 0).unwrap(),
                gender: Gender::Female,
                phone: None,
                email: None,
                emergency_contact: None,
                medical_history: vec![],
                allergies: vec![Allergy {
                    allergen: allergen.into(),
                    reaction: "rash".into(),
                    severity: Severity::Moderate,
                }],
                current_medications: meds
                    .iter()
                    .map(|m| Medication {
                        name: (*m).into(),
                        dosage: "10mg".into(),
                        frequency: "daily".into(),
                        route: "oral".into(),
                        start_date: None,
                        end_date: None,
                        instructions: None,
                    })
                    .collect(),
            },
            record: None,
            discharge_note: None,
            history: None,
        }
    }

    fn validator(allergen: &str, meds: &[&str]) -> SafetyValidator {
        SafetyValidator::for_context(&context_with(allergen, meds), &SafetyConfig::default())
    }

    fn payload_with_med(name: &str) -> InstructionsPayload {
        InstructionsPayload {
            medication_schedule: vec![MedicationScheduleEntry {
                name: name.into(),
                dosage: "500mg".into(),
                timing: "twice daily".into(),
                special_instructions: None,
            }],
            lifestyle_recommendations: vec![],
            follow_up_reminders: vec![],
            warning_signs: vec!["fever over 101F".into()],
            activity_guidelines: vec![],
            diet_recommendations: vec![],
            wound_care_instructions: None,
            summary: "Rest and recover.".into(),
        }
    }

    #[test]
    fn same_class_allergen_blocks() {
        // Penicillin allergy must block amoxicillin even though the names differ.
        let v = validator("Penicillin", &["Amoxicillin"]);
        let verdict = v.validate_instructions(&payload_with_med("Amoxicillin"));
        assert!(verdict.is_blocked());
        assert!(verdict.flags.contains(&SafetyFlag::ContraindicatedAdvice));
    }

    #[test]
    fn unknown_medication_flags_but_delivers() {
        let v = validator("Penicillin", &["Lisinopril"]);
        let verdict = v.validate_instructions(&payload_with_med("Metoprolol"));
        assert_eq!(verdict.status, ValidationStatus::Flagged);
        assert!(verdict.flags.contains(&SafetyFlag::PossibleHallucination));
    }

    #[test]
    fn known_medication_passes() {
        let v = validator("Sulfa", &["Lisinopril"]);
        let verdict = v.validate_instructions(&payload_with_med("Lisinopril"));
        assert_eq!(verdict.status, ValidationStatus::Pass);
    }

    #[test]
    fn free_text_recommendation_of_allergen_blocks() {
        let v = validator("Ibuprofen", &["Acetaminophen"]);
        let mut payload = payload_with_med("Acetaminophen");
        payload.lifestyle_recommendations = vec!["Take ibuprofen as needed for pain.".into()];
        assert!(v.validate_instructions(&payload).is_blocked());
    }

    #[test]
    fn bare_allergen_mention_does_not_block_answer() {
        let v = validator("Penicillin", &["Lisinopril"]);
        let verdict = v.validate_answer("You are allergic to penicillin, so avoid it.");
        assert_eq!(verdict.status, ValidationStatus::Pass);
    }

    #[test]
    fn later_occurrence_recommendation_still_blocks() {
        let v = validator("Penicillin", &["Lisinopril"]);
        let verdict = v.validate_answer(
            "Amoxicillin was mentioned in your notes. For the sore throat \
             you should take amoxicillin twice a day.",
        );
        assert!(verdict.is_blocked());
        assert!(verdict.flags.contains(&SafetyFlag::ContraindicatedAdvice));
    }

    #[test]
    fn answer_recommending_class_member_blocks() {
        let v = validator("Penicillin", &["Lisinopril"]);
        let verdict = v.validate_answer("You could start amoxicillin for the infection.");
        assert!(verdict.is_blocked());
    }

    #[test]
    fn empty_warning_signs_flag_for_severe_record() {
        let mut ctx = context_with("Sulfa", &["Lisinopril"]);
        let updated = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        ctx.record = Some(aftercare_core::record::MedicalRecord {
            id: 1,
            patient_id: "P001234".into(),
            admission_date: updated,
            discharge_date: Some(updated),
            primary_diagnosis: "Sepsis".into(),
            secondary_diagnoses: vec![],
            procedures_performed: vec![],
            treatment_summary: "IV antibiotics".into(),
            physician_notes: None,
            nursing_notes: None,
            lab_results: vec![],
            vital_signs: vec![],
            severity_level: Severity::High,
            updated_at: updated,
        });
        let v = SafetyValidator::for_context(&ctx, &SafetyConfig::default());

        let mut payload = payload_with_med("Lisinopril");
        payload.warning_signs.clear();
        let verdict = v.validate_instructions(&payload);
        assert_eq!(verdict.status, ValidationStatus::Flagged);
        assert!(verdict.flags.contains(&SafetyFlag::MissingDisclaimer));
    }

    #[test]
    fn warning_signs_not_required_for_low_severity() {
        let v = validator("Sulfa", &["Lisinopril"]);
        let mut payload = payload_with_med("Lisinopril");
        payload.warning_signs.clear();
        // No record at all: severity unknown, no disclaimer requirement.
        assert_eq!(v.validate_instructions(&payload).status, ValidationStatus::Pass);
    }
}
