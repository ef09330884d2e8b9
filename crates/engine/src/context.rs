//! Clinical context assembly — gathers patient, record, and notes into one
//! normalized, request-scoped context object.
//!
//! Read-only: the assembler never writes to storage. Record selection is
//! explicit — when no record id is given for a record-scoped operation, the
//! most recent record *with an associated discharge note* is chosen, and the
//! absence of any such record is a visible `IncompleteContext` failure,
//! never a silent fallback.

use std::sync::Arc;

use aftercare_core::error::{Error, Result};
use aftercare_core::patient::{AgeBand, Allergy, Patient};
use aftercare_core::record::{ComprehensiveHistory, DischargeNote, MedicalRecord};
use aftercare_core::store::ClinicalStore;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Everything the engine knows about one patient for one request.
///
/// Owned exclusively by the request that created it; never persisted.
/// Identifying fields still present here (name, contacts) exist only so the
/// redaction layer can build its placeholder mapping — nothing leaves the
/// process without passing through that mapping.
#[derive(Debug, Clone)]
pub struct ClinicalContext {
    pub patient: Patient,
    /// Coarse age band derived from date of birth; model-facing context
    /// never carries the raw birth date.
    pub age_band: AgeBand,
    /// The target medical record, when the operation is record-scoped.
    pub record: Option<MedicalRecord>,
    /// The discharge note attached to `record`.
    pub discharge_note: Option<DischargeNote>,
    /// Full history, present only in comprehensive (record-unscoped) mode.
    pub history: Option<ComprehensiveHistory>,
}

impl ClinicalContext {
    /// The version stamp of the clinical data this context was built from.
    /// A cached synthesis result is stale once storage reports a newer one.
    pub fn source_version(&self) -> DateTime<Utc> {
        let record_v = self.record.as_ref().map(|r| r.updated_at);
        let note_v = self.discharge_note.as_ref().map(|n| n.updated_at);
        match (record_v, note_v) {
            (Some(r), Some(n)) => r.max(n),
            (Some(r), None) => r,
            (None, Some(n)) => n,
            (None, None) => Utc::now(),
        }
    }

    /// Every medication name the patient is known to take: current
    /// medications plus medications at discharge.
    pub fn known_medication_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .patient
            .current_medications
            .iter()
            .map(|m| m.name.clone())
            .collect();
        if let Some(note) = &self.discharge_note {
            names.extend(note.medications_at_discharge.iter().map(|m| m.name.clone()));
        }
        if let Some(history) = &self.history {
            for note in &history.discharge_notes {
                names.extend(note.medications_at_discharge.iter().map(|m| m.name.clone()));
            }
        }
        names
    }

    /// Recorded allergies.
    pub fn allergies(&self) -> &[Allergy] {
        &self.patient.allergies
    }

    /// Names of the context sections that are actually populated. Used for
    /// source attribution and grounding.
    pub fn section_names(&self) -> Vec<&'static str> {
        let mut sections = vec!["demographics"];
        if !self.patient.medical_history.is_empty() {
            sections.push("medical_history");
        }
        if !self.patient.allergies.is_empty() {
            sections.push("allergies");
        }
        if !self.patient.current_medications.is_empty() {
            sections.push("current_medications");
        }
        if let Some(record) = &self.record {
            sections.push("medical_record");
            if !record.lab_results.is_empty() {
                sections.push("lab_results");
            }
            if !record.vital_signs.is_empty() {
                sections.push("vital_signs");
            }
        }
        if self.discharge_note.is_some() {
            sections.push("discharge_note");
        }
        if let Some(history) = &self.history {
            if !history.medical_records.is_empty() {
                sections.push("medical_record");
            }
            if !history.discharge_notes.is_empty() {
                sections.push("discharge_note");
            }
            if history.activities.iter().any(|a| a.is_clinical()) {
                sections.push("clinical_activities");
            }
            if !history.visits.is_empty() {
                sections.push("visits");
            }
        }
        sections.dedup();
        sections
    }
}

/// Assembles a [`ClinicalContext`] from the storage collaborator.
pub struct ContextAssembler {
    store: Arc<dyn ClinicalStore>,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn ClinicalStore>) -> Self {
        Self { store }
    }

    /// Assemble a record-scoped context.
    ///
    /// With `record_id = None`, selects the most recent record that has an
    /// associated discharge note. Fails `IncompleteContext` if the selected
    /// record has no discharge note (or no record qualifies).
    pub async fn assemble_for_record(
        &self,
        patient_id: &str,
        record_id: Option<i64>,
    ) -> Result<ClinicalContext> {
        let patient = self.store.get_patient(patient_id).await?;
        let notes = self.store.get_discharge_notes(patient_id).await?;

        let (record, note) = match record_id {
            Some(id) => {
                let record = self.store.get_medical_record(patient_id, id).await?;
                let note = notes
                    .into_iter()
                    .find(|n| n.medical_record_id == id)
                    .ok_or_else(|| {
                        Error::IncompleteContext(format!(
                            "medical record {id} for patient {patient_id} has no discharge note"
                        ))
                    })?;
                (record, note)
            }
            None => {
                let records = self.store.get_medical_records(patient_id).await?;
                // Records arrive most recent first; take the first with a note.
                let found = records.into_iter().find_map(|r| {
                    notes
                        .iter()
                        .find(|n| n.medical_record_id == r.id)
                        .cloned()
                        .map(|n| (r, n))
                });
                found.ok_or_else(|| {
                    Error::IncompleteContext(format!(
                        "patient {patient_id} has no medical record with a discharge note"
                    ))
                })?
            }
        };

        debug!(
            patient = %patient_id,
            record = record.id,
            "Assembled record-scoped clinical context"
        );

        Ok(ClinicalContext {
            age_band: AgeBand::from_date_of_birth(patient.date_of_birth, Utc::now()),
            patient,
            record: Some(record),
            discharge_note: Some(note),
            history: None,
        })
    }

    /// Assemble a comprehensive context from the patient's full history.
    /// Used by the enhanced Q&A path; does not require a discharge note.
    pub async fn assemble_comprehensive(&self, patient_id: &str) -> Result<ClinicalContext> {
        let history = self.store.get_comprehensive_history(patient_id).await?;
        let patient = history.patient.clone();

        // Surface the latest record/note pair when one exists so answers can
        // still reference the most recent stay.
        let record = history.medical_records.first().cloned();
        let note = record
            .as_ref()
            .and_then(|r| {
                history
                    .discharge_notes
                    .iter()
                    .find(|n| n.medical_record_id == r.id)
            })
            .cloned();

        debug!(
            patient = %patient_id,
            records = history.medical_records.len(),
            visits = history.visits.len(),
            "Assembled comprehensive clinical context"
        );

        Ok(ClinicalContext {
            age_band: AgeBand::from_date_of_birth(patient.date_of_birth, Utc::now()),
            patient,
            record,
            discharge_note: note,
            history: Some(history),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aftercare_core::patient::{Gender, Severity};
    use chrono::TimeZone;

    fn patient() -> Patient {
        Patient {
            patient_id: "P001".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            date_of_birth: Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap(),
            gender: Gender::Female,
            phone: None,
            email: None,
            emergency_contact: None,
            medical_history: vec!["hypertension".into()],
            allergies: vec![],
            current_medications: vec![],
        }
    }

    fn record(id: i64, updated: DateTime<Utc>) -> MedicalRecord {
        MedicalRecord {
            id,
            patient_id: "P001".into(),
            admission_date: updated,
            discharge_date: Some(updated),
            primary_diagnosis: "Pneumonia".into(),
            secondary_diagnoses: vec![],
            procedures_performed: vec![],
            treatment_summary: "Antibiotics".into(),
            physician_notes: None,
            nursing_notes: None,
            lab_results: vec![],
            vital_signs: vec![],
            severity_level: Severity::Moderate,
            updated_at: updated,
        }
    }

    fn note(record_id: i64, updated: DateTime<Utc>) -> DischargeNote {
        DischargeNote {
            id: record_id * 10,
            patient_id: "P001".into(),
            medical_record_id: record_id,
            discharge_summary: "Recovering well".into(),
            medications_at_discharge: vec![],
            follow_up_instructions: None,
            activity_restrictions: None,
            diet_instructions: None,
            warning_signs: None,
            discharge_physician: "Dr. Grace".into(),
            discharge_date: updated,
            updated_at: updated,
        }
    }

    #[test]
    fn source_version_is_newest_of_record_and_note() {
        let older = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let ctx = ClinicalContext {
            age_band: AgeBand::YoungAdult,
            patient: patient(),
            record: Some(record(1, older)),
            discharge_note: Some(note(1, newer)),
            history: None,
        };
        assert_eq!(ctx.source_version(), newer);
    }

    #[test]
    fn section_names_reflect_populated_fields() {
        let updated = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let ctx = ClinicalContext {
            age_band: AgeBand::YoungAdult,
            patient: patient(),
            record: Some(record(1, updated)),
            discharge_note: Some(note(1, updated)),
            history: None,
        };
        let sections = ctx.section_names();
        assert!(sections.contains(&"demographics"));
        assert!(sections.contains(&"medical_history"));
        assert!(sections.contains(&"medical_record"));
        assert!(sections.contains(&"discharge_note"));
        assert!(!sections.contains(&"allergies"));
        assert!(!sections.contains(&"lab_results"));
    }
}
