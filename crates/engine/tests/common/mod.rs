//! Shared fixtures: an in-memory clinical store and a scripted model.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use aftercare_core::error::{ModelError, StorageError};
use aftercare_core::model::{GenerationRequest, GenerationResponse, GenerativeModel};
use aftercare_core::patient::{Allergy, EmergencyContact, Gender, Medication, Patient, Severity};
use aftercare_core::record::{
    ClinicalActivity, ComprehensiveHistory, DischargeNote, MedicalRecord, PatientVisit,
};
use aftercare_core::store::ClinicalStore;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

/// Route engine logs through the test harness; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory [`ClinicalStore`] seeded by the test.
#[derive(Default)]
pub struct InMemoryStore {
    patients: Mutex<HashMap<String, Patient>>,
    records: Mutex<Vec<MedicalRecord>>,
    notes: Mutex<Vec<DischargeNote>>,
    activities: Mutex<Vec<ClinicalActivity>>,
    visits: Mutex<Vec<PatientVisit>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_patient(&self, patient: Patient) {
        self.patients
            .lock()
            .unwrap()
            .insert(patient.patient_id.clone(), patient);
    }

    pub fn insert_record(&self, record: MedicalRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn insert_note(&self, note: DischargeNote) {
        self.notes.lock().unwrap().push(note);
    }

    #[allow(dead_code)]
    pub fn insert_activity(&self, activity: ClinicalActivity) {
        self.activities.lock().unwrap().push(activity);
    }

    #[allow(dead_code)]
    pub fn insert_visit(&self, visit: PatientVisit) {
        self.visits.lock().unwrap().push(visit);
    }

    /// Simulate an out-of-band edit bumping a record's version.
    #[allow(dead_code)]
    pub fn touch_record(&self, record_id: i64, updated_at: DateTime<Utc>) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == record_id) {
            record.updated_at = updated_at;
        }
    }
}

#[async_trait]
impl ClinicalStore for InMemoryStore {
    async fn get_patient(&self, patient_id: &str) -> Result<Patient, StorageError> {
        self.patients
            .lock()
            .unwrap()
            .get(patient_id)
            .cloned()
            .ok_or_else(|| StorageError::PatientNotFound(patient_id.to_string()))
    }

    async fn get_medical_records(
        &self,
        patient_id: &str,
    ) -> Result<Vec<MedicalRecord>, StorageError> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.admission_date.cmp(&a.admission_date));
        Ok(records)
    }

    async fn get_medical_record(
        &self,
        patient_id: &str,
        record_id: i64,
    ) -> Result<MedicalRecord, StorageError> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.patient_id == patient_id && r.id == record_id)
            .cloned()
            .ok_or_else(|| StorageError::RecordNotFound {
                patient_id: patient_id.to_string(),
                record_id,
            })
    }

    async fn get_discharge_notes(
        &self,
        patient_id: &str,
    ) -> Result<Vec<DischargeNote>, StorageError> {
        let mut notes: Vec<_> = self
            .notes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.patient_id == patient_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.discharge_date.cmp(&a.discharge_date));
        Ok(notes)
    }

    async fn get_comprehensive_history(
        &self,
        patient_id: &str,
    ) -> Result<ComprehensiveHistory, StorageError> {
        let patient = self.get_patient(patient_id).await?;
        Ok(ComprehensiveHistory {
            patient,
            medical_records: self.get_medical_records(patient_id).await?,
            discharge_notes: self.get_discharge_notes(patient_id).await?,
            activities: self
                .activities
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.patient_id == patient_id)
                .cloned()
                .collect(),
            visits: self
                .visits
                .lock()
                .unwrap()
                .iter()
                .filter(|v| v.patient_id == patient_id)
                .cloned()
                .collect(),
        })
    }
}

/// Returns scripted responses in order, recording every request. Panics
/// when the script runs dry, which catches unexpected extra model calls.
pub struct ScriptedModel {
    responses: Mutex<Vec<Result<String, ModelError>>>,
    calls: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Add per-call latency so concurrent callers genuinely overlap.
    #[allow(dead_code)]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ModelError> {
        self.calls.lock().unwrap().push(request);
        let next = {
            let mut responses = self.responses.lock().unwrap();
            assert!(!responses.is_empty(), "scripted model ran out of responses");
            responses.remove(0)
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        next.map(|text| GenerationResponse {
            text,
            model: "scripted".into(),
            usage: None,
        })
    }
}

pub fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
}

/// Maria Garcia, P001234: senior, penicillin allergy, on lisinopril.
pub fn maria() -> Patient {
    Patient {
        patient_id: "P001234".into(),
        first_name: "Maria".into(),
        last_name: "Garcia".into(),
        date_of_birth: Utc.with_ymd_and_hms(1958, 3, 14, 0, 0, 0).unwrap(),
        gender: Gender::Female,
        phone: Some("555-867-5309".into()),
        email: Some("maria.garcia@example.com".into()),
        emergency_contact: Some(EmergencyContact {
            name: "Luis Garcia".into(),
            relationship: "son".into(),
            phone: "555-123-4567".into(),
            email: None,
        }),
        medical_history: vec!["type 2 diabetes".into(), "hypertension".into()],
        allergies: vec![Allergy {
            allergen: "Penicillin".into(),
            reaction: "hives".into(),
            severity: Severity::Moderate,
        }],
        current_medications: vec![Medication {
            name: "Lisinopril".into(),
            dosage: "10mg".into(),
            frequency: "once daily".into(),
            route: "oral".into(),
            start_date: None,
            end_date: None,
            instructions: None,
        }],
    }
}

pub fn record(id: i64, updated: DateTime<Utc>) -> MedicalRecord {
    MedicalRecord {
        id,
        patient_id: "P001234".into(),
        admission_date: updated,
        discharge_date: Some(updated),
        primary_diagnosis: "Community-acquired pneumonia".into(),
        secondary_diagnoses: vec![],
        procedures_performed: vec![],
        treatment_summary: "Maria Garcia responded well to IV azithromycin.".into(),
        physician_notes: None,
        nursing_notes: None,
        lab_results: vec![],
        vital_signs: vec![],
        severity_level: Severity::Moderate,
        updated_at: updated,
    }
}

pub fn note(record_id: i64, updated: DateTime<Utc>) -> DischargeNote {
    DischargeNote {
        id: record_id * 10,
        patient_id: "P001234".into(),
        medical_record_id: record_id,
        discharge_summary:
            "Discharged home in stable condition. Her son Luis Garcia will assist with medications."
                .into(),
        medications_at_discharge: vec![Medication {
            name: "Azithromycin".into(),
            dosage: "250mg".into(),
            frequency: "once daily".into(),
            route: "oral".into(),
            start_date: None,
            end_date: None,
            instructions: Some("finish the full course".into()),
        }],
        follow_up_instructions: Some("See your primary care physician in 1-2 weeks.".into()),
        activity_restrictions: Some("No heavy lifting for one week.".into()),
        diet_instructions: None,
        warning_signs: Some("Return if fever exceeds 101F.".into()),
        discharge_physician: "Dr. Okafor".into(),
        discharge_date: updated,
        updated_at: updated,
    }
}

/// A schema-valid instructions document referencing only known medications.
pub fn good_instructions_json() -> String {
    serde_json::json!({
        "medication_schedule": [
            {"name": "Azithromycin", "dosage": "250mg", "timing": "every morning"},
            {"name": "Lisinopril", "dosage": "10mg", "timing": "every morning"}
        ],
        "lifestyle_recommendations": ["Drink plenty of fluids."],
        "follow_up_reminders": [
            {"kind": "Primary Care", "timeframe": "1-2 weeks", "purpose": "recovery check"}
        ],
        "warning_signs": ["Fever over 101F", "Worsening shortness of breath"],
        "activity_guidelines": ["Light walking only this week."],
        "diet_recommendations": [],
        "summary": "PATIENT_NAME, you are recovering well. Finish your antibiotics."
    })
    .to_string()
}

/// A document recommending amoxicillin, contraindicated for Maria.
pub fn contraindicated_instructions_json() -> String {
    serde_json::json!({
        "medication_schedule": [
            {"name": "Amoxicillin", "dosage": "500mg", "timing": "twice daily"}
        ],
        "warning_signs": ["Fever over 101F"],
        "summary": "Take the antibiotics as scheduled."
    })
    .to_string()
}

pub fn good_answer_json() -> String {
    serde_json::json!({
        "answer": "PATIENT_NAME, light walking is fine this week; avoid heavy lifting.",
        "confidence": 0.8,
        "sources": ["discharge_note", "medical_record"]
    })
    .to_string()
}
