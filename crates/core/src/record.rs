//! Medical records, discharge notes, and the comprehensive history used by
//! the enhanced Q&A path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patient::{LabResult, Medication, Patient, Severity, VitalSigns};

/// One hospital admission's clinical record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: i64,
    pub patient_id: String,
    pub admission_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_date: Option<DateTime<Utc>>,
    pub primary_diagnosis: String,
    #[serde(default)]
    pub secondary_diagnoses: Vec<String>,
    #[serde(default)]
    pub procedures_performed: Vec<String>,
    pub treatment_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physician_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nursing_notes: Option<String>,
    #[serde(default)]
    pub lab_results: Vec<LabResult>,
    #[serde(default)]
    pub vital_signs: Vec<VitalSigns>,
    pub severity_level: Severity,
    /// Last modification time. Drives cache invalidation: a cached
    /// instructions document is stale once this moves past its build time.
    pub updated_at: DateTime<Utc>,
}

/// The discharge note attached to a medical record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeNote {
    pub id: i64,
    pub patient_id: String,
    pub medical_record_id: i64,
    pub discharge_summary: String,
    #[serde(default)]
    pub medications_at_discharge: Vec<Medication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_restrictions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_signs: Option<String>,
    pub discharge_physician: String,
    pub discharge_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in the patient's clinical audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalActivity {
    pub id: i64,
    pub patient_id: String,
    /// Activity kind: "medication_added", "medication_removed",
    /// "diagnosis_updated", "procedure_performed", "admission", ...
    pub activity_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl ClinicalActivity {
    /// Whether this activity kind is clinically relevant enough to project
    /// into model-facing context. Administrative events are excluded.
    pub fn is_clinical(&self) -> bool {
        matches!(
            self.activity_type.as_str(),
            "medication_added"
                | "medication_removed"
                | "diagnosis_updated"
                | "procedure_performed"
        )
    }
}

/// One visit or stay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientVisit {
    pub id: i64,
    pub patient_id: String,
    pub visit_number: String,
    pub admission_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_date: Option<DateTime<Utc>>,
    /// "emergency", "scheduled", "follow_up".
    pub visit_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// "active", "discharged", "transferred".
    pub status: String,
}

/// Everything the storage collaborator knows about one patient, used by the
/// comprehensive (record-unscoped) Q&A path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveHistory {
    pub patient: Patient,
    pub medical_records: Vec<MedicalRecord>,
    pub discharge_notes: Vec<DischargeNote>,
    #[serde(default)]
    pub activities: Vec<ClinicalActivity>,
    #[serde(default)]
    pub visits: Vec<PatientVisit>,
}
