//! The synthesis output document and its cache key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patient::EmergencyContact;
use crate::qa::SafetyFlag;

/// Identifies one synthesis job: a (patient, medical record) pair.
///
/// Used for cache lookup and in-flight coalescing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationKey {
    pub patient_id: String,
    pub record_id: i64,
}

impl GenerationKey {
    pub fn new(patient_id: impl Into<String>, record_id: i64) -> Self {
        Self {
            patient_id: patient_id.into(),
            record_id,
        }
    }
}

impl std::fmt::Display for GenerationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.patient_id, self.record_id)
    }
}

/// One medication entry in the generated schedule.
///
/// A valid entry carries at least one of name, dosage, or timing; entries
/// missing all three are dropped during repair with a recorded warning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationScheduleEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub timing: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl MedicationScheduleEntry {
    /// True when name, dosage, and timing are all absent.
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty() && self.dosage.trim().is_empty() && self.timing.trim().is_empty()
    }
}

/// One follow-up appointment or reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpReminder {
    /// Appointment kind, e.g. "Primary Care", "Cardiology".
    #[serde(default)]
    pub kind: String,
    /// Human timeframe, e.g. "1-2 weeks".
    #[serde(default)]
    pub timeframe: String,
    #[serde(default)]
    pub purpose: String,
}

/// The full personalized discharge instructions document.
///
/// Every list field is always present — possibly empty, never null. List
/// order is whatever the model produced; the engine never truncates
/// (truncation for display is a UI concern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizedInstructions {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wound_care_instructions: Option<Vec<String>>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
    pub summary: String,
    /// When this document was generated.
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
    /// Non-blocking safety findings attached during validation, e.g. a
    /// medication the patient's history does not mention. Structured
    /// counterparts of the prose in `validation_warnings`, for callers
    /// that dispatch on kind.
    #[serde(default)]
    pub safety_flags: Vec<SafetyFlag>,
    /// Non-fatal issues recorded while repairing the document (e.g. a
    /// dropped empty medication entry). Never silently discarded.
    #[serde(default)]
    pub validation_warnings: Vec<String>,
}
