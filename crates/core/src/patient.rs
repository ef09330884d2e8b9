//! Patient demographics and clinical attributes.
//!
//! These mirror what the storage collaborator returns. Raw identifying
//! fields (name, phone, email) exist only on [`Patient`]; they never cross
//! the redaction boundary into a model-facing payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Patient gender as recorded at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

/// Clinical severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

/// Coarse age band used in model-facing context instead of an exact age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    Pediatric,
    YoungAdult,
    MiddleAged,
    Senior,
    Elderly,
    Unknown,
}

impl AgeBand {
    /// Derive the band from a date of birth, relative to `now`.
    pub fn from_date_of_birth(date_of_birth: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let days = (now - date_of_birth).num_days();
        if days < 0 {
            return AgeBand::Unknown;
        }
        let age = days / 365;
        match age {
            0..=17 => AgeBand::Pediatric,
            18..=34 => AgeBand::YoungAdult,
            35..=54 => AgeBand::MiddleAged,
            55..=74 => AgeBand::Senior,
            _ => AgeBand::Elderly,
        }
    }

    /// Label used when projecting context for the model.
    pub fn label(&self) -> &'static str {
        match self {
            AgeBand::Pediatric => "pediatric",
            AgeBand::YoungAdult => "young_adult",
            AgeBand::MiddleAged => "middle_aged",
            AgeBand::Senior => "senior",
            AgeBand::Elderly => "elderly",
            AgeBand::Unknown => "unknown",
        }
    }
}

/// A recorded allergy with its reaction and severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allergy {
    pub allergen: String,
    pub reaction: String,
    pub severity: Severity,
}

/// A medication the patient is taking or was prescribed at discharge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// An emergency contact from the patient's structured registration data.
///
/// Contact details surfaced in generated output are always reinserted from
/// this structured data, never taken from generated prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A single vital-signs reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalSigns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure_systolic: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure_diastolic: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// A single lab result with its reference range and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResult {
    pub test_name: String,
    pub value: String,
    pub unit: String,
    pub reference_range: String,
    /// "normal", "abnormal", or "critical".
    pub status: String,
    pub recorded_at: DateTime<Utc>,
}

/// A patient as returned by the storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: DateTime<Utc>,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub medical_history: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub current_medications: Vec<Medication>,
}

impl Patient {
    /// Full name as registered. Only valid on the caller's side of the
    /// redaction boundary.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
