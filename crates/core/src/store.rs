//! ClinicalStore trait — the read-only storage collaborator.
//!
//! The surrounding CRUD layer owns persistence; the engine only reads. All
//! methods return structured entities, never raw rows.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::patient::Patient;
use crate::record::{ComprehensiveHistory, DischargeNote, MedicalRecord};

/// Read-only access to patients, records, and notes.
#[async_trait]
pub trait ClinicalStore: Send + Sync {
    /// Fetch a patient by external patient id.
    async fn get_patient(&self, patient_id: &str) -> Result<Patient, StorageError>;

    /// All medical records for a patient, most recent admission first.
    async fn get_medical_records(
        &self,
        patient_id: &str,
    ) -> Result<Vec<MedicalRecord>, StorageError>;

    /// One medical record by id, scoped to the patient.
    async fn get_medical_record(
        &self,
        patient_id: &str,
        record_id: i64,
    ) -> Result<MedicalRecord, StorageError>;

    /// All discharge notes for a patient, most recent discharge first.
    async fn get_discharge_notes(
        &self,
        patient_id: &str,
    ) -> Result<Vec<DischargeNote>, StorageError>;

    /// The full visit/activity/timeline history for the comprehensive Q&A
    /// path.
    async fn get_comprehensive_history(
        &self,
        patient_id: &str,
    ) -> Result<ComprehensiveHistory, StorageError>;
}
