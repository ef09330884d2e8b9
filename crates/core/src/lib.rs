//! # Aftercare Core
//!
//! Domain types, traits, and error definitions for the Aftercare discharge
//! instruction engine. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators — clinical storage and the generative
//! model — are defined as traits here. Implementations live in their
//! respective crates. This enables:
//! - Swapping the model backend via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod instructions;
pub mod model;
pub mod patient;
pub mod qa;
pub mod record;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ModelError, Result, StorageError};
pub use instructions::{
    FollowUpReminder, GenerationKey, MedicationScheduleEntry, PersonalizedInstructions,
};
pub use model::{GenerationRequest, GenerationResponse, GenerativeModel, ModelUsage};
pub use patient::{
    AgeBand, Allergy, EmergencyContact, Gender, LabResult, Medication, Patient, Severity,
    VitalSigns,
};
pub use qa::{QAExchange, SafetyFlag};
pub use record::{
    ClinicalActivity, ComprehensiveHistory, DischargeNote, MedicalRecord, PatientVisit,
};
pub use store::ClinicalStore;
