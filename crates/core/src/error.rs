//! Error types for the Aftercare domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The top-level [`Error`]
//! is the exact failure taxonomy the engine exposes to callers: every variant
//! is a distinct, recognizable kind so the UI layer can distinguish "try
//! again" from "this patient has no data yet" from "the AI service is down".
//!
//! Everything is `Clone` so a single in-flight generation outcome can be
//! fanned out to every coalesced caller.

use thiserror::Error;

/// The top-level error type for all engine operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The requested patient or medical record does not exist. Client error,
    /// never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record-scoped operation was requested but no usable medical record
    /// or discharge note exists to synthesize from. Client error.
    #[error("Incomplete clinical context: {0}")]
    IncompleteContext(String),

    /// Empty or malformed question input. Rejected before any model call.
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// Model output failed schema parsing. Retried once internally with a
    /// corrective instruction; surfaced as [`Error::GenerationFailed`] if the
    /// retry also fails.
    #[error("Malformed generation: {0}")]
    MalformedGeneration(String),

    /// The model could not produce a structurally valid document after the
    /// one permitted corrective retry.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Generated content failed a blocking safety check after the one
    /// permitted reinforced retry. Surfaced, never silently weakened.
    #[error("Unsafe generation blocked: {0}")]
    UnsafeGenerationBlocked(String),

    /// The model is unreachable, misconfigured, or timed out. Callers should
    /// present "AI service unavailable" rather than a generic failure.
    #[error("AI service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Anything that should never happen in normal operation.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator boundary errors ---

/// Errors from the read-only clinical storage collaborator.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Patient not found: {0}")]
    PatientNotFound(String),

    #[error("Medical record {record_id} not found for patient {patient_id}")]
    RecordNotFound { patient_id: String, record_id: i64 },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors from the generative model collaborator.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by model provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::PatientNotFound(id) => Error::NotFound(format!("patient {id}")),
            StorageError::RecordNotFound {
                patient_id,
                record_id,
            } => Error::NotFound(format!("medical record {record_id} for patient {patient_id}")),
            StorageError::Backend(msg) => Error::Internal(format!("storage backend: {msg}")),
        }
    }
}

impl From<ModelError> for Error {
    // Every model-side failure is a service-availability condition from the
    // caller's point of view: there is no canned-answer fallback path.
    fn from(err: ModelError) -> Self {
        Error::ServiceUnavailable(err.to_string())
    }
}
