//! The Aftercare engine — instruction synthesis and safety-constrained Q&A.
//!
//! The engine converts a patient's clinical context into a structured,
//! de-identified discharge instructions document, and answers ad-hoc
//! questions against that context with safety gating, confidence scoring,
//! and source attribution.
//!
//! Data flows through a fixed pipeline:
//!
//! 1. **Context assembly** — patient + record + notes into one
//!    request-scoped [`ClinicalContext`]
//! 2. **Redaction** — identifying fields become stable placeholders before
//!    anything reaches the model
//! 3. **Generation** — one structured call per operation, parsed strictly
//!    against the prompt/schema contract
//! 4. **Safety validation** — hallucination, contraindication, and scope
//!    checks; flags attach, blocks reject
//! 5. **Rehydration** — contact fields reinserted from structured data
//!
//! Expensive synthesis calls are deduplicated per (patient, record) key by
//! the [`coalescer::GenerationCache`]. There is no canned-answer fallback
//! path anywhere: a wrong or fabricated answer in a medical context is
//! worse than a visible failure.

pub mod coalescer;
pub mod context;
pub mod contract;
pub mod engine;
pub mod qa;
pub mod redaction;
pub mod safety;
pub mod synthesizer;

pub use coalescer::GenerationCache;
pub use context::{ClinicalContext, ContextAssembler};
pub use engine::DischargeEngine;
pub use qa::QaEngine;
pub use redaction::{RedactedContext, RedactionMap};
pub use safety::{SafetyValidator, ValidationStatus, Verdict};
pub use synthesizer::InstructionSynthesizer;
