//! The engine facade wiring assembly, synthesis, Q&A, and the cache
//! together behind the operations callers actually use.

use std::sync::Arc;

use aftercare_config::AppConfig;
use aftercare_core::error::Result;
use aftercare_core::instructions::{GenerationKey, PersonalizedInstructions};
use aftercare_core::model::GenerativeModel;
use aftercare_core::qa::QAExchange;
use aftercare_core::store::ClinicalStore;
use tracing::instrument;

use crate::coalescer::GenerationCache;
use crate::context::ContextAssembler;
use crate::qa::QaEngine;
use crate::synthesizer::InstructionSynthesizer;

/// The discharge instructions engine.
///
/// Holds no per-request state; safe to share behind an `Arc` across
/// however many concurrent callers the host application has.
pub struct DischargeEngine {
    assembler: ContextAssembler,
    synthesizer: InstructionSynthesizer,
    qa: QaEngine,
    cache: GenerationCache,
    model: Arc<dyn GenerativeModel>,
}

impl DischargeEngine {
    pub fn new(
        store: Arc<dyn ClinicalStore>,
        model: Arc<dyn GenerativeModel>,
        config: AppConfig,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(store),
            synthesizer: InstructionSynthesizer::new(model.clone(), config.clone()),
            qa: QaEngine::new(model.clone(), config),
            cache: GenerationCache::new(),
            model,
        }
    }

    /// Generate (or serve from cache) personalized discharge instructions
    /// for one specific medical record.
    ///
    /// Concurrent calls for the same (patient, record) pair share a single
    /// model call. The cached document is regenerated automatically once
    /// the underlying record or discharge note has a newer version.
    #[instrument(skip(self), fields(patient = %patient_id, record = record_id))]
    pub async fn generate_instructions(
        &self,
        patient_id: &str,
        record_id: i64,
    ) -> Result<PersonalizedInstructions> {
        let context = self
            .assembler
            .assemble_for_record(patient_id, Some(record_id))
            .await?;
        let key = GenerationKey::new(patient_id, record_id);
        self.cache
            .get_or_generate(&key, context.source_version(), || {
                self.synthesizer.synthesize(&context)
            })
            .await
    }

    /// Like [`generate_instructions`](Self::generate_instructions) but for
    /// the patient's most recent record that has a discharge note.
    #[instrument(skip(self), fields(patient = %patient_id))]
    pub async fn generate_latest_instructions(
        &self,
        patient_id: &str,
    ) -> Result<PersonalizedInstructions> {
        let context = self.assembler.assemble_for_record(patient_id, None).await?;
        let record_id = context
            .record
            .as_ref()
            .map(|r| r.id)
            .unwrap_or_default();
        let key = GenerationKey::new(patient_id, record_id);
        self.cache
            .get_or_generate(&key, context.source_version(), || {
                self.synthesizer.synthesize(&context)
            })
            .await
    }

    /// Answer a follow-up question. With a record id the answer is grounded
    /// in that record's context; without one it is grounded in the
    /// patient's full history, which needs no discharge note to exist.
    #[instrument(skip(self, question), fields(patient = %patient_id))]
    pub async fn ask_question(
        &self,
        patient_id: &str,
        question: &str,
        record_id: Option<i64>,
    ) -> Result<QAExchange> {
        let context = match record_id {
            Some(id) => {
                self.assembler
                    .assemble_for_record(patient_id, Some(id))
                    .await?
            }
            None => self.assembler.assemble_comprehensive(patient_id).await?,
        };
        self.qa.answer(&context, question).await
    }

    /// Answer a question against the patient's full history: every record,
    /// note, visit, and clinical activity. Does not require a discharge
    /// note to exist.
    #[instrument(skip(self, question), fields(patient = %patient_id))]
    pub async fn ask_question_enhanced(
        &self,
        patient_id: &str,
        question: &str,
    ) -> Result<QAExchange> {
        let context = self.assembler.assemble_comprehensive(patient_id).await?;
        self.qa.answer(&context, question).await
    }

    /// Drop the cached document for one (patient, record) pair. Callers
    /// use this when they know the clinical data changed out of band.
    pub async fn invalidate_cached_instructions(&self, patient_id: &str, record_id: i64) {
        self.cache
            .invalidate(&GenerationKey::new(patient_id, record_id))
            .await;
    }

    /// Whether the model backend is reachable and configured.
    pub async fn model_available(&self) -> bool {
        self.model.health_check().await.unwrap_or(false)
    }
}
