//! GenerativeModel trait — the abstraction over the external text model.
//!
//! The engine treats the model as an opaque capability: one structured
//! request in, one raw text response out. It may fail or time out, and
//! identical input carries no guarantee of identical output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A single generation request built by the prompt/schema contract.
///
/// By the time a request reaches a model implementation it has already
/// crossed the redaction boundary: no raw patient identifiers appear in
/// either prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g. "meta-llama/llama-3.2-3b-instruct:free").
    pub model: String,
    /// System prompt: role, safety guidelines, required output schema.
    pub system_prompt: String,
    /// User prompt: the projected clinical context plus the task.
    pub user_prompt: String,
    /// Temperature (low for clinical output).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// Token usage reported by the model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response from the model. The raw text is parsed strictly by
/// the contract layer; this type makes no claim about its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The raw generated text.
    pub text: String,
    /// Which model actually responded (may differ from requested).
    pub model: String,
    pub usage: Option<ModelUsage>,
}

/// The generative model trait.
///
/// The engine calls `generate()` without knowing which backend is in use.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// A human-readable name for this backend (e.g. "openrouter").
    fn name(&self) -> &str;

    /// Send one request and get the complete raw response.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ModelError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ModelError> {
        Ok(true)
    }
}
