//! Timeout wrapper — puts a hard deadline on every generation call.
//!
//! Generation calls are the only operations in the engine that may suspend
//! for non-trivial time; a call that outlives its deadline becomes
//! `ModelError::Timeout`, which the engine surfaces as `ServiceUnavailable`
//! without any silent retry.

use async_trait::async_trait;
use aftercare_core::error::ModelError;
use aftercare_core::model::{GenerationRequest, GenerationResponse, GenerativeModel};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Wraps a model backend with a per-call timeout.
pub struct TimeoutModel {
    inner: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

impl TimeoutModel {
    pub fn new(inner: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl GenerativeModel for TimeoutModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ModelError> {
        match tokio::time::timeout(self.timeout, self.inner.generate(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    backend = %self.inner.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Generation call timed out"
                );
                Err(ModelError::Timeout(format!(
                    "Backend '{}' timed out after {}s",
                    self.inner.name(),
                    self.timeout.as_secs()
                )))
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ModelError> {
        match tokio::time::timeout(self.timeout, self.inner.health_check()).await {
            Ok(result) => result,
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A backend that never answers.
    struct HangingModel;

    #[async_trait]
    impl GenerativeModel for HangingModel {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> std::result::Result<GenerationResponse, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    /// A backend that answers immediately.
    struct InstantModel;

    #[async_trait]
    impl GenerativeModel for InstantModel {
        fn name(&self) -> &str {
            "instant"
        }

        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> std::result::Result<GenerationResponse, ModelError> {
            Ok(GenerationResponse {
                text: "{}".into(),
                model: "instant".into(),
                usage: None,
            })
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "m".into(),
            system_prompt: "s".into(),
            user_prompt: "u".into(),
            temperature: 0.2,
            max_tokens: 10,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let model = TimeoutModel::new(Arc::new(HangingModel), Duration::from_secs(5));
        let err = model.generate(request()).await.unwrap_err();
        assert!(matches!(err, ModelError::Timeout(_)));
    }

    #[tokio::test]
    async fn fast_backend_passes_through() {
        let model = TimeoutModel::new(Arc::new(InstantModel), Duration::from_secs(5));
        let resp = model.generate(request()).await.unwrap();
        assert_eq!(resp.model, "instant");
    }
}
