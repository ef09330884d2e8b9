//! Generative model backends for Aftercare.
//!
//! All backends implement the `aftercare_core::GenerativeModel` trait.
//! The engine is wired with one backend, usually wrapped in
//! [`TimeoutModel`] so every call carries a hard deadline.

pub mod openai_compat;
pub mod timeout;

pub use openai_compat::OpenAiCompatModel;
pub use timeout::TimeoutModel;

use aftercare_config::ModelConfig;
use aftercare_core::GenerativeModel;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured model backend with its timeout wrapper.
///
/// A missing API key still yields a model object; every call on it fails
/// with `NotConfigured`, which the engine surfaces as `ServiceUnavailable`.
pub fn from_config(config: &ModelConfig) -> Arc<dyn GenerativeModel> {
    let inner: Arc<dyn GenerativeModel> = match &config.api_key {
        Some(key) => Arc::new(OpenAiCompatModel::new(
            "openrouter",
            config.base_url.clone(),
            key.clone(),
        )),
        None => Arc::new(openai_compat::UnconfiguredModel),
    };
    Arc::new(TimeoutModel::new(
        inner,
        Duration::from_secs(config.timeout_secs),
    ))
}
