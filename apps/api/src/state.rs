use std::sync::Arc;

use crate::analysis::extract::TextExtractor;
use crate::config::Config;
use crate::llm_client::ModelBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Model-call capability. Default: `OpenAiClient`; tests inject a scripted fake.
    pub model: Arc<dyn ModelBackend>,
    /// PDF text extraction. Default: `PdfTextExtractor`.
    pub extractor: Arc<dyn TextExtractor>,
    pub config: Config,
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        openai_api_key: "test-key".to_string(),
        openai_model: "gpt-5".to_string(),
        openai_base_url: "http://localhost:0/v1".to_string(),
        llm_timeout_secs: 5,
        port: 0,
        max_upload_bytes: 1024 * 1024,
        rust_log: "debug".to_string(),
    }
}
