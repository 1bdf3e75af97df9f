//! Per-file analysis pipeline.
//!
//! Flow: extract text → clean → build prompt → model strategy chain →
//!       parse JSON → normalize → finalize with provenance.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::extract::{clean_extracted_text, TextExtractor};
use crate::analysis::models::{AnalysisResult, Provenance};
use crate::analysis::normalizer::{finalize, normalize, parse_model_json};
use crate::analysis::prompts::{build_analysis_prompt, ANALYSIS_SCHEMA_NAME};
use crate::analysis::schema::{to_json_schema, ANALYSIS_PAYLOAD};
use crate::errors::AppError;
use crate::llm_client::prompts::{SCREENER_JSON_ONLY_SYSTEM, SCREENER_SYSTEM};
use crate::llm_client::{CallStrategy, ModelBackend, ModelRequest};

/// A PDF received in the multipart body, already checked for content type.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// The first strategy output that parsed as JSON.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub strategy: CallStrategy,
    pub value: Value,
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy chain
// ────────────────────────────────────────────────────────────────────────────

enum CallState {
    Attempting(usize),
    Success(ModelOutput),
    Exhausted,
}

fn system_prompt_for(strategy: CallStrategy) -> &'static str {
    match strategy {
        CallStrategy::FunctionCall | CallStrategy::JsonSchema => SCREENER_SYSTEM,
        CallStrategy::PlainText => SCREENER_JSON_ONLY_SYSTEM,
    }
}

/// Runs the strategies in `CallStrategy::ORDER`; the first output that parses as JSON wins.
///
/// A strategy fails when the backend errors, returns nothing, or returns text
/// that is not JSON. Exhaustion is `EmptyModelOutput` if no strategy produced
/// any text, otherwise `InvalidModelOutput` with the last parse error.
pub async fn generate_analysis_json(
    model: &dyn ModelBackend,
    prompt: &str,
) -> Result<ModelOutput, AppError> {
    let schema = to_json_schema(&ANALYSIS_PAYLOAD);
    let mut last_parse_error: Option<String> = None;
    let mut state = CallState::Attempting(0);

    loop {
        state = match state {
            CallState::Attempting(i) => match CallStrategy::ORDER.get(i) {
                None => CallState::Exhausted,
                Some(&strategy) => {
                    let request = ModelRequest {
                        strategy,
                        system: system_prompt_for(strategy),
                        prompt,
                        schema_name: ANALYSIS_SCHEMA_NAME,
                        schema: &schema,
                    };
                    match model.complete(request).await {
                        Ok(text) if text.trim().is_empty() => {
                            warn!("Strategy {} returned empty output", strategy.as_str());
                            CallState::Attempting(i + 1)
                        }
                        Ok(text) => match parse_model_json(&text) {
                            Ok(value) => CallState::Success(ModelOutput { strategy, value }),
                            Err(e) => {
                                warn!(
                                    "Strategy {} returned unparsable output: {e}",
                                    strategy.as_str()
                                );
                                last_parse_error = Some(e.to_string());
                                CallState::Attempting(i + 1)
                            }
                        },
                        Err(e) => {
                            warn!("Strategy {} failed: {e}", strategy.as_str());
                            CallState::Attempting(i + 1)
                        }
                    }
                }
            },
            CallState::Success(output) => return Ok(output),
            CallState::Exhausted => {
                return Err(match last_parse_error {
                    Some(detail) => AppError::InvalidModelOutput(detail),
                    None => AppError::EmptyModelOutput,
                })
            }
        };
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-file pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Analyzes one uploaded PDF end to end.
pub async fn analyze_upload(
    model: &dyn ModelBackend,
    extractor: &dyn TextExtractor,
    upload: UploadedFile,
    upload_date: DateTime<Utc>,
) -> Result<AnalysisResult, AppError> {
    let extracted = extractor
        .extract_text(&upload.bytes)
        .await
        .map_err(|e| AppError::Extraction {
            file_name: upload.file_name.clone(),
            reason: format!("{e:#}"),
        })?;
    let raw_text = clean_extracted_text(&extracted);

    let prompt = build_analysis_prompt(&raw_text);
    let output = generate_analysis_json(model, &prompt).await?;
    let normalized = normalize(&output.value)?;

    info!(
        "Analyzed \"{}\" ({} bytes): strategy={}, path={}",
        upload.file_name,
        upload.bytes.len(),
        output.strategy.as_str(),
        normalized.path.as_str()
    );

    Ok(finalize(
        normalized.analysis,
        Provenance {
            id: Uuid::new_v4(),
            file_size: upload.bytes.len() as u64,
            file_name: upload.file_name,
            upload_date,
            analysis_date: Utc::now(),
            raw_text,
        },
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::llm_client::LlmError;

    /// Scripted backend: one canned reply per strategy, recording the call order.
    pub(crate) struct FakeModel {
        replies: HashMap<CallStrategy, Result<String, u16>>,
        pub(crate) calls: Mutex<Vec<CallStrategy>>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl FakeModel {
        pub(crate) fn new() -> Self {
            Self {
                replies: HashMap::new(),
                calls: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn reply(mut self, strategy: CallStrategy, text: &str) -> Self {
            self.replies.insert(strategy, Ok(text.to_string()));
            self
        }

        pub(crate) fn fail(mut self, strategy: CallStrategy, status: u16) -> Self {
            self.replies.insert(strategy, Err(status));
            self
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelBackend for FakeModel {
        async fn complete(&self, request: ModelRequest<'_>) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(request.strategy);
            self.prompts.lock().unwrap().push(request.prompt.to_string());
            match self.replies.get(&request.strategy) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(status)) => Err(LlmError::Api {
                    status: *status,
                    message: "scripted failure".to_string(),
                }),
                None => Err(LlmError::EmptyContent),
            }
        }
    }

    pub(crate) struct FakeExtractor(pub(crate) Result<String, String>);

    #[async_trait]
    impl TextExtractor for FakeExtractor {
        async fn extract_text(&self, _bytes: &[u8]) -> anyhow::Result<String> {
            self.0.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    pub(crate) fn valid_analysis_json() -> String {
        json!({
            "candidateName": "Grace Hopper",
            "overallScore": 93,
            "scores": { "technical": 95, "experience": 92, "communication": 90, "cultureFit": 88 },
            "summary": "Compiler pioneer.",
            "strengths": ["Compilers"],
            "weaknesses": [],
            "recommendations": ["Hire"],
            "skills": ["COBOL"],
            "experience": { "years": 40, "positions": ["Rear Admiral"], "companies": ["US Navy"] },
            "education": [{ "degree": "PhD", "institution": "Yale", "year": "1934" }]
        })
        .to_string()
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4 fake"),
        }
    }

    #[tokio::test]
    async fn test_first_strategy_wins() {
        let model = FakeModel::new()
            .reply(CallStrategy::FunctionCall, &valid_analysis_json())
            .reply(CallStrategy::PlainText, "{}");
        let output = generate_analysis_json(&model, "prompt").await.unwrap();
        assert_eq!(output.strategy, CallStrategy::FunctionCall);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failures_fall_through_in_order() {
        let model = FakeModel::new()
            .fail(CallStrategy::FunctionCall, 400)
            .reply(CallStrategy::JsonSchema, "   ")
            .reply(CallStrategy::PlainText, &valid_analysis_json());
        let output = generate_analysis_json(&model, "prompt").await.unwrap();
        assert_eq!(output.strategy, CallStrategy::PlainText);
        assert_eq!(
            *model.calls.lock().unwrap(),
            vec![
                CallStrategy::FunctionCall,
                CallStrategy::JsonSchema,
                CallStrategy::PlainText
            ]
        );
    }

    #[tokio::test]
    async fn test_unparsable_output_tries_next_strategy() {
        let model = FakeModel::new()
            .reply(CallStrategy::FunctionCall, "{\"candidateName\": ")
            .reply(CallStrategy::JsonSchema, &valid_analysis_json());
        let output = generate_analysis_json(&model, "prompt").await.unwrap();
        assert_eq!(output.strategy, CallStrategy::JsonSchema);
    }

    #[tokio::test]
    async fn test_no_output_at_all_is_empty_model_output() {
        let model = FakeModel::new().fail(CallStrategy::FunctionCall, 500);
        let err = generate_analysis_json(&model, "prompt").await.unwrap_err();
        assert!(matches!(err, AppError::EmptyModelOutput));
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_only_garbage_output_is_invalid_model_output() {
        let model = FakeModel::new().reply(CallStrategy::PlainText, "Sorry, I can't do that.");
        let err = generate_analysis_json(&model, "prompt").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidModelOutput(_)));
    }

    #[tokio::test]
    async fn test_analyze_upload_stamps_provenance() {
        let model = FakeModel::new().reply(CallStrategy::FunctionCall, &valid_analysis_json());
        let extractor = FakeExtractor(Ok("Grace Hopper\u{00AD}\n\n\nNavy".to_string()));
        let upload_date = Utc::now();

        let result = analyze_upload(&model, &extractor, upload("grace.pdf"), upload_date)
            .await
            .unwrap();

        assert_eq!(result.file_name, "grace.pdf");
        assert_eq!(result.file_size, 13);
        assert_eq!(result.upload_date, upload_date);
        assert!(result.analysis_date >= upload_date);
        assert_eq!(result.raw_text, "Grace Hopper\nNavy");
        assert_eq!(result.education[0].year, 1934);
        assert!(model.prompts.lock().unwrap()[0].contains("Grace Hopper\nNavy"));
    }

    #[tokio::test]
    async fn test_extraction_failure_names_the_file_and_skips_model() {
        let model = FakeModel::new().reply(CallStrategy::FunctionCall, &valid_analysis_json());
        let extractor = FakeExtractor(Err("corrupt xref table".to_string()));

        let err = analyze_upload(&model, &extractor, upload("broken.pdf"), Utc::now())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("\"broken.pdf\""));
        assert_eq!(model.call_count(), 0);
    }
}
