//! Axum route handler for the Analysis API.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    Json,
};
use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::info;

use crate::analysis::models::AnalysisResult;
use crate::analysis::pipeline::{analyze_upload, UploadedFile};
use crate::errors::AppError;
use crate::state::AppState;

/// Multipart part names that carry resumes.
const FILE_FIELDS: [&str; 2] = ["file", "files"];

/// One upload returns the bare record; several are wrapped in `results`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Single(Box<AnalysisResult>),
    Batch { results: Vec<AnalysisResult> },
}

/// POST /api/analyze
///
/// Analyzes every PDF in the multipart body concurrently. Any failure fails the
/// whole request; there are no partial results.
pub async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let uploads = read_uploads(&mut multipart).await?;
    if uploads.is_empty() {
        return Err(AppError::NoFiles);
    }

    info!("Analyzing {} uploaded file(s)", uploads.len());
    let upload_date = Utc::now();

    let mut results = try_join_all(uploads.into_iter().map(|upload| {
        analyze_upload(
            state.model.as_ref(),
            state.extractor.as_ref(),
            upload,
            upload_date,
        )
    }))
    .await?;

    let response = if results.len() == 1 {
        AnalyzeResponse::Single(Box::new(results.remove(0)))
    } else {
        AnalyzeResponse::Batch { results }
    };
    Ok(Json(response))
}

/// Collects `file`/`files` parts, rejecting non-PDF content types before any
/// analysis starts. Non-file parts are skipped.
async fn read_uploads(multipart: &mut Multipart) -> Result<Vec<UploadedFile>, AppError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        let is_file_part = field
            .name()
            .is_some_and(|name| FILE_FIELDS.contains(&name));
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !is_file_part {
            continue;
        }

        ensure_pdf(&field, &file_name)?;

        let bytes = field.bytes().await.map_err(multipart_error)?;
        uploads.push(UploadedFile { file_name, bytes });
    }

    Ok(uploads)
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::Multipart {
        status: e.status(),
        message: e.body_text(),
    }
}

fn ensure_pdf(field: &Field<'_>, file_name: &str) -> Result<(), AppError> {
    let is_pdf = field
        .content_type()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"));
    if is_pdf {
        Ok(())
    } else {
        Err(AppError::UnsupportedFileType {
            file_name: file_name.to_string(),
        })
    }
}
