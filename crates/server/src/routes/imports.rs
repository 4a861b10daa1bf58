// crates/server/src/routes/imports.rs
//! Import job endpoints.
//!
//! - POST /imports — validate an upload, then start a job (or extract inline)
//! - GET  /imports/{id} — owner-scoped job snapshot
//! - POST /imports/{id}/cancel — request cancellation, idempotent

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use larder_core::{
    validate_upload, FileClass, SourceDocument, UploadedFile, DOCUMENT_CONTENT_TYPE,
    MAX_UPLOAD_BYTES,
};
use larder_db::NewImportJob;
use larder_types::{CancelResponse, CreateImportResponse, JobStatusResponse, SourceKind};
use tracing::{debug, info};

use crate::auth::Caller;
use crate::config::parse_flag;
use crate::error::{ApiError, ApiResult};
use crate::jobs::InlineResult;
use crate::metrics::record_upload;
use crate::state::AppState;

/// Request body ceiling: the largest valid file plus multipart framing.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Optional multipart field overriding the server's image fast-path default.
pub const FAST_PATH_FIELD: &str = "fastPath";

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    fast_path: Option<bool>,
}

async fn read_upload(multipart: &mut Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            FAST_PATH_FIELD => {
                let raw = field.text().await?;
                let flag = parse_flag(&raw).ok_or_else(|| {
                    ApiError::BadRequest(format!("{FAST_PATH_FIELD} must be true or false"))
                })?;
                form.fast_path = Some(flag);
            }
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    Ok(form)
}

/// POST /api/imports
///
/// 400 on validation failure, no job created. Otherwise 202 with the job id,
/// or for inline image extraction 201 with the recipe / 200 with `noRecipe`.
async fn create_import(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let form = read_upload(&mut multipart).await?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {FILE_FIELD} field")))?;

    let class = validate_upload(&file).inspect_err(|_| record_upload("rejected"))?;
    let content_type = match class {
        FileClass::Image(format) => format.mime_type(),
        FileClass::Document => DOCUMENT_CONTENT_TYPE,
    };
    let kind = class.source_kind();

    if kind == SourceKind::Image && form.fast_path.unwrap_or(state.image_fast_path) {
        record_upload("inline");
        let doc = SourceDocument {
            job_id: None,
            kind,
            content_type: content_type.to_string(),
            bytes: file.bytes,
        };
        let response = match state.runner.extract_inline(caller.id(), &doc).await? {
            InlineResult::Recipe(row) => (
                StatusCode::CREATED,
                Json(CreateImportResponse::Recipe {
                    recipe_id: row.id,
                    title: row.title,
                }),
            )
                .into_response(),
            InlineResult::NoRecipe => {
                (StatusCode::OK, Json(CreateImportResponse::NoRecipe)).into_response()
            }
        };
        return Ok(response);
    }

    let job = state
        .db
        .create_import_job(&NewImportJob {
            owner: caller.id(),
            source_kind: kind,
            content_type,
            file_name: file.file_name.as_deref(),
            bytes: &file.bytes,
        })
        .await?;
    record_upload("job");
    info!(
        job_id = %job.id,
        owner = caller.id(),
        kind = kind.as_str(),
        size = file.len(),
        "Import job created"
    );

    state.runner.start(&job.id);

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateImportResponse::Job { job_id: job.id }),
    )
        .into_response())
}

/// GET /api/imports/{id}
///
/// 404 for unknown jobs and for jobs owned by someone else, identically.
async fn get_import(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = state
        .db
        .get_import_job(caller.id(), &id)
        .await?
        .ok_or_else(|| ApiError::JobNotFound(id.clone()))?;
    Ok(Json(job.to_response()))
}

/// POST /api/imports/{id}/cancel
///
/// Always `{ok: true}`: applied, already terminal, unknown and foreign jobs
/// are indistinguishable from outside.
async fn cancel_import(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let applied = state.db.request_cancel(caller.id(), &id).await?;
    debug!(job_id = %id, owner = caller.id(), applied, "Cancel requested");
    Ok(Json(CancelResponse { ok: true }))
}

/// Build the imports router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/imports",
            post(create_import).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/imports/{id}", get(get_import))
        .route("/imports/{id}/cancel", post(cancel_import))
}
