//! Draft file diff resource.
//!
//! `GET /api/review-requests/{review_request_id}/draft/diffs/{revision}/files/`
//! and `GET/PUT .../files/{filediff_id}/`. Only people who may change the
//! review request see its draft diff.

use super::auth::RequestUser;
use super::errors::ApiErr;
use super::fields::{bind_fields, parse_body, FieldSpec, FieldType};
use super::{resolve_local_site, AppState};
use crate::db::{attachments, diffs, review_requests};
use crate::error::AppError;
use crate::models::{DiffSet, FileDiff};
use crate::services::draft_filediffs::{
    self, DestAttachmentUpload, UpdateDraftFileDiff, DEST_ATTACHMENT_FIELD,
};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const POLICY_ID: &str = "draft_filediff";

const UPDATE_FIELDS: &[FieldSpec] = &[FieldSpec::optional(DEST_ATTACHMENT_FIELD, FieldType::Json)];

#[derive(Deserialize)]
struct DraftDiffPath {
    local_site: Option<String>,
    review_request_id: i64,
    revision: i64,
}

#[derive(Deserialize)]
struct DraftFileDiffPath {
    local_site: Option<String>,
    review_request_id: i64,
    revision: i64,
    filediff_id: i64,
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "commit-id")]
    commit_id: Option<String>,
}

/// `dest_attachment_file` as sent by clients; `content` is base64.
#[derive(Deserialize)]
struct UploadField {
    filename: String,
    mimetype: Option<String>,
    content: String,
}

#[derive(Debug, Serialize)]
pub struct DestAttachmentPayload {
    pub id: i64,
    pub filename: String,
    pub mimetype: String,
    pub caption: String,
}

/// Serialized form of a draft file diff.
#[derive(Debug, Serialize)]
pub struct FileDiffPayload {
    pub id: i64,
    pub source_file: String,
    pub dest_file: String,
    pub source_revision: String,
    pub dest_detail: String,
    pub commit_id: Option<String>,
    pub binary: bool,
    pub extra_data: Value,
    pub dest_attachment: Option<DestAttachmentPayload>,
}

/// Build the draft file diff routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/review-requests/{review_request_id}/draft/diffs/{revision}/files/",
            get(list_files),
        )
        .route(
            "/review-requests/{review_request_id}/draft/diffs/{revision}/files/{filediff_id}/",
            get(get_file).put(update_file),
        )
}

/// Find the draft diff set named in the URL, checking the caller may
/// change the review request that owns it.
async fn load_draft_diffset(
    state: &AppState,
    request_user: &RequestUser,
    method: &Method,
    local_site: Option<&str>,
    review_request_id: i64,
    revision: i64,
    object_id: Option<i64>,
) -> Result<DiffSet, AppError> {
    let site = resolve_local_site(state, request_user, local_site).await?;
    request_user.check_policy(
        POLICY_ID,
        method,
        object_id.map(|id| id.to_string()).as_deref(),
    )?;

    let review_request = review_requests::get_review_request(&state.db, review_request_id)
        .await?
        .filter(|rr| rr.local_site_id == site.as_ref().map(|s| s.id))
        .ok_or_else(|| AppError::not_found_with_id("ReviewRequest", review_request_id))?;

    if !review_request.is_mutable_by(request_user.viewer(), site.as_ref()) {
        return Err(request_user.denied());
    }

    diffs::get_draft_diffset(&state.db, review_request_id, revision)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("DiffSet", revision))
}

async fn load_filediff(
    state: &AppState,
    request_user: &RequestUser,
    method: &Method,
    path: &DraftFileDiffPath,
) -> Result<FileDiff, AppError> {
    let diffset = load_draft_diffset(
        state,
        request_user,
        method,
        path.local_site.as_deref(),
        path.review_request_id,
        path.revision,
        Some(path.filediff_id),
    )
    .await?;

    diffs::get_filediff(&state.db, path.filediff_id)
        .await?
        .filter(|f| f.diffset_id == diffset.id)
        .ok_or_else(|| AppError::not_found_with_id("FileDiff", path.filediff_id))
}

async fn file_payload(state: &AppState, filediff: &FileDiff) -> Result<FileDiffPayload, AppError> {
    let dest_attachment = match filediff.dest_attachment_id {
        Some(id) => attachments::get_file_attachment(&state.db, id)
            .await?
            .map(|a| DestAttachmentPayload {
                id: a.id,
                filename: a.filename,
                mimetype: a.mimetype,
                caption: a.caption,
            }),
        None => None,
    };

    Ok(FileDiffPayload {
        id: filediff.id,
        source_file: filediff.source_file.clone(),
        dest_file: filediff.dest_file.clone(),
        source_revision: filediff.source_revision.clone(),
        dest_detail: filediff.dest_detail.clone(),
        commit_id: filediff.commit_id.clone(),
        binary: filediff.binary,
        extra_data: Value::Object(filediff.extra_data_map()),
        dest_attachment,
    })
}

async fn file_response(state: &AppState, filediff: &FileDiff) -> Result<Response, AppError> {
    Ok(Json(json!({
        "stat": "ok",
        "file": file_payload(state, filediff).await?,
    }))
    .into_response())
}

/// GET: the files in a draft diff, optionally only those in one commit.
async fn list_files(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    method: Method,
    Path(path): Path<DraftDiffPath>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiErr> {
    let diffset = load_draft_diffset(
        &state,
        &request_user,
        &method,
        path.local_site.as_deref(),
        path.review_request_id,
        path.revision,
        None,
    )
    .await?;

    let filediffs = diffs::list_filediffs(&state.db, diffset.id, query.commit_id.as_deref()).await?;
    let mut files = Vec::with_capacity(filediffs.len());
    for filediff in &filediffs {
        files.push(file_payload(&state, filediff).await?);
    }

    Ok(Json(json!({
        "stat": "ok",
        "total_results": files.len(),
        "files": files,
    }))
    .into_response())
}

async fn get_file(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    method: Method,
    Path(path): Path<DraftFileDiffPath>,
) -> Result<Response, ApiErr> {
    let filediff = load_filediff(&state, &request_user, &method, &path).await?;
    Ok(file_response(&state, &filediff).await?)
}

/// PUT: upload the new version of a binary file, or change `extra_data`.
async fn update_file(
    State(state): State<AppState>,
    Extension(request_user): Extension<RequestUser>,
    method: Method,
    Path(path): Path<DraftFileDiffPath>,
    body: Bytes,
) -> Result<Response, ApiErr> {
    request_user.require_login()?;
    let filediff = load_filediff(&state, &request_user, &method, &path).await?;
    let fields = bind_fields(&parse_body(&body)?, UPDATE_FIELDS, true)?;

    let dest_attachment = fields
        .json(DEST_ATTACHMENT_FIELD)
        .map(|raw| parse_upload(&raw))
        .transpose()?;

    let updated = draft_filediffs::update_draft_filediff(
        &state.db,
        path.review_request_id,
        &filediff,
        UpdateDraftFileDiff {
            dest_attachment,
            extra_fields: fields.extra_data,
        },
    )
    .await?;

    Ok(file_response(&state, &updated).await?)
}

fn parse_upload(raw: &str) -> Result<DestAttachmentUpload, AppError> {
    let field: UploadField = serde_json::from_str(raw).map_err(|_| {
        AppError::invalid_field(
            DEST_ATTACHMENT_FIELD,
            "Expected an object with filename and content.",
        )
    })?;

    let content = STANDARD
        .decode(field.content.as_bytes())
        .map_err(|_| AppError::invalid_field(DEST_ATTACHMENT_FIELD, "The content is not valid base64."))?;

    Ok(DestAttachmentUpload {
        filename: field.filename,
        mimetype: field.mimetype,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload() {
        let upload =
            parse_upload(r#"{"filename": "logo.png", "content": "iVBORw=="}"#).unwrap();
        assert_eq!(upload.filename, "logo.png");
        assert_eq!(upload.mimetype, None);
        assert_eq!(upload.content, vec![0x89, b'P', b'N', b'G']);

        for bad in [r#""just a string""#, r#"{"filename": "a", "content": "%%%"}"#] {
            let err = parse_upload(bad).unwrap_err();
            assert!(err.field_errors().unwrap().contains_key(DEST_ATTACHMENT_FIELD));
        }
    }
}
