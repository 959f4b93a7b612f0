//! Repository control plane: upsert, tags, finalize, read path.

use crate::auth::{authorize_read, authorize_write, require_identity};
use crate::error::{ApiError, ApiResult};
use crate::headers::{ENDPOINTS_HEADER, TOKEN_HEADER};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::header::{CONTENT_TYPE, USER_AGENT, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use capstan_core::access::AccessGrant;
use capstan_core::image::extract_image_id;
use capstan_core::manifest::decode_manifest;
use capstan_core::repo::RepoPath;
use capstan_metadata::models::{RepositoryRow, TagRow};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Maximum accepted tag body size; the body is one quoted image id.
const MAX_TAG_BODY_SIZE: usize = 4 * 1024;

/// Did the client ask for a registry token?
fn wants_token(req: &Request) -> bool {
    req.headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Build the endpoint header, plus token headers when the client signalled
/// token-flow support.
fn grant_headers(state: &AppState, req: &Request, grant: &AccessGrant) -> ApiResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ENDPOINTS_HEADER,
        HeaderValue::from_str(&state.config.registry.endpoints)
            .map_err(|e| ApiError::Internal(format!("invalid endpoints config: {e}")))?,
    );

    if wants_token(req) {
        let token = grant.token().header_value();
        headers.insert(
            TOKEN_HEADER,
            HeaderValue::from_str(&token)
                .map_err(|e| ApiError::Internal(format!("invalid token header: {e}")))?,
        );
        headers.insert(
            WWW_AUTHENTICATE,
            HeaderValue::from_str(&format!("Token {token}"))
                .map_err(|e| ApiError::Internal(format!("invalid token header: {e}")))?,
        );
    }

    Ok(headers)
}

/// PUT /v1/repositories/{namespace}/{repository} - create or replace a
/// repository from its manifest.
///
/// The manifest bytes are stored verbatim; only the completion verifier
/// decodes them. A replace resets the completion state for the new push.
#[tracing::instrument(skip(state, req))]
pub async fn put_repository(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
    req: Request,
) -> ApiResult<(StatusCode, HeaderMap, Json<&'static str>)> {
    let identity = require_identity(&req)?.clone();
    let path = RepoPath::parse(&namespace, &repository)?;
    let grant = authorize_write(&identity, path.namespace(), path.name())?;

    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let headers = grant_headers(&state, &req, &grant)?;

    let manifest = axum::body::to_bytes(req.into_body(), state.config.server.max_manifest_size)
        .await
        .map_err(|e| ApiError::MalformedBody(format!("failed to read body: {e}")))?;

    let now = OffsetDateTime::now_utc();
    state
        .metadata
        .upsert_repository(&RepositoryRow {
            namespace: path.namespace().to_string(),
            name: path.name().to_string(),
            manifest: manifest.to_vec(),
            // Repositories created through the push API are public.
            is_private: false,
            uploaded: false,
            checksummed: false,
            total_size: 0,
            user_agent,
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(
        namespace = %path.namespace(),
        repository = %path.name(),
        manifest_bytes = manifest.len(),
        "repository manifest stored"
    );
    Ok((StatusCode::OK, headers, Json("")))
}

/// PUT /v1/repositories/{ns}/{repo}/tags/{tag} - point a tag at an image id.
///
/// The image id is accepted without checking that the image exists;
/// referential integrity is enforced at finalize time against the manifest.
/// Every failure on this path surfaces as 400, which is what the v1 client
/// expects here.
#[tracing::instrument(skip(state, req))]
pub async fn put_tag(
    State(state): State<AppState>,
    Path((namespace, repository, tag)): Path<(String, String, String)>,
    req: Request,
) -> ApiResult<(StatusCode, Json<&'static str>)> {
    let identity = require_identity(&req)?.clone();
    let path = RepoPath::parse(&namespace, &repository)?;
    let _grant = authorize_write(&identity, path.namespace(), path.name())?;

    let repo = state
        .metadata
        .get_repository(path.namespace(), path.name())
        .await
        .map_err(|e| ApiError::BadRequest(format!("repository lookup failed: {e}")))?;
    if repo.is_none() {
        return Err(ApiError::BadRequest(format!(
            "repository {path} not found"
        )));
    }

    let body = axum::body::to_bytes(req.into_body(), MAX_TAG_BODY_SIZE)
        .await
        .map_err(|e| ApiError::MalformedBody(format!("failed to read body: {e}")))?;

    let image_id = extract_image_id(&body)
        .ok_or_else(|| ApiError::MalformedBody("no image id found in tag body".to_string()))?;

    let now = OffsetDateTime::now_utc();
    state
        .metadata
        .upsert_tag(&TagRow {
            namespace: path.namespace().to_string(),
            repository: path.name().to_string(),
            tag: tag.clone(),
            image_id: image_id.as_str().to_string(),
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::debug!(
        namespace = %path.namespace(),
        repository = %path.name(),
        tag = %tag,
        image_id = %image_id,
        "tag stored"
    );
    Ok((StatusCode::OK, Json("")))
}

/// PUT /v1/repositories/{ns}/{repo}/images - finalize a push.
///
/// The one place the manifest structure is interpreted: every referenced
/// image must exist, be uploaded and be checksummed before the repository is
/// marked complete. Completion is persisted as a single write so a failure
/// cannot leave the flags half-updated, and the whole operation is
/// re-runnable by a client retry.
#[tracing::instrument(skip(state, req))]
pub async fn put_repository_images(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
    req: Request,
) -> ApiResult<(StatusCode, Json<&'static str>)> {
    let identity = require_identity(&req)?.clone();
    let path = RepoPath::parse(&namespace, &repository)?;
    let _grant = authorize_write(&identity, path.namespace(), path.name())?;

    let repo = state
        .metadata
        .get_repository(path.namespace(), path.name())
        .await?
        .ok_or_else(|| ApiError::RepositoryNotFound(path.to_string()))?;

    let image_ids = decode_manifest(&repo.manifest)
        .map_err(|e| ApiError::MalformedBody(format!("stored manifest does not decode: {e}")))?;

    let mut images = Vec::with_capacity(image_ids.len());
    for id in &image_ids {
        let image = state
            .metadata
            .get_image(id.as_str())
            .await?
            .ok_or_else(|| ApiError::ImageNotFound(id.to_string()))?;
        images.push(image);
    }

    // All-or-nothing: one missing layer fails the whole push, and upload
    // state outranks checksum state in the report.
    if let Some(image) = images.iter().find(|image| !image.uploaded) {
        return Err(ApiError::IncompleteUpload(image.image_id.clone()));
    }
    if let Some(image) = images.iter().find(|image| !image.checksummed) {
        return Err(ApiError::ChecksumPending(image.image_id.clone()));
    }

    let total_size: i64 = images.iter().map(|image| image.size).sum();

    state
        .metadata
        .complete_repository(
            path.namespace(),
            path.name(),
            total_size,
            OffsetDateTime::now_utc(),
        )
        .await
        .map_err(|e| ApiError::PersistError(e.to_string()))?;

    tracing::info!(
        namespace = %path.namespace(),
        repository = %path.name(),
        image_count = images.len(),
        total_size,
        "push finalized"
    );
    Ok((StatusCode::OK, Json("")))
}

/// GET /v1/repositories/{ns}/{repo}/images - the stored manifest, verbatim.
///
/// A repository that never existed and one that exists but was never
/// finalized are indistinguishable to the client: both are 404.
#[tracing::instrument(skip(state, req))]
pub async fn get_repository_images(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
    req: Request,
) -> ApiResult<(StatusCode, HeaderMap, Vec<u8>)> {
    let identity = require_identity(&req)?.clone();
    let path = RepoPath::parse(&namespace, &repository)?;

    let repo = state
        .metadata
        .get_active_repository(path.namespace(), path.name())
        .await?
        .ok_or_else(|| ApiError::RepositoryNotFound(path.to_string()))?;

    let grant = authorize_read(&identity, path.namespace(), path.name(), repo.is_private)?;

    let mut headers = grant_headers(&state, &req, &grant)?;
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok((StatusCode::OK, headers, repo.manifest))
}

/// GET /v1/repositories/{ns}/{repo}/tags - tag name to image id mapping.
///
/// Same existence and visibility gate as the manifest read.
#[tracing::instrument(skip(state, req))]
pub async fn get_repository_tags(
    State(state): State<AppState>,
    Path((namespace, repository)): Path<(String, String)>,
    req: Request,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let identity = require_identity(&req)?.clone();
    let path = RepoPath::parse(&namespace, &repository)?;

    let repo = state
        .metadata
        .get_active_repository(path.namespace(), path.name())
        .await?
        .ok_or_else(|| ApiError::RepositoryNotFound(path.to_string()))?;

    let _grant = authorize_read(&identity, path.namespace(), path.name(), repo.is_private)?;

    let tags = state
        .metadata
        .list_tags(path.namespace(), path.name())
        .await?;

    let mut mapping = Map::new();
    for tag in tags {
        mapping.insert(tag.tag, Value::String(tag.image_id));
    }

    Ok((StatusCode::OK, Json(Value::Object(mapping))))
}
