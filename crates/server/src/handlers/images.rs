//! Per-image payload handlers and the ancestry resolver.

use crate::auth::require_identity;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use capstan_core::image::ImageId;
use capstan_metadata::MetadataStore;
use capstan_metadata::models::ImageRow;
use capstan_storage::{BlobKind, StorageError};
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashSet;
use time::OffsetDateTime;

/// Maximum accepted image JSON (and checksum body) size.
const MAX_JSON_SIZE: usize = 1024 * 1024;

/// Checksum header sent by the v1 client alongside the checksum call.
const CHECKSUM_HEADER: &str = "x-docker-checksum";

/// The fields of an image JSON document the registry interprets; the rest of
/// the document passes through opaquely.
#[derive(Debug, Deserialize)]
struct ImageJson {
    id: String,
    #[serde(default)]
    parent: Option<String>,
}

/// Map a storage miss to the image-scoped 404.
fn blob_not_found(image_id: &ImageId) -> impl FnOnce(StorageError) -> ApiError {
    let id = image_id.to_string();
    move |e| match e {
        StorageError::NotFound(_) => ApiError::ImageNotFound(id),
        other => other.into(),
    }
}

/// PUT /v1/images/{id}/json - store image metadata and register the image.
///
/// This is what creates the image record; layer and checksum uploads require
/// it. Re-uploading resets the image's upload state.
#[tracing::instrument(skip(state, req))]
pub async fn put_image_json(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    req: Request,
) -> ApiResult<(StatusCode, Json<&'static str>)> {
    require_identity(&req)?;
    let image_id = ImageId::parse(&image_id)?;

    let body = axum::body::to_bytes(req.into_body(), MAX_JSON_SIZE)
        .await
        .map_err(|e| ApiError::MalformedBody(format!("failed to read body: {e}")))?;

    let json: ImageJson = serde_json::from_slice(&body)
        .map_err(|e| ApiError::MalformedBody(format!("invalid image json: {e}")))?;
    if json.id != image_id.as_str() {
        return Err(ApiError::MalformedBody(format!(
            "image json id {} does not match path id {image_id}",
            json.id
        )));
    }
    let parent_id = match json.parent {
        Some(parent) => Some(ImageId::parse(&parent)?.into_string()),
        None => None,
    };

    state
        .blobs
        .put(image_id.as_str(), BlobKind::Json, body)
        .await?;

    let now = OffsetDateTime::now_utc();
    state
        .metadata
        .upsert_image(&ImageRow {
            image_id: image_id.as_str().to_string(),
            parent_id,
            uploaded: false,
            checksummed: false,
            size: 0,
            checksum: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::debug!(image_id = %image_id, "image json stored");
    Ok((StatusCode::OK, Json("")))
}

/// GET /v1/images/{id}/json - the stored image metadata, verbatim.
#[tracing::instrument(skip(state, req))]
pub async fn get_image_json(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    req: Request,
) -> ApiResult<Response> {
    require_identity(&req)?;
    let image_id = ImageId::parse(&image_id)?;

    if state.metadata.get_image(image_id.as_str()).await?.is_none() {
        return Err(ApiError::ImageNotFound(image_id.to_string()));
    }

    let data = state
        .blobs
        .get(image_id.as_str(), BlobKind::Json)
        .await
        .map_err(blob_not_found(&image_id))?;

    Ok((StatusCode::OK, [(CONTENT_TYPE, "application/json")], data).into_response())
}

/// PUT /v1/images/{id}/layer - store the layer blob and mark the image
/// uploaded.
///
/// The body is streamed straight into the blob store; the recorded size is
/// whatever arrived before EOF, and the uploaded flag flips only after the
/// blob landed.
#[tracing::instrument(skip(state, req))]
pub async fn put_image_layer(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    req: Request,
) -> ApiResult<(StatusCode, Json<&'static str>)> {
    require_identity(&req)?;
    let image_id = ImageId::parse(&image_id)?;

    // The json upload must come first; it is what registers the image.
    if state.metadata.get_image(image_id.as_str()).await?.is_none() {
        return Err(ApiError::ImageNotFound(image_id.to_string()));
    }

    let body_stream = req
        .into_body()
        .into_data_stream()
        .map(|chunk| chunk.map_err(|e| StorageError::Io(std::io::Error::other(e))));

    let size = state
        .blobs
        .put_stream(image_id.as_str(), BlobKind::Layer, Box::pin(body_stream))
        .await? as i64;

    state
        .metadata
        .mark_image_uploaded(image_id.as_str(), size, OffsetDateTime::now_utc())
        .await?;

    tracing::info!(image_id = %image_id, size, "image layer stored");
    Ok((StatusCode::OK, Json("")))
}

/// GET /v1/images/{id}/layer - stream the layer blob back.
#[tracing::instrument(skip(state, req))]
pub async fn get_image_layer(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    req: Request,
) -> ApiResult<Response> {
    require_identity(&req)?;
    let image_id = ImageId::parse(&image_id)?;

    if state.metadata.get_image(image_id.as_str()).await?.is_none() {
        return Err(ApiError::ImageNotFound(image_id.to_string()));
    }

    let size = state
        .blobs
        .size(image_id.as_str(), BlobKind::Layer)
        .await
        .map_err(blob_not_found(&image_id))?;
    let stream = state
        .blobs
        .get_stream(image_id.as_str(), BlobKind::Layer)
        .await
        .map_err(blob_not_found(&image_id))?;

    let body = Body::from_stream(
        stream.map(|chunk| chunk.map_err(|e| std::io::Error::other(e.to_string()))),
    );

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/octet-stream"),
            (CONTENT_LENGTH, &size.to_string()),
        ],
        body,
    )
        .into_response())
}

/// PUT /v1/images/{id}/checksum - record the client checksum and close the
/// image.
///
/// The v1 client sends the checksum in a header; older clients put it in the
/// body instead.
#[tracing::instrument(skip(state, req))]
pub async fn put_image_checksum(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    req: Request,
) -> ApiResult<(StatusCode, Json<&'static str>)> {
    require_identity(&req)?;
    let image_id = ImageId::parse(&image_id)?;

    if state.metadata.get_image(image_id.as_str()).await?.is_none() {
        return Err(ApiError::ImageNotFound(image_id.to_string()));
    }

    let header_checksum = req
        .headers()
        .get(CHECKSUM_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let checksum = match header_checksum {
        Some(value) if !value.is_empty() => value,
        _ => {
            let body = axum::body::to_bytes(req.into_body(), MAX_JSON_SIZE)
                .await
                .map_err(|e| ApiError::MalformedBody(format!("failed to read body: {e}")))?;
            let text = String::from_utf8_lossy(&body)
                .trim()
                .trim_matches('"')
                .to_string();
            if text.is_empty() {
                return Err(ApiError::MalformedBody(
                    "no checksum in header or body".to_string(),
                ));
            }
            text
        }
    };

    state
        .blobs
        .put(
            image_id.as_str(),
            BlobKind::Checksum,
            Bytes::from(checksum.clone()),
        )
        .await?;
    state
        .metadata
        .mark_image_checksummed(image_id.as_str(), &checksum, OffsetDateTime::now_utc())
        .await?;

    tracing::debug!(image_id = %image_id, "image checksum recorded");
    Ok((StatusCode::OK, Json("")))
}

/// Walk an image's parent chain, returning ids eldest (base) first.
///
/// A repeated id is a cycle; a missing link is a broken chain. Both are
/// client-visible data corruption, not server faults.
pub(crate) async fn ancestors(
    metadata: &dyn MetadataStore,
    image_id: &ImageId,
) -> ApiResult<Vec<String>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = image_id.as_str().to_string();

    loop {
        if !seen.insert(current.clone()) {
            return Err(ApiError::CycleDetected(current));
        }
        let image = metadata
            .get_image(&current)
            .await?
            .ok_or_else(|| ApiError::ImageNotFound(current.clone()))?;
        chain.push(image.image_id);
        match image.parent_id {
            Some(parent) => current = parent,
            None => break,
        }
    }

    // Walked child -> parent; the client replays layers base first.
    chain.reverse();
    Ok(chain)
}

/// GET /v1/images/{id}/ancestry - ordered ancestor ids, base image first.
#[tracing::instrument(skip(state, req))]
pub async fn get_image_ancestry(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    req: Request,
) -> ApiResult<Json<Vec<String>>> {
    require_identity(&req)?;
    let image_id = ImageId::parse(&image_id)?;
    let chain = ancestors(state.metadata.as_ref(), &image_id).await?;
    Ok(Json(chain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_metadata::SqliteStore;
    use capstan_metadata::repos::ImageRepo;

    async fn test_metadata() -> (tempfile::TempDir, SqliteStore) {
        let temp = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("metadata.db"))
            .await
            .unwrap();
        (temp, store)
    }

    async fn insert_image(store: &SqliteStore, image_id: &str, parent_id: Option<&str>) {
        let now = OffsetDateTime::now_utc();
        store
            .upsert_image(&ImageRow {
                image_id: image_id.to_string(),
                parent_id: parent_id.map(str::to_string),
                uploaded: true,
                checksummed: true,
                size: 1,
                checksum: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ancestors_resolves_base_first() {
        let (_temp, store) = test_metadata().await;
        // C.parent = B, B.parent = A, A has no parent.
        insert_image(&store, "aaa", None).await;
        insert_image(&store, "bbb", Some("aaa")).await;
        insert_image(&store, "ccc", Some("bbb")).await;

        let chain = ancestors(&store, &ImageId::parse("ccc").unwrap())
            .await
            .unwrap();
        assert_eq!(chain, ["aaa", "bbb", "ccc"]);
    }

    #[tokio::test]
    async fn ancestors_of_base_image_is_itself() {
        let (_temp, store) = test_metadata().await;
        insert_image(&store, "aaa", None).await;

        let chain = ancestors(&store, &ImageId::parse("aaa").unwrap())
            .await
            .unwrap();
        assert_eq!(chain, ["aaa"]);
    }

    #[tokio::test]
    async fn ancestors_detects_cycles() {
        let (_temp, store) = test_metadata().await;
        insert_image(&store, "aaa", Some("bbb")).await;
        insert_image(&store, "bbb", Some("aaa")).await;

        match ancestors(&store, &ImageId::parse("aaa").unwrap()).await {
            Err(ApiError::CycleDetected(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ancestors_reports_broken_chains() {
        let (_temp, store) = test_metadata().await;
        insert_image(&store, "bbb", Some("ghost")).await;

        match ancestors(&store, &ImageId::parse("bbb").unwrap()).await {
            Err(ApiError::ImageNotFound(id)) => assert_eq!(id, "ghost"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
