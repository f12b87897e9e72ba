//! Media HTTP handlers

use crate::error::ApiError;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use mediastore_common::{Error, Media, PreviewRequest};
use mediastore_storage::{MediaHandle, MediaService, parse_boundary};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Application state shared across handlers
pub struct AppState {
    pub media: MediaService,
}

/// Query parameters for downloads
#[derive(Debug, Default, Deserialize)]
pub struct PreviewParams {
    pub maxheight: Option<u32>,
    pub maxwidth: Option<u32>,
}

impl From<PreviewParams> for PreviewRequest {
    fn from(params: PreviewParams) -> Self {
        Self::new(params.maxheight, params.maxwidth)
    }
}

/// Query parameters for media listing
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// RFC 3339 timestamp
    pub since: Option<String>,
}

impl ListParams {
    pub fn since(&self) -> Result<Option<DateTime<Utc>>, ApiError> {
        self.since
            .as_deref()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        ApiError::BadRequest(format!("invalid 'since' timestamp {s}: {e}"))
                    })
            })
            .transpose()
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Upload generic media (POST /media/{entity})
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<Media>), ApiError> {
    upload(&state, &entity, &headers, body, false).await
}

/// Upload an avatar (PUT|POST /media/{entity}/avatar)
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<(StatusCode, Json<Media>), ApiError> {
    upload(&state, &entity, &headers, body, true).await
}

async fn upload(
    state: &AppState,
    entity: &str,
    headers: &HeaderMap,
    body: Body,
    is_avatar: bool,
) -> Result<(StatusCode, Json<Media>), ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = parse_boundary(content_type)?;

    let media = state
        .media
        .insert_media(entity, body.into_data_stream(), &boundary, is_avatar)
        .await?;
    Ok((StatusCode::CREATED, Json(media)))
}

/// List an entity's media (GET /media/{entity}?since=)
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Media>>, ApiError> {
    let media = state.media.list_media(&entity, params.since()?).await?;
    Ok(Json(media))
}

/// Download a media file (GET /media/{entity}/{media_id})
pub async fn download_media(
    State(state): State<Arc<AppState>>,
    Path((entity, media_id)): Path<(String, String)>,
    Query(params): Query<PreviewParams>,
) -> Result<Response, ApiError> {
    let handle = state.media.get_media(&entity, &media_id, params.into()).await?;
    stream(&state.media, &handle).await
}

/// Download an entity's avatar (GET /media/{entity}/avatar)
pub async fn download_avatar(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    Query(params): Query<PreviewParams>,
) -> Result<Response, ApiError> {
    let handle = state.media.get_avatar(&entity, params.into()).await?;
    stream(&state.media, &handle).await
}

/// Media record (GET /media/{entity}/{media_id}/info)
pub async fn media_info(
    State(state): State<Arc<AppState>>,
    Path((entity, media_id)): Path<(String, String)>,
) -> Result<Json<Media>, ApiError> {
    let media = state.media.get_media_info(&media_id).await?;
    if media.entity_id != entity {
        return Err(Error::not_found(media_id, entity).into());
    }
    Ok(Json(media))
}

async fn stream(service: &MediaService, handle: &MediaHandle) -> Result<Response, ApiError> {
    let mime_type = service.get_media_type(handle.media_id.as_str()).await?;
    let file = handle.open().await.map_err(Error::from)?;
    debug!("Streaming {} ({} bytes)", handle.path.display(), handle.size);

    let content_type = HeaderValue::from_str(&mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(handle.size)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
