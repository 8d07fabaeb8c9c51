//! Recording listing, download and playback handlers

use std::io;

use axum::body::Body;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::store::{RecordingKind, RecordingName};

use super::error::HttpError;
use super::state::AppState;
use super::NO_CACHE_HEADERS;

/// `GET /recordings/index.html`
pub async fn list(State(state): State<AppState>) -> Result<Response, HttpError> {
    let entries = match state.store.list().await {
        Ok(entries) => entries,
        // Nothing recorded yet
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    tracing::debug!(count = entries.len(), "Listing recordings");

    Ok((NO_CACHE_HEADERS, Html(state.pages.recordings(&entries))).into_response())
}

/// `GET /recordings/{name}`
///
/// Only converted recordings are served. Raw segments are forbidden, and
/// anything failing validation, including a segment that does not decode to
/// UTF-8, is indistinguishable from a missing file.
pub async fn download(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, HttpError> {
    let Path(name) = path.map_err(|e| HttpError::NotFound(e.body_text()))?;
    let name = RecordingName::parse(&name).ok_or_else(|| HttpError::NotFound(name.clone()))?;

    if name.kind() == RecordingKind::Pending {
        return Err(HttpError::Forbidden(name.to_string()));
    }

    let (file, len) = match state.store.open(&name).await {
        Ok(opened) => opened,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(HttpError::NotFound(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    tracing::debug!(recording = %name, bytes = len, "Serving recording");

    Ok((
        NO_CACHE_HEADERS,
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct PlaybackParams {
    file: Option<String>,
}

/// `GET /playback.html?file=<name>`
pub async fn playback(
    State(state): State<AppState>,
    params: Result<Query<PlaybackParams>, QueryRejection>,
) -> Result<Html<String>, HttpError> {
    let file = params
        .ok()
        .and_then(|Query(p)| p.file)
        .ok_or_else(|| HttpError::NotFound("playback without file argument".into()))?;

    let name = RecordingName::parse(&file).ok_or(HttpError::NotFound(file))?;

    Ok(Html(state.pages.playback(name.as_str())))
}
