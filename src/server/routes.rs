//! Route table
//!
//! | Path                       | Response                                   |
//! |----------------------------|--------------------------------------------|
//! | `/`                        | 301 to `/index.html`                       |
//! | `/index.html`              | live view page                             |
//! | `/stream.mjpg`             | multipart JPEG stream                      |
//! | `/recordings`              | 301 to `/recordings/index.html`            |
//! | `/recordings/index.html`   | recordings listing                         |
//! | `/recordings/{name}`       | mp4 bytes, 403 for raw, 404 otherwise      |
//! | `/playback.html?file=name` | player page, 404 without a valid name      |
//! | anything else              | 404                                        |
//!
//! Other methods on these paths get 405.

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use super::error::HttpError;
use super::recordings;
use super::state::AppState;
use super::stream;

/// Build the router over `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { moved_permanently("/index.html") }))
        .route("/index.html", get(index))
        .route("/stream.mjpg", get(stream::live_stream))
        .route(
            "/recordings",
            get(|| async { moved_permanently("/recordings/index.html") }),
        )
        .route("/recordings/index.html", get(recordings::list))
        .route("/recordings/{name}", get(recordings::download))
        .route("/playback.html", get(recordings::playback))
        .fallback(not_found)
        .with_state(state)
}

fn moved_permanently(location: &'static str) -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.pages.index().to_string())
}

async fn not_found(uri: Uri) -> HttpError {
    HttpError::NotFound(uri.path().to_string())
}
