//! Live MJPEG stream
//!
//! `multipart/x-mixed-replace` response where every part is one JPEG:
//!
//! ```text
//! --FRAME\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: 51234\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! ```
//!
//! Each viewer gets a pump task that awaits the next frame from its own
//! [`FrameSubscriber`] and hands the encoded part to the response body
//! through a one-slot channel. The pump ends when the viewer goes away or
//! the mailbox is closed.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::broadcast::{Frame, FrameSubscriber};

use super::state::{AppState, ViewerGuard};
use super::NO_CACHE_HEADERS;

/// Multipart boundary token
pub const BOUNDARY: &str = "FRAME";

/// `Content-Type` of the live stream
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=FRAME";

/// Encode one frame as a multipart part
pub fn encode_part(frame: &Frame) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );

    let mut part = BytesMut::with_capacity(header.len() + frame.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(&frame.data);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// `GET /stream.mjpg`
pub async fn live_stream(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    let subscriber = state.mailbox.subscribe();
    let viewer = state.add_viewer();
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(1);

    tracing::info!(peer = %peer, viewers = viewer.count(), "Live viewer connected");

    tokio::spawn(pump(subscriber, viewer, tx, peer));

    (
        NO_CACHE_HEADERS,
        [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

async fn pump(
    mut subscriber: FrameSubscriber,
    _viewer: ViewerGuard,
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    peer: SocketAddr,
) {
    let mut sent = 0u64;

    loop {
        let frame = tokio::select! {
            _ = tx.closed() => {
                tracing::info!(peer = %peer, frames = sent, "Live viewer disconnected");
                return;
            }
            frame = subscriber.next_frame() => frame,
        };

        let Some(frame) = frame else {
            tracing::debug!(peer = %peer, frames = sent, "Frame source closed; ending live stream");
            return;
        };

        if tx.send(Ok(encode_part(&frame))).await.is_err() {
            tracing::info!(peer = %peer, frames = sent, "Live viewer disconnected");
            return;
        }
        sent += 1;
    }
}
