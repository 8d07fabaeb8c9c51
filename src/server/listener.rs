//! HTTP server listener
//!
//! Handles the TCP accept loop and spawns a hyper connection per client.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tower::ServiceExt;

use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::routes;
use crate::server::state::AppState;

/// Camera HTTP server
pub struct HttpServer {
    config: ServerConfig,
    router: Router,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl HttpServer {
    /// Create a new server with the given configuration and handler state
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self::with_router(config, routes::router(state))
    }

    /// Create a server around a prepared router
    pub fn with_router(config: ServerConfig, router: Router) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            router,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Run the server
    ///
    /// This method blocks until the process exits.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from an already bound listener until `shutdown`
    ///
    /// Connections still open when `shutdown` resolves are left to finish on
    /// their own tasks.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "HTTP server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let router = self.router.clone();
        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .keep_alive(self.config.keep_alive)
            .header_read_timeout(self.config.header_read_timeout);

        tokio::spawn(async move {
            let _permit = permit;

            let service = service_fn(move |mut req: Request<Incoming>| {
                req.extensions_mut().insert(ConnectInfo(peer_addr));
                router.clone().oneshot(req)
            });

            if let Err(e) = builder.serve_connection(TokioIo::new(socket), service).await {
                tracing::debug!(
                    connection_id = connection_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(connection_id = connection_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;
    use crate::broadcast::FrameMailbox;
    use crate::server::pages::Pages;
    use crate::store::RecordingStore;

    struct Running {
        addr: SocketAddr,
        mailbox: Arc<FrameMailbox>,
        shutdown: Option<oneshot::Sender<()>>,
        task: tokio::task::JoinHandle<Result<()>>,
        _dir: tempfile::TempDir,
    }

    async fn start(config: ServerConfig) -> Running {
        let dir = tempfile::tempdir().unwrap();
        let mailbox = Arc::new(FrameMailbox::new());
        let state = AppState::new(
            Arc::clone(&mailbox),
            RecordingStore::new(dir.path()),
            Pages::default(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = HttpServer::new(config, state);
        let task = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
        });

        Running {
            addr,
            mailbox,
            shutdown: Some(tx),
            task,
            _dir: dir,
        }
    }

    /// Send a GET and read exactly one response (headers plus body)
    async fn request(stream: &mut TcpStream, path: &str, close: bool) -> String {
        let connection = if close { "close" } else { "keep-alive" };
        let req = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: {}\r\n\r\n",
            path, connection
        );
        stream.write_all(req.as_bytes()).await.unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        let header_end = loop {
            if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            received.extend_from_slice(&buf[..n]);
        };

        let head = String::from_utf8_lossy(&received[..header_end]).to_ascii_lowercase();
        let body_len: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().unwrap())
            .unwrap_or(0);

        while received.len() < header_end + body_len {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before body");
            received.extend_from_slice(&buf[..n]);
        }

        String::from_utf8_lossy(&received).into_owned()
    }

    #[tokio::test]
    async fn test_serves_http() {
        let mut server = start(ServerConfig::default()).await;

        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        let response = request(&mut stream, "/", true).await;

        assert!(response.starts_with("HTTP/1.1 301"), "{}", response);
        assert!(response.to_ascii_lowercase().contains("location: /index.html"));

        server.shutdown.take().unwrap().send(()).unwrap();
        server.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_keep_alive_serves_several_requests() {
        let server = start(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(server.addr).await.unwrap();

        let first = request(&mut stream, "/nope", false).await;
        assert!(first.starts_with("HTTP/1.1 404"), "{}", first);

        let second = request(&mut stream, "/recordings", false).await;
        assert!(second.starts_with("HTTP/1.1 301"), "{}", second);
    }

    #[tokio::test]
    async fn test_live_stream_over_tcp() {
        let server = start(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(server.addr).await.unwrap();

        stream
            .write_all(b"GET /stream.mjpg HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        // Wait until the handler has subscribed, then publish
        tokio::time::timeout(Duration::from_secs(5), async {
            while server.mailbox.subscriber_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        server.mailbox.publish(Bytes::from_static(b"jpeg-bytes"));

        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        let needle = b"Content-Length: 10\r\n\r\njpeg-bytes\r\n";
        tokio::time::timeout(Duration::from_secs(5), async {
            while !received.windows(needle.len()).any(|w| w == needle) {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed early");
                received.extend_from_slice(&buf[..n]);
            }
        })
        .await
        .unwrap();

        let text = String::from_utf8_lossy(&received);
        assert!(text.starts_with("HTTP/1.1 200"));
        assert!(text.contains("multipart/x-mixed-replace; boundary=FRAME"));
        assert!(text.contains("--FRAME\r\nContent-Type: image/jpeg\r\n"));
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let server = start(ServerConfig::default().max_connections(1)).await;

        // First connection holds the only permit
        let mut first = TcpStream::connect(server.addr).await.unwrap();
        let response = request(&mut first, "/index.html", false).await;
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);

        // Second is accepted and immediately dropped
        let mut second = TcpStream::connect(server.addr).await.unwrap();
        let _ = second
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await;
        let mut buf = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), second.read_to_end(&mut buf))
            .await
            .unwrap();
        assert!(read.is_err() || buf.is_empty());

        // The limit does not affect the connection already admitted
        let again = request(&mut first, "/", false).await;
        assert!(again.starts_with("HTTP/1.1 301"), "{}", again);
    }
}
