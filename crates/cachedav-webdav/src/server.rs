//! HTTP server lifecycle management for WebDAV.
//!
//! This module provides the HTTP server that serves WebDAV requests, guards
//! them with optional Basic authentication, and handles the server lifecycle
//! (start, stop).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dav_server::body::Body;
use dav_server::fs::GuardedFileSystem;
use dav_server::memls::MemLs;
use dav_server::DavHandler;
use hyper::body::Incoming;
use hyper::header::{AUTHORIZATION, HeaderValue, WWW_AUTHENTICATE};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::WebDavResult;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Credentials every request must present when authentication is enabled.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicAuth {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Check an `Authorization` header value against these credentials.
    pub fn verify(&self, header: Option<&HeaderValue>) -> bool {
        let Some(value) = header.and_then(|h| h.to_str().ok()) else {
            return false;
        };
        let Some((scheme, encoded)) = value.split_once(' ') else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return false;
        };
        match credentials.split_once(':') {
            Some((user, password)) => user == self.user && password == self.password,
            None => false,
        }
    }
}

/// Configuration for the WebDAV server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 = auto-assign).
    pub port: u16,
    /// Bind address.
    pub bind_address: IpAddr,
    /// Required credentials, if any.
    pub auth: Option<BasicAuth>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            auth: None,
        }
    }
}

/// A running WebDAV server instance.
pub struct WebDavServer {
    /// The actual bound address.
    pub addr: SocketAddr,
    /// Shutdown signal sender.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Server task handle.
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl WebDavServer {
    /// Start a new WebDAV server.
    pub async fn start(
        fs: Box<dyn GuardedFileSystem<()>>,
        config: ServerConfig,
    ) -> WebDavResult<Self> {
        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        info!(addr = %actual_addr, auth = config.auth.is_some(), "Starting WebDAV server");

        let dav_handler = DavHandler::builder()
            .filesystem(fs)
            .locksystem(MemLs::new())
            .build_handler();

        let state = Arc::new(ServiceState {
            handler: dav_handler,
            auth: config.auth,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_handle = tokio::spawn(async move {
            tokio::select! {
                () = run_server(listener, state) => {
                    debug!("Server loop ended");
                }
                _ = shutdown_rx => {
                    info!("Received shutdown signal");
                }
            }
        });

        Ok(Self {
            addr: actual_addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Get the URL for this server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the server.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        info!("WebDAV server stopped");
    }

    /// Stop the server synchronously (for use in Drop).
    fn stop_sync(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for WebDavServer {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

struct ServiceState {
    handler: DavHandler,
    auth: Option<BasicAuth>,
}

fn unauthorized() -> Response<Body> {
    let mut resp = Response::new(Body::from("401 Unauthorized\n".to_string()));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp.headers_mut().insert(
        WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"WebDAV\""),
    );
    resp
}

/// Authenticate, dispatch and log one request.
async fn handle_request(state: Arc<ServiceState>, req: Request<Incoming>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = match &state.auth {
        Some(auth) if !auth.verify(req.headers().get(AUTHORIZATION)) => unauthorized(),
        _ => state.handler.handle(req).await,
    };

    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), "Request failed");
    } else {
        info!(method = %method, path = %path, status = status.as_u16(), "Request served");
    }
    resp
}

/// Run the server accept loop.
async fn run_server(listener: TcpListener, state: Arc<ServiceState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(handle_request(state, req).await) }
                    });

                    if let Err(e) = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        warn!(peer = %peer_addr, error = %e, "HTTP connection error");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}
