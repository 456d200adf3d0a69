//! Test server harness for WebDAV integration tests.
//!
//! Provides a `TestServer` that runs a `WebDavServer` on an ephemeral port
//! over either a hybrid filesystem (temporary cache dir + in-memory remote)
//! or a plain dav-server `LocalFs`, along with HTTP convenience methods.

use bytes::Bytes;
use cachedav_core::testing::MemoryRemote;
use cachedav_core::{CacheDir, HybridFs};
use cachedav_webdav::{BasicAuth, HybridDav, ServerConfig, WebDavServer};
use dav_server::fs::GuardedFileSystem;
use dav_server::localfs::LocalFs;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Credentials used by the authenticated server variant.
pub const TEST_USER: &str = "proxy-user";
pub const TEST_PASS: &str = "proxy-pass";

/// Test server with HTTP client and automatic cleanup.
pub struct TestServer {
    /// The running WebDAV server.
    server: WebDavServer,
    /// HTTP client for making requests.
    client: Client,
    /// Credentials attached to every request, if any.
    credentials: Option<(String, String)>,
    /// Base URL for the server.
    pub base_url: String,
    /// Remote double behind the hybrid filesystem (hybrid servers only).
    pub remote: Arc<MemoryRemote>,
    /// Temporary directory (cleaned up on drop).
    temp_dir: TempDir,
}

fn local_config(auth: Option<BasicAuth>) -> ServerConfig {
    ServerConfig {
        port: 0,
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        auth,
    }
}

impl TestServer {
    /// Serve a hybrid filesystem over a fresh cache dir and `remote`.
    pub async fn hybrid(remote: MemoryRemote) -> Self {
        Self::hybrid_with_auth(remote, None).await
    }

    /// Serve a hybrid filesystem that requires Basic authentication.
    pub async fn hybrid_with_auth(remote: MemoryRemote, auth: Option<BasicAuth>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let remote = Arc::new(remote);
        let fs = HybridFs::new(Arc::new(CacheDir::new(temp_dir.path())), remote.clone());
        Self::start(Box::new(HybridDav::new(fs)), auth, remote, temp_dir).await
    }

    /// Serve a temp directory through dav-server's own `LocalFs`.
    ///
    /// Used as a stand-in upstream for exercising `WebDavClient`.
    pub async fn local_upstream() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let fs = LocalFs::new(temp_dir.path(), false, false, false);
        Self::start(fs, None, Arc::new(MemoryRemote::new()), temp_dir).await
    }

    async fn start(
        fs: Box<dyn GuardedFileSystem<()>>,
        auth: Option<BasicAuth>,
        remote: Arc<MemoryRemote>,
        temp_dir: TempDir,
    ) -> Self {
        let credentials = auth.as_ref().map(|a| (a.user.clone(), a.password.clone()));
        let server = WebDavServer::start(fs, local_config(auth))
            .await
            .expect("Failed to start WebDAV server");

        let base_url = server.url();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let test_server = Self {
            server,
            client,
            credentials,
            base_url,
            remote,
            temp_dir,
        };
        test_server.wait_ready().await;
        test_server
    }

    /// Wait for the server to be ready to accept connections.
    async fn wait_ready(&self) {
        for _ in 0..50 {
            if self
                .request(Method::OPTIONS, "/")
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready in time");
    }

    /// Root of the cache (or upstream) directory on disk.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Location of a `/`-rooted path on disk.
    pub fn disk_path(&self, path: &str) -> PathBuf {
        self.root().join(path.trim_start_matches('/'))
    }

    /// Write a file directly into the directory on disk.
    pub fn write_disk(&self, path: &str, content: &[u8]) {
        let target = self.disk_path(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(target, content).expect("Failed to write file");
    }

    /// Build a full URL from a path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.credentials {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    /// A request without the configured credentials.
    pub fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    // ========== HTTP Convenience Methods ==========

    /// GET a file's contents.
    pub async fn get(&self, path: &str) -> Response {
        self.request(Method::GET, path)
            .send()
            .await
            .expect("GET request failed")
    }

    /// GET a file's contents as bytes.
    pub async fn get_bytes(&self, path: &str) -> Result<Bytes, (StatusCode, String)> {
        let resp = self.get(path).await;
        let status = resp.status();
        if status.is_success() {
            Ok(resp.bytes().await.expect("Failed to read response bytes"))
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err((status, body))
        }
    }

    /// GET with a Range header.
    pub async fn get_range(&self, path: &str, range: &str) -> Response {
        self.request(Method::GET, path)
            .header("Range", range)
            .send()
            .await
            .expect("GET request failed")
    }

    /// PUT file contents.
    pub async fn put(&self, path: &str, body: impl Into<reqwest::Body>) -> Response {
        self.request(Method::PUT, path)
            .body(body)
            .send()
            .await
            .expect("PUT request failed")
    }

    /// DELETE a file or directory.
    pub async fn delete(&self, path: &str) -> Response {
        self.request(Method::DELETE, path)
            .send()
            .await
            .expect("DELETE request failed")
    }

    /// MKCOL (create directory).
    pub async fn mkcol(&self, path: &str) -> Response {
        self.request(Method::from_bytes(b"MKCOL").unwrap(), path)
            .send()
            .await
            .expect("MKCOL request failed")
    }

    /// PROPFIND and return body as string.
    pub async fn propfind_body(&self, path: &str, depth: &str) -> (StatusCode, String) {
        let resp = self
            .request(Method::from_bytes(b"PROPFIND").unwrap(), path)
            .header("Depth", depth)
            .send()
            .await
            .expect("PROPFIND request failed");
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        (status, body)
    }

    /// MOVE a file or directory.
    pub async fn move_(&self, from: &str, to: &str, overwrite: bool) -> Response {
        self.request(Method::from_bytes(b"MOVE").unwrap(), from)
            .header("Destination", self.url(to))
            .header("Overwrite", if overwrite { "T" } else { "F" })
            .send()
            .await
            .expect("MOVE request failed")
    }

    /// Stop the server explicitly (otherwise happens on drop).
    pub async fn stop(self) {
        self.server.stop().await;
    }
}
