//! WebDAV client implementing the remote-store capability.
//!
//! Talks plain RFC 4918 over `reqwest`: PROPFIND for stat and listings,
//! ranged GET for reads, MKCOL, DELETE and MOVE for the mutating calls.

use crate::error::{WebDavError, WebDavResult};
use async_trait::async_trait;
use cachedav_core::{EntryInfo, RangeReader, RemoteError, RemoteStore};
use futures::TryStreamExt;
use percent_encoding::percent_decode_str;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RANGE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::fmt;
use std::io;
use std::time::{Duration, SystemTime};
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info, trace, warn};
use url::Url;
use xmltree::{Element, XMLNode};

/// Remote server used when none is configured.
pub const DEFAULT_REMOTE_URL: &str = "https://dav.mypikpak.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:resourcetype/>
    <D:getcontentlength/>
    <D:getlastmodified/>
    <D:displayname/>
  </D:prop>
</D:propfind>"#;

/// Connection settings for the remote WebDAV server.
#[derive(Clone)]
pub struct ClientConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REMOTE_URL.to_string(),
            user: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A remote WebDAV server seen through the [`RemoteStore`] capability.
#[derive(Clone)]
pub struct WebDavClient {
    http: Client,
    base: Url,
    user: Option<String>,
    password: Option<String>,
}

impl fmt::Debug for WebDavClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavClient")
            .field("base", &self.base.as_str())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Depth header values used by PROPFIND.
#[derive(Debug, Clone, Copy)]
enum Depth {
    Zero,
    One,
}

impl Depth {
    fn header(self) -> HeaderValue {
        match self {
            Depth::Zero => HeaderValue::from_static("0"),
            Depth::One => HeaderValue::from_static("1"),
        }
    }
}

/// One `<response>` of a multistatus document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PropEntry {
    /// Decoded path portion of the href, without a trailing slash.
    path: String,
    info: EntryInfo,
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

fn status_error(method: &str, path: &str, status: StatusCode) -> RemoteError {
    if status == StatusCode::NOT_FOUND {
        RemoteError::NotFound {
            path: path.to_string(),
        }
    } else {
        RemoteError::Status {
            method: method.to_string(),
            path: path.to_string(),
            status: status.as_u16(),
        }
    }
}

fn method(name: &'static str) -> Result<Method, RemoteError> {
    Method::from_bytes(name.as_bytes()).map_err(|e| RemoteError::Transport(e.to_string()))
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Decoded path of an href, which may be absolute or server-relative.
fn href_path(href: &str) -> String {
    let raw = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.to_string(),
    };
    let decoded = decode(&raw);
    let trimmed = decoded.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn as_element(node: &XMLNode) -> Option<&Element> {
    match node {
        XMLNode::Element(e) => Some(e),
        _ => None,
    }
}

fn children<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    element
        .children
        .iter()
        .filter_map(as_element)
        .filter(move |e| e.name == name)
}

fn child_text(element: &Element, name: &str) -> Option<String> {
    children(element, name)
        .next()
        .and_then(Element::get_text)
        .map(|t| t.trim().to_string())
}

/// A propstat applies unless its status line says otherwise.
fn propstat_ok(propstat: &Element) -> bool {
    child_text(propstat, "status").is_none_or(|s| s.contains(" 200"))
}

/// `base_path` is the decoded path of the configured root, whose entry is unnamed.
fn parse_response(response: &Element, base_path: &str) -> Option<PropEntry> {
    let href = child_text(response, "href")?;
    let path = href_path(&href);
    let name = if path == base_path {
        String::new()
    } else {
        path.rsplit('/').next().unwrap_or_default().to_string()
    };

    let prop = children(response, "propstat")
        .filter(|ps| propstat_ok(ps))
        .find_map(|ps| children(ps, "prop").next())?;

    let is_dir = children(prop, "resourcetype")
        .next()
        .is_some_and(|rt| children(rt, "collection").next().is_some());
    let modified = child_text(prop, "getlastmodified")
        .and_then(|t| httpdate::parse_http_date(&t).ok())
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let info = if is_dir {
        EntryInfo::directory(name)
    } else {
        let size = child_text(prop, "getcontentlength")
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(0);
        EntryInfo::file(name, size)
    };

    Some(PropEntry {
        path,
        info: info.with_modified(modified),
    })
}

/// Parse a `207 Multi-Status` body.
fn parse_multistatus(
    body: &[u8],
    path: &str,
    base_path: &str,
) -> Result<Vec<PropEntry>, RemoteError> {
    let root = Element::parse(body).map_err(|e| RemoteError::InvalidResponse {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    if root.name != "multistatus" {
        return Err(RemoteError::InvalidResponse {
            path: path.to_string(),
            reason: format!("unexpected root element <{}>", root.name),
        });
    }
    Ok(children(&root, "response")
        .filter_map(|r| parse_response(r, base_path))
        .collect())
}

impl WebDavClient {
    /// Build a client; no request is made until [`WebDavClient::connect`].
    pub fn new(config: ClientConfig) -> WebDavResult<Self> {
        let mut base = Url::parse(&config.url).map_err(|e| WebDavError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(WebDavError::InvalidUrl {
                url: config.url,
                reason: "expected an http(s) URL".to_string(),
            });
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base,
            user: config.user.filter(|u| !u.is_empty()),
            password: config.password,
        })
    }

    /// Check that the server is reachable and accepts the credentials.
    pub async fn connect(&self) -> WebDavResult<()> {
        let root = self.stat("/").await?;
        info!(url = %self.base, is_dir = root.is_dir, "Connected to remote WebDAV server");
        Ok(())
    }

    /// Absolute URL of a proxy path. Collections get a trailing slash.
    fn url_for(&self, path: &str, collection: bool) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| RemoteError::InvalidResponse {
                path: path.to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if collection {
                segments.push("");
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.user {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    async fn propfind(&self, path: &str, depth: Depth) -> Result<Vec<PropEntry>, RemoteError> {
        let url = self.url_for(path, matches!(depth, Depth::One))?;
        let mut headers = HeaderMap::new();
        headers.insert("Depth", depth.header());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml; charset=utf-8"));

        trace!(url = %url, ?depth, "PROPFIND");
        let resp = self
            .request(method("PROPFIND")?, url)
            .headers(headers)
            .body(PROPFIND_BODY)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status != StatusCode::MULTI_STATUS {
            return Err(status_error("PROPFIND", path, status));
        }
        let body = resp.bytes().await.map_err(transport)?;
        parse_multistatus(&body, path, &href_path(self.base.path()))
    }

    async fn mkcol(&self, path: &str) -> Result<StatusCode, RemoteError> {
        let url = self.url_for(path, true)?;
        let resp = self
            .request(method("MKCOL")?, url)
            .send()
            .await
            .map_err(transport)?;
        Ok(resp.status())
    }

    /// Wrap a GET body as a reader positioned at `offset`.
    async fn range_body(
        resp: Response,
        offset: u64,
        length: Option<u64>,
        skip: bool,
    ) -> Result<RangeReader, RemoteError> {
        let stream = Box::pin(resp.bytes_stream().map_err(io::Error::other));
        let mut reader = StreamReader::new(stream);
        if skip && offset > 0 {
            let skipped = tokio::io::copy(&mut (&mut reader).take(offset), &mut tokio::io::sink())
                .await?;
            trace!(skipped, "Discarded bytes before requested offset");
        }
        Ok(Box::pin(reader.take(length.unwrap_or(u64::MAX))))
    }
}

#[async_trait]
impl RemoteStore for WebDavClient {
    async fn stat(&self, path: &str) -> Result<EntryInfo, RemoteError> {
        let entries = self.propfind(path, Depth::Zero).await?;
        entries
            .into_iter()
            .next()
            .map(|e| e.info)
            .ok_or_else(|| RemoteError::InvalidResponse {
                path: path.to_string(),
                reason: "multistatus without a usable response".to_string(),
            })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<EntryInfo>, RemoteError> {
        let entries = self.propfind(path, Depth::One).await?;

        let target = self.url_for(path, false)?;
        let target = href_path(target.path());

        let has_self = entries.iter().any(|e| e.path == target);
        let listing: Vec<EntryInfo> = entries
            .into_iter()
            .filter(|e| !has_self || e.path != target)
            .map(|e| e.info)
            .collect();
        debug!(path = %path, count = listing.len(), "Remote listing");
        Ok(listing)
    }

    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<RangeReader, RemoteError> {
        let url = self.url_for(path, false)?;
        let range = match length {
            Some(0) => return Ok(Box::pin(tokio::io::empty())),
            Some(len) => format!("bytes={}-{}", offset, offset.saturating_add(len - 1)),
            None => format!("bytes={offset}-"),
        };

        trace!(url = %url, range = %range, "GET");
        let resp = self
            .request(Method::GET, url)
            .header(RANGE, range)
            .send()
            .await
            .map_err(transport)?;

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => Self::range_body(resp, offset, length, false).await,
            StatusCode::OK => {
                debug!(path = %path, offset, "Server ignored Range header, skipping locally");
                Self::range_body(resp, offset, length, true).await
            }
            StatusCode::RANGE_NOT_SATISFIABLE => Ok(Box::pin(tokio::io::empty())),
            status => Err(status_error("GET", path, status)),
        }
    }

    async fn mkdir_all(&self, path: &str, _mode: u32) -> Result<(), RemoteError> {
        if path.trim_matches('/').is_empty() {
            return Ok(());
        }

        let status = self.mkcol(path).await?;
        if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(());
        }
        if status != StatusCode::CONFLICT {
            return Err(status_error("MKCOL", path, status));
        }

        // Missing parent: create each ancestor in turn, then the target.
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            let status = self.mkcol(&current).await?;
            if !status.is_success() && status != StatusCode::METHOD_NOT_ALLOWED {
                warn!(path = %current, status = status.as_u16(), "MKCOL failed");
                return Err(status_error("MKCOL", &current, status));
            }
        }
        Ok(())
    }

    async fn remove_all(&self, path: &str) -> Result<(), RemoteError> {
        let url = self.url_for(path, false)?;
        let resp = self
            .request(Method::DELETE, url)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(status_error("DELETE", path, status))
        }
    }

    async fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<(), RemoteError> {
        let source = self.url_for(from, false)?;
        let destination = self.url_for(to, false)?;
        let resp = self
            .request(method("MOVE")?, source)
            .header("Destination", destination.as_str())
            .header("Overwrite", if overwrite { "T" } else { "F" })
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error("MOVE", from, status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/dav/Movies/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
        <d:getlastmodified>Tue, 15 Nov 1994 08:12:31 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/Movies/The%20Film.mkv</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype/>
        <d:getcontentlength>1048576</d:getcontentlength>
        <d:getlastmodified>Tue, 15 Nov 1994 08:12:31 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
    <d:propstat>
      <d:prop><d:displayname/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>http://example.com/dav/Movies/Extras/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    fn client(url: &str) -> WebDavClient {
        WebDavClient::new(ClientConfig {
            url: url.to_string(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_multistatus() {
        let entries = parse_multistatus(LISTING.as_bytes(), "/Movies", "/dav").unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].path, "/dav/Movies");
        assert!(entries[0].info.is_dir);
        assert_eq!(
            entries[0].info.modified,
            SystemTime::UNIX_EPOCH + Duration::from_secs(784_887_151)
        );

        assert_eq!(entries[1].info.name, "The Film.mkv");
        assert_eq!(entries[1].info.size, 1_048_576);
        assert!(!entries[1].info.is_dir);

        assert_eq!(entries[2].path, "/dav/Movies/Extras");
        assert_eq!(entries[2].info.name, "Extras");
        assert!(entries[2].info.is_dir);
    }

    #[test]
    fn test_parse_root_entry_is_unnamed() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>https://host/dav/</d:href>
    <d:propstat>
      <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/dav/</d:href>
    <d:propstat>
      <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        let c = client("https://host/dav/");
        let base = href_path(c.base.path());
        assert_eq!(base, "/dav");

        let entries = parse_multistatus(body.as_bytes(), "/", &base).unwrap();
        assert_eq!(entries[0].path, "/dav");
        assert_eq!(entries[0].info.name, "");
        assert!(entries[0].info.is_dir);
        assert_eq!(entries[1].info.name, "dav");

        let plain = client("https://host");
        let entries = parse_multistatus(body.as_bytes(), "/", &href_path(plain.base.path())).unwrap();
        assert_eq!(entries[0].info.name, "dav");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_multistatus(b"not xml", "/x", "/"),
            Err(RemoteError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_multistatus(b"<html><body/></html>", "/x", "/"),
            Err(RemoteError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_href_path() {
        assert_eq!(href_path("/"), "/");
        assert_eq!(href_path("/a/b%20c/"), "/a/b c");
        assert_eq!(href_path("https://host:8443/dav/x.txt"), "/dav/x.txt");
    }

    #[test]
    fn test_url_for() {
        let c = client("https://dav.example.com/dav");
        assert_eq!(
            c.url_for("/Movies/The Film.mkv", false).unwrap().as_str(),
            "https://dav.example.com/dav/Movies/The%20Film.mkv"
        );
        assert_eq!(
            c.url_for("/Movies", true).unwrap().as_str(),
            "https://dav.example.com/dav/Movies/"
        );
        assert_eq!(c.url_for("/", true).unwrap().as_str(), "https://dav.example.com/dav/");

        let root = client("https://dav.example.com");
        assert_eq!(root.url_for("/a", false).unwrap().as_str(), "https://dav.example.com/a");
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            WebDavClient::new(ClientConfig {
                url: "ftp://example.com".into(),
                ..ClientConfig::default()
            }),
            Err(WebDavError::InvalidUrl { .. })
        ));
        assert!(matches!(
            WebDavClient::new(ClientConfig {
                url: "not a url".into(),
                ..ClientConfig::default()
            }),
            Err(WebDavError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = ClientConfig {
            password: Some("hunter2".into()),
            ..ClientConfig::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
