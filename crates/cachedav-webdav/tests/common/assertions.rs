//! Custom assertions for WebDAV integration tests.

use crate::common::TestServer;
use reqwest::StatusCode;

/// Assert that a file exists and has the expected content.
pub async fn assert_file_content(server: &TestServer, path: &str, expected: &[u8]) {
    match server.get_bytes(path).await {
        Ok(actual) => {
            assert_eq!(
                actual.as_ref(),
                expected,
                "File content mismatch at {}: expected {} bytes, got {} bytes",
                path,
                expected.len(),
                actual.len()
            );
        }
        Err((status, body)) => {
            panic!("Failed to read file {path}: status={status}, body={body}");
        }
    }
}

/// Assert that a path returns 404 Not Found.
pub async fn assert_not_found(server: &TestServer, path: &str) {
    let resp = server.get(path).await;
    assert_eq!(
        resp.status(),
        StatusCode::NOT_FOUND,
        "Expected 404 for {}, got {}",
        path,
        resp.status()
    );
}

/// Assert that a PROPFIND depth=1 listing mentions exactly these names once.
pub async fn assert_listing(server: &TestServer, path: &str, expected: &[&str]) {
    let (status, body) = server.propfind_body(path, "1").await;
    assert_eq!(status, StatusCode::MULTI_STATUS, "PROPFIND {path} failed: {body}");

    for name in expected {
        let href = format!("{}/{name}", path.trim_end_matches('/'));
        let count = body.matches(&format!("{href}<")).count()
            + body.matches(&format!("{href}/<")).count();
        assert_eq!(count, 1, "Expected exactly one entry for {href} in:\n{body}");
    }

    let responses = body.matches("response>").count() / 2;
    assert_eq!(
        responses,
        expected.len() + 1,
        "Unexpected number of entries in listing of {path}:\n{body}"
    );
}
