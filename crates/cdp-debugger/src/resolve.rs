//! Locating and loading the source map a script refers to.
//!
//! A `sourceMapURL` is tried through exactly one of three channels, in
//! order: an inline base64 `data:` URL, a file next to the script, or the
//! reference resolved against the script's http(s) URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Url;

use crate::error::SourceMapError;
use crate::source_map::PositionMapper;

/// Where a script's source map can be found.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceMapLocation {
    /// Embedded in the reference; already decoded JSON.
    Inline(String),
    /// Must be read or fetched. The file is tried first, then the URL.
    External {
        file: Option<PathBuf>,
        remote: Option<Url>,
    },
}

/// Work out where the map named by `reference` lives for a script loaded
/// from `script_url`.
pub fn locate(script_url: &str, reference: &str) -> Result<SourceMapLocation, SourceMapError> {
    if reference.starts_with("data:") {
        return decode_data_url(reference).map(SourceMapLocation::Inline);
    }

    let file = file_candidate(script_url, reference);
    let remote = remote_candidate(script_url, reference);
    if file.is_none() && remote.is_none() {
        return Err(SourceMapError::Unresolvable {
            reference: reference.to_string(),
            script: script_url.to_string(),
        });
    }
    Ok(SourceMapLocation::External { file, remote })
}

/// Decode `data:application/json;base64,<payload>`.
pub fn decode_data_url(reference: &str) -> Result<String, SourceMapError> {
    let body = reference
        .strip_prefix("data:")
        .ok_or_else(|| SourceMapError::DataUrl("missing data: prefix".into()))?;
    let (header, payload) = body
        .split_once(',')
        .ok_or_else(|| SourceMapError::DataUrl("missing payload separator".into()))?;
    if !header.split(';').any(|part| part == "base64") {
        return Err(SourceMapError::DataUrl(
            "only base64 payloads are supported".into(),
        ));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| SourceMapError::DataUrl(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SourceMapError::DataUrl(e.to_string()))
}

/// Read `file`, falling back to fetching `remote`, within `timeout`.
pub async fn load_external(
    file: Option<PathBuf>,
    remote: Option<Url>,
    timeout: Duration,
) -> Result<PositionMapper, SourceMapError> {
    let attempt = async {
        let mut last_error = None;
        if let Some(path) = file {
            match read_file(&path).await {
                Ok(mapper) => return Ok(mapper),
                Err(e) => {
                    tracing::debug!("source map file unavailable: {}", e);
                    last_error = Some(e);
                }
            }
        }
        if let Some(url) = remote {
            return fetch(url, timeout).await;
        }
        Err(last_error.unwrap_or(SourceMapError::Unresolvable {
            reference: String::new(),
            script: String::new(),
        }))
    };

    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| SourceMapError::Timeout(timeout.as_millis() as u64))?
}

async fn read_file(path: &Path) -> Result<PositionMapper, SourceMapError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceMapError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    PositionMapper::parse(&text)
}

async fn fetch(url: Url, timeout: Duration) -> Result<PositionMapper, SourceMapError> {
    let fetch_error = |e: reqwest::Error| SourceMapError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    };
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(fetch_error)?;
    let text = client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(fetch_error)?
        .text()
        .await
        .map_err(fetch_error)?;
    PositionMapper::parse(&text)
}

fn scheme_of(url: &str) -> Option<&str> {
    url.split_once("://").map(|(scheme, _)| scheme)
}

fn file_candidate(script_url: &str, reference: &str) -> Option<PathBuf> {
    if scheme_of(reference).is_some() {
        return None;
    }
    let script_path = match scheme_of(script_url) {
        None => script_url,
        Some("file") => script_url.strip_prefix("file://")?,
        Some(_) => return None,
    };
    let dir = Path::new(script_path).parent()?;
    Some(dir.join(reference))
}

fn remote_candidate(script_url: &str, reference: &str) -> Option<Url> {
    let resolved = match Url::parse(script_url) {
        Ok(base) if scheme_of(script_url).is_some() => base.join(reference).ok()?,
        _ => Url::parse(reference).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const MAP: &str = r#"{"version":3,"sources":["app.ts"],"names":[],"mappings":"AAAA"}"#;

    #[test]
    fn locate_inline_map() {
        let reference = format!("data:application/json;charset=utf-8;base64,{}", STANDARD.encode(MAP));
        assert_eq!(
            locate("file:///app/app.js", &reference).unwrap(),
            SourceMapLocation::Inline(MAP.to_string())
        );
    }

    #[test]
    fn inline_map_must_be_base64() {
        let err = locate("file:///app/app.js", "data:application/json,{}").unwrap_err();
        assert!(matches!(err, SourceMapError::DataUrl(_)));
    }

    #[test]
    fn locate_file_next_to_file_url_script() {
        let location = locate("file:///app/dist/app.js", "app.js.map").unwrap();
        assert_eq!(
            location,
            SourceMapLocation::External {
                file: Some(PathBuf::from("/app/dist/app.js.map")),
                remote: None,
            }
        );
    }

    #[test]
    fn locate_file_next_to_plain_path_script() {
        let location = locate("/app/dist/app.js", "../maps/app.js.map").unwrap();
        assert_eq!(
            location,
            SourceMapLocation::External {
                file: Some(PathBuf::from("/app/dist/../maps/app.js.map")),
                remote: None,
            }
        );
    }

    #[test]
    fn locate_remote_for_http_script() {
        let location = locate("http://localhost:8080/js/app.js", "app.js.map").unwrap();
        assert_eq!(
            location,
            SourceMapLocation::External {
                file: None,
                remote: Some(Url::parse("http://localhost:8080/js/app.js.map").unwrap()),
            }
        );
    }

    #[test]
    fn locate_unresolvable_reference() {
        let err = locate("chrome://settings/app.js", "app.js.map").unwrap_err();
        assert!(matches!(err, SourceMapError::Unresolvable { .. }));
    }

    #[tokio::test]
    async fn load_external_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.js.map");
        std::fs::write(&path, MAP).unwrap();

        let mapper = load_external(Some(path), None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(mapper.sources(), &["app.ts"]);
    }

    #[tokio::test]
    async fn load_external_missing_file_without_remote_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_external(
            Some(dir.path().join("missing.map")),
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SourceMapError::Read { .. }));
    }

    /// Serve `body` once as an HTTP/1.1 200 response.
    async fn serve_once(body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        Url::parse(&format!("http://{}/app.js.map", addr)).unwrap()
    }

    #[tokio::test]
    async fn load_external_falls_back_to_remote() {
        let dir = tempfile::TempDir::new().unwrap();
        let url = serve_once(MAP).await;
        let mapper = load_external(
            Some(dir.path().join("missing.map")),
            Some(url),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(mapper.sources(), &["app.ts"]);
    }

    #[tokio::test]
    async fn load_external_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and never answer.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let url = Url::parse(&format!("http://{}/slow.map", addr)).unwrap();
        let err = load_external(None, Some(url), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SourceMapError::Timeout(200) | SourceMapError::Fetch { .. }
        ));
    }
}
