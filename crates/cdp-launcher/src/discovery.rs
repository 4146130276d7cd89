//! Endpoint discovery.
//!
//! A runtime started with remote debugging lists its debuggable targets at
//! `GET http://{host}:{port}/json`. The endpoint comes up some time after
//! the process starts, so polling is retried with a fixed delay up to a
//! bounded number of attempts.

use std::time::Duration;

use async_trait::async_trait;
use cdp_config::DiscoveryConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::DiscoveryError;

/// One debuggable target listed by the discovery endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(rename = "type", default)]
    pub page_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_socket_debugger_url: Option<String>,
}

/// Something that lists pages. One call is one poll.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn pages(&self) -> Result<Vec<Page>, DiscoveryError>;
}

/// Lists pages over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
    url: String,
}

impl HttpPageSource {
    pub fn new(host: &str, port: u16, request_timeout: Duration) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("http://{}:{}/json", host, port),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn pages(&self) -> Result<Vec<Page>, DiscoveryError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;
        response
            .json::<Vec<Page>>()
            .await
            .map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))
    }
}

/// Timing of discovery polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first poll.
    pub initial_delay: Duration,
    /// Wait between failed polls.
    pub retry_delay: Duration,
    /// Total polls allowed; values below 1 are treated as 1.
    pub max_attempts: u32,
}

impl From<&DiscoveryConfig> for RetryPolicy {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_attempts: config.max_attempts,
        }
    }
}

/// What to do after a failed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Retry,
    Exhausted,
}

/// Attempt bookkeeping for one discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
    last_error: Option<String>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
        }
    }

    /// Polls started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count a poll as started.
    pub fn begin(&mut self) {
        self.attempts += 1;
    }

    /// Record a failed poll and decide whether another is allowed.
    pub fn fail(&mut self, error: &DiscoveryError) -> RetryOutcome {
        self.last_error = Some(error.to_string());
        if self.attempts >= self.max_attempts {
            RetryOutcome::Exhausted
        } else {
            RetryOutcome::Retry
        }
    }

    /// The terminal error once retries are exhausted.
    pub fn exhausted(self) -> DiscoveryError {
        DiscoveryError::Exhausted {
            attempts: self.attempts,
            last: self.last_error.unwrap_or_default(),
        }
    }
}

/// The socket URL of the first page that has one.
pub fn select_socket_url(pages: &[Page]) -> Option<&str> {
    pages
        .iter()
        .find_map(|p| p.web_socket_debugger_url.as_deref().filter(|u| !u.is_empty()))
}

/// Poll `source` until a page with a debugger socket is listed.
///
/// Failed polls are retried per `policy`. A successful poll that lists no
/// socket fails immediately. Once `stop` turns `true` (or its sender is
/// dropped) no further poll is started.
pub async fn discover_endpoint(
    source: &dyn PageSource,
    policy: &RetryPolicy,
    mut stop: watch::Receiver<bool>,
) -> Result<String, DiscoveryError> {
    let mut retry = RetryState::new(policy.max_attempts);
    let mut delay = policy.initial_delay;

    loop {
        if !wait_unless_stopped(delay, &mut stop).await {
            tracing::debug!("discovery stopped after {} attempts", retry.attempts());
            return Err(DiscoveryError::Stopped);
        }

        retry.begin();
        let polled = tokio::select! {
            polled = source.pages() => polled,
            _ = stop.wait_for(|stopped| *stopped) => return Err(DiscoveryError::Stopped),
        };

        match polled {
            Ok(pages) => {
                let url = select_socket_url(&pages).ok_or(DiscoveryError::NoSocket)?;
                tracing::info!("debugger endpoint discovered: {}", url);
                return Ok(url.to_string());
            }
            Err(e) => {
                tracing::debug!("discovery attempt {} failed: {}", retry.attempts(), e);
                if retry.fail(&e) == RetryOutcome::Exhausted {
                    let err = retry.exhausted();
                    tracing::warn!("{}", err);
                    return Err(err);
                }
            }
        }
        delay = policy.retry_delay;
    }
}

/// Sleep for `delay`. Returns `false` if a stop was requested first.
async fn wait_unless_stopped(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    if *stop.borrow() {
        return false;
    }
    let slept = tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = stop.wait_for(|stopped| *stopped) => false,
    };
    slept && !*stop.borrow()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Fails the first `failures` polls, then lists `pages`.
    struct Flaky {
        failures: u32,
        pages: Vec<Page>,
        polls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, pages: Vec<Page>) -> Self {
            Self {
                failures,
                pages,
                polls: AtomicU32::new(0),
            }
        }

        fn polls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for Flaky {
        async fn pages(&self) -> Result<Vec<Page>, DiscoveryError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(DiscoveryError::Request("connection refused".into()))
            } else {
                Ok(self.pages.clone())
            }
        }
    }

    fn page(url: &str, socket: Option<&str>) -> Page {
        Page {
            page_type: "page".into(),
            url: url.into(),
            web_socket_debugger_url: socket.map(str::to_string),
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(500),
            retry_delay: Duration::from_millis(500),
            max_attempts,
        }
    }

    #[test]
    fn page_deserializes_from_json_listing() {
        let pages: Vec<Page> = serde_json::from_str(
            r#"[{"description":"node.js instance","type":"node","url":"file:///app.js",
                "webSocketDebuggerUrl":"ws://127.0.0.1:9229/abc"}]"#,
        )
        .unwrap();
        assert_eq!(pages[0].page_type, "node");
        assert_eq!(
            pages[0].web_socket_debugger_url.as_deref(),
            Some("ws://127.0.0.1:9229/abc")
        );
    }

    #[test]
    fn first_page_with_socket_is_selected() {
        let pages = vec![
            page("chrome://newtab/", None),
            page("http://a", Some("ws://a")),
            page("http://b", Some("ws://b")),
        ];
        assert_eq!(select_socket_url(&pages), Some("ws://a"));
        assert_eq!(select_socket_url(&[page("x", Some(""))]), None);
        assert_eq!(select_socket_url(&[]), None);
    }

    #[test]
    fn retry_state_exhausts_at_max() {
        let mut state = RetryState::new(2);
        let err = DiscoveryError::Request("refused".into());
        state.begin();
        assert_eq!(state.fail(&err), RetryOutcome::Retry);
        state.begin();
        assert_eq!(state.fail(&err), RetryOutcome::Exhausted);
        assert!(matches!(
            state.exhausted(),
            DiscoveryError::Exhausted { attempts: 2, ref last } if last.contains("refused")
        ));
    }

    #[test]
    fn zero_attempts_means_one() {
        let mut state = RetryState::new(0);
        state.begin();
        assert_eq!(
            state.fail(&DiscoveryError::Request("x".into())),
            RetryOutcome::Exhausted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures_within_budget() {
        let source = Flaky::new(4, vec![page("file:///app.js", Some("ws://h/1"))]);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let url = discover_endpoint(&source, &policy(5), stop_rx).await.unwrap();
        assert_eq!(url, "ws://h/1");
        assert_eq!(source.polls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_when_failures_exceed_budget() {
        let source = Flaky::new(6, vec![page("file:///app.js", Some("ws://h/1"))]);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let err = discover_endpoint(&source, &policy(5), stop_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Exhausted { attempts: 5, .. }));
        assert_eq!(source.polls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_initial_delay_before_first_poll() {
        let source = Flaky::new(0, vec![page("a", Some("ws://a"))]);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let started = tokio::time::Instant::now();
        discover_endpoint(&source, &policy(1), stop_rx).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn no_socket_is_not_retried() {
        let source = Flaky::new(0, vec![page("chrome://newtab/", None)]);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let err = discover_endpoint(&source, &policy(10), stop_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::NoSocket));
        assert_eq!(source.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_poll_prevents_polling() {
        let source = Flaky::new(0, vec![page("a", Some("ws://a"))]);
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send_replace(true);
        let err = discover_endpoint(&source, &policy(10), stop_rx)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Stopped));
        assert_eq!(source.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_retry_delay_prevents_next_poll() {
        let source = Flaky::new(100, Vec::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let stopper = async {
            // First poll happens at 500ms; stop while waiting for the second.
            tokio::time::sleep(Duration::from_millis(700)).await;
            stop_tx.send_replace(true);
        };
        let retry = policy(10);
        let (result, ()) = tokio::join!(discover_endpoint(&source, &retry, stop_rx), stopper);
        assert!(matches!(result, Err(DiscoveryError::Stopped)));
        assert_eq!(source.polls(), 1);
    }

    async fn serve_once(body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
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
        port
    }

    #[tokio::test]
    async fn http_source_lists_pages() {
        let port = serve_once(
            r#"[{"type":"page","url":"about:blank","webSocketDebuggerUrl":"ws://127.0.0.1/devtools/page/1"}]"#,
        )
        .await;
        let source = HttpPageSource::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        assert_eq!(source.url(), format!("http://127.0.0.1:{}/json", port));
        let pages = source.pages().await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(
            select_socket_url(&pages),
            Some("ws://127.0.0.1/devtools/page/1")
        );
    }

    #[tokio::test]
    async fn http_source_rejects_non_json() {
        let port = serve_once("<html>not json</html>").await;
        let source = HttpPageSource::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            source.pages().await,
            Err(DiscoveryError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn http_source_reports_unreachable_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let source = HttpPageSource::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            source.pages().await,
            Err(DiscoveryError::Request(_))
        ));
    }
}
