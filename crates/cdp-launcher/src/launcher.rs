//! Debuggee process supervision.
//!
//! [`Launcher::start`] spawns the debuggee, hands its output streams to
//! reader tasks and its [`Child`] to a supervisor task, then discovers the
//! debugger endpoint while watching for an early exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cdp_config::{DiscoveryConfig, LauncherConfig};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::discovery::{discover_endpoint, HttpPageSource, PageSource, RetryPolicy};
use crate::error::LaunchError;
use crate::profile::{build_command, profile_for, LaunchProfile};

/// Lifecycle of a [`Launcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LauncherState {
    #[default]
    Idle,
    /// Spawning the process.
    Starting,
    /// Polling the discovery endpoint.
    Discovering,
    /// The endpoint is known and the process is running.
    Ready,
    /// The last start attempt failed.
    Failed,
}

/// Notifications from the debuggee process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherEvent {
    /// A chunk of stdout.
    Output(String),
    /// A chunk of stderr.
    Error(String),
    /// The process exited before its endpoint was discovered.
    LaunchFailed { code: Option<i32>, stderr: String },
    /// The process is gone. `code` is `None` when it was killed.
    Stopped { code: Option<i32> },
}

/// Requests a stop from outside the task driving the [`Launcher`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Interrupt discovery and kill the debuggee.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Sent to `start` when the process ends before it is ready. Dropped
/// unsent otherwise.
struct Exit {
    code: Option<i32>,
    stderr: String,
}

/// Starts a debuggee and finds its debugger endpoint.
pub struct Launcher {
    profile: Box<dyn LaunchProfile>,
    source: Arc<dyn PageSource>,
    policy: RetryPolicy,
    state: LauncherState,
    events: mpsc::UnboundedSender<LauncherEvent>,
    stop_tx: Arc<watch::Sender<bool>>,
    supervisor: Option<JoinHandle<()>>,
    socket_url: Option<String>,
}

impl Launcher {
    /// A launcher for `config` that discovers over HTTP.
    pub fn new(
        config: &LauncherConfig,
        discovery: &DiscoveryConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LauncherEvent>), LaunchError> {
        let source = HttpPageSource::new(
            &config.host,
            config.port,
            Duration::from_millis(discovery.request_timeout_ms),
        )?;
        Ok(Self::with_parts(
            profile_for(config),
            Arc::new(source),
            RetryPolicy::from(discovery),
        ))
    }

    pub fn with_parts(
        profile: Box<dyn LaunchProfile>,
        source: Arc<dyn PageSource>,
        policy: RetryPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<LauncherEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = watch::channel(false);
        let launcher = Self {
            profile,
            source,
            policy,
            state: LauncherState::Idle,
            events,
            stop_tx: Arc::new(stop_tx),
            supervisor: None,
            socket_url: None,
        };
        (launcher, rx)
    }

    pub fn state(&self) -> LauncherState {
        self.state
    }

    /// The discovered endpoint while `Ready`.
    pub fn socket_url(&self) -> Option<&str> {
        self.socket_url.as_deref()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    /// Spawn the debuggee and return its debugger WebSocket URL.
    ///
    /// Fails if the profile has no binary, the process cannot be spawned,
    /// discovery fails or is stopped, or the process exits first. On any
    /// failure after spawning the process is torn down.
    pub async fn start(&mut self) -> Result<String, LaunchError> {
        if !matches!(self.state, LauncherState::Idle | LauncherState::Failed) {
            return Err(LaunchError::AlreadyStarted);
        }
        self.state = LauncherState::Starting;
        self.stop_tx.send_replace(false);

        let (mut child, binary) = match self.spawn() {
            Ok(spawned) => spawned,
            Err(e) => {
                self.state = LauncherState::Failed;
                return Err(e);
            }
        };
        tracing::info!(
            "started {} debuggee {} (pid {:?})",
            self.profile.name(),
            binary,
            child.id()
        );

        let stderr_log = Arc::new(Mutex::new(String::new()));
        let readers = vec![
            spawn_reader(child.stdout.take(), self.events.clone(), None),
            spawn_reader(
                child.stderr.take(),
                self.events.clone(),
                Some(stderr_log.clone()),
            ),
        ];
        let ready = Arc::new(AtomicBool::new(false));
        let (exit_tx, mut exit_rx) = oneshot::channel();
        self.supervisor = Some(tokio::spawn(supervise(Supervised {
            child,
            readers: readers.into_iter().flatten().collect(),
            stderr_log,
            ready: ready.clone(),
            events: self.events.clone(),
            stop: self.stop_tx.subscribe(),
            exit_tx,
        })));

        self.state = LauncherState::Discovering;
        let discovered = tokio::select! {
            result = discover_endpoint(self.source.as_ref(), &self.policy, self.stop_tx.subscribe()) => {
                result.map_err(LaunchError::from)
            }
            Ok(exit) = &mut exit_rx => {
                Err(LaunchError::ProcessExited { code: exit.code, stderr: exit.stderr })
            }
        };

        match discovered {
            Ok(url) => {
                ready.store(true, Ordering::SeqCst);
                self.state = LauncherState::Ready;
                self.socket_url = Some(url.clone());
                Ok(url)
            }
            Err(e) => {
                tracing::warn!("launch failed: {}", e);
                self.shutdown().await;
                self.state = LauncherState::Failed;
                Err(e)
            }
        }
    }

    fn spawn(&self) -> Result<(Child, String), LaunchError> {
        let mut command = build_command(self.profile.as_ref())?;
        let binary = self.profile.binary().unwrap_or_default();
        tracing::debug!("spawning {} {:?}", binary, self.profile.arguments());
        command
            .kill_on_drop(true)
            .spawn()
            .map(|child| (child, binary.clone()))
            .map_err(|e| LaunchError::Spawn {
                binary,
                reason: e.to_string(),
            })
    }

    /// Stop the debuggee: output readers are torn down before the process
    /// is killed. Always results in one [`LauncherEvent::Stopped`].
    pub async fn stop(&mut self) {
        if !self.shutdown().await {
            let _ = self.events.send(LauncherEvent::Stopped { code: None });
        }
        self.state = LauncherState::Idle;
        self.socket_url = None;
    }

    /// Signal stop and wait for the supervisor. Returns `true` if a
    /// supervisor ran to completion (and so already sent `Stopped`).
    async fn shutdown(&mut self) -> bool {
        self.stop_tx.send_replace(true);
        match self.supervisor.take() {
            Some(handle) => match handle.await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("debuggee supervisor failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("profile", &self.profile.name())
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("socket_url", &self.socket_url)
            .finish()
    }
}

/// Forward a child output stream as events; stderr is also accumulated
/// into `log`.
fn spawn_reader<R>(
    stream: Option<R>,
    events: mpsc::UnboundedSender<LauncherEvent>,
    log: Option<Arc<Mutex<String>>>,
) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut stream = stream?;
    Some(tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            let text = String::from_utf8_lossy(&buf[..n]).into_owned();
            let event = match &log {
                Some(log) => {
                    if let Ok(mut log) = log.lock() {
                        log.push_str(&text);
                    }
                    LauncherEvent::Error(text)
                }
                None => LauncherEvent::Output(text),
            };
            if events.send(event).is_err() {
                return;
            }
        }
    }))
}

/// Upper bound on waiting for output readers once the child has exited.
/// Grandchildren can hold the pipes open indefinitely.
const READER_DRAIN: Duration = Duration::from_millis(250);

/// Let the readers forward what is already buffered, then abort any that
/// have not reached end of stream.
async fn drain_readers(readers: Vec<JoinHandle<()>>) {
    let deadline = tokio::time::Instant::now() + READER_DRAIN;
    for mut reader in readers {
        if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
            tracing::debug!("debuggee output still open after exit");
            reader.abort();
        }
    }
}

struct Supervised {
    child: Child,
    readers: Vec<JoinHandle<()>>,
    stderr_log: Arc<Mutex<String>>,
    ready: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<LauncherEvent>,
    stop: watch::Receiver<bool>,
    exit_tx: oneshot::Sender<Exit>,
}

/// Own the child until it exits or a stop is requested.
async fn supervise(mut s: Supervised) {
    let status = tokio::select! {
        status = s.child.wait() => Some(status),
        _ = s.stop.wait_for(|stopped| *stopped) => None,
    };

    let code = match status {
        Some(status) => {
            drain_readers(s.readers).await;
            let code = status.ok().and_then(|status| status.code());
            if !s.ready.load(Ordering::SeqCst) {
                let stderr = s
                    .stderr_log
                    .lock()
                    .map(|log| log.clone())
                    .unwrap_or_default();
                tracing::warn!("debuggee exited before ready (code {:?})", code);
                let _ = s.events.send(LauncherEvent::LaunchFailed {
                    code,
                    stderr: stderr.clone(),
                });
                let _ = s.exit_tx.send(Exit { code, stderr });
            } else if code != Some(0) {
                tracing::warn!("debuggee exited with code {:?}", code);
            } else {
                tracing::info!("debuggee exited");
            }
            code
        }
        None => {
            for reader in &s.readers {
                reader.abort();
            }
            if let Err(e) = s.child.kill().await {
                tracing::warn!("failed to kill debuggee: {}", e);
            }
            tracing::info!("debuggee stopped");
            None
        }
    };
    let _ = s.events.send(LauncherEvent::Stopped { code });
}
