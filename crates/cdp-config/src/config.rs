use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which kind of debuggee the launcher starts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    /// `node --inspect-brk`.
    #[default]
    Node,
    /// Chrome / Chromium with `--remote-debugging-port`.
    Chrome,
    /// Any binary; arguments are passed verbatim.
    Custom,
}

/// Log verbosity level.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debug messages.
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How the debuggee process is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Launch profile.
    #[serde(default)]
    pub runtime: RuntimeKind,
    /// Executable to run. Falls back to the profile's default when unset.
    #[serde(default)]
    pub binary: Option<String>,
    /// Script or page handed to the debuggee (node: entry file, chrome: URL).
    #[serde(default)]
    pub program: Option<String>,
    /// Extra arguments appended after the profile's own.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory of the debuggee.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Run the command line through the platform shell.
    #[serde(default)]
    pub shell: bool,
    /// Host the inspector listens on.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the inspector listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Chrome only: run without a window.
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Chrome only: profile directory.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9229
}

fn default_true() -> bool {
    true
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeKind::Node,
            binary: None,
            program: None,
            args: Vec::new(),
            cwd: None,
            shell: false,
            host: default_host(),
            port: default_port(),
            headless: true,
            user_data_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// Polling policy for the `/json` discovery endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Delay before the first poll.
    #[serde(default = "default_delay_ms")]
    pub initial_delay_ms: u64,
    /// Delay between failed polls.
    #[serde(default = "default_delay_ms")]
    pub retry_delay_ms: u64,
    /// Total number of polls before giving up (at least 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_delay_ms() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    10
}

fn default_request_timeout_ms() -> u64 {
    2000
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_delay_ms(),
            retry_delay_ms: default_delay_ms(),
            max_attempts: default_max_attempts(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Debug session behaviour once connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Domains enabled right after connecting, in order.
    #[serde(default = "default_domains")]
    pub enable_domains: Vec<String>,
    /// Send `Runtime.runIfWaitingForDebugger` after enabling domains.
    #[serde(default = "default_true")]
    pub run_if_waiting_for_debugger: bool,
    /// Upper bound for reading or fetching one source map.
    #[serde(default = "default_source_map_timeout_ms")]
    pub source_map_timeout_ms: u64,
    /// How long a single protocol command may wait for its response.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_domains() -> Vec<String> {
    vec!["Runtime".to_string(), "Debugger".to_string()]
}

fn default_source_map_timeout_ms() -> u64 {
    5000
}

fn default_command_timeout_secs() -> u64 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable_domains: default_domains(),
            run_if_waiting_for_debugger: true,
            source_map_timeout_ms: default_source_map_timeout_ms(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Debuggee launch settings.
    #[serde(default)]
    pub launcher: LauncherConfig,
    /// Endpoint discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Session settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}
