use thiserror::Error;

/// Errors from polling the discovery endpoint.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A single poll could not reach the endpoint.
    #[error("discovery request failed: {0}")]
    Request(String),

    /// The endpoint answered with something other than a page list.
    #[error("invalid discovery response: {0}")]
    InvalidResponse(String),

    /// Pages were listed but none exposes a debugger socket.
    #[error("unable to find page with socket")]
    NoSocket,

    /// Every allowed poll failed.
    #[error("unable to get pages after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of polls made.
        attempts: u32,
        /// Error of the final poll.
        last: String,
    },

    /// Discovery was interrupted by a stop request.
    #[error("discovery stopped")]
    Stopped,
}

/// Errors from starting the debuggee.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The profile has no executable to run.
    #[error("no binary path specified")]
    MissingBinary,

    /// `start` was called while a debuggee is already running.
    #[error("launcher already started")]
    AlreadyStarted,

    /// The process could not be spawned.
    #[error("failed to spawn {binary}: {reason}")]
    Spawn {
        /// Executable that failed.
        binary: String,
        /// OS error text.
        reason: String,
    },

    /// The process exited before its endpoint was discovered.
    #[error("debuggee exited before it was ready (exit code {code:?}): {stderr}")]
    ProcessExited {
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Everything the process wrote to stderr.
        stderr: String,
    },

    /// Endpoint discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
