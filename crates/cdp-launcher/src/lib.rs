//! cdp-launcher: starts a debuggee and discovers its debugger endpoint.
pub mod discovery;
pub mod error;
pub mod launcher;
pub mod profile;

pub use discovery::{discover_endpoint, HttpPageSource, Page, PageSource, RetryPolicy, RetryState};
pub use error::{DiscoveryError, LaunchError};
pub use launcher::{Launcher, LauncherEvent, LauncherState, StopHandle};
pub use profile::{profile_for, LaunchProfile, ProcessOptions};
