//! Breakpoint bookkeeping.
//!
//! Placed breakpoints are keyed by the (path, line) they were requested at.
//! Requests for scripts that have not loaded yet are parked per URL and
//! completed through a oneshot once the script is announced.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::DebuggerError;
use crate::script::url_key;

/// A breakpoint acknowledged by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    /// Runtime-assigned id.
    pub id: String,
    pub url: String,
    /// Zero-based line in the requested script.
    pub line_number: u32,
    /// Always 0; breakpoints are matched by line only.
    pub column_number: u32,
    pub condition: Option<String>,
}

/// Outcome delivered to a parked request.
pub type Placement = Result<Breakpoint, DebuggerError>;

/// A request waiting for its script to load.
#[derive(Debug)]
pub struct PendingBreakpoint {
    /// Requested path, as given by the caller.
    pub path: String,
    pub line_number: u32,
    pub condition: Option<String>,
    reply: oneshot::Sender<Placement>,
}

impl PendingBreakpoint {
    /// Report the placement outcome to whoever holds the handle.
    pub fn complete(self, placement: Placement) {
        // The caller may have dropped the handle.
        let _ = self.reply.send(placement);
    }
}

/// Resolves once a parked breakpoint has been placed.
#[derive(Debug)]
pub struct PendingPlacement {
    rx: oneshot::Receiver<Placement>,
}

impl PendingPlacement {
    /// Wait for placement. Fails with [`DebuggerError::BreakpointCancelled`]
    /// when the request is dropped, e.g. on disconnect or replacement.
    pub async fn wait(self) -> Placement {
        self.rx
            .await
            .unwrap_or(Err(DebuggerError::BreakpointCancelled))
    }

    /// Non-blocking check; `None` while still pending.
    pub fn try_result(&mut self) -> Option<Placement> {
        match self.rx.try_recv() {
            Ok(placement) => Some(placement),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(DebuggerError::BreakpointCancelled)),
        }
    }
}

/// What `add_breakpoint` hands back.
#[derive(Debug)]
pub enum BreakpointHandle {
    /// The script was known and the breakpoint is set.
    Placed(Breakpoint),
    /// The script has not loaded yet.
    Pending(PendingPlacement),
}

/// All breakpoints of one session.
#[derive(Debug, Default)]
pub struct BreakpointManager {
    placed: HashMap<(String, u32), Breakpoint>,
    pending: HashMap<String, Vec<PendingBreakpoint>>,
}

fn key(path: &str, line_number: u32) -> (String, u32) {
    (url_key(path).to_string(), line_number)
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a placed breakpoint under the (path, line) it was requested at.
    pub fn insert(&mut self, path: &str, breakpoint: Breakpoint) {
        self.placed
            .insert(key(path, breakpoint.line_number), breakpoint);
    }

    /// Remove and return the placed breakpoint at (path, line).
    pub fn take(&mut self, path: &str, line_number: u32) -> Option<Breakpoint> {
        self.placed.remove(&key(path, line_number))
    }

    /// Park a request until `path` is announced.
    pub fn park(
        &mut self,
        path: &str,
        line_number: u32,
        condition: Option<String>,
    ) -> PendingPlacement {
        let (reply, rx) = oneshot::channel();
        self.pending
            .entry(url_key(path).to_string())
            .or_default()
            .push(PendingBreakpoint {
                path: path.to_string(),
                line_number,
                condition,
                reply,
            });
        PendingPlacement { rx }
    }

    /// Drop a parked request. Returns `true` if one was found.
    pub fn drop_pending(&mut self, path: &str, line_number: u32) -> bool {
        let url = url_key(path);
        let Some(list) = self.pending.get_mut(url) else {
            return false;
        };
        let before = list.len();
        list.retain(|p| p.line_number != line_number);
        let removed = list.len() != before;
        if list.is_empty() {
            self.pending.remove(url);
        }
        removed
    }

    /// Take every request parked for `url`.
    pub fn take_pending(&mut self, url: &str) -> Vec<PendingBreakpoint> {
        self.pending.remove(url_key(url)).unwrap_or_default()
    }

    pub fn by_id(&self, id: &str) -> Option<&Breakpoint> {
        self.placed.values().find(|bp| bp.id == id)
    }

    /// Placed breakpoints ordered by URL then line.
    pub fn all(&self) -> Vec<Breakpoint> {
        let mut all: Vec<_> = self.placed.values().cloned().collect();
        all.sort_by(|a, b| (&a.url, a.line_number).cmp(&(&b.url, b.line_number)));
        all
    }

    /// The stored breakpoints among `ids`, in the given order.
    pub fn hit(&self, ids: &[String]) -> Vec<Breakpoint> {
        ids.iter().filter_map(|id| self.by_id(id)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.placed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Forget everything. Parked requests observe cancellation.
    pub fn clear(&mut self) {
        self.placed.clear();
        self.pending.clear();
    }
}
