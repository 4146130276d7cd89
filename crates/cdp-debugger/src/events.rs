//! Events flowing into and out of a debug session.

use cdp_transport::{ChannelEvent, EventReceiver};
use tokio::sync::mpsc;

use crate::error::SourceMapError;
use crate::protocol::{PausedEvent, RemoteObject};
use crate::script::Script;
use crate::source_map::PositionMapper;

/// A console or exception message from the debuggee.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    /// Console API type (`log`, `warning`, ...) or `error` for exceptions.
    pub kind: String,
    pub args: Vec<RemoteObject>,
}

impl LogMessage {
    /// Arguments rendered and joined with spaces.
    pub fn text(&self) -> String {
        self.args
            .iter()
            .map(RemoteObject::describe)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Notifications for the host.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session is connected and domains are enabled. Sent once.
    Ready { domains: Vec<String> },
    /// The channel closed or the session was disconnected. Sent once.
    Closed,
    LogMessage(LogMessage),
    Paused(PausedEvent),
    Resumed,
    /// A script (generated or original) was registered or updated.
    ScriptLoaded(Script),
}

/// Input to [`Debugger::handle`](crate::Debugger::handle).
#[derive(Debug)]
pub enum EngineEvent {
    /// Something arrived on the CDP channel.
    Channel(ChannelEvent),
    /// A background source map load finished.
    SourceMapResolved {
        /// URL of the generated script the map belongs to.
        url: String,
        result: Result<PositionMapper, SourceMapError>,
    },
}

/// The event stream of one session.
///
/// Kept apart from the `Debugger` so a host can wait for the next event
/// while still holding the session mutably.
#[derive(Debug)]
pub struct EngineEvents {
    channel: EventReceiver,
    resolved: mpsc::UnboundedReceiver<EngineEvent>,
    channel_done: bool,
}

impl EngineEvents {
    pub(crate) fn new(
        channel: EventReceiver,
        resolved: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> Self {
        Self {
            channel,
            resolved,
            channel_done: false,
        }
    }

    /// Wait for the next event. Returns `None` once the channel has closed
    /// and its `Closed` event has been delivered.
    pub async fn next(&mut self) -> Option<EngineEvent> {
        if self.channel_done {
            return None;
        }
        tokio::select! {
            event = self.channel.recv() => match event {
                Some(ChannelEvent::Closed) | None => {
                    self.channel_done = true;
                    Some(EngineEvent::Channel(ChannelEvent::Closed))
                }
                Some(event) => Some(EngineEvent::Channel(event)),
            },
            Some(resolved) = self.resolved.recv() => Some(resolved),
        }
    }
}
