//! The debug session engine.
//!
//! A [`Debugger`] owns every piece of session state: the script registry,
//! breakpoints and execution state. All mutation happens from
//! [`Debugger::handle`] and the host-facing methods, which take `&mut self`,
//! so nothing here needs a lock.

use std::sync::Arc;
use std::time::Duration;

use cdp_config::SessionConfig;
use cdp_transport::{ChannelEvent, EventReceiver, Transport, TransportError, WsTransport};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::breakpoint::{Breakpoint, BreakpointHandle, BreakpointManager};
use crate::error::{DebuggerError, SourceMapError};
use crate::evaluate::evaluate_on_frames;
use crate::events::{EngineEvent, EngineEvents, LogMessage, SessionEvent};
use crate::protocol::{
    from_params, EvaluationResult, PausedEvent, PropertyDescriptor, RemoteEvent, RemoteObject,
    ScriptParsedEvent,
};
use crate::resolve::{self, SourceMapLocation};
use crate::script::{is_ignored, Script, ScriptRegistry};
use crate::source_map::PositionMapper;
use crate::stack::{self, ScopeEntry, StackFrame};
use crate::state::ExecutionStateMachine;

/// One debug session against one runtime.
pub struct Debugger {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    scripts: ScriptRegistry,
    breakpoints: BreakpointManager,
    execution: ExecutionStateMachine,
    domains: Vec<String>,
    resolved_tx: mpsc::UnboundedSender<EngineEvent>,
    outbox: Vec<SessionEvent>,
    closed: bool,
}

impl Debugger {
    /// Open a WebSocket to `url` and bootstrap a session on it.
    pub async fn connect(
        url: &str,
        config: SessionConfig,
    ) -> Result<(Self, EngineEvents), DebuggerError> {
        let (transport, events) = WsTransport::connect(url).await?;
        let transport = transport.with_request_timeout(config.command_timeout_secs);
        Self::attach(Arc::new(transport), events, config).await
    }

    /// Bootstrap a session on an already established channel.
    ///
    /// Queries the remote domains, enables the configured ones and releases
    /// a runtime waiting for a debugger. On success a single
    /// [`SessionEvent::Ready`] is queued.
    pub async fn attach(
        transport: Arc<dyn Transport>,
        events: EventReceiver,
        config: SessionConfig,
    ) -> Result<(Self, EngineEvents), DebuggerError> {
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        let mut debugger = Self {
            transport,
            config,
            scripts: ScriptRegistry::new(),
            breakpoints: BreakpointManager::new(),
            execution: ExecutionStateMachine::new(),
            domains: Vec::new(),
            resolved_tx,
            outbox: Vec::new(),
            closed: false,
        };

        if let Err(e) = debugger.bootstrap().await {
            tracing::warn!("session bootstrap failed: {}", e);
            debugger.transport.close().await;
            return Err(e);
        }
        Ok((debugger, EngineEvents::new(events, resolved_rx)))
    }

    async fn bootstrap(&mut self) -> Result<(), DebuggerError> {
        self.domains = match self.transport.call("Schema.getDomains", json!({})).await {
            Ok(result) => domain_names(&result),
            Err(TransportError::Protocol { message, .. }) => {
                tracing::debug!("Schema.getDomains unavailable: {}", message);
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        for domain in &self.config.enable_domains {
            self.transport
                .call(&format!("{}.enable", domain), json!({}))
                .await?;
        }

        if self.config.run_if_waiting_for_debugger {
            match self
                .transport
                .call("Runtime.runIfWaitingForDebugger", json!({}))
                .await
            {
                Ok(_) => {}
                Err(TransportError::Protocol { message, .. }) => {
                    tracing::debug!("Runtime.runIfWaitingForDebugger rejected: {}", message);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.execution.on_connected();
        tracing::info!("debug session ready ({} domains)", self.domains.len());
        self.outbox.push(SessionEvent::Ready {
            domains: self.domains.clone(),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Event processing
    // -----------------------------------------------------------------------

    /// Process one event and return the notifications it produced.
    pub async fn handle(&mut self, event: EngineEvent) -> Vec<SessionEvent> {
        match event {
            EngineEvent::Channel(ChannelEvent::Notification { method, params }) => {
                if self.execution.is_connected() {
                    match RemoteEvent::decode(&method, params) {
                        Ok(remote) => self.on_remote_event(remote).await,
                        Err(e) => tracing::warn!("ignoring malformed {}: {}", method, e),
                    }
                }
            }
            EngineEvent::Channel(ChannelEvent::Closed) => self.on_closed(),
            EngineEvent::SourceMapResolved { url, result } => {
                self.on_source_map_resolved(url, result).await
            }
        }
        self.take_events()
    }

    /// Notifications queued outside of [`handle`](Self::handle), e.g. by
    /// `attach` or `disconnect`.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }

    async fn on_remote_event(&mut self, event: RemoteEvent) {
        match event {
            RemoteEvent::ExceptionThrown(thrown) => {
                self.outbox.push(SessionEvent::LogMessage(LogMessage {
                    kind: "error".to_string(),
                    args: vec![RemoteObject::string(thrown.exception_details.description())],
                }));
            }
            RemoteEvent::ConsoleApiCalled(call) => {
                self.outbox.push(SessionEvent::LogMessage(LogMessage {
                    kind: call.kind,
                    args: call.args,
                }));
            }
            RemoteEvent::Paused(paused) => {
                tracing::debug!(
                    "paused ({}) with {} frames",
                    paused.reason,
                    paused.call_frames.len()
                );
                self.execution.on_paused(paused.call_frames.clone());
                self.outbox.push(SessionEvent::Paused(paused));
            }
            RemoteEvent::Resumed => {
                self.execution.on_resumed();
                self.outbox.push(SessionEvent::Resumed);
            }
            RemoteEvent::ScriptParsed(parsed) => self.on_script_parsed(parsed).await,
            RemoteEvent::Other(method) => tracing::trace!("unhandled event: {}", method),
        }
    }

    async fn on_script_parsed(&mut self, parsed: ScriptParsedEvent) {
        if is_ignored(&parsed.url) {
            tracing::trace!("skipping internal script {:?}", parsed.url);
            return;
        }
        let reference = parsed.source_map_reference().map(str::to_string);
        let script = Script::generated(parsed.script_id, parsed.url, reference.clone());
        let Some(reference) = reference else {
            self.announce(script).await;
            return;
        };

        match resolve::locate(&script.url, &reference) {
            Ok(SourceMapLocation::Inline(json)) => match PositionMapper::parse(&json) {
                Ok(mapper) => self.announce_mapped(script.with_mapper(Arc::new(mapper))).await,
                Err(e) => {
                    tracing::warn!("inline source map of {} unusable: {}", script.url, e);
                    self.announce(script).await;
                }
            },
            Ok(SourceMapLocation::External { file, remote }) => {
                let url = script.url.clone();
                self.announce(script).await;
                let tx = self.resolved_tx.clone();
                let timeout = Duration::from_millis(self.config.source_map_timeout_ms);
                tokio::spawn(async move {
                    let result = resolve::load_external(file, remote, timeout).await;
                    let _ = tx.send(EngineEvent::SourceMapResolved { url, result });
                });
            }
            Err(e) => {
                tracing::warn!("source map of {} unusable: {}", script.url, e);
                self.announce(script).await;
            }
        }
    }

    async fn on_source_map_resolved(
        &mut self,
        url: String,
        result: Result<PositionMapper, SourceMapError>,
    ) {
        if !self.execution.is_connected() {
            tracing::debug!("discarding source map for {} after disconnect", url);
            return;
        }
        let Some(script) = self.scripts.by_url(&url).cloned() else {
            return;
        };
        match result {
            Ok(mapper) => {
                tracing::info!(
                    "source map loaded for {} ({} sources)",
                    url,
                    mapper.sources().len()
                );
                self.announce_mapped(script.with_mapper(Arc::new(mapper)))
                    .await;
            }
            Err(e) => tracing::warn!("source map for {} unavailable: {}", url, e),
        }
    }

    /// Register a mapped generated script and every original it names.
    async fn announce_mapped(&mut self, script: Script) {
        let originals = script.originals();
        self.announce(script).await;
        for original in originals {
            self.announce(original).await;
        }
    }

    /// Register `script`, tell the host, and place breakpoints that were
    /// waiting for it.
    async fn announce(&mut self, script: Script) {
        let stored = self.scripts.register(script).clone();
        tracing::debug!("script loaded: {}", stored.url);
        self.outbox.push(SessionEvent::ScriptLoaded(stored.clone()));

        for request in self.breakpoints.take_pending(&stored.url) {
            let placement = self
                .place(
                    &stored,
                    &request.path,
                    request.line_number,
                    request.condition.clone(),
                )
                .await;
            if let Err(e) = &placement {
                tracing::warn!(
                    "deferred breakpoint {}:{} failed: {}",
                    request.path,
                    request.line_number,
                    e
                );
            }
            request.complete(placement);
        }
    }

    fn on_closed(&mut self) {
        self.execution.on_disconnected();
        self.breakpoints.clear();
        self.scripts.clear();
        if !self.closed {
            self.closed = true;
            tracing::info!("debug session closed");
            self.outbox.push(SessionEvent::Closed);
        }
    }

    // -----------------------------------------------------------------------
    // Breakpoints
    // -----------------------------------------------------------------------

    /// Set a breakpoint at a zero-based line of `path`.
    ///
    /// Any breakpoint already at (path, line) is removed first. If `path`
    /// has not been loaded yet the request is parked and a pending handle
    /// is returned.
    pub async fn add_breakpoint(
        &mut self,
        path: &str,
        line_number: u32,
        condition: Option<String>,
    ) -> Result<BreakpointHandle, DebuggerError> {
        self.require_connected()?;
        self.remove_breakpoint(path, line_number).await?;

        match self.scripts.by_url(path).cloned() {
            Some(script) => self
                .place(&script, path, line_number, condition)
                .await
                .map(BreakpointHandle::Placed),
            None => {
                tracing::debug!(
                    "{} not loaded yet, deferring breakpoint at line {}",
                    path,
                    line_number
                );
                Ok(BreakpointHandle::Pending(self.breakpoints.park(
                    path,
                    line_number,
                    condition,
                )))
            }
        }
    }

    /// Remove the breakpoint at (path, line). Unknown locations are a no-op.
    pub async fn remove_breakpoint(
        &mut self,
        path: &str,
        line_number: u32,
    ) -> Result<(), DebuggerError> {
        if self.breakpoints.drop_pending(path, line_number) {
            return Ok(());
        }
        let Some(breakpoint) = self.breakpoints.take(path, line_number) else {
            return Ok(());
        };
        match self
            .transport
            .call(
                "Debugger.removeBreakpoint",
                json!({ "breakpointId": breakpoint.id }),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(TransportError::Protocol { message, .. }) => {
                tracing::warn!("removing breakpoint {}: {}", breakpoint.id, message);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn place(
        &mut self,
        script: &Script,
        path: &str,
        line_number: u32,
        condition: Option<String>,
    ) -> Result<Breakpoint, DebuggerError> {
        let position =
            script
                .generated_position(line_number)
                .ok_or_else(|| DebuggerError::Unmapped {
                    url: script.url.clone(),
                    line: line_number,
                })?;

        let mut params = json!({
            "url": position.url,
            "lineNumber": position.line_number,
        });
        if let Some(column) = position.column_number {
            params["columnNumber"] = json!(column);
        }
        if let Some(condition) = &condition {
            params["condition"] = json!(condition);
        }

        let method = "Debugger.setBreakpointByUrl";
        let result = self.transport.call(method, params).await?;
        let id = result
            .get("breakpointId")
            .and_then(Value::as_str)
            .ok_or_else(|| DebuggerError::InvalidResponse {
                method: method.to_string(),
                reason: "missing breakpointId".to_string(),
            })?
            .to_string();

        let breakpoint = Breakpoint {
            id,
            url: script.url.clone(),
            line_number,
            column_number: 0,
            condition,
        };
        tracing::info!(
            "breakpoint {} set at {}:{} (remote line {})",
            breakpoint.id,
            breakpoint.url,
            line_number,
            position.line_number
        );
        self.breakpoints.insert(path, breakpoint.clone());
        Ok(breakpoint)
    }

    /// Look up a placed breakpoint by its runtime id.
    pub fn breakpoint_by_id(&self, id: &str) -> Option<&Breakpoint> {
        self.breakpoints.by_id(id)
    }

    /// Placed breakpoints, ordered by URL and line.
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.all()
    }

    /// The stored breakpoints that caused `paused`.
    pub fn hit_breakpoints(&self, paused: &PausedEvent) -> Vec<Breakpoint> {
        self.breakpoints.hit(&paused.hit_breakpoints)
    }

    // -----------------------------------------------------------------------
    // Execution control
    // -----------------------------------------------------------------------

    pub async fn resume(&mut self) -> Result<(), DebuggerError> {
        self.run("Debugger.resume").await
    }

    pub async fn step_over(&mut self) -> Result<(), DebuggerError> {
        self.run("Debugger.stepOver").await
    }

    pub async fn step_into(&mut self) -> Result<(), DebuggerError> {
        self.run("Debugger.stepInto").await
    }

    pub async fn step_out(&mut self) -> Result<(), DebuggerError> {
        self.run("Debugger.stepOut").await
    }

    /// Ask the runtime to pause. State changes when `Debugger.paused` arrives.
    pub async fn pause(&mut self) -> Result<(), DebuggerError> {
        self.require_connected()?;
        self.transport.call("Debugger.pause", json!({})).await?;
        Ok(())
    }

    /// Send a command that lets the debuggee run and mark the session running.
    async fn run(&mut self, method: &str) -> Result<(), DebuggerError> {
        self.require_connected()?;
        self.transport.call(method, json!({})).await?;
        self.execution.on_resumed();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Evaluate `expression` in the paused stack, innermost frame first.
    pub async fn evaluate(&self, expression: &str) -> Result<EvaluationResult, DebuggerError> {
        self.require_connected()?;
        let frames = self.execution.frames().to_vec();
        evaluate_on_frames(self.transport.as_ref(), &frames, expression).await
    }

    /// Own properties of a remote object, without previews.
    pub async fn get_properties(
        &self,
        object_id: &str,
    ) -> Result<Vec<PropertyDescriptor>, DebuggerError> {
        self.require_connected()?;
        let method = "Runtime.getProperties";
        let result = self
            .transport
            .call(
                method,
                json!({
                    "objectId": object_id,
                    "ownProperties": true,
                    "accessorPropertiesOnly": false,
                    "generatePreview": false,
                }),
            )
            .await?;
        let list = result.get("result").cloned().unwrap_or(Value::Array(Vec::new()));
        from_params(method, list)
    }

    /// The paused stack in original coordinates, innermost first.
    pub fn call_stack(&self) -> Vec<StackFrame> {
        stack::call_stack(self.execution.frames(), &self.scripts)
    }

    /// Scopes of the frame at `frame_index`.
    pub fn scope(&self, frame_index: usize) -> Result<Vec<ScopeEntry>, DebuggerError> {
        self.execution
            .frame(frame_index)
            .map(stack::scope_of)
            .ok_or(DebuggerError::NoSuchFrame(frame_index))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Close the channel and drop all session state. Queues
    /// [`SessionEvent::Closed`] unless it was already sent.
    pub async fn disconnect(&mut self) {
        if self.execution.is_connected() {
            self.transport.close().await;
        }
        self.on_closed();
    }

    pub fn is_connected(&self) -> bool {
        self.execution.is_connected()
    }

    pub fn is_paused(&self) -> bool {
        self.execution.is_paused()
    }

    /// Domains reported by `Schema.getDomains`.
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    fn require_connected(&self) -> Result<(), DebuggerError> {
        if self.execution.is_connected() {
            Ok(())
        } else {
            Err(DebuggerError::NotConnected)
        }
    }
}

fn domain_names(result: &Value) -> Vec<String> {
    result
        .get("domains")
        .and_then(Value::as_array)
        .map(|domains| {
            domains
                .iter()
                .filter_map(|d| d.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
