//! Debug session engine for runtimes speaking the Chrome DevTools Protocol.
//!
//! The engine tracks parsed scripts and their source maps, places
//! breakpoints in original-source coordinates, follows pause/resume state
//! and evaluates expressions in the paused stack.

pub mod breakpoint;
pub mod error;
pub mod evaluate;
pub mod events;
pub mod protocol;
pub mod resolve;
pub mod script;
pub mod session;
pub mod source_map;
pub mod stack;
pub mod state;

pub use breakpoint::{Breakpoint, BreakpointHandle, PendingPlacement};
pub use error::{DebuggerError, SourceMapError};
pub use events::{EngineEvent, EngineEvents, LogMessage, SessionEvent};
pub use protocol::{CallFrame, EvaluationResult, PausedEvent, PropertyDescriptor, RemoteObject};
pub use script::{Script, ScriptRegistry};
pub use session::Debugger;
pub use source_map::PositionMapper;
pub use stack::{ScopeEntry, StackFrame};
pub use state::ExecutionState;
