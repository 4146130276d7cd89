//! Execution state machine.

use crate::protocol::CallFrame;

/// Whether the debuggee is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionState {
    #[default]
    Running,
    Paused,
}

/// Connection flag, run state and the frames of the current pause.
#[derive(Debug, Default)]
pub struct ExecutionStateMachine {
    connected: bool,
    state: ExecutionState,
    frames: Vec<CallFrame>,
}

impl ExecutionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_paused(&self) -> bool {
        self.state == ExecutionState::Paused
    }

    /// Frames of the current pause, innermost first. Empty while running.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&CallFrame> {
        self.frames.get(index)
    }

    pub fn on_connected(&mut self) {
        self.connected = true;
        self.state = ExecutionState::Running;
        self.frames.clear();
    }

    /// Remote pause: replace the frame list wholesale.
    pub fn on_paused(&mut self, frames: Vec<CallFrame>) {
        self.state = ExecutionState::Paused;
        self.frames = frames;
    }

    /// Remote resume, or a local resume/step that succeeded.
    pub fn on_resumed(&mut self) {
        self.state = ExecutionState::Running;
        self.frames.clear();
    }

    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.state = ExecutionState::Running;
        self.frames.clear();
    }
}
