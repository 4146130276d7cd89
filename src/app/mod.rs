mod commands;
mod render;

use cdp_debugger::{Debugger, EngineEvent, SessionEvent};
use cdp_launcher::LauncherEvent;

use commands::parse_command;

/// Console state: one debug session and the quit flag.
pub(crate) struct App {
    pub(crate) debugger: Debugger,
    pub(crate) running: bool,
}

impl App {
    pub(crate) fn new(debugger: Debugger) -> Self {
        Self {
            debugger,
            running: true,
        }
    }

    /// Feed one engine event through the session and print the result.
    pub(crate) async fn on_engine_event(&mut self, event: EngineEvent) {
        let events = self.debugger.handle(event).await;
        self.show_session_events(events);
    }

    /// Print notifications queued outside of event handling.
    pub(crate) fn flush(&mut self) {
        let events = self.debugger.take_events();
        self.show_session_events(events);
    }

    fn show_session_events(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match event {
                SessionEvent::Ready { domains } => {
                    println!("{}", render::describe_ready(&domains));
                }
                SessionEvent::Closed => {
                    println!("debugger disconnected");
                    self.running = false;
                }
                SessionEvent::LogMessage(message) => {
                    println!("{}", render::describe_log(&message));
                }
                SessionEvent::Paused(paused) => {
                    let stack = self.debugger.call_stack();
                    let hits = self.debugger.hit_breakpoints(&paused);
                    println!("{}", render::describe_paused(&paused.reason, &stack, &hits));
                }
                SessionEvent::Resumed => println!("resumed"),
                SessionEvent::ScriptLoaded(script) => {
                    tracing::debug!("script loaded: {}", script.url);
                }
            }
        }
    }

    pub(crate) fn show_launcher_event(event: &LauncherEvent) {
        match event {
            LauncherEvent::Output(text) => print!("{}", text),
            LauncherEvent::Error(text) => eprint!("{}", text),
            LauncherEvent::LaunchFailed { code, .. } => {
                println!("debuggee failed to start (exit code {:?})", code);
            }
            LauncherEvent::Stopped { code } => match code {
                Some(code) => println!("debuggee exited with code {}", code),
                None => println!("debuggee stopped"),
            },
        }
    }

    /// Run one line of user input.
    pub(crate) async fn on_input(&mut self, line: &str) {
        match parse_command(line) {
            Ok(Some(command)) => {
                if let Err(e) = self.execute(command).await {
                    println!("error: {}", e);
                }
            }
            Ok(None) => {}
            Err(message) => println!("{}", message),
        }
        self.flush();
    }

    pub(crate) async fn shutdown(&mut self) {
        self.debugger.disconnect().await;
        self.debugger.take_events();
    }
}
