use cdp_debugger::{BreakpointHandle, DebuggerError};

use super::{render, App};

const HELP: &str = "\
commands (lines are 1-based):
  break PATH:LINE [CONDITION]   set a breakpoint (alias: b)
  clear PATH:LINE               remove a breakpoint
  breakpoints                   list breakpoints (alias: bl)
  continue | pause              resume or interrupt execution (alias: c)
  next | step | out             step over, into or out (aliases: n, s, o)
  eval EXPRESSION               evaluate in the paused stack (alias: p)
  stack                         show the call stack (alias: bt)
  scope [FRAME]                 show the scope of a frame
  props OBJECT_ID               list an object's own properties
  scripts                       list loaded scripts
  quit                          disconnect and exit (alias: q)";

/// One console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Break {
        path: String,
        /// Zero-based.
        line: u32,
        condition: Option<String>,
    },
    Clear {
        path: String,
        line: u32,
    },
    Breakpoints,
    Continue,
    Pause,
    Next,
    Step,
    Out,
    Eval(String),
    Stack,
    Scope(usize),
    Props(String),
    Scripts,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub(crate) fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "break" | "b" => {
            let (location, condition) = match rest.split_once(char::is_whitespace) {
                Some((location, condition)) => (location, Some(condition.trim().to_string())),
                None => (rest, None),
            };
            let (path, line) = parse_location(location)?;
            Command::Break {
                path,
                line,
                condition: condition.filter(|c| !c.is_empty()),
            }
        }
        "clear" => {
            let (path, line) = parse_location(rest)?;
            Command::Clear { path, line }
        }
        "breakpoints" | "bl" => Command::Breakpoints,
        "continue" | "c" => Command::Continue,
        "pause" => Command::Pause,
        "next" | "n" => Command::Next,
        "step" | "s" => Command::Step,
        "out" | "o" => Command::Out,
        "eval" | "p" => {
            if rest.is_empty() {
                return Err("usage: eval EXPRESSION".to_string());
            }
            Command::Eval(rest.to_string())
        }
        "stack" | "bt" => Command::Stack,
        "scope" => {
            if rest.is_empty() {
                Command::Scope(0)
            } else {
                let index = rest
                    .parse()
                    .map_err(|_| format!("invalid frame index: {}", rest))?;
                Command::Scope(index)
            }
        }
        "props" => {
            if rest.is_empty() {
                return Err("usage: props OBJECT_ID".to_string());
            }
            Command::Props(rest.to_string())
        }
        "scripts" => Command::Scripts,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {} (try `help`)", other)),
    };
    Ok(Some(command))
}

/// Split `PATH:LINE` on the last colon. `LINE` is one-based on input and
/// returned zero-based.
fn parse_location(location: &str) -> Result<(String, u32), String> {
    let usage = || format!("expected PATH:LINE, got {:?}", location);
    let (path, line) = location.rsplit_once(':').ok_or_else(usage)?;
    let line: u32 = line.parse().map_err(|_| usage())?;
    if path.is_empty() || line == 0 {
        return Err(usage());
    }
    Ok((path.to_string(), line - 1))
}

// =========================================================================
// Command dispatch
// =========================================================================

impl App {
    pub(crate) async fn execute(&mut self, command: Command) -> Result<(), DebuggerError> {
        match command {
            Command::Break {
                path,
                line,
                condition,
            } => match self.debugger.add_breakpoint(&path, line, condition).await? {
                BreakpointHandle::Placed(breakpoint) => {
                    println!("{}", render::describe_breakpoint(&breakpoint));
                }
                BreakpointHandle::Pending(pending) => {
                    println!("{} is not loaded yet; breakpoint pending", path);
                    tokio::spawn(async move {
                        match pending.wait().await {
                            Ok(breakpoint) => {
                                println!("{}", render::describe_breakpoint(&breakpoint))
                            }
                            Err(DebuggerError::BreakpointCancelled) => {}
                            Err(e) => println!("pending breakpoint in {} failed: {}", path, e),
                        }
                    });
                }
            },
            Command::Clear { path, line } => {
                self.debugger.remove_breakpoint(&path, line).await?;
            }
            Command::Breakpoints => {
                let breakpoints = self.debugger.breakpoints();
                if breakpoints.is_empty() {
                    println!("no breakpoints");
                }
                for breakpoint in breakpoints {
                    println!("{}", render::describe_breakpoint(&breakpoint));
                }
            }
            Command::Continue => self.debugger.resume().await?,
            Command::Pause => self.debugger.pause().await?,
            Command::Next => self.debugger.step_over().await?,
            Command::Step => self.debugger.step_into().await?,
            Command::Out => self.debugger.step_out().await?,
            Command::Eval(expression) => {
                let result = self.debugger.evaluate(&expression).await?;
                println!("{}", render::describe_evaluation(&result));
            }
            Command::Stack => {
                println!("{}", render::describe_stack(&self.debugger.call_stack()));
            }
            Command::Scope(index) => {
                println!("{}", render::describe_scope(&self.debugger.scope(index)?));
            }
            Command::Props(object_id) => {
                let properties = self.debugger.get_properties(&object_id).await?;
                println!("{}", render::describe_properties(&properties));
            }
            Command::Scripts => {
                let mut urls: Vec<&str> = self
                    .debugger
                    .scripts()
                    .iter()
                    .map(|script| script.url.as_str())
                    .collect();
                urls.sort_unstable();
                for url in urls {
                    println!("{}", url);
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => self.running = false,
        }
        Ok(())
    }
}
