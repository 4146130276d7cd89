//! Launch profiles: how each kind of debuggee is started.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use cdp_config::{LauncherConfig, RuntimeKind};
use tokio::process::Command;

use crate::error::LaunchError;

/// Options applied to the spawned process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Run the command line through the platform shell.
    pub shell: bool,
    pub cwd: Option<PathBuf>,
    /// Added to the inherited environment.
    pub env: BTreeMap<String, String>,
}

/// Computes the command line for one kind of debuggee.
pub trait LaunchProfile: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Executable to run, if one is known.
    fn binary(&self) -> Option<String>;

    /// Arguments passed to the executable.
    fn arguments(&self) -> Vec<String>;

    fn options(&self) -> ProcessOptions;
}

fn options_from(config: &LauncherConfig) -> ProcessOptions {
    ProcessOptions {
        shell: config.shell,
        cwd: config.cwd.clone(),
        env: config.env.clone(),
    }
}

/// `node --inspect-brk=host:port <program> <args>`.
#[derive(Debug, Clone)]
pub struct NodeProfile {
    config: LauncherConfig,
}

impl NodeProfile {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }
}

impl LaunchProfile for NodeProfile {
    fn name(&self) -> &'static str {
        "node"
    }

    fn binary(&self) -> Option<String> {
        Some(
            self.config
                .binary
                .clone()
                .unwrap_or_else(|| "node".to_string()),
        )
    }

    fn arguments(&self) -> Vec<String> {
        let mut args = vec![format!(
            "--inspect-brk={}:{}",
            self.config.host, self.config.port
        )];
        args.extend(self.config.program.iter().cloned());
        args.extend(self.config.args.iter().cloned());
        args
    }

    fn options(&self) -> ProcessOptions {
        options_from(&self.config)
    }
}

/// Chrome or Chromium with remote debugging enabled. `program` is the
/// start URL.
#[derive(Debug, Clone)]
pub struct ChromeProfile {
    config: LauncherConfig,
}

impl ChromeProfile {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }
}

/// Default Chrome executable for the current platform.
fn default_chrome_binary() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
    } else if cfg!(target_os = "windows") {
        Some("chrome.exe")
    } else if cfg!(unix) {
        Some("google-chrome")
    } else {
        None
    }
}

impl LaunchProfile for ChromeProfile {
    fn name(&self) -> &'static str {
        "chrome"
    }

    fn binary(&self) -> Option<String> {
        self.config
            .binary
            .clone()
            .or_else(|| default_chrome_binary().map(str::to_string))
    }

    fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.config.port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        if self.config.headless {
            args.push("--headless".to_string());
        }
        if let Some(dir) = &self.config.user_data_dir {
            args.push(format!("--user-data-dir={}", dir.display()));
        }
        args.extend(self.config.args.iter().cloned());
        args.extend(self.config.program.iter().cloned());
        args
    }

    fn options(&self) -> ProcessOptions {
        options_from(&self.config)
    }
}

/// Any executable; arguments are passed through verbatim.
#[derive(Debug, Clone)]
pub struct CustomProfile {
    config: LauncherConfig,
}

impl CustomProfile {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }
}

impl LaunchProfile for CustomProfile {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn binary(&self) -> Option<String> {
        self.config.binary.clone()
    }

    fn arguments(&self) -> Vec<String> {
        self.config.args.clone()
    }

    fn options(&self) -> ProcessOptions {
        options_from(&self.config)
    }
}

/// The profile for `config.runtime`.
pub fn profile_for(config: &LauncherConfig) -> Box<dyn LaunchProfile> {
    match config.runtime {
        RuntimeKind::Node => Box::new(NodeProfile::new(config.clone())),
        RuntimeKind::Chrome => Box::new(ChromeProfile::new(config.clone())),
        RuntimeKind::Custom => Box::new(CustomProfile::new(config.clone())),
    }
}

/// Build the process command for `profile` with piped output streams.
///
/// Fails with [`LaunchError::MissingBinary`] when the profile names no
/// executable.
pub fn build_command(profile: &dyn LaunchProfile) -> Result<Command, LaunchError> {
    let binary = profile
        .binary()
        .filter(|b| !b.trim().is_empty())
        .ok_or(LaunchError::MissingBinary)?;
    let args = profile.arguments();
    let options = profile.options();

    let mut command = if options.shell {
        let line = std::iter::once(binary.as_str())
            .chain(args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ");
        shell_command(line)
    } else {
        let mut command = Command::new(&binary);
        command.args(&args);
        command
    };

    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }
    command
        .envs(&options.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    Ok(command)
}

#[cfg(not(windows))]
fn shell_command(line: String) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

#[cfg(windows)]
fn shell_command(line: String) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(line);
    command
}

/// Quote a word for `sh -c` unless it is made of safe characters only.
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use super::*;

    fn config(runtime: RuntimeKind) -> LauncherConfig {
        LauncherConfig {
            runtime,
            ..LauncherConfig::default()
        }
    }

    fn args_of(command: &Command) -> Vec<String> {
        command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn node_profile_breaks_on_first_line() {
        let mut cfg = config(RuntimeKind::Node);
        cfg.program = Some("app.js".into());
        cfg.args = vec!["--verbose".into()];
        let profile = profile_for(&cfg);

        assert_eq!(profile.name(), "node");
        assert_eq!(profile.binary().as_deref(), Some("node"));
        assert_eq!(
            profile.arguments(),
            vec!["--inspect-brk=127.0.0.1:9229", "app.js", "--verbose"]
        );
    }

    #[test]
    fn node_profile_honours_binary_override() {
        let mut cfg = config(RuntimeKind::Node);
        cfg.binary = Some("/opt/node/bin/node".into());
        cfg.port = 9333;
        let profile = NodeProfile::new(cfg);
        assert_eq!(profile.binary().as_deref(), Some("/opt/node/bin/node"));
        assert_eq!(profile.arguments(), vec!["--inspect-brk=127.0.0.1:9333"]);
    }

    #[test]
    fn chrome_profile_arguments() {
        let mut cfg = config(RuntimeKind::Chrome);
        cfg.binary = Some("chromium".into());
        cfg.port = 9222;
        cfg.user_data_dir = Some(PathBuf::from("/tmp/profile"));
        cfg.program = Some("http://localhost:8080".into());
        let profile = profile_for(&cfg);

        let args = profile.arguments();
        assert_eq!(args[0], "--remote-debugging-port=9222");
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("http://localhost:8080"));
    }

    #[test]
    fn chrome_profile_without_headless() {
        let mut cfg = config(RuntimeKind::Chrome);
        cfg.headless = false;
        let args = ChromeProfile::new(cfg).arguments();
        assert!(!args.contains(&"--headless".to_string()));
    }

    #[test]
    fn custom_profile_passes_arguments_verbatim() {
        let mut cfg = config(RuntimeKind::Custom);
        cfg.binary = Some("deno".into());
        cfg.args = vec!["run".into(), "--inspect-brk".into(), "main.ts".into()];
        let profile = profile_for(&cfg);
        assert_eq!(profile.binary().as_deref(), Some("deno"));
        assert_eq!(profile.arguments(), cfg.args);
    }

    #[test]
    fn missing_binary_fails_before_spawn() {
        let profile = CustomProfile::new(config(RuntimeKind::Custom));
        assert!(matches!(
            build_command(&profile),
            Err(LaunchError::MissingBinary)
        ));

        let mut cfg = config(RuntimeKind::Custom);
        cfg.binary = Some("  ".into());
        assert!(matches!(
            build_command(&CustomProfile::new(cfg)),
            Err(LaunchError::MissingBinary)
        ));
    }

    #[test]
    fn direct_command_uses_binary_and_args() {
        let mut cfg = config(RuntimeKind::Custom);
        cfg.binary = Some("deno".into());
        cfg.args = vec!["run".into(), "main.ts".into()];
        cfg.cwd = Some(PathBuf::from("/srv/app"));
        let command = build_command(&CustomProfile::new(cfg)).unwrap();

        assert_eq!(command.as_std().get_program(), OsStr::new("deno"));
        assert_eq!(args_of(&command), vec!["run", "main.ts"]);
        assert_eq!(
            command.as_std().get_current_dir(),
            Some(std::path::Path::new("/srv/app"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn shell_command_quotes_words() {
        let mut cfg = config(RuntimeKind::Custom);
        cfg.binary = Some("node".into());
        cfg.args = vec!["my app.js".into(), "it's".into()];
        cfg.shell = true;
        let command = build_command(&CustomProfile::new(cfg)).unwrap();

        assert_eq!(command.as_std().get_program(), OsStr::new("sh"));
        assert_eq!(
            args_of(&command),
            vec!["-c", r"node 'my app.js' 'it'\''s'"]
        );
    }

    #[test]
    fn env_is_forwarded() {
        let mut cfg = config(RuntimeKind::Custom);
        cfg.binary = Some("deno".into());
        cfg.env.insert("NODE_ENV".into(), "test".into());
        let command = build_command(&CustomProfile::new(cfg)).unwrap();
        let envs: Vec<_> = command.as_std().get_envs().collect();
        assert_eq!(envs, vec![(OsStr::new("NODE_ENV"), Some(OsStr::new("test")))]);
    }

    #[test]
    fn quoting_leaves_safe_words_alone() {
        assert_eq!(shell_quote("--inspect-brk=127.0.0.1:9229"), "--inspect-brk=127.0.0.1:9229");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
    }
}
