use std::sync::Mutex;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

use cdp_config::logging::{
    ensure_log_dir, rotate_log_files, DEFAULT_MAX_LOG_FILES, DEFAULT_MAX_LOG_SIZE,
};
use cdp_config::{load_config, load_file, AppPaths, Config};
use cdp_debugger::Debugger;
use cdp_launcher::{Launcher, LauncherEvent};

use crate::app::App;
use crate::CliArgs;

/// Load configuration, start or attach to the debuggee, and run the
/// console until the session ends or the user quits.
pub(crate) async fn run_console(cli: CliArgs) -> Result<()> {
    let paths = AppPaths::new().context("failed to detect home directory")?;

    let mut config = match &cli.config {
        Some(path) => {
            load_file(path).with_context(|| format!("failed to load {}", path.display()))?
        }
        None => {
            let project_dir = std::env::current_dir().ok();
            load_config(&paths.config_dir(), project_dir.as_deref())
                .context("failed to load configuration")?
        }
    };
    if let Some(program) = cli.program {
        config.launcher.program = Some(program);
        config.launcher.args = cli.args;
    }

    init_logging(&config, &paths)?;
    info!(
        "cdp-debug starting, log level: {}",
        config.log.level.as_filter()
    );

    let (mut launcher, mut launcher_events, url) = match cli.attach {
        Some(url) => (None, None, url),
        None => {
            let (mut launcher, events) = Launcher::new(&config.launcher, &config.discovery)
                .context("failed to prepare launcher")?;
            println!(
                "starting {:?} debuggee, waiting for {}:{}",
                config.launcher.runtime, config.launcher.host, config.launcher.port
            );
            let url = match launcher.start().await {
                Ok(url) => url,
                Err(e) => {
                    let mut events = events;
                    while let Ok(event) = events.try_recv() {
                        App::show_launcher_event(&event);
                    }
                    return Err(e).context("failed to launch debuggee");
                }
            };
            (Some(launcher), Some(events), url)
        }
    };

    println!("connecting to {}", url);
    let (debugger, mut events) = Debugger::connect(&url, config.session.clone())
        .await
        .context("failed to connect to debugger")?;

    let mut app = App::new(debugger);
    app.flush();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while app.running {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => app.on_engine_event(event).await,
                None => break,
            },
            Some(event) = next_launcher_event(&mut launcher_events) => {
                App::show_launcher_event(&event);
            }
            line = stdin.next_line() => match line {
                Ok(Some(line)) => app.on_input(&line).await,
                Ok(None) => break,
                Err(e) => {
                    error!("stdin read failed: {}", e);
                    break;
                }
            },
        }
    }

    app.shutdown().await;
    if let Some(launcher) = launcher.as_mut() {
        launcher.stop().await;
    }
    if let Some(events) = launcher_events.as_mut() {
        while let Ok(event) = events.try_recv() {
            App::show_launcher_event(&event);
        }
    }
    info!("cdp-debug exiting");
    Ok(())
}

async fn next_launcher_event(
    events: &mut Option<mpsc::UnboundedReceiver<LauncherEvent>>,
) -> Option<LauncherEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

/// Send tracing output to the log file so it never mixes with the console.
fn init_logging(config: &Config, paths: &AppPaths) -> Result<()> {
    let log_path = config
        .log
        .file
        .clone()
        .unwrap_or_else(|| paths.default_log_file());

    ensure_log_dir(&log_path)
        .with_context(|| format!("failed to create log directory for {}", log_path.display()))?;
    rotate_log_files(&log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES)
        .context("failed to rotate log files")?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = tracing_subscriber::EnvFilter::try_new(config.log.level.as_filter())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_env_filter(env_filter)
        .init();
    Ok(())
}
