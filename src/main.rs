use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console_relay::adapter::{log_notifications, NotifyingLogger};
use console_relay::config::Config;
use console_relay::events::Severity;
use console_relay::sink::{ConsoleSink, InterceptedSink, Sink};
use console_relay::NotificationEngine;
use log::{debug, info, warn};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Prefix marking a piped line as a manual notification
const NOTIFY_PREFIX: &str = "!notify ";

/// Lines buffered between the stdin reader thread and the relay loop
const LINE_BUFFER: usize = 64;

/// Command-line arguments for the console relay
#[derive(Parser)]
#[command(
    name = "console-relay",
    about = "Relay critical console output to text, call, webhook and log channels",
    long_about = "Intercepts diagnostic output, escalates warnings and errors that contain \
                  critical keywords, and relays them to configured notification channels \
                  under a sliding-window rate limit."
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Configuration preset used when no file is given
    #[arg(long, default_value = "default", global = true)]
    preset: String,

    /// Enable verbose logging output (sets the default filter to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter configuration file
    Init {
        /// Phone number for notifications
        #[arg(long)]
        phone: Option<String>,
        /// Webhook URL for notifications
        #[arg(long)]
        webhook: Option<String>,
        /// Where to write the configuration
        #[arg(short, long, default_value = "console-relay.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Send a test error and a manual notification
    Test {
        /// Phone number for notifications
        #[arg(long)]
        phone: Option<String>,
        /// Webhook URL for notifications
        #[arg(long)]
        webhook: Option<String>,
        /// Disable the text and call channels
        #[arg(long)]
        dry_run: bool,
    },
    /// Relay stdin lines through the console, notifying on critical ones
    Pipe {
        /// Severity assigned to every piped line
        #[arg(long, default_value = "error")]
        severity: Severity,
    },
}

/// Load configuration from file or preset, then apply environment overrides
fn load_config(path: Option<&Path>, preset: &str) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::preset(preset)?,
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Build the engine and route the `log` facade through it
fn start_engine(config: Config, verbose: bool) -> Result<Arc<NotificationEngine>> {
    let default_filter = if verbose {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };
    let inner = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .build();
    let max_level = inner.filter();

    let engine = NotificationEngine::with_http(config, Arc::new(ConsoleSink))
        .context("Failed to initialise notification engine")?;
    NotifyingLogger::new(inner, Arc::clone(&engine))
        .install(max_level)
        .context("Failed to install logger")?;
    log_notifications(&engine);

    debug!("Notification engine ready");
    Ok(engine)
}

fn print_stats(sink: &InterceptedSink) {
    let stats = sink.engine().stats();
    sink.info("Test results:");
    sink.info(&format!("  Sent: {}", stats.sent));
    sink.info(&format!("  Rate limited: {}", stats.undelivered));
}

fn init_command(
    phone: Option<String>,
    webhook: Option<String>,
    output: &Path,
    force: bool,
) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            output.display()
        );
    }

    let config = Config {
        phone_number: Some(phone.unwrap_or_else(|| "+1234567890".to_string())),
        webhook_url: Some(webhook.unwrap_or_else(|| "https://your-webhook.com/notify".to_string())),
        enable_text: true,
        ..Config::default()
    };
    std::fs::write(output, config.to_toml_string()?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Created {}", output.display());
    println!("Next steps:");
    println!("  1. Update {} with your webhook URL and phone number", output.display());
    println!("  2. Run: console-relay --config {} test", output.display());
    Ok(())
}

async fn test_command(
    mut config: Config,
    verbose: bool,
    phone: Option<String>,
    webhook: Option<String>,
    dry_run: bool,
) -> Result<()> {
    if phone.is_some() {
        config.phone_number = phone;
    }
    if webhook.is_some() {
        config.webhook_url = webhook;
    }
    if dry_run {
        config.enable_text = false;
        config.enable_call = false;
    }

    let engine = start_engine(config, verbose)?;
    let sink = engine.intercept()?;

    sink.info("Sending test error...");
    sink.error("Test critical error from console-relay CLI");
    sink.notify("Test manual notification from console-relay CLI");

    engine.flush().await;
    print_stats(&sink);
    if dry_run {
        sink.info("Dry run: text and call channels were disabled");
    }

    sink.restore();
    Ok(())
}

/// Read lines on a dedicated OS thread
///
/// Blocking reads cannot be cancelled, so the thread is left detached and
/// never holds up runtime shutdown. It exits on EOF, on a read error, or
/// once the receiver is dropped.
fn spawn_line_reader<R>(reader: R) -> io::Result<mpsc::Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Relay lines until the input ends or `shutdown` fires
///
/// # Returns
///
/// Number of lines relayed
async fn relay_lines(
    sink: &InterceptedSink,
    severity: Severity,
    lines: &mut mpsc::Receiver<io::Result<String>>,
    shutdown: &Notify,
) -> usize {
    let mut relayed = 0;
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("Interrupted, flushing pending notifications");
                break;
            }
            line = lines.recv() => match line {
                Some(Ok(line)) => {
                    match line.strip_prefix(NOTIFY_PREFIX) {
                        Some(message) => sink.notify(message),
                        None => sink.write(severity, &line),
                    }
                    relayed += 1;
                }
                Some(Err(e)) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
                None => break,
            }
        }
    }
    relayed
}

async fn pipe_command(config: Config, verbose: bool, severity: Severity) -> Result<()> {
    let engine = start_engine(config, verbose)?;
    let sink = engine.intercept()?;

    let shutdown = Arc::new(Notify::new());
    let handler_shutdown = Arc::clone(&shutdown);
    ctrlc::set_handler(move || handler_shutdown.notify_one())
        .context("Failed to install Ctrl-C handler")?;

    info!("Relaying stdin at {} severity", severity);
    let mut lines = spawn_line_reader(io::BufReader::new(io::stdin()))
        .context("Failed to start stdin reader")?;
    let relayed = relay_lines(&sink, severity, &mut lines, &shutdown).await;
    debug!("Relayed {} lines", relayed);

    engine.flush().await;
    let stats = engine.stats();
    let original = sink.restore();
    original.info(&format!(
        "console-relay: {} sent, {} rate limited",
        stats.sent, stats.undelivered
    ));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init {
            phone,
            webhook,
            output,
            force,
        } => init_command(phone, webhook, &output, force),
        Command::Test {
            phone,
            webhook,
            dry_run,
        } => {
            let config = load_config(cli.config.as_deref(), &cli.preset)?;
            test_command(config, cli.verbose, phone, webhook, dry_run).await
        }
        Command::Pipe { severity } => {
            let config = load_config(cli.config.as_deref(), &cli.preset)?;
            pipe_command(config, cli.verbose, severity).await
        }
    }
}
