//! File Manager Daemon - privileged filesystem mutations over per-verb Unix sockets.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fm_daemon::config::Settings;
use fm_daemon::fs::{self, Filesystem};
use fm_daemon::socket::CommandChannel;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

fn main() -> ExitCode {
    // Parse command line arguments (simple std::env approach)
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    // Get config path from --config argument or default
    let config_path = get_config_path(&args);

    // Load configuration
    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging based on configuration
    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    // Print startup banner
    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!("Socket directory: {}", settings.channel.directory.display());
    info!("Log level: {}", settings.logging.level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(settings, config_path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Daemon failed");
            ExitCode::FAILURE
        }
    }
}

/// Async main function.
async fn async_main(
    settings: Settings,
    config_path: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = settings;
    let mut filesystem = fs::from_config(&settings.filesystem)?;
    let mut channel = CommandChannel::start(&settings, Arc::clone(&filesystem)).await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())?;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, initiating graceful shutdown...");
                channel.stop(drain_timeout(&settings)).await;
                break;
            }
            _ = hangup.recv() => {
                info!("Reload signal received, restarting command channel...");
                let new_settings = match Settings::load(&config_path) {
                    Ok(new_settings) => new_settings,
                    Err(e) => {
                        error!(error = %e, "Failed to reload configuration, keeping existing channel");
                        continue;
                    }
                };

                channel.stop(drain_timeout(&settings)).await;

                let new_filesystem = if new_settings.filesystem.backend == settings.filesystem.backend {
                    Arc::clone(&filesystem)
                } else {
                    match fs::from_config(&new_settings.filesystem) {
                        Ok(new_filesystem) => new_filesystem,
                        Err(e) => {
                            error!(error = %e, "Failed to build filesystem backend, keeping existing one");
                            Arc::clone(&filesystem)
                        }
                    }
                };

                channel = match CommandChannel::start(&new_settings, Arc::clone(&new_filesystem)).await {
                    Ok(new_channel) => {
                        settings = new_settings;
                        filesystem = new_filesystem;
                        info!("Configuration reloaded successfully");
                        new_channel
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to start channel with new configuration, restoring previous one");
                        CommandChannel::start(&settings, Arc::clone(&filesystem)).await?
                    }
                };
            }
        }
    }

    info!(backend = filesystem.name(), "Daemon stopped");
    Ok(())
}

fn drain_timeout(settings: &Settings) -> Duration {
    Duration::from_secs(settings.limits.drain_timeout_seconds)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Privileged file manager daemon exposing one Unix socket per verb.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: /etc/fm-daemon/daemon.toml]
    -h, --help             Print help information
    -V, --version          Print version information

SIGNALS:
    SIGINT, SIGTERM        Drain connections and exit
    SIGHUP                 Reload configuration and restart the channel
"#,
        NAME, VERSION, NAME
    );
}

/// Get configuration file path from command line arguments.
fn get_config_path(args: &[String]) -> String {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    // Default path
    "/etc/fm-daemon/daemon.toml".to_string()
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            // Default to pretty format
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}
