//! Duckrun - LAN duck hunt
//!
//! Terminal front end: hosts or joins a session, then reads player commands
//! from stdin while ticking the session every 50ms.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use duckrun_net::TcpTransport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod commands;
mod config;
mod lobby;
mod menu;
mod objectives;
mod scenes;

use app::{App, Flow};
use commands::Command;
use config::AppConfig;

/// Session tick interval
const TICK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "duckrun")]
#[command(about = "Find the ducks, find the key", long_about = None)]
struct Cli {
    /// Config file (defaults to config.toml in the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Host a LAN game on the first free port
    Host {
        /// Use the online relay instead of LAN
        #[arg(long)]
        online: bool,
    },
    /// Join a LAN game, or an online game by join code
    Join {
        /// Host address, or the join code with --online
        address: String,
        #[arg(long, conflicts_with = "online")]
        port: Option<u16>,
        /// Join through the online relay
        #[arg(long)]
        online: bool,
    },
    /// Run a dedicated server with no local player
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = cli.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("duckrun={0},duckrun_net={0},duckrun_core={0}", log_level).into()),
        )
        .init();

    tracing::info!("Starting Duckrun v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tokio runtime for networking
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let transport = TcpTransport::with_max_clients(
        runtime.handle().clone(),
        config.net.max_remote_clients(),
    );
    let mut app = App::new(transport, config);

    runtime.block_on(run(&mut app, cli.command));
    app.quit();
    drop(app);

    // The stdin reader may still be parked in a blocking read
    runtime.shutdown_timeout(Duration::from_secs(1));
}

async fn run(app: &mut App<TcpTransport>, mode: Option<Mode>) {
    match mode {
        Some(Mode::Host { online: true }) => app.host_online().await,
        Some(Mode::Host { online: false }) => app.host(),
        Some(Mode::Join {
            address,
            online: true,
            ..
        }) => app.join_online(&address).await,
        Some(Mode::Join { address, port, .. }) => {
            let port = port.map(|p| p.to_string());
            app.join(&address, port.as_deref());
        }
        Some(Mode::Serve { port }) => {
            let port = port.unwrap_or(app.session().config().base_port);
            app.serve(port);
        }
        None => println!("{}", commands::HELP),
    }
    flush_output(app);

    let (line_tx, mut line_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_stdin(line_tx));

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut stdin_open = true;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                app.tick(Instant::now());
            }
            line = line_rx.recv(), if stdin_open => {
                let Some(line) = line else {
                    // Keep serving until interrupted
                    stdin_open = false;
                    continue;
                };
                match Command::parse(&line) {
                    Some(Ok(command)) => {
                        if app.execute(command) == Flow::Quit {
                            flush_output(app);
                            break;
                        }
                    }
                    Some(Err(e)) => println!("{}", e),
                    None => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
        flush_output(app);
    }
}

fn flush_output(app: &mut App<TcpTransport>) {
    for line in app.take_output() {
        println!("{}", line);
    }
}

async fn read_stdin(lines: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                if lines.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
}
