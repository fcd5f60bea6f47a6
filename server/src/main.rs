use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerMessage};
use server::runner::{GameRunner, RunnerConfig};
use server::tuning::Tuning;
use shared::TICK_INTERVAL_MS;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Milliseconds per simulation step
    #[clap(short, long, default_value_t = TICK_INTERVAL_MS)]
    tick_interval: f64,
    /// Round length in seconds, overrides the tuning file
    #[clap(long)]
    round_length: Option<f64>,
    /// Seconds between a round ending and the next one, overrides the tuning file
    #[clap(long)]
    round_linger: Option<f64>,
    /// Directory holding `<map>.json` files; the built-in map is used when absent
    #[clap(short, long)]
    maps_dir: Option<PathBuf>,
    /// JSON file overriding gameplay constants
    #[clap(long)]
    tuning: Option<PathBuf>,
    /// Maximum number of connected players
    #[clap(long, default_value = "16")]
    max_clients: usize,
    /// Seconds of silence after which a client is dropped
    #[clap(long, default_value = "5")]
    client_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut tuning = match &args.tuning {
        Some(path) => Tuning::from_file(path)?,
        None => Tuning::default(),
    };
    if let Some(length) = args.round_length {
        tuning.round_length = length;
    }
    if let Some(linger) = args.round_linger {
        tuning.round_linger = linger;
    }

    let mut config = RunnerConfig::from_tuning(&tuning, args.tick_interval);
    config.maps_dir = args.maps_dir.clone();
    let runner = GameRunner::new(tuning, config);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        runner,
        Duration::from_secs_f64(args.tick_interval / 1000.0),
        args.max_clients,
        Duration::from_secs(args.client_timeout),
    )
    .await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            if let Err(e) = shutdown.send(ServerMessage::Shutdown) {
                error!("Failed to signal shutdown: {}", e);
            }
        }
    });

    server.run().await
}
