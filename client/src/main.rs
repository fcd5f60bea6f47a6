use clap::Parser;
use client::input::Bot;
use client::network::{Client, ClientConfig};
use client::strategy::StrategyKind;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Nickname shown on the scoreboard
    #[arg(short = 'n', long, default_value = "player")]
    nickname: String,

    /// How positions are reconstructed from snapshots
    #[arg(long, value_enum, default_value_t = StrategyKind::Interpolation)]
    strategy: StrategyKind,

    /// Interpolation delay behind server time in milliseconds
    #[arg(short = 'd', long, default_value = "100")]
    delay: f64,

    /// Frames per second
    #[arg(short = 'f', long, default_value = "60")]
    fps: u32,

    /// Milliseconds between pings
    #[arg(long, default_value = "1000")]
    ping_interval: u64,

    /// Wander around and shoot randomly
    #[arg(short = 'b', long)]
    bot: bool,

    /// Seed for the bot's decisions
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let frame_interval = Duration::from_secs_f64(1.0 / args.fps.max(1) as f64);
    let config = ClientConfig {
        server: args.server,
        nickname: args.nickname,
        ping_interval: Duration::from_millis(args.ping_interval.max(1)),
        frame_interval,
        input_interval: frame_interval,
        report_every: args.fps.max(1) as u64,
    };
    let bot = args.bot.then(|| Bot::new(args.seed));

    let mut client = Client::new(config, args.strategy.build(args.delay), bot).await?;
    client.run().await?;

    Ok(())
}
