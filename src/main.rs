use anyhow::{Context, Result};
use bet_client::bet::BetReader;
use bet_client::client::{Client, ClientConfig};
use bet_client::shutdown::{ExitPolicy, ShutdownCoordinator};
use bet_client::ClientError;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::time::Duration;
use time::macros::format_description;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;

#[derive(Debug, Parser)]
#[command(version, about = "Submit lottery bets to the aggregator and query the winners")]
struct Args {
    /// Client (agency) identity
    #[arg(long, env = "CLI_ID")]
    id: String,

    /// Aggregator address as host:port
    #[arg(long, env = "CLI_SERVER_ADDRESS", default_value = "server:12345")]
    server_address: String,

    /// Pause between consecutive batches, in milliseconds
    #[arg(long, env = "CLI_LOOP_PERIOD_MS", default_value_t = 1000)]
    loop_period_ms: u64,

    /// CSV file with one bet per line
    #[arg(long, env = "CLI_BETS_FILE", default_value = "/data/agency.csv")]
    bets_file: PathBuf,

    /// Maximum bets per BET frame
    #[arg(long, env = "CLI_BATCH_SIZE", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..))]
    batch_size: u32,

    /// Give up after this many WINNER queries answered with WINNERWAIT (unbounded if unset)
    #[arg(long, env = "CLI_MAX_WINNER_QUERIES")]
    max_winner_queries: Option<u32>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "CLI_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let timer = UtcTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = ClientConfig {
        id: args.id,
        server_address: args.server_address,
        loop_period: Duration::from_millis(args.loop_period_ms),
        batch_size: args.batch_size as usize,
        max_winner_queries: args.max_winner_queries,
    };

    let shutdown = ShutdownCoordinator::new(config.id.clone());
    shutdown
        .install_signal_handler()
        .context("install termination signal handler")?;
    shutdown
        .spawn(ExitPolicy::Exit)
        .context("spawn shutdown thread")?;

    let mut source = BetReader::open(&args.bets_file)
        .with_context(|| format!("open bets file {:?}", args.bets_file))?;

    let client = Client::new(config, shutdown);
    match client.run(&mut source) {
        Ok(outcome) => {
            info!(
                action = "client_done",
                result = "success",
                client_id = %client.config().id,
                batches = outcome.submission.batches,
                bets = outcome.submission.bets,
                winners = outcome.winners.count(),
            );
            Ok(())
        }
        Err(ClientError::Cancelled) => Ok(()),
        Err(e) if e.is_fatal() => {
            error!(action = "connect", result = "fail", client_id = %client.config().id, error = %e);
            Err(e).context("aggregator unreachable")
        }
        // Per-batch and poll failures are already reported where they happen.
        Err(e) => {
            error!(action = "client_done", result = "fail", client_id = %client.config().id, error = %e);
            Ok(())
        }
    }
}
