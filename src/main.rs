//! briefbot CLI entry point. One invocation = one batch run.

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use briefbot::batch::{BatchOutcome, BatchRunner};
use briefbot::config::Config;
use briefbot::digest::DigestGenerator;
use briefbot::slack::SlackChannelClient;

#[derive(Parser)]
#[command(name = "briefbot")]
#[command(about = "Digests YouTube links from a Slack channel into threaded replies")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Run the full pipeline but don't post replies
    #[arg(long)]
    dry_run: bool,

    /// Override the history window size for this run
    #[arg(long)]
    limit: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A local .env is honored before config reads the environment.
    let _ = dotenvy::dotenv();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load().context("failed to load configuration from environment")?;
    if let Some(limit) = cli.limit {
        config.history_limit = limit;
    }

    tracing::info!(
        channel_id = %config.slack_channel_id,
        resolver = ?config.resolver,
        history_limit = config.history_limit,
        "starting batch run"
    );

    let chat = SlackChannelClient::new(&config.slack_bot_token, &config.slack_channel_id)
        .context("failed to build slack client")?;
    let resolver = briefbot::video::build_resolver(&config)
        .context("failed to build video resolver")?;
    let generator = DigestGenerator::new(&config);

    let runner = BatchRunner::new(&config, Box::new(chat), resolver, Box::new(generator))
        .with_dry_run(cli.dry_run);

    match runner.run().await? {
        BatchOutcome::Stopped { at_ts, replied } => {
            tracing::info!(stopped_at = %at_ts, replied, "batch stopped at already-processed message");
        }
        BatchOutcome::WindowExhausted { replied } => {
            tracing::info!(replied, "batch exhausted the history window");
        }
    }

    Ok(())
}
