mod config;
mod fetch;
mod notify;
mod runner;
mod watcher;

use clap::Parser;
use fetch::HttpFetcher;
use notify::PushoverNotifier;
use std::process::ExitCode;

/// Poll a web page and send a push notification the first time its content changes.
///
/// Everything except the target URL comes from the environment (a `.env` file
/// in the working directory is honoured) or from pagewatch.toml.
#[derive(Parser, Debug)]
#[command(name = "pagewatch", version, about)]
pub struct Cli {
    /// URL of the web page to monitor (overrides SOURCE_URL)
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pagewatch=info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let settings = match load_settings(cli.url.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !settings.pushover.has_credentials() {
        tracing::warn!(
            "PUSHOVER_TOKEN / PUSHOVER_USER not set; notifications will not be delivered"
        );
    }

    let client = match fetch::build_client() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to build HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };
    let fetcher = HttpFetcher::new(client.clone());
    let notifier = PushoverNotifier::new(client, settings.pushover.clone());

    println!(
        "Monitoring {} every {}s",
        settings.source_url,
        settings.check_interval.as_secs()
    );

    match runner::run(&settings, &fetcher, &notifier).await {
        Ok(outcome) => {
            tracing::info!(
                checks = outcome.checks,
                fingerprint = %outcome.fingerprint,
                "monitoring finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}. Exiting.");
            ExitCode::FAILURE
        }
    }
}

/// Defaults < config file < environment (.env included) < `--url`.
fn load_settings(cli_url: Option<&str>) -> Result<config::Settings, config::ConfigError> {
    config::load_dotenv();
    let mut cfg = config::load(&config::config_path())?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    cfg.resolve(cli_url)
}
