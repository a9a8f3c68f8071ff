use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use std::path::PathBuf;

use move_url::app::{self, MoveOutcome, MoveRequest};
use move_url::config::{Config, Environment, Settings};
use move_url::error::MoveError;

#[derive(Parser, Debug)]
#[command(
    name = "move-url",
    about = "Move a feed to a new URL in newsboat's cache, keeping its articles",
    after_help = "The urls file is not modified; update it yourself after a successful move."
)]
struct Args {
    /// Path to the cache database (default: newsboat's cache.db)
    #[arg(short = 'c', long, value_name = "FILE")]
    cache_file: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/move-url/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show what would change, then roll back
    #[arg(long)]
    dry_run: bool,

    /// URL to move from
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    old_url: String,

    /// URL to move to
    #[arg(value_parser = NonEmptyStringValueParser::new())]
    new_url: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for the result message
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let env = Environment::from_process();

    let config = match args.config.clone().or_else(|| env.config_file()) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
        None => Config::default(),
    };

    let settings = Settings::resolve(args.cache_file, &config, &env)?;
    let request = MoveRequest {
        old_url: args.old_url,
        new_url: args.new_url,
        dry_run: args.dry_run,
    };

    match app::move_url(&settings, &request).await {
        Ok(outcome) => {
            print_outcome(&request, &outcome);
            Ok(())
        }
        Err(MoveError::Busy { holder, .. }) => {
            eprintln!("Error: the cache is opened by another process (PID: {holder})");
            std::process::exit(1);
        }
        Err(e) => Err(e).with_context(|| format!("Cache: {}", settings.cache_path.display())),
    }
}

fn print_outcome(request: &MoveRequest, outcome: &MoveOutcome) {
    let report = outcome.report;
    let name = outcome
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| format!("'{t}'"))
        .unwrap_or_else(|| "feed".to_string());

    if report.is_noop() {
        println!(
            "Nothing references {} in the cache; nothing was changed.",
            request.old_url
        );
        return;
    }

    if !report.committed {
        println!(
            "Dry run: moving {} from {} to {} would update {} feed(s) and {} article(s). Nothing was changed.",
            name, request.old_url, request.new_url, report.feeds, report.items
        );
        return;
    }

    println!(
        "URL moved successfully: {} now lives at {} ({} feed(s), {} article(s) updated).",
        name, request.new_url, report.feeds, report.items
    );
    println!("Remember to replace the old URL in your urls file with the new one.");
}
