use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vantevo::dom::memory::MemoryPage;
use vantevo::guard::Verdict;
use vantevo::payload::{EcommerceValues, Meta};
use vantevo::transport::Settlement;
use vantevo::{Config, Dispatch, Tracker};

#[derive(Parser)]
#[command(name = "vantevo")]
#[command(about = "Send analytics hits from a headless page", long_about = None)]
struct Cli {
    /// Configuration file (JSON, TOML or YAML); VANTEVO_* variables still apply
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a pageview or custom event
    Send {
        /// Page URL the hit is sent from
        #[arg(long)]
        url: String,
        /// Event name (defaults to pageview)
        #[arg(long)]
        event: Option<String>,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        referrer: String,
        /// Metadata entry, repeatable
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },
    /// Record an e-commerce event from a JSON values file
    Ecommerce {
        #[arg(long)]
        url: String,
        #[arg(long)]
        event: String,
        /// JSON file with items and order fields
        #[arg(long)]
        values: PathBuf,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Report whether a hit from the given page would be sent
    Check {
        #[arg(long)]
        url: String,
        #[arg(long)]
        event: Option<String>,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))?;
    Ok((key.to_string(), value.to_string()))
}

fn page(url: &str, title: &str, referrer: &str) -> Result<Arc<MemoryPage>> {
    let page = MemoryPage::new(url)
        .with_context(|| format!("invalid page URL '{url}'"))?
        .with_title(title)
        .with_referrer(referrer);
    Ok(Arc::new(page))
}

async fn report(dispatch: Dispatch) {
    match dispatch {
        Dispatch::Sent(delivery) => match delivery.settled().await {
            Some(Settlement::Status(status)) => println!("✓ Hit delivered (HTTP {status})"),
            Some(Settlement::Failed(err)) => println!("⚠ Hit not delivered: {err}"),
            None => println!("⚠ Delivery abandoned"),
        },
        Dispatch::Logged => println!("✓ Hit logged (dev mode)"),
        Dispatch::Suppressed(reason) => println!("⚠ Hit suppressed: {reason}"),
        Dispatch::Dropped(err) => println!("⚠ Hit dropped: {err}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    info!(
        endpoint = %config.proxy_server,
        dev = config.dev,
        "Loaded configuration"
    );

    match cli.command {
        Commands::Send {
            url,
            event,
            title,
            referrer,
            meta,
        } => {
            let tracker = Tracker::with_http(config, page(&url, &title, &referrer)?)?;
            let meta: Meta = meta
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            report(tracker.record(event.as_deref(), Some(meta), None)).await;
        }
        Commands::Ecommerce {
            url,
            event,
            values,
            title,
        } => {
            let raw = std::fs::read_to_string(&values)
                .with_context(|| format!("failed to read {}", values.display()))?;
            let values: EcommerceValues =
                serde_json::from_str(&raw).context("invalid e-commerce values")?;
            let tracker = Tracker::with_http(config, page(&url, &title, "")?)?;
            report(tracker.record_ecommerce(&event, values, None)).await;
        }
        Commands::Check { url, event } => {
            let tracker = Tracker::with_http(config, page(&url, "", "")?)?;
            match tracker.check(event.as_deref()) {
                Verdict::Proceed => println!("✓ Hit would be sent"),
                Verdict::Suppress(reason) => println!("⚠ Hit would be suppressed: {reason}"),
            }
        }
    }

    Ok(())
}
