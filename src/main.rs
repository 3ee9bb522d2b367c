use anyhow::{bail, Context};
use drivedrop::upload_manager::TracingNotifier;
use drivedrop::{ChannelEvent, Config, FileRef, InboundCommand, UploadManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

const USAGE: &str = "usage: drivedrop [--config <path>] <url> [name]";

struct Args {
    config: Option<PathBuf>,
    url: String,
    name: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut config = None;
    let mut positional = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(url) = positional.next() else {
        bail!("{USAGE}");
    };
    Ok(Args {
        config,
        url,
        name: positional.next(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    let source = Url::parse(&args.url).with_context(|| format!("invalid URL: {}", args.url))?;
    let mut file = FileRef::for_url(&source);
    if let Some(name) = args.name.filter(|n| !n.trim().is_empty()) {
        file.name = name;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        file = %file.name,
        "starting upload"
    );

    let manager = UploadManager::from_config(
        &config,
        config.token_provider()?,
        Arc::new(TracingNotifier::new()),
    )?;
    let mut ticket = manager.submit(InboundCommand::PutFileOnGoogleDrive { file });

    while let Some(event) = ticket.observer.recv().await {
        match event {
            ChannelEvent::Progress(progress) => {
                let percent = if progress.bytes_total == 0 {
                    100
                } else {
                    progress.bytes_sent * 100 / progress.bytes_total
                };
                eprint!("\r{percent:>3}% ({}/{} bytes)", progress.bytes_sent, progress.bytes_total);
            }
            ChannelEvent::Outcome(outcome) => {
                eprintln!();
                println!("{}", serde_json::to_string(&outcome)?);
                break;
            }
        }
    }

    let outcome = ticket.completion.await.context("upload task panicked")?;
    if !outcome.succeeded {
        std::process::exit(1);
    }
    Ok(())
}
