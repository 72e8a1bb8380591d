mod script;

use std::path::PathBuf;

use boundaries::SyncConfig;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::script::{Script, replay};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a recorded map session against an in-memory feature service")]
struct Args {
    /// Session script (JSON)
    script: PathBuf,

    /// Override the scale threshold from the script or environment
    #[arg(long)]
    scale_threshold: Option<f64>,

    /// Override the surrounding mask opacity
    #[arg(long)]
    visible_opacity: Option<f64>,

    /// Print the report on a single line
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let text = tokio::fs::read_to_string(&args.script).await?;
    let script = Script::from_json(&text)?;

    let mut config = script.config_or(SyncConfig::from_env);
    if let Some(threshold) = args.scale_threshold {
        config.scale_threshold = threshold;
    }
    if let Some(opacity) = args.visible_opacity {
        config.visible_opacity = opacity;
    }

    info!(
        script = %args.script.display(),
        steps = script.steps.len(),
        scale_threshold = config.scale_threshold,
        "replaying session"
    );
    let report = replay(script, config).await?;
    info!(
        requests = report.requests,
        completed = report.completed,
        "replay finished"
    );

    let out = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{out}");
    Ok(())
}
