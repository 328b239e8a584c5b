use std::path::Path;
use std::sync::Arc;

use hive_verify::{NoCorrection, Paper, PipelineOrchestrator};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::args::PublishArgs;
use crate::exit_codes;

pub async fn run(args: PublishArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let mut config = super::load_config(config_path)?;
    if args.no_start {
        config.verifier.auto_start = false;
    }

    let content = super::read_paper(&args.file)?;
    let title = args
        .title
        .clone()
        .unwrap_or_else(|| derive_title(&content, &args.file));
    let author = args
        .author
        .clone()
        .unwrap_or_else(|| config.author().to_string());

    let paper = Paper::new(title, content, author).with_claims(args.claims);
    let pipeline = PipelineOrchestrator::from_config(&config, Arc::new(NoCorrection))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; abandoning pipeline run");
            on_signal.cancel();
        }
    });

    info!(title = %paper.title, author = %paper.author, "publishing paper");
    let run = pipeline.submit(paper, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&run)?);

    Ok(exit_codes::for_outcome(&run.outcome))
}

/// First level-one heading, else the file stem.
fn derive_title(content: &str, path: &Path) -> String {
    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "Untitled".to_string())
}
