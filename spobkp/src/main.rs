use std::path::Path;

use anyhow::Context;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use spobkp::archive;
use spobkp::config::JobConfig;
use spobkp::job;

const ARCHIVE_BASE: &str = "/tmp/archive";

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = JobConfig::from_env();
    init_logging(config.debug);

    tracing::info!(workspace = %config.workspace_dir.display(), "archiving the workspace");
    std::fs::create_dir_all(ARCHIVE_BASE)
        .with_context(|| format!("failed to create the archive directory at {ARCHIVE_BASE}"))?;

    let archive_name = archive::archive_name(&config.archive_prefix, OffsetDateTime::now_utc())
        .context("failed to build the archive name")?;
    let archive_path = Path::new(ARCHIVE_BASE).join(&archive_name);
    let size = archive::create_archive(&config.workspace_dir, &archive_path)
        .with_context(|| format!("failed to create the archive at {}", archive_path.display()))?;
    tracing::info!(path = %archive_path.display(), size, "archive created");

    let outcome = job::run(&config, &archive_path, &archive_name).await;
    tracing::info!(outcome = outcome.as_str(), "upload pipeline finished");

    // Local cleanup runs no matter how the pipeline ended.
    archive::remove_archive(&archive_path);
    Ok(())
}
