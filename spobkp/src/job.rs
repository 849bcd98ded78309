use std::path::Path;

use spobkp_core::{AuthClient, ChunkedUploader, GraphClient, enforce_retention};

use crate::config::JobConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    ConfigMissing,
    AuthFailed,
    ResolveFailed,
    SessionFailed,
    UploadFailed,
    Completed,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::ConfigMissing => "config-missing",
            JobOutcome::AuthFailed => "auth-failed",
            JobOutcome::ResolveFailed => "resolve-failed",
            JobOutcome::SessionFailed => "session-failed",
            JobOutcome::UploadFailed => "upload-failed",
            JobOutcome::Completed => "completed",
        }
    }
}

/// Runs the upload pipeline. Every stage is a hard gate for the stages
/// after it; retention at the end is best-effort and never changes the
/// outcome. Stage failures are logged here, not raised.
pub async fn run(config: &JobConfig, archive_path: &Path, archive_name: &str) -> JobOutcome {
    if let Err(err) = config.validate() {
        tracing::error!(error = %err, "skipping the upload since environment information is missing");
        return JobOutcome::ConfigMissing;
    }

    tracing::info!("starting a connection to the storage endpoint");
    let token = match AuthClient::new(
        &config.authority,
        config.client_id.clone(),
        config.client_secret.clone(),
        config.scope.clone(),
    ) {
        Ok(auth) => match auth.acquire_token().await {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(error = %err, "failed to retrieve an access token");
                return JobOutcome::AuthFailed;
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "failed to build the credential client");
            return JobOutcome::AuthFailed;
        }
    };

    let client = match GraphClient::new(&config.endpoint, token) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "the configured endpoint cannot target a folder");
            return JobOutcome::ResolveFailed;
        }
    };

    tracing::info!("resolving the target directory id");
    let folder_id = match client.resolve_folder().await {
        Ok(folder_id) => folder_id,
        Err(err) => {
            tracing::error!(error = %err, "aborting since no directory id was retrieved");
            return JobOutcome::ResolveFailed;
        }
    };

    tracing::info!(file = archive_name, "creating an upload session");
    let session = match client.create_upload_session(&folder_id, archive_name).await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "failed to create an upload session");
            return JobOutcome::SessionFailed;
        }
    };

    tracing::info!("uploading the archive in chunks");
    if let Err(err) = upload_archive(session.upload_url.as_str(), archive_path).await {
        tracing::error!(error = %err, "the upload did not complete, skipping remote cleanup");
        return JobOutcome::UploadFailed;
    }

    tracing::info!(max_backups = config.max_backups, "enforcing the backup retention bound");
    match enforce_retention(&client, config.max_backups).await {
        Ok(report) => {
            tracing::info!(
                total = report.total,
                deleted = report.deleted.len(),
                "retention pass finished"
            );
            if report.halted.is_some() {
                tracing::warn!("retention stopped early, excess backups remain");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to list the target folder for retention");
        }
    }

    JobOutcome::Completed
}

async fn upload_archive(session_url: &str, archive_path: &Path) -> anyhow::Result<()> {
    let file = tokio::fs::File::open(archive_path).await?;
    let total_len = file.metadata().await?.len();
    let uploader = ChunkedUploader::new()?;
    uploader.upload(session_url, file, total_len).await?;
    Ok(())
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
