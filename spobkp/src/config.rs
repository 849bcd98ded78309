use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_WORKSPACE: &str = "./";
const DEFAULT_ARCHIVE_PREFIX: &str = "repo";
const DEFAULT_MAX_BACKUPS: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

/// Everything the job reads from the environment, captured once at startup
/// and passed by reference from there on.
#[derive(Clone, Debug)]
pub struct JobConfig {
    pub authority: String,
    pub endpoint: String,
    pub scope: String,
    pub client_id: String,
    pub client_secret: String,
    pub archive_prefix: String,
    pub workspace_dir: PathBuf,
    pub max_backups: usize,
    pub debug: bool,
}

impl JobConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).unwrap_or_default();
        let workspace = lookup("GITHUB_WORKSPACE")
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());
        Self {
            authority: get("SPOBKP_AUTHORITY"),
            endpoint: get("SPOBKP_ENDPOINT"),
            scope: get("SPOBKP_SCOPE"),
            client_id: get("SPOBKP_CLIENTID"),
            client_secret: get("SPOBKP_SECRET"),
            archive_prefix: lookup("ARCHIVE_PREFIX")
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_ARCHIVE_PREFIX.to_string()),
            workspace_dir: PathBuf::from(workspace),
            max_backups: lookup("SPOBKP_MAX_BACKUPS")
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_MAX_BACKUPS),
            debug: lookup("DEBUG")
                .map(|value| value.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Checks every required setting for a non-empty value and reports all
    /// of the missing ones at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("SPOBKP_AUTHORITY", &self.authority),
            ("SPOBKP_ENDPOINT", &self.endpoint),
            ("SPOBKP_SCOPE", &self.scope),
            ("SPOBKP_CLIENTID", &self.client_id),
            ("SPOBKP_SECRET", &self.client_secret),
        ];
        let missing: Vec<String> = required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingFields(missing))
        }
    }
}
