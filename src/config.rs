//! Runtime configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. The remote backend needs its base URL and public key; the local
//! backend only needs a directory for the key-value database.

use std::path::PathBuf;

use anyhow::anyhow;
use directories::ProjectDirs;
use log::{info, warn};

use crate::error::Result;

pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const BACKEND_VAR: &str = "WIFI_ANALYZER_BACKEND";
pub const DATA_DIR_VAR: &str = "WIFI_ANALYZER_DATA_DIR";

/// Connection settings for the hosted relational backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Which record store the application runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Local { data_dir: PathBuf },
    Remote(RemoteConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: Backend,
}

impl AppConfig {
    /// Loads the configuration from the environment, reading `.env` first if
    /// one is present.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote backend is requested without both of
    /// its variables, if the backend name is unknown, or if no data
    /// directory can be determined for the local backend.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let remote = match (non_empty(SUPABASE_URL_VAR), non_empty(SUPABASE_KEY_VAR))
        {
            (Some(base_url), Some(api_key)) => Some(RemoteConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            }),
            _ => None,
        };

        let requested = non_empty(BACKEND_VAR).map(|v| v.to_lowercase());

        let backend = match (requested.as_deref(), remote) {
            (Some("remote"), Some(remote)) | (None, Some(remote)) => {
                Backend::Remote(remote)
            }
            (Some("remote"), None) => {
                return Err(anyhow!(
                    "remote backend requires {} and {}",
                    SUPABASE_URL_VAR,
                    SUPABASE_KEY_VAR
                ));
            }
            (Some("local"), _) | (None, None) => {
                Backend::Local { data_dir: local_data_dir(non_empty(DATA_DIR_VAR))? }
            }
            (Some(other), _) => {
                return Err(anyhow!("unknown backend '{}'", other));
            }
        };

        match &backend {
            Backend::Local { data_dir } => {
                info!("Using local store at {:?}", data_dir)
            }
            Backend::Remote(remote) => {
                info!("Using remote store at {}", remote.base_url)
            }
        }

        Ok(AppConfig { backend })
    }
}

fn local_data_dir(overridden: Option<String>) -> Result<PathBuf> {
    if let Some(dir) = overridden {
        return Ok(PathBuf::from(dir));
    }

    let proj_dirs = ProjectDirs::from("com", "wifi-analyzer", "wifi-analyzer")
        .ok_or_else(|| anyhow!("No home directory available for the local store"))?;

    Ok(proj_dirs.data_dir().join("store"))
}
