//! Fatal error taxonomy.
//!
//! Each variant names the phase that failed so the CLI can report it before
//! exiting. Per-item batch failures are not represented here; see
//! [`crate::dispatch::ItemStatus`].

use std::path::PathBuf;

use thiserror::Error;

pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("config load failed: {path}")]
    ConfigLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("config invalid: missing {datastore} credential '{field}'")]
    MissingCredential {
        datastore: &'static str,
        field: &'static str,
    },

    #[error("asset fetch failed: {url}")]
    AssetFetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("asset extraction failed: {path}")]
    AssetExtract {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "key file check failed: replica-set mode requires a pre-shared key at {path}\n\
         Generate it with `openssl rand -base64 756 > {path}`, then secure it with \
         `chmod 400 {path}` and hand it to the database user with `chown 999:999 {path}`"
    )]
    KeyFileMissing { path: PathBuf },

    #[error("manifest write failed: {path}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("runtime command failed: {action}")]
    Runtime {
        action: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    pub fn config_load(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            source,
        }
    }

    pub fn asset_fetch(url: impl Into<String>, source: anyhow::Error) -> Self {
        Self::AssetFetch {
            url: url.into(),
            source,
        }
    }

    pub fn asset_extract(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::AssetExtract {
            path: path.into(),
            source,
        }
    }

    pub fn manifest_write(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::ManifestWrite {
            path: path.into(),
            source,
        }
    }

    pub fn runtime(action: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Runtime {
            action: action.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failed_phase() {
        let err = DeployError::config_load("/tmp/configs.json", anyhow::anyhow!("boom"));
        assert!(err.to_string().starts_with("config load failed"));

        let err = DeployError::asset_fetch("https://x/build.zip", anyhow::anyhow!("timeout"));
        assert!(err.to_string().starts_with("asset fetch failed"));

        let err = DeployError::manifest_write("/tmp/out.yml", anyhow::anyhow!("denied"));
        assert!(err.to_string().starts_with("manifest write failed"));
    }

    #[test]
    fn key_file_message_is_actionable() {
        let err = DeployError::KeyFileMissing {
            path: PathBuf::from("mongo-key"),
        };
        let msg = err.to_string();
        assert!(msg.contains("openssl rand -base64 756"));
        assert!(msg.contains("chmod 400 mongo-key"));
        assert!(msg.contains("chown 999:999 mongo-key"));
    }
}
