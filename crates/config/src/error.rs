//! Configuration error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid peer address '{address}': {reason}")]
    InvalidPeerAddress { address: String, reason: String },

    /// `CORE_CHAINCODE_ID_NAME` or `--id` must be set.
    #[error("chaincode id is required")]
    MissingChaincodeId,

    #[error("TLS is enabled but {setting} is not set")]
    MissingTlsSetting { setting: &'static str },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
