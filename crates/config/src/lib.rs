//! Chaincode Configuration
//!
//! Settings a chaincode process needs before it can open its stream to the
//! peer. Values are layered: built-in defaults, then an optional TOML file,
//! then the `CORE_*` environment variables the peer sets when it launches
//! chaincode, then command line flags.

mod address;
mod args;
mod error;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use address::PeerAddress;
pub use args::ChaincodeArgs;
pub use error::{ConfigError, ConfigResult};

pub const DEFAULT_PEER_HOST: &str = "127.0.0.1";
pub const DEFAULT_PEER_PORT: u16 = 7051;
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaincodeConfig {
    /// Name (optionally `name:version`) the chaincode registers under.
    pub chaincode_id: String,
    pub peer_address: PeerAddress,
    pub tls: TlsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    pub enabled: bool,
    pub root_cert_file: Option<PathBuf>,
    pub client_key_path: Option<PathBuf>,
    pub client_cert_path: Option<PathBuf>,
}

/// Fabric log level names for user code and for the runtime itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub shim: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            shim: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn level_directive(&self) -> &'static str {
        tracing_level(&self.level)
    }

    pub fn shim_directive(&self) -> &'static str {
        tracing_level(&self.shim)
    }
}

/// Maps a Fabric log level name onto a tracing filter directive.
///
/// Unknown names fall back to `info`.
pub fn tracing_level(name: &str) -> &'static str {
    match name.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" | "ERROR" => "error",
        "WARNING" | "WARN" => "warn",
        "NOTICE" | "INFO" => "info",
        "DEBUG" => "debug",
        _ => "info",
    }
}

impl ChaincodeConfig {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded chaincode config file");
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolves the final configuration for `args` and validates it.
    pub fn load(args: &ChaincodeArgs) -> ConfigResult<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays every value set in `args`.
    pub fn apply(&mut self, args: &ChaincodeArgs) -> ConfigResult<()> {
        if let Some(id) = &args.chaincode_id {
            self.chaincode_id = id.clone();
        }
        if let Some(address) = &args.peer_address {
            self.peer_address = address.parse()?;
        }
        if let Some(enabled) = args.tls_enabled {
            self.tls.enabled = enabled;
        }
        if let Some(path) = &args.tls_root_cert_file {
            self.tls.root_cert_file = Some(path.clone());
        }
        if let Some(path) = &args.tls_client_key_path {
            self.tls.client_key_path = Some(path.clone());
        }
        if let Some(path) = &args.tls_client_cert_path {
            self.tls.client_cert_path = Some(path.clone());
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(level) = &args.shim_log_level {
            self.logging.shim = level.clone();
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.chaincode_id.trim().is_empty() {
            return Err(ConfigError::MissingChaincodeId);
        }
        if self.tls.enabled {
            let required = [
                ("CORE_PEER_TLS_ROOTCERT_FILE", &self.tls.root_cert_file),
                ("CORE_TLS_CLIENT_KEY_PATH", &self.tls.client_key_path),
                ("CORE_TLS_CLIENT_CERT_PATH", &self.tls.client_cert_path),
            ];
            for (setting, value) in required {
                if value.is_none() {
                    return Err(ConfigError::MissingTlsSetting { setting });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fabric_levels_map_to_tracing() {
        assert_eq!(tracing_level("CRITICAL"), "error");
        assert_eq!(tracing_level("error"), "error");
        assert_eq!(tracing_level("WARNING"), "warn");
        assert_eq!(tracing_level("NOTICE"), "info");
        assert_eq!(tracing_level("debug"), "debug");
        assert_eq!(tracing_level("verbose"), "info");
    }

    #[test]
    fn default_config_needs_an_id() {
        let config = ChaincodeConfig::default();
        assert_eq!(config.peer_address.port, DEFAULT_PEER_PORT);
        assert!(matches!(config.validate(), Err(ConfigError::MissingChaincodeId)));
    }

    #[test]
    fn tls_requires_every_path() {
        let mut config = ChaincodeConfig {
            chaincode_id: "assets:1.0".to_string(),
            ..Default::default()
        };
        config.tls.enabled = true;
        config.tls.root_cert_file = Some("ca.pem".into());
        match config.validate() {
            Err(ConfigError::MissingTlsSetting { setting }) => {
                assert_eq!(setting, "CORE_TLS_CLIENT_KEY_PATH")
            }
            other => panic!("unexpected: {other:?}"),
        }

        config.tls.client_key_path = Some("client.key".into());
        config.tls.client_cert_path = Some("client.crt".into());
        assert!(config.validate().is_ok());
    }
}
