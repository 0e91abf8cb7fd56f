use std::path::PathBuf;

use clap::Parser;

/// Command line of a chaincode process.
///
/// Every flag can also come from the environment variable the peer sets
/// when it launches chaincode; an explicit flag wins.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "chaincode", about = "Hyperledger Fabric chaincode", version)]
pub struct ChaincodeArgs {
    /// Optional TOML file with base settings.
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Peer chaincode listener address.
    #[arg(long, short = 'a', value_name = "HOST:PORT", env = "CORE_PEER_ADDRESS")]
    pub peer_address: Option<String>,

    /// Name the chaincode registers under.
    #[arg(long = "id", short = 'i', value_name = "NAME", env = "CORE_CHAINCODE_ID_NAME")]
    pub chaincode_id: Option<String>,

    #[arg(long, value_name = "BOOL", env = "CORE_PEER_TLS_ENABLED")]
    pub tls_enabled: Option<bool>,

    #[arg(long, value_name = "PATH", env = "CORE_PEER_TLS_ROOTCERT_FILE")]
    pub tls_root_cert_file: Option<PathBuf>,

    #[arg(long, value_name = "PATH", env = "CORE_TLS_CLIENT_KEY_PATH")]
    pub tls_client_key_path: Option<PathBuf>,

    #[arg(long, value_name = "PATH", env = "CORE_TLS_CLIENT_CERT_PATH")]
    pub tls_client_cert_path: Option<PathBuf>,

    /// Fabric level name for chaincode logs (DEBUG, INFO, WARNING, ...).
    #[arg(long, value_name = "LEVEL", env = "CORE_CHAINCODE_LOGGING_LEVEL")]
    pub log_level: Option<String>,

    /// Fabric level name for runtime logs.
    #[arg(long, value_name = "LEVEL", env = "CORE_CHAINCODE_LOGGING_SHIM")]
    pub shim_log_level: Option<String>,
}
