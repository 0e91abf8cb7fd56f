//! # fabric-chaincode: Hyperledger Fabric chaincode runtime in Rust
//!
//! Everything a chaincode process needs to talk to its peer:
//!
//! - [`fsm`] - generic finite state machine driving the connection lifecycle
//! - [`shim`] - protocol handler, ledger API, paged queries and stream driver
//! - [`config`] - settings from TOML, `CORE_*` environment and command line
//! - [`telemetry`] - logging subscribers handed out as `tracing::Dispatch`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fabric_chaincode::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! fn ping(_stub: &mut ChaincodeStub) -> RouteFuture<'_> {
//!     Box::pin(async move { Ok(Response::success("pong")) })
//! }
//!
//! # async fn run(transport: MemoryTransport) -> anyhow::Result<()> {
//! let config = ChaincodeConfig {
//!     chaincode_id: "ping:1.0".to_string(),
//!     ..Default::default()
//! };
//! let router = Router::new().route("ping", ping);
//! fabric_chaincode::serve(&config, router, transport, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

pub use chaincode_config as config;
pub use chaincode_fsm as fsm;
pub use chaincode_shim as shim;
pub use chaincode_telemetry as telemetry;

use chaincode_config::ChaincodeConfig;
use chaincode_shim::{Chaincode, ChaincodeId, ChaincodeSupportStream, Transport};
use chaincode_telemetry::{build_dispatch, LogConfig};

/// Common imports for chaincode development
pub mod prelude {
    pub use crate::config::{ChaincodeArgs, ChaincodeConfig};
    pub use crate::shim::{
        Chaincode, ChaincodeStub, CompositeKey, KeyModification, KeyValue, MemoryTransport,
        QueryResults, Response, RouteFuture, Router, ShimError, ShimResult, Transport,
    };
    pub use crate::telemetry::{LogConfig, LogFormat};
}

/// Runs `chaincode` over `transport` until the peer hangs up, the transport
/// fails or `cancel` fires.
///
/// Runtime logs go to a subscriber built from `config.logging` and never to
/// the process-wide default.
pub async fn serve<C, T>(
    config: &ChaincodeConfig,
    chaincode: C,
    transport: T,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    C: Chaincode,
    T: Transport,
{
    config
        .validate()
        .context("invalid chaincode configuration")?;
    let dispatch = build_dispatch(&LogConfig::from(&config.logging))
        .context("failed to set up logging")?;

    tracing::dispatcher::with_default(&dispatch, || {
        tracing::info!(
            chaincode = %config.chaincode_id,
            peer = %config.peer_address,
            tls = config.tls.enabled,
            "starting chaincode"
        )
    });

    ChaincodeSupportStream::new(ChaincodeId::new(&config.chaincode_id), Arc::new(chaincode))
        .with_dispatch(dispatch)
        .with_cancellation(cancel)
        .run(transport)
        .await
        .with_context(|| format!("chaincode {} stopped", config.chaincode_id))
}
