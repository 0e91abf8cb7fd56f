//! # Chaincode Shim
//!
//! Runtime side of the chaincode/peer protocol.
//!
//! A chaincode process opens one bidirectional stream to its peer. Over it
//! the chaincode registers, waits until the peer declares it ready, and
//! then executes Init and Transaction requests. While a transaction runs,
//! every ledger read or write is a request/response round trip correlated
//! by channel and transaction id.
//!
//! ## Layout
//!
//! - [`handler`]: connection lifecycle, message classification and the
//!   correlated request API
//! - [`registry`]: one-shot response slots keyed by [`TxKey`]
//! - [`outbound`]: the FIFO drained by the single stream writer
//! - [`stub`]: what a transaction sees ([`ChaincodeStub`])
//! - [`query`]: lazily paged, cached query results
//! - [`stream`]: the reader/writer pair driving a [`Transport`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chaincode_shim::{memory_pair, ChaincodeId, ChaincodeStub, ChaincodeSupportStream, Response, RouteFuture, Router};
//!
//! fn get(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
//!     Box::pin(async move {
//!         let key = stub.parameters().into_iter().next().unwrap_or_default();
//!         let value = stub.get_state(&key).await?;
//!         Ok(Response::success(value))
//!     })
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let (transport, _peer) = memory_pair();
//! let router = Router::new().route("get", get);
//! ChaincodeSupportStream::new(ChaincodeId::new("assets"), Arc::new(router))
//!     .run(transport)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod chaincode;
pub mod context;
pub mod error;
pub mod handler;
pub mod ledger;
pub mod memory;
pub mod message;
pub mod outbound;
pub mod query;
pub mod registry;
pub mod router;
pub mod state;
pub mod stream;
pub mod stub;

pub use chaincode::{Chaincode, Response};
pub use context::{ContextGuard, TransactionContexts};
pub use error::{ShimError, ShimResult};
pub use handler::Handler;
pub use ledger::{CompositeKey, KeyModification, KeyValue};
pub use memory::{memory_pair, MemoryPeer, MemorySink, MemoryTransport};
pub use message::{
    ChaincodeEvent, ChaincodeId, ChaincodeInput, ChaincodeMessage, MessageType, QueryMetadata,
    QueryResponse, QueryResponseMetadata, SignedProposal, TxKey,
};
pub use outbound::{OutboundQueue, OutboundReceiver};
pub use query::{BlockingQueryIter, QueryIter, QueryRecord, QueryResults};
pub use registry::{ResponseRegistry, ResponseSlot};
pub use router::{RouteFuture, RouteHandler, Router};
pub use state::ConnectionState;
pub use stream::{ChaincodeSupportStream, MessageSink, MessageStream, Transport};
pub use stub::{ChaincodeStub, VALIDATION_PARAMETER};
