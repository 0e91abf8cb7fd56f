//! Error types for the chaincode runtime.

use chaincode_fsm::FsmError;
use thiserror::Error;

use crate::message::{MessageType, TxKey};

/// Errors raised by the handler, the stub and the stream driver.
#[derive(Error, Debug)]
pub enum ShimError {
    /// The lifecycle state machine rejected an operation.
    #[error(transparent)]
    Fsm(#[from] FsmError),

    #[error("codec: cannot encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: bincode::Error,
    },

    #[error("codec: cannot decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: bincode::Error,
    },

    /// A correlated request is already waiting on this transaction.
    #[error("[{key}] response slot already exists, another request must be pending")]
    SlotInUse { key: TxKey },

    /// A response arrived for a transaction nobody is waiting on.
    #[error("[{key}] no pending request for response of type {kind}")]
    NoPendingRequest { key: TxKey, kind: MessageType },

    /// A second response arrived for the same pending request.
    #[error("[{key}] response already delivered")]
    AlreadyDelivered { key: TxKey },

    /// The peer answered a correlated request with an Error message.
    #[error("[{key}] peer error: {message}")]
    PeerError { key: TxKey, message: String },

    /// The peer answered a correlated request with something other than
    /// Response or Error.
    #[error("[{key}] unexpected {kind} message in response to a request")]
    UnexpectedResponse { key: TxKey, kind: MessageType },

    #[error("Cannot {operation} in query context")]
    QueryContext { operation: &'static str },

    #[error("[{key}] transaction is already executing")]
    DuplicateTransaction { key: TxKey },

    #[error("[{key}] handler cannot handle message ({kind}) with payload size ({size}) while in state: {state}")]
    IllegalMessage {
        key: TxKey,
        kind: MessageType,
        size: usize,
        state: String,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("{message}")]
    InvalidCompositeKey { message: String },

    #[error("query: {message}")]
    Query { message: String },

    #[error("query: iterator already closed")]
    QueryClosed,

    #[error("outbound: message queue is closed")]
    OutboundClosed,

    #[error("transport: {message}")]
    Transport { message: String },

    #[error("runtime cancelled")]
    Cancelled,

    #[error("handler is gone")]
    HandlerGone,
}

impl ShimError {
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn query<S: Into<String>>(message: S) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Result type for runtime operations.
pub type ShimResult<T> = std::result::Result<T, ShimError>;
