//! The contract user chaincode implements, and the result it returns.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::stub::ChaincodeStub;

/// Outcome of an Init/Invoke call, also the result of a cross-chaincode call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Response {
    pub status: i32,
    pub message: String,
    pub payload: Bytes,
}

impl Response {
    pub const OK: i32 = 200;
    /// Statuses from here on are errors to the peer's endorser.
    pub const ERROR_THRESHOLD: i32 = 400;
    /// Statuses from here on fail the transaction inside the shim.
    pub const ERROR: i32 = 500;

    pub fn new(status: i32, message: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: payload.into(),
        }
    }

    pub fn success(payload: impl Into<Bytes>) -> Self {
        Self::new(Self::OK, String::new(), payload)
    }

    pub fn success_with_message(message: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self::new(Self::OK, message, payload)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Self::ERROR, message, Bytes::new())
    }

    pub fn is_error(&self) -> bool {
        self.status >= Self::ERROR
    }

    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// User transaction logic.
///
/// Both calls run on their own task, one per inbound Init/Transaction
/// message. Returning `Err` or panicking fails only that transaction.
#[async_trait]
pub trait Chaincode: Send + Sync + 'static {
    async fn init(&self, stub: &mut ChaincodeStub) -> anyhow::Result<Response>;

    async fn invoke(&self, stub: &mut ChaincodeStub) -> anyhow::Result<Response>;
}
