//! Messages exchanged with the peer and their typed payloads.

pub mod codec;
mod payload;

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use payload::*;

/// Discriminant of a [`ChaincodeMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MessageType {
    #[default]
    Undefined,
    Register,
    Registered,
    Init,
    Ready,
    Transaction,
    Completed,
    Error,
    GetState,
    PutState,
    DelState,
    InvokeChaincode,
    Response,
    GetStateByRange,
    GetQueryResult,
    QueryStateNext,
    QueryStateClose,
    Keepalive,
    GetHistoryForKey,
    GetStateMetadata,
    PutStateMetadata,
}

impl MessageType {
    pub const ALL: [MessageType; 21] = [
        MessageType::Undefined,
        MessageType::Register,
        MessageType::Registered,
        MessageType::Init,
        MessageType::Ready,
        MessageType::Transaction,
        MessageType::Completed,
        MessageType::Error,
        MessageType::GetState,
        MessageType::PutState,
        MessageType::DelState,
        MessageType::InvokeChaincode,
        MessageType::Response,
        MessageType::GetStateByRange,
        MessageType::GetQueryResult,
        MessageType::QueryStateNext,
        MessageType::QueryStateClose,
        MessageType::Keepalive,
        MessageType::GetHistoryForKey,
        MessageType::GetStateMetadata,
        MessageType::PutStateMetadata,
    ];

    /// Upper-case wire name, also used as the lifecycle event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Undefined => "UNDEFINED",
            MessageType::Register => "REGISTER",
            MessageType::Registered => "REGISTERED",
            MessageType::Init => "INIT",
            MessageType::Ready => "READY",
            MessageType::Transaction => "TRANSACTION",
            MessageType::Completed => "COMPLETED",
            MessageType::Error => "ERROR",
            MessageType::GetState => "GET_STATE",
            MessageType::PutState => "PUT_STATE",
            MessageType::DelState => "DEL_STATE",
            MessageType::InvokeChaincode => "INVOKE_CHAINCODE",
            MessageType::Response => "RESPONSE",
            MessageType::GetStateByRange => "GET_STATE_BY_RANGE",
            MessageType::GetQueryResult => "GET_QUERY_RESULT",
            MessageType::QueryStateNext => "QUERY_STATE_NEXT",
            MessageType::QueryStateClose => "QUERY_STATE_CLOSE",
            MessageType::Keepalive => "KEEPALIVE",
            MessageType::GetHistoryForKey => "GET_HISTORY_FOR_KEY",
            MessageType::GetStateMetadata => "GET_STATE_METADATA",
            MessageType::PutStateMetadata => "PUT_STATE_METADATA",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        MessageType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == upper)
            .ok_or_else(|| format!("Unknown message type: {}", s))
    }
}

/// Identifies one logical transaction: the channel plus the transaction id.
///
/// Correlated responses and the mutation marker are both keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxKey {
    pub channel_id: String,
    pub tx_id: String,
}

impl TxKey {
    pub fn new(channel_id: impl Into<String>, tx_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            tx_id: tx_id.into(),
        }
    }
}

impl fmt::Display for TxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel_id, self.tx_id)
    }
}

/// One frame of the chaincode/peer conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChaincodeMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub timestamp: Option<DateTime<Utc>>,
    pub payload: Bytes,
    pub txid: String,
    pub proposal: Option<SignedProposal>,
    pub chaincode_event: Option<ChaincodeEvent>,
    pub channel_id: String,
}

impl ChaincodeMessage {
    pub fn new(
        kind: MessageType,
        channel_id: impl Into<String>,
        txid: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind,
            timestamp: None,
            payload: payload.into(),
            txid: txid.into(),
            proposal: None,
            chaincode_event: None,
            channel_id: channel_id.into(),
        }
    }

    /// Builds a message addressed to the transaction `key`.
    pub fn for_tx(kind: MessageType, key: &TxKey, payload: impl Into<Bytes>) -> Self {
        Self::new(kind, key.channel_id.clone(), key.tx_id.clone(), payload)
    }

    pub fn with_event(mut self, event: Option<ChaincodeEvent>) -> Self {
        self.chaincode_event = event;
        self
    }

    pub fn with_proposal(mut self, proposal: SignedProposal) -> Self {
        self.proposal = Some(proposal);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn tx_key(&self) -> TxKey {
        TxKey::new(self.channel_id.clone(), self.txid.clone())
    }

    /// The payload read as text, as carried by Error messages.
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
