use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ShimResult;

use super::codec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChaincodeId {
    pub name: String,
    pub version: String,
    pub path: String,
}

impl ChaincodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Arguments of an Init/Transaction message; the first one names the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChaincodeInput {
    pub args: Vec<Bytes>,
    pub decorations: HashMap<String, Bytes>,
    pub is_init: bool,
}

impl ChaincodeInput {
    pub fn from_args<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChaincodeSpec {
    pub chaincode_id: ChaincodeId,
    pub input: ChaincodeInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetState {
    pub key: String,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PutState {
    pub key: String,
    pub value: Bytes,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DelState {
    pub key: String,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetStateMetadata {
    pub key: String,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateMetadata {
    pub metakey: String,
    pub value: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PutStateMetadata {
    pub key: String,
    pub collection: String,
    pub metadata: StateMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateMetadataResult {
    pub entries: Vec<StateMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetStateByRange {
    pub start_key: String,
    pub end_key: String,
    pub collection: String,
    /// Encoded [`QueryMetadata`], empty when not paginated.
    pub metadata: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetQueryResult {
    pub query: String,
    pub collection: String,
    pub metadata: Bytes,
}

/// Page request attached to paginated queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueryMetadata {
    pub page_size: i32,
    pub bookmark: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetHistoryForKey {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueryStateNext {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueryStateClose {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueryResultBytes {
    pub result_bytes: Bytes,
}

/// One page of query results plus the cursor id to continue from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueryResponse {
    pub results: Vec<QueryResultBytes>,
    pub has_more: bool,
    pub id: String,
    /// Encoded [`QueryResponseMetadata`] for paginated queries.
    pub metadata: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueryResponseMetadata {
    pub fetched_records_count: i32,
    pub bookmark: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChaincodeEvent {
    pub chaincode_id: String,
    pub tx_id: String,
    pub event_name: String,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignedProposal {
    pub proposal_bytes: Bytes,
    pub signature: Bytes,
}

impl SignedProposal {
    pub fn proposal(&self) -> ShimResult<Proposal> {
        codec::decode(&self.proposal_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Proposal {
    pub header: Header,
    pub payload: ChaincodeProposalPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Header {
    pub channel_header: ChannelHeader,
    pub signature_header: SignatureHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChannelHeader {
    pub channel_id: String,
    pub tx_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignatureHeader {
    pub creator: Bytes,
    pub nonce: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChaincodeProposalPayload {
    pub input: Bytes,
    pub transient_map: HashMap<String, Bytes>,
}
