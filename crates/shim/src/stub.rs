//! The per-transaction ledger API handed to chaincode.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::chaincode::Response;
use crate::error::{ShimError, ShimResult};
use crate::handler::Handler;
use crate::ledger::{CompositeKey, KeyModification, KeyValue};
use crate::message::{
    ChaincodeEvent, ChaincodeInput, ChaincodeMessage, QueryMetadata, SignedProposal, TxKey,
};
use crate::query::QueryResults;

/// Metadata key under which the key-level endorsement policy is stored.
pub const VALIDATION_PARAMETER: &str = "VALIDATION_PARAMETER";

/// Everything one Init or Invoke call can see and do.
///
/// Reads and writes go through the handler that dispatched the transaction,
/// correlated by this transaction's channel and id.
pub struct ChaincodeStub {
    handler: Arc<Handler>,
    key: TxKey,
    input: ChaincodeInput,
    signed_proposal: Option<SignedProposal>,
    creator: Option<Bytes>,
    transient: HashMap<String, Bytes>,
    binding: Option<Bytes>,
    timestamp: Option<DateTime<Utc>>,
    event: Option<ChaincodeEvent>,
}

impl ChaincodeStub {
    pub(crate) fn new(
        handler: Arc<Handler>,
        message: &ChaincodeMessage,
        input: ChaincodeInput,
    ) -> ShimResult<Self> {
        let mut stub = Self {
            handler,
            key: message.tx_key(),
            input,
            signed_proposal: message.proposal.clone(),
            creator: None,
            transient: HashMap::new(),
            binding: None,
            timestamp: message.timestamp,
            event: None,
        };

        if let Some(signed) = &message.proposal {
            let proposal = signed.proposal()?;
            let channel = &proposal.header.channel_header;
            let signature = &proposal.header.signature_header;

            stub.binding = Some(compute_binding(&signature.nonce, &signature.creator, channel.epoch));
            stub.creator = Some(signature.creator.clone());
            stub.transient = proposal.payload.transient_map;
            if channel.timestamp.is_some() {
                stub.timestamp = channel.timestamp;
            }
        }

        Ok(stub)
    }

    // ---- invocation context ----

    pub fn tx_id(&self) -> &str {
        &self.key.tx_id
    }

    pub fn channel_id(&self) -> &str {
        &self.key.channel_id
    }

    pub fn tx_key(&self) -> &TxKey {
        &self.key
    }

    pub fn args(&self) -> &[Bytes] {
        &self.input.args
    }

    pub fn string_args(&self) -> Vec<String> {
        self.input
            .args
            .iter()
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
            .collect()
    }

    /// The first argument, by convention the function name.
    pub fn function(&self) -> Option<String> {
        self.input
            .args
            .first()
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
    }

    /// Every argument after the function name.
    pub fn parameters(&self) -> Vec<String> {
        self.string_args().into_iter().skip(1).collect()
    }

    pub fn function_and_parameters(&self) -> (String, Vec<String>) {
        let mut args = self.string_args().into_iter();
        let function = args.next().unwrap_or_default();
        (function, args.collect())
    }

    pub fn decorations(&self) -> &HashMap<String, Bytes> {
        &self.input.decorations
    }

    pub fn signed_proposal(&self) -> Option<&SignedProposal> {
        self.signed_proposal.as_ref()
    }

    /// Serialized identity of the proposal submitter.
    pub fn creator(&self) -> Option<&Bytes> {
        self.creator.as_ref()
    }

    /// Private inputs that never reach the ledger.
    pub fn transient(&self) -> &HashMap<String, Bytes> {
        &self.transient
    }

    /// SHA-256 over nonce, creator and little-endian epoch; ties the
    /// proposal to its submitter.
    pub fn binding(&self) -> Option<&Bytes> {
        self.binding.as_ref()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    // ---- world state ----

    /// Empty bytes when the key does not exist.
    pub async fn get_state(&self, key: &str) -> ShimResult<Bytes> {
        self.handler.get_state(&self.key, "", key).await
    }

    pub async fn get_string_state(&self, key: &str) -> ShimResult<String> {
        let value = self.get_state(key).await?;
        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    pub async fn put_state(&self, key: &str, value: impl Into<Bytes>) -> ShimResult<()> {
        ensure_key(key)?;
        self.handler.put_state(&self.key, "", key, value.into()).await
    }

    pub async fn put_string_state(&self, key: &str, value: &str) -> ShimResult<()> {
        self.put_state(key, value.to_string()).await
    }

    pub async fn del_state(&self, key: &str) -> ShimResult<()> {
        self.handler.delete_state(&self.key, "", key).await
    }

    pub async fn get_state_validation_parameter(&self, key: &str) -> ShimResult<Option<Bytes>> {
        let mut metadata = self.handler.get_state_metadata(&self.key, "", key).await?;
        Ok(metadata.remove(VALIDATION_PARAMETER))
    }

    pub async fn set_state_validation_parameter(
        &self,
        key: &str,
        endorsement_policy: impl Into<Bytes>,
    ) -> ShimResult<()> {
        self.handler
            .put_state_metadata(&self.key, "", key, VALIDATION_PARAMETER, endorsement_policy.into())
            .await
    }

    // ---- queries ----
    //
    // Query constructors send nothing; the first page is fetched when the
    // results are first read.

    pub fn get_state_by_range(&self, start_key: &str, end_key: &str) -> ShimResult<QueryResults<KeyValue>> {
        self.range_results("", start_key, end_key, None)
    }

    pub fn get_state_by_range_with_pagination(
        &self,
        start_key: &str,
        end_key: &str,
        page_size: i32,
        bookmark: &str,
    ) -> ShimResult<QueryResults<KeyValue>> {
        let metadata = pagination(page_size, bookmark)?;
        self.range_results("", start_key, end_key, Some(&metadata))
    }

    pub fn get_state_by_partial_composite_key(
        &self,
        object_type: &str,
        attributes: &[&str],
    ) -> ShimResult<QueryResults<KeyValue>> {
        let (start, end) = CompositeKey::new(object_type, attributes.iter().copied())?.range();
        self.range_results("", &start, &end, None)
    }

    pub fn get_state_by_partial_composite_key_with_pagination(
        &self,
        object_type: &str,
        attributes: &[&str],
        page_size: i32,
        bookmark: &str,
    ) -> ShimResult<QueryResults<KeyValue>> {
        let (start, end) = CompositeKey::new(object_type, attributes.iter().copied())?.range();
        let metadata = pagination(page_size, bookmark)?;
        self.range_results("", &start, &end, Some(&metadata))
    }

    /// Runs a rich query against a state database that supports one.
    pub fn get_query_result(&self, query: &str) -> ShimResult<QueryResults<KeyValue>> {
        self.rich_results("", query, None)
    }

    pub fn get_query_result_with_pagination(
        &self,
        query: &str,
        page_size: i32,
        bookmark: &str,
    ) -> ShimResult<QueryResults<KeyValue>> {
        let metadata = pagination(page_size, bookmark)?;
        self.rich_results("", query, Some(&metadata))
    }

    pub fn get_history_for_key(&self, key: &str) -> ShimResult<QueryResults<KeyModification>> {
        ensure_key(key)?;
        let request = Handler::history_request(&self.key, key)?;
        Ok(QueryResults::new(Arc::clone(&self.handler), self.key.clone(), request))
    }

    pub fn create_composite_key(&self, object_type: &str, attributes: &[&str]) -> ShimResult<CompositeKey> {
        CompositeKey::new(object_type, attributes.iter().copied())
    }

    pub fn split_composite_key(&self, key: &str) -> ShimResult<CompositeKey> {
        CompositeKey::parse(key)
    }

    // ---- private data ----

    pub async fn get_private_data(&self, collection: &str, key: &str) -> ShimResult<Bytes> {
        ensure_collection(collection)?;
        self.handler.get_state(&self.key, collection, key).await
    }

    pub async fn put_private_data(
        &self,
        collection: &str,
        key: &str,
        value: impl Into<Bytes>,
    ) -> ShimResult<()> {
        ensure_collection(collection)?;
        ensure_key(key)?;
        self.handler
            .put_state(&self.key, collection, key, value.into())
            .await
    }

    pub async fn del_private_data(&self, collection: &str, key: &str) -> ShimResult<()> {
        ensure_collection(collection)?;
        self.handler.delete_state(&self.key, collection, key).await
    }

    pub async fn get_private_data_validation_parameter(
        &self,
        collection: &str,
        key: &str,
    ) -> ShimResult<Option<Bytes>> {
        ensure_collection(collection)?;
        let mut metadata = self
            .handler
            .get_state_metadata(&self.key, collection, key)
            .await?;
        Ok(metadata.remove(VALIDATION_PARAMETER))
    }

    pub async fn set_private_data_validation_parameter(
        &self,
        collection: &str,
        key: &str,
        endorsement_policy: impl Into<Bytes>,
    ) -> ShimResult<()> {
        ensure_collection(collection)?;
        self.handler
            .put_state_metadata(
                &self.key,
                collection,
                key,
                VALIDATION_PARAMETER,
                endorsement_policy.into(),
            )
            .await
    }

    pub fn get_private_data_by_range(
        &self,
        collection: &str,
        start_key: &str,
        end_key: &str,
    ) -> ShimResult<QueryResults<KeyValue>> {
        ensure_collection(collection)?;
        self.range_results(collection, start_key, end_key, None)
    }

    pub fn get_private_data_by_partial_composite_key(
        &self,
        collection: &str,
        object_type: &str,
        attributes: &[&str],
    ) -> ShimResult<QueryResults<KeyValue>> {
        ensure_collection(collection)?;
        let (start, end) = CompositeKey::new(object_type, attributes.iter().copied())?.range();
        self.range_results(collection, &start, &end, None)
    }

    pub fn get_private_data_query_result(
        &self,
        collection: &str,
        query: &str,
    ) -> ShimResult<QueryResults<KeyValue>> {
        ensure_collection(collection)?;
        self.rich_results(collection, query, None)
    }

    // ---- chaincode to chaincode ----

    /// Calls `chaincode_name` within this transaction, optionally on another
    /// channel.
    ///
    /// A failing callee shows up as an error [`Response`], not as `Err`.
    pub async fn invoke_chaincode(
        &self,
        chaincode_name: &str,
        args: Vec<Bytes>,
        channel: Option<&str>,
    ) -> ShimResult<Response> {
        let target = match channel {
            Some(channel) if !channel.is_empty() => format!("{chaincode_name}/{channel}"),
            _ => chaincode_name.to_string(),
        };
        debug!(tx_id = %self.key.tx_id, chaincode = %target, "invoking chaincode");
        self.handler.invoke_chaincode(&self.key, &target, args).await
    }

    pub async fn invoke_chaincode_with_string_args(
        &self,
        chaincode_name: &str,
        args: &[&str],
        channel: Option<&str>,
    ) -> ShimResult<Response> {
        let args = args.iter().map(|arg| Bytes::from(arg.to_string())).collect();
        self.invoke_chaincode(chaincode_name, args, channel).await
    }

    // ---- events ----

    /// Attaches an event to the transaction outcome, replacing any earlier
    /// one.
    pub fn set_event(&mut self, name: &str, payload: impl Into<Bytes>) -> ShimResult<()> {
        if name.trim().is_empty() {
            return Err(ShimError::invalid_argument("event name must not be empty"));
        }
        self.event = Some(ChaincodeEvent {
            event_name: name.to_string(),
            payload: payload.into(),
            ..Default::default()
        });
        Ok(())
    }

    pub fn event(&self) -> Option<&ChaincodeEvent> {
        self.event.as_ref()
    }

    pub(crate) fn take_event(&mut self) -> Option<ChaincodeEvent> {
        self.event.take()
    }

    fn range_results(
        &self,
        collection: &str,
        start_key: &str,
        end_key: &str,
        metadata: Option<&QueryMetadata>,
    ) -> ShimResult<QueryResults<KeyValue>> {
        let request = Handler::range_request(&self.key, collection, start_key, end_key, metadata)?;
        Ok(QueryResults::new(Arc::clone(&self.handler), self.key.clone(), request))
    }

    fn rich_results(
        &self,
        collection: &str,
        query: &str,
        metadata: Option<&QueryMetadata>,
    ) -> ShimResult<QueryResults<KeyValue>> {
        let request = Handler::rich_query_request(&self.key, collection, query, metadata)?;
        Ok(QueryResults::new(Arc::clone(&self.handler), self.key.clone(), request))
    }
}

impl std::fmt::Debug for ChaincodeStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaincodeStub")
            .field("key", &self.key)
            .field("args", &self.input.args.len())
            .field("binding", &self.binding.as_ref().map(hex::encode))
            .field("event", &self.event.as_ref().map(|event| &event.event_name))
            .finish()
    }
}

pub(crate) fn compute_binding(nonce: &[u8], creator: &[u8], epoch: u64) -> Bytes {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hasher.update(epoch.to_le_bytes());
    Bytes::from(hasher.finalize().to_vec())
}

fn pagination(page_size: i32, bookmark: &str) -> ShimResult<QueryMetadata> {
    if page_size <= 0 {
        return Err(ShimError::invalid_argument(format!(
            "page size must be positive, got {page_size}"
        )));
    }
    Ok(QueryMetadata {
        page_size,
        bookmark: bookmark.to_string(),
    })
}

fn ensure_key(key: &str) -> ShimResult<()> {
    if key.is_empty() {
        return Err(ShimError::invalid_argument("key must not be an empty string"));
    }
    Ok(())
}

fn ensure_collection(collection: &str) -> ShimResult<()> {
    if collection.is_empty() {
        return Err(ShimError::invalid_argument(
            "collection must not be an empty string",
        ));
    }
    Ok(())
}
