//! Scripted peer and a sample asset chaincode shared by the integration
//! tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chaincode_shim::message::{codec, QueryResultBytes};
use chaincode_shim::{
    memory_pair, Chaincode, ChaincodeId, ChaincodeInput, ChaincodeMessage, ChaincodeStub,
    ChaincodeSupportStream, KeyModification, KeyValue, MemoryPeer, MessageType, QueryResponse,
    QueryResponseMetadata, Response, RouteFuture, Router, ShimError, ShimResult,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const CHAINCODE: &str = "testcc";
pub const CHANNEL: &str = "mychannel";

/// Plays the peer's side of one chaincode stream.
pub struct MockPeer {
    peer: MemoryPeer,
    pub runtime: JoinHandle<ShimResult<()>>,
    pub cancel: CancellationToken,
}

impl MockPeer {
    /// Starts `chaincode` and answers its registration.
    pub async fn connect<C: Chaincode>(chaincode: C) -> Self {
        let mut peer = Self::start(chaincode);
        let register = peer.expect(MessageType::Register).await;
        let id: ChaincodeId = codec::decode(&register.payload).unwrap();
        assert_eq!(id.name, CHAINCODE);

        peer.send(ChaincodeMessage::new(MessageType::Registered, "", "", ""));
        peer.send(ChaincodeMessage::new(MessageType::Ready, "", "", ""));
        peer
    }

    pub fn start<C: Chaincode>(chaincode: C) -> Self {
        let (transport, peer) = memory_pair();
        let stream = ChaincodeSupportStream::new(ChaincodeId::new(CHAINCODE), Arc::new(chaincode));
        let cancel = stream.cancellation_token();
        let runtime = tokio::spawn(stream.run(transport));
        Self {
            peer,
            runtime,
            cancel,
        }
    }

    pub async fn recv(&mut self) -> ChaincodeMessage {
        tokio::time::timeout(Duration::from_secs(5), self.peer.recv())
            .await
            .expect("timed out waiting for the chaincode")
            .expect("chaincode closed its stream")
    }

    /// Asserts that nothing arrives within a short grace period.
    pub async fn expect_silence(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(100), self.peer.recv()).await;
        assert!(next.is_err(), "unexpected message: {next:?}");
    }

    pub async fn expect(&mut self, kind: MessageType) -> ChaincodeMessage {
        let message = self.recv().await;
        assert_eq!(message.kind, kind, "unexpected message: {message:?}");
        message
    }

    pub fn send(&self, message: ChaincodeMessage) {
        self.peer.send(message).unwrap();
    }

    pub fn init(&self, tx_id: &str, args: &[&str]) {
        self.send(tx_message(MessageType::Init, tx_id, args));
    }

    pub fn invoke(&self, tx_id: &str, args: &[&str]) {
        self.send(tx_message(MessageType::Transaction, tx_id, args));
    }

    pub fn reply(&self, request: &ChaincodeMessage, payload: impl Into<Bytes>) {
        self.send(ChaincodeMessage::for_tx(
            MessageType::Response,
            &request.tx_key(),
            payload,
        ));
    }

    pub fn reply_error(&self, request: &ChaincodeMessage, text: &str) {
        self.send(ChaincodeMessage::for_tx(
            MessageType::Error,
            &request.tx_key(),
            text.to_string(),
        ));
    }

    /// Waits for Completed on `tx_id` and decodes its response.
    pub async fn completed(&mut self, tx_id: &str) -> Response {
        let message = self.expect(MessageType::Completed).await;
        assert_eq!(message.txid, tx_id);
        codec::decode(&message.payload).unwrap()
    }

    /// Waits for Error on `tx_id` and returns its text.
    pub async fn failed(&mut self, tx_id: &str) -> String {
        let message = self.expect(MessageType::Error).await;
        assert_eq!(message.txid, tx_id);
        message.payload_text().into_owned()
    }

    pub async fn hang_up(mut self) -> ShimResult<()> {
        self.peer.hang_up();
        tokio::time::timeout(Duration::from_secs(5), self.runtime)
            .await
            .expect("runtime did not stop")
            .unwrap()
    }

    pub fn peer(&self) -> &MemoryPeer {
        &self.peer
    }
}

pub fn tx_message(kind: MessageType, tx_id: &str, args: &[&str]) -> ChaincodeMessage {
    let input = ChaincodeInput::from_args(args.iter().map(|arg| arg.to_string()));
    ChaincodeMessage::new(kind, CHANNEL, tx_id, codec::encode(&input).unwrap())
}

pub fn kv_page(records: &[(&str, &str)], has_more: bool, id: &str) -> Bytes {
    let results = records
        .iter()
        .map(|(key, value)| QueryResultBytes {
            result_bytes: codec::encode(&KeyValue::new(*key, value.to_string())).unwrap(),
        })
        .collect();
    codec::encode(&QueryResponse {
        results,
        has_more,
        id: id.to_string(),
        metadata: Bytes::new(),
    })
    .unwrap()
}

pub fn paged_kv_page(records: &[(&str, &str)], bookmark: &str) -> Bytes {
    let mut page: QueryResponse = codec::decode(&kv_page(records, false, "paged")).unwrap();
    page.metadata = codec::encode(&QueryResponseMetadata {
        fetched_records_count: records.len() as i32,
        bookmark: bookmark.to_string(),
    })
    .unwrap();
    codec::encode(&page).unwrap()
}

pub fn history_page(entries: &[(&str, &str, bool)]) -> Bytes {
    let results = entries
        .iter()
        .map(|(tx_id, value, is_delete)| QueryResultBytes {
            result_bytes: codec::encode(&KeyModification {
                tx_id: tx_id.to_string(),
                value: Bytes::from(value.to_string()),
                timestamp: None,
                is_delete: *is_delete,
            })
            .unwrap(),
        })
        .collect();
    codec::encode(&QueryResponse {
        results,
        has_more: false,
        id: "history".to_string(),
        metadata: Bytes::new(),
    })
    .unwrap()
}

fn param(stub: &ChaincodeStub, index: usize) -> anyhow::Result<String> {
    stub.parameters()
        .get(index)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing parameter {index}"))
}

fn init(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        stub.put_state(&param(stub, 0)?, param(stub, 1)?).await?;
        Ok(Response::success_with_message("OK response1", Bytes::new()))
    })
}

fn get(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let value = stub.get_state(&param(stub, 0)?).await?;
        Ok(Response::success(value))
    })
}

fn put(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        stub.put_state(&param(stub, 0)?, param(stub, 1)?).await?;
        Ok(Response::success(Bytes::new()))
    })
}

fn del(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        stub.del_state(&param(stub, 0)?).await?;
        Ok(Response::success(Bytes::new()))
    })
}

fn range(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_state_by_range(&param(stub, 0)?, &param(stub, 1)?)?;
        let records = results.collect().await;
        results.close().await;
        Ok(Response::success(join_keys(&records?)))
    })
}

/// Two enumerators over one result set.
fn range_twice(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_state_by_range(&param(stub, 0)?, &param(stub, 1)?)?;
        let first = results.collect().await?;
        let second = results.collect().await?;
        results.close().await;
        Ok(Response::success(format!(
            "{}|{}",
            join_keys(&first),
            join_keys(&second)
        )))
    })
}

fn range_blocking(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_state_by_range(&param(stub, 0)?, &param(stub, 1)?)?;
        let records = results.blocking_iter().collect::<ShimResult<Vec<_>>>()?;
        Ok(Response::success(join_keys(&records)))
    })
}

/// Reads one record through the blocking adapter and drops it.
fn range_first_blocking(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_state_by_range(&param(stub, 0)?, &param(stub, 1)?)?;
        let first = results.blocking_iter().next().transpose()?;
        let closed = results.is_closed().await;
        Ok(Response::success(format!(
            "{}|{}",
            first.map(|record| record.key).unwrap_or_default(),
            closed
        )))
    })
}

/// Closes twice, then reports whether later reads fail as closed.
fn range_closed(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_state_by_range(&param(stub, 0)?, &param(stub, 1)?)?;
        let first = results.iter().next().await.transpose()?;
        results.close().await;
        results.close().await;

        let next = results.iter().next().await;
        let metadata = results.metadata().await;
        Ok(Response::success(format!(
            "{}|{}|{}",
            first.map(|record| record.key).unwrap_or_default(),
            matches!(next, Some(Err(ShimError::QueryClosed))),
            matches!(metadata, Err(ShimError::QueryClosed))
        )))
    })
}

/// Reports the first read of two independent enumerators.
fn range_malformed(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_state_by_range(&param(stub, 0)?, &param(stub, 1)?)?;
        let first = results.iter().next().await;
        let second = results.iter().next().await;
        results.close().await;

        let render = |item: Option<ShimResult<KeyValue>>| match item {
            Some(Err(err)) => err.to_string(),
            other => format!("unexpected {other:?}"),
        };
        Ok(Response::success(format!("{}|{}", render(first), render(second))))
    })
}

fn paged(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_state_by_range_with_pagination(&param(stub, 0)?, "", 2, "")?;
        let metadata = results.metadata().await?.unwrap_or_default();
        let records = results.collect().await?;
        results.close().await;
        Ok(Response::success(format!(
            "{}@{}/{}",
            join_keys(&records),
            metadata.bookmark,
            metadata.fetched_records_count
        )))
    })
}

fn owned_by(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let owner = param(stub, 0)?;
        let results = stub.get_state_by_partial_composite_key("owner~asset", &[owner.as_str()])?;
        let records = results.collect().await?;
        results.close().await;

        let mut assets = Vec::new();
        for record in records {
            let key = stub.split_composite_key(&record.key)?;
            assets.extend(key.attributes().get(1).cloned());
        }
        Ok(Response::success(assets.join(",")))
    })
}

fn rich_query(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_query_result(&param(stub, 0)?)?;
        let records = results.collect().await?;
        results.close().await;
        Ok(Response::success(join_keys(&records)))
    })
}

fn history(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let results = stub.get_history_for_key(&param(stub, 0)?)?;
        let entries = results.collect().await?;
        results.close().await;
        let rendered: Vec<String> = entries
            .iter()
            .map(|entry| match entry.is_delete {
                true => format!("{}:deleted", entry.tx_id),
                false => format!("{}:{}", entry.tx_id, entry.string_value()),
            })
            .collect();
        Ok(Response::success(rendered.join(",")))
    })
}

fn private(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let collection = param(stub, 0)?;
        let key = param(stub, 1)?;
        stub.put_private_data(&collection, &key, param(stub, 2)?).await?;
        let value = stub.get_private_data(&collection, &key).await?;
        Ok(Response::success(value))
    })
}

fn emit(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let name = param(stub, 0)?;
        let payload = param(stub, 1)?;
        stub.set_event(&name, payload)?;
        Ok(Response::success(Bytes::new()))
    })
}

fn call(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let target = param(stub, 0)?;
        let channel = param(stub, 1).ok();
        let response = stub
            .invoke_chaincode_with_string_args(&target, &["get", "a"], channel.as_deref())
            .await?;
        Ok(response)
    })
}

fn context(stub: &mut ChaincodeStub) -> RouteFuture<'_> {
    Box::pin(async move {
        let creator = stub
            .creator()
            .map(|creator| String::from_utf8_lossy(creator).into_owned())
            .unwrap_or_default();
        let transient = stub
            .transient()
            .get("secret")
            .map(|value| String::from_utf8_lossy(value).into_owned())
            .unwrap_or_default();
        let binding = stub.binding().map(hex::encode).unwrap_or_default();
        Ok(Response::success(format!(
            "{}|{}|{}|{}",
            stub.channel_id(),
            creator,
            transient,
            binding
        )))
    })
}

fn join_keys(records: &[KeyValue]) -> String {
    records
        .iter()
        .map(|record| format!("{}={}", record.key, record.string_value()))
        .collect::<Vec<_>>()
        .join(",")
}

/// The chaincode every integration test runs against.
pub fn asset_chaincode() -> Router {
    Router::new()
        .on_init(init)
        .route("get", get)
        .route("put", put)
        .route("del", del)
        .route("range", range)
        .route("rangeTwice", range_twice)
        .route("rangeBlocking", range_blocking)
        .route("rangeFirstBlocking", range_first_blocking)
        .route("rangeClosed", range_closed)
        .route("rangeMalformed", range_malformed)
        .route("paged", paged)
        .route("ownedBy", owned_by)
        .route("query", rich_query)
        .route("history", history)
        .route("private", private)
        .route("emit", emit)
        .route("call", call)
        .route("context", context)
}
