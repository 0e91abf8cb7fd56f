//! Bootstrapping a chaincode from a config file over the in-memory transport.

use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;
use fabric_chaincode::prelude::*;
use fabric_chaincode::shim::message::{codec, PutState};
use fabric_chaincode::shim::{memory_pair, ChaincodeId, ChaincodeInput, ChaincodeMessage, MessageType};
use tokio_util::sync::CancellationToken;

struct Counter;

#[async_trait]
impl Chaincode for Counter {
    async fn init(&self, stub: &mut ChaincodeStub) -> anyhow::Result<Response> {
        stub.put_state("count", "0").await?;
        Ok(Response::success(Bytes::new()))
    }

    async fn invoke(&self, stub: &mut ChaincodeStub) -> anyhow::Result<Response> {
        let current: u64 = stub.get_string_state("count").await?.parse()?;
        let next = (current + 1).to_string();
        stub.put_state("count", next.clone()).await?;
        Ok(Response::success(next))
    }
}

#[tokio::test]
async fn serve_runs_until_the_peer_hangs_up() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "chaincode_id = \"counter:1.0\"\n\n[logging]\nshim = \"DEBUG\"").unwrap();
    let args = ChaincodeArgs {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = ChaincodeConfig::load(&args).unwrap();

    let (transport, mut peer) = memory_pair();
    let runtime = tokio::spawn(async move {
        fabric_chaincode::serve(&config, Counter, transport, CancellationToken::new()).await
    });

    let register = peer.recv().await.unwrap();
    assert_eq!(register.kind, MessageType::Register);
    let id: ChaincodeId = codec::decode(&register.payload).unwrap();
    assert_eq!(id.name, "counter:1.0");
    peer.send(ChaincodeMessage::new(MessageType::Registered, "", "", "")).unwrap();
    peer.send(ChaincodeMessage::new(MessageType::Ready, "", "", "")).unwrap();

    let input = ChaincodeInput::from_args(["increment"]);
    peer.send(ChaincodeMessage::new(
        MessageType::Transaction,
        "mychannel",
        "tx1",
        codec::encode(&input).unwrap(),
    ))
    .unwrap();

    let get = peer.recv().await.unwrap();
    assert_eq!(get.kind, MessageType::GetState);
    peer.send(ChaincodeMessage::for_tx(MessageType::Response, &get.tx_key(), "41"))
        .unwrap();

    let put = peer.recv().await.unwrap();
    let request: PutState = codec::decode(&put.payload).unwrap();
    assert_eq!(request.value, Bytes::from("42"));
    peer.send(ChaincodeMessage::for_tx(MessageType::Response, &put.tx_key(), ""))
        .unwrap();

    let completed = peer.recv().await.unwrap();
    assert_eq!(completed.kind, MessageType::Completed);
    let response: Response = codec::decode(&completed.payload).unwrap();
    assert_eq!(response.payload_text(), "42");

    peer.hang_up();
    runtime.await.unwrap().unwrap();
}

#[tokio::test]
async fn serve_rejects_invalid_config() {
    let (transport, _peer) = memory_pair();
    let err = fabric_chaincode::serve(
        &ChaincodeConfig::default(),
        Counter,
        transport,
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(format!("{err:#}").contains("chaincode id is required"));
}

#[tokio::test]
async fn cancellation_stops_serve() {
    let config = ChaincodeConfig {
        chaincode_id: "counter".to_string(),
        ..Default::default()
    };
    let cancel = CancellationToken::new();
    let (transport, mut peer) = memory_pair();
    let runtime = tokio::spawn({
        let cancel = cancel.clone();
        async move { fabric_chaincode::serve(&config, Counter, transport, cancel).await }
    });

    assert_eq!(peer.recv().await.unwrap().kind, MessageType::Register);
    cancel.cancel();
    runtime.await.unwrap().unwrap();
}
