//! In-process transport, used to embed a chaincode next to a peer
//! simulator and throughout the tests.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{ShimError, ShimResult};
use crate::message::ChaincodeMessage;
use crate::stream::{MessageSink, MessageStream, Transport};

/// Chaincode side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    to_peer: mpsc::UnboundedSender<ChaincodeMessage>,
    from_peer: mpsc::UnboundedReceiver<ShimResult<ChaincodeMessage>>,
}

/// Peer side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    to_chaincode: Option<mpsc::UnboundedSender<ShimResult<ChaincodeMessage>>>,
    from_chaincode: mpsc::UnboundedReceiver<ChaincodeMessage>,
}

/// Creates a connected transport and peer.
pub fn memory_pair() -> (MemoryTransport, MemoryPeer) {
    let (to_peer, from_chaincode) = mpsc::unbounded_channel();
    let (to_chaincode, from_peer) = mpsc::unbounded_channel();
    (
        MemoryTransport { to_peer, from_peer },
        MemoryPeer {
            to_chaincode: Some(to_chaincode),
            from_chaincode,
        },
    )
}

impl Transport for MemoryTransport {
    type Sink = MemorySink;

    fn split(self) -> (Self::Sink, MessageStream) {
        let sink = MemorySink {
            sender: Some(self.to_peer),
        };
        (sink, UnboundedReceiverStream::new(self.from_peer).boxed())
    }
}

#[derive(Debug)]
pub struct MemorySink {
    sender: Option<mpsc::UnboundedSender<ChaincodeMessage>>,
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&mut self, message: ChaincodeMessage) -> ShimResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ShimError::transport("stream already completed"))?;
        sender
            .send(message)
            .map_err(|_| ShimError::transport("peer disconnected"))
    }

    async fn complete(&mut self) -> ShimResult<()> {
        self.sender = None;
        Ok(())
    }
}

impl MemoryPeer {
    pub fn send(&self, message: ChaincodeMessage) -> ShimResult<()> {
        self.inject(Ok(message))
    }

    /// Makes the chaincode's inbound stream fail with `err`.
    pub fn fail(&self, err: ShimError) -> ShimResult<()> {
        self.inject(Err(err))
    }

    /// Next message from the chaincode; `None` once it completed its stream.
    pub async fn recv(&mut self) -> Option<ChaincodeMessage> {
        self.from_chaincode.recv().await
    }

    /// Ends the chaincode's inbound stream.
    pub fn hang_up(&mut self) {
        self.to_chaincode = None;
    }

    fn inject(&self, item: ShimResult<ChaincodeMessage>) -> ShimResult<()> {
        self.to_chaincode
            .as_ref()
            .ok_or_else(|| ShimError::transport("peer already hung up"))?
            .send(item)
            .map_err(|_| ShimError::transport("chaincode disconnected"))
    }
}
