//! Drives one bidirectional stream between the chaincode and its peer.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, Dispatch};

use crate::chaincode::Chaincode;
use crate::error::{ShimError, ShimResult};
use crate::handler::Handler;
use crate::message::{ChaincodeId, ChaincodeMessage};
use crate::outbound::OutboundReceiver;

/// Messages from the peer, in arrival order.
pub type MessageStream = BoxStream<'static, ShimResult<ChaincodeMessage>>;

/// Write half of a peer connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSink: Send + 'static {
    async fn send(&mut self, message: ChaincodeMessage) -> ShimResult<()>;

    /// Signals that no more messages will be sent.
    async fn complete(&mut self) -> ShimResult<()>;
}

/// A duplex connection to the peer.
pub trait Transport: Send + 'static {
    type Sink: MessageSink;

    fn split(self) -> (Self::Sink, MessageStream);
}

/// Runs a [`Chaincode`] over a [`Transport`] until the peer hangs up, the
/// transport fails or the runtime is cancelled.
pub struct ChaincodeSupportStream {
    chaincode_id: ChaincodeId,
    chaincode: Arc<dyn Chaincode>,
    dispatch: Option<Dispatch>,
    cancel: CancellationToken,
}

impl ChaincodeSupportStream {
    pub fn new(chaincode_id: ChaincodeId, chaincode: Arc<dyn Chaincode>) -> Self {
        Self {
            chaincode_id,
            chaincode,
            dispatch: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Routes every log event of this runtime, including transaction tasks,
    /// to `dispatch` instead of the global subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the first transport failure, or `Ok` on a clean shutdown.
    pub async fn run<T: Transport>(self, transport: T) -> ShimResult<()> {
        match self.dispatch.clone() {
            Some(dispatch) => self.drive(transport).with_subscriber(dispatch).await,
            None => self.drive(transport).await,
        }
    }

    async fn drive<T: Transport>(self, transport: T) -> ShimResult<()> {
        let (sink, inbound) = transport.split();
        let (handler, outbound) =
            Handler::new(self.chaincode_id, self.chaincode, self.cancel.clone())?;

        let reader = tokio::spawn(
            read_loop(Arc::clone(&handler), inbound, self.cancel.clone()).with_current_subscriber(),
        );
        let written = write_loop(sink, outbound, self.cancel.clone()).await;

        self.cancel.cancel();
        let read = reader
            .await
            .map_err(|err| ShimError::transport(format!("inbound reader failed: {err}")))?;
        info!(chaincode = %handler.chaincode_id().name, "chaincode stream finished");

        written.and(read)
    }
}

async fn read_loop(
    handler: Arc<Handler>,
    mut inbound: MessageStream,
    cancel: CancellationToken,
) -> ShimResult<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = inbound.next() => match next {
                Some(Ok(message)) => {
                    if let Err(err) = handler.handle_inbound(message) {
                        error!(%err, "failed to handle message from peer");
                    }
                }
                Some(Err(err)) => {
                    error!(%err, "inbound stream failed");
                    cancel.cancel();
                    return Err(err);
                }
                None => {
                    info!("peer closed the stream");
                    cancel.cancel();
                    return Ok(());
                }
            }
        }
    }
}

async fn write_loop<S: MessageSink>(
    mut sink: S,
    mut outbound: OutboundReceiver,
    cancel: CancellationToken,
) -> ShimResult<()> {
    let result = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            next = outbound.next() => match next {
                Some(message) => {
                    debug!(kind = %message.kind, tx_id = %message.txid, "sending message to peer");
                    if let Err(err) = sink.send(message).await {
                        error!(%err, "outbound stream failed");
                        cancel.cancel();
                        break Err(err);
                    }
                }
                None => break Ok(()),
            }
        }
    };

    outbound.close();
    if let Err(err) = sink.complete().await {
        debug!(%err, "could not complete outbound stream");
    }
    result
}
