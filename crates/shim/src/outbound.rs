//! FIFO of messages waiting for the stream writer.

use tokio::sync::mpsc;

use crate::error::{ShimError, ShimResult};
use crate::message::ChaincodeMessage;

/// Producer side, cloned into every task that talks to the peer.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    sender: mpsc::UnboundedSender<ChaincodeMessage>,
}

/// Consumer side, owned by the single writer loop.
#[derive(Debug)]
pub struct OutboundReceiver {
    receiver: mpsc::UnboundedReceiver<ChaincodeMessage>,
}

pub fn channel() -> (OutboundQueue, OutboundReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (OutboundQueue { sender }, OutboundReceiver { receiver })
}

impl OutboundQueue {
    pub fn enqueue(&self, message: ChaincodeMessage) -> ShimResult<()> {
        tracing::trace!(kind = %message.kind, tx_id = %message.txid, "enqueue outbound message");
        self.sender
            .send(message)
            .map_err(|_| ShimError::OutboundClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl OutboundReceiver {
    /// Next message in enqueue order; `None` once every producer is gone.
    pub async fn next(&mut self) -> Option<ChaincodeMessage> {
        self.receiver.recv().await
    }

    pub fn try_next(&mut self) -> Option<ChaincodeMessage> {
        self.receiver.try_recv().ok()
    }

    /// Stops accepting new messages; already queued ones can still be drained.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;

    #[tokio::test]
    async fn preserves_enqueue_order_across_producers() {
        let (queue, mut receiver) = channel();
        let other = queue.clone();
        for i in 0..10 {
            let producer = if i % 2 == 0 { &queue } else { &other };
            producer
                .enqueue(ChaincodeMessage::new(MessageType::GetState, "ch", i.to_string(), ""))
                .unwrap();
        }
        for i in 0..10 {
            assert_eq!(receiver.next().await.unwrap().txid, i.to_string());
        }
        assert!(receiver.try_next().is_none());
    }

    #[test]
    fn enqueue_fails_after_close() {
        let (queue, mut receiver) = channel();
        receiver.close();
        assert!(queue.is_closed());
        assert!(matches!(
            queue.enqueue(ChaincodeMessage::default()),
            Err(ShimError::OutboundClosed)
        ));
    }
}
