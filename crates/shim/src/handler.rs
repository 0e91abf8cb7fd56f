//! Peer protocol handler.
//!
//! The handler owns the connection lifecycle, classifies every inbound
//! message and implements the correlated request API transaction code uses
//! to talk to the ledger.
//!
//! ```text
//!   created --REGISTERED--> established --READY--> ready
//!                                                  |  ^
//!                     INIT | TRANSACTION | RESPONSE | ERROR
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use chaincode_fsm::{CallbackDesc, EventDesc, Fsm, FsmEvent};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::chaincode::{Chaincode, Response};
use crate::context::TransactionContexts;
use crate::error::{ShimError, ShimResult};
use crate::message::{
    codec, ChaincodeEvent, ChaincodeId, ChaincodeInput, ChaincodeMessage, ChaincodeSpec, DelState,
    GetHistoryForKey, GetQueryResult, GetState, GetStateByRange, GetStateMetadata, MessageType,
    PutState, PutStateMetadata, QueryMetadata, QueryResponse, QueryStateClose, QueryStateNext,
    StateMetadata, StateMetadataResult, TxKey,
};
use crate::outbound::{self, OutboundQueue, OutboundReceiver};
use crate::registry::ResponseRegistry;
use crate::state::ConnectionState;
use crate::stub::ChaincodeStub;

type LifecycleFsm = Fsm<ChaincodeMessage, ShimError>;
type LifecycleEvent = FsmEvent<ChaincodeMessage, ShimError>;

pub struct Handler {
    chaincode_id: ChaincodeId,
    chaincode: Arc<dyn Chaincode>,
    // Only the inbound reader raises events; the lock makes the handler Sync.
    fsm: Mutex<LifecycleFsm>,
    registry: Arc<ResponseRegistry>,
    contexts: Arc<TransactionContexts>,
    outbound: OutboundQueue,
    cancel: CancellationToken,
}

impl Handler {
    /// Creates the handler and queues the registration message.
    ///
    /// The returned receiver must be drained by exactly one writer.
    pub fn new(
        chaincode_id: ChaincodeId,
        chaincode: Arc<dyn Chaincode>,
        cancel: CancellationToken,
    ) -> ShimResult<(Arc<Self>, OutboundReceiver)> {
        let (outbound, receiver) = outbound::channel();
        let handler = Arc::new(Self {
            chaincode_id,
            chaincode,
            fsm: Mutex::new(Fsm::new(ConnectionState::Created.as_str())),
            registry: Arc::new(ResponseRegistry::new()),
            contexts: Arc::new(TransactionContexts::new()),
            outbound,
            cancel,
        });
        handler.install_lifecycle()?;

        let register = ChaincodeMessage::new(
            MessageType::Register,
            "",
            "",
            codec::encode(&handler.chaincode_id)?,
        );
        handler.outbound.enqueue(register)?;
        info!(chaincode = %handler.chaincode_id.name, "registering with peer");

        Ok((handler, receiver))
    }

    fn install_lifecycle(self: &Arc<Self>) -> ShimResult<()> {
        let created = ConnectionState::Created.as_str();
        let established = ConnectionState::Established.as_str();
        let ready = ConnectionState::Ready.as_str();

        let mut fsm = self.fsm.lock();
        fsm.add_events([
            EventDesc::new(MessageType::Registered.as_str(), [created], established),
            EventDesc::new(MessageType::Ready.as_str(), [established], ready),
            EventDesc::new(MessageType::Init.as_str(), [ready], ready),
            EventDesc::new(MessageType::Transaction.as_str(), [ready], ready),
            EventDesc::new(MessageType::Response.as_str(), [ready], ready),
            EventDesc::new(MessageType::Error.as_str(), [ready], ready),
        ])?;
        fsm.add_callbacks([
            CallbackDesc::enter_state(established, |_: &mut LifecycleEvent| {
                info!("registered with peer, waiting for ready")
            }),
            CallbackDesc::enter_state(ready, |_: &mut LifecycleEvent| {
                info!("chaincode ready for transactions")
            }),
            CallbackDesc::before_event(MessageType::Init.as_str(), dispatch(Arc::downgrade(self))),
            CallbackDesc::before_event(
                MessageType::Transaction.as_str(),
                dispatch(Arc::downgrade(self)),
            ),
            CallbackDesc::after_event(
                MessageType::Response.as_str(),
                deliver(Arc::clone(&self.registry)),
            ),
            CallbackDesc::after_event(MessageType::Error.as_str(), deliver(Arc::clone(&self.registry))),
        ])?;
        Ok(())
    }

    pub fn chaincode_id(&self) -> &ChaincodeId {
        &self.chaincode_id
    }

    pub fn state(&self) -> ConnectionState {
        self.fsm
            .lock()
            .current()
            .parse()
            .unwrap_or(ConnectionState::Created)
    }

    pub fn registry(&self) -> &Arc<ResponseRegistry> {
        &self.registry
    }

    pub fn contexts(&self) -> &Arc<TransactionContexts> {
        &self.contexts
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Classifies one inbound message. Called only by the inbound reader.
    ///
    /// Init/Transaction messages are handed to a new task and this returns
    /// immediately. An `Err` concerns this message only; the reader logs it
    /// and keeps going.
    pub fn handle_inbound(&self, message: ChaincodeMessage) -> ShimResult<()> {
        if message.kind == MessageType::Keepalive {
            debug!(tx_id = %message.txid, "received keepalive, nothing to do");
            return Ok(());
        }

        let key = message.tx_key();
        let kind = message.kind;
        let size = message.payload.len();

        let mut fsm = self.fsm.lock();
        let state = fsm.current().to_string();
        debug!(%key, %kind, %state, "handling chaincode message");
        let outcome = fsm.raise_event(kind.as_str(), message);
        drop(fsm);

        match outcome {
            Ok(outcome) => {
                let transitioned = outcome.is_transitioned();
                match outcome.into_cause() {
                    Some(cause) => Err(cause),
                    None => {
                        if !transitioned {
                            debug!(%key, %kind, "ignoring lifecycle signal without cause");
                        }
                        Ok(())
                    }
                }
            }
            Err(err) if err.is_illegal_event() => self.reject(key, kind, size, state),
            Err(err) => Err(err.into()),
        }
    }

    fn reject(&self, key: TxKey, kind: MessageType, size: usize, state: String) -> ShimResult<()> {
        if state != ConnectionState::Ready.as_str() {
            warn!(%key, %kind, %state, "ignoring message while registering");
            return Ok(());
        }

        let err = ShimError::IllegalMessage {
            key: key.clone(),
            kind,
            size,
            state,
        };
        self.outbound.enqueue(ChaincodeMessage::for_tx(
            MessageType::Error,
            &key,
            err.to_string(),
        ))?;
        Err(err)
    }

    fn spawn_transaction(self: Arc<Self>, message: ChaincodeMessage) {
        let span = info_span!(
            "transaction",
            channel_id = %message.channel_id,
            tx_id = %message.txid,
            kind = %message.kind,
        );
        tokio::spawn(
            self.run_transaction(message)
                .instrument(span)
                .with_current_subscriber(),
        );
    }

    async fn run_transaction(self: Arc<Self>, message: ChaincodeMessage) {
        let key = message.tx_key();
        let outcome = AssertUnwindSafe(self.execute(&message)).catch_unwind().await;

        let reply = match outcome {
            Ok(Ok((response, event))) if !response.is_error() => match codec::encode(&response) {
                Ok(payload) => {
                    debug!(status = response.status, "transaction completed");
                    ChaincodeMessage::for_tx(MessageType::Completed, &key, payload).with_event(event)
                }
                Err(err) => ChaincodeMessage::for_tx(MessageType::Error, &key, err.to_string()),
            },
            Ok(Ok((response, event))) => {
                warn!(status = response.status, message = %response.message, "transaction failed");
                ChaincodeMessage::for_tx(MessageType::Error, &key, response.message).with_event(event)
            }
            Ok(Err(err)) => {
                let text = format!("{:#}", err);
                error!(error = %text, "transaction raised an error");
                ChaincodeMessage::for_tx(MessageType::Error, &key, text)
            }
            Err(panic) => {
                let text = panic_message(panic);
                error!(error = %text, "transaction panicked");
                ChaincodeMessage::for_tx(MessageType::Error, &key, text)
            }
        };

        if let Err(err) = self.outbound.enqueue(reply) {
            warn!(%key, %err, "could not report transaction outcome");
        }
    }

    async fn execute(
        self: &Arc<Self>,
        message: &ChaincodeMessage,
    ) -> anyhow::Result<(Response, Option<ChaincodeEvent>)> {
        let input: ChaincodeInput = codec::decode(&message.payload)?;
        let _context = self.contexts.mark(message.tx_key(), true)?;

        let mut stub = ChaincodeStub::new(Arc::clone(self), message, input)?;
        let response = match message.kind {
            MessageType::Init => self.chaincode.init(&mut stub).await?,
            _ => self.chaincode.invoke(&mut stub).await?,
        };
        Ok((response, stub.take_event()))
    }

    /// Sends `request` and suspends until the peer answers it.
    ///
    /// Returns the payload of a Response; an Error reply becomes
    /// [`ShimError::PeerError`].
    pub async fn invoke_and_await(&self, request: ChaincodeMessage) -> ShimResult<Bytes> {
        let key = request.tx_key();
        let slot = self.registry.acquire(key.clone())?;
        debug!(%key, kind = %request.kind, "sending correlated request");
        self.outbound.enqueue(request)?;

        let reply = slot.wait(&self.cancel).await?;
        match reply.kind {
            MessageType::Response => Ok(reply.payload),
            MessageType::Error => Err(ShimError::PeerError {
                key,
                message: reply.payload_text().into_owned(),
            }),
            kind => Err(ShimError::UnexpectedResponse { key, kind }),
        }
    }

    pub async fn get_state(&self, key: &TxKey, collection: &str, state_key: &str) -> ShimResult<Bytes> {
        let request = GetState {
            key: state_key.to_string(),
            collection: collection.to_string(),
        };
        self.invoke_and_await(ChaincodeMessage::for_tx(
            MessageType::GetState,
            key,
            codec::encode(&request)?,
        ))
        .await
    }

    pub async fn put_state(
        &self,
        key: &TxKey,
        collection: &str,
        state_key: &str,
        value: Bytes,
    ) -> ShimResult<()> {
        self.ensure_transaction(key, "put state")?;
        let request = PutState {
            key: state_key.to_string(),
            value,
            collection: collection.to_string(),
        };
        self.invoke_and_await(ChaincodeMessage::for_tx(
            MessageType::PutState,
            key,
            codec::encode(&request)?,
        ))
        .await?;
        Ok(())
    }

    pub async fn delete_state(&self, key: &TxKey, collection: &str, state_key: &str) -> ShimResult<()> {
        self.ensure_transaction(key, "del state")?;
        let request = DelState {
            key: state_key.to_string(),
            collection: collection.to_string(),
        };
        self.invoke_and_await(ChaincodeMessage::for_tx(
            MessageType::DelState,
            key,
            codec::encode(&request)?,
        ))
        .await?;
        Ok(())
    }

    pub async fn get_state_metadata(
        &self,
        key: &TxKey,
        collection: &str,
        state_key: &str,
    ) -> ShimResult<HashMap<String, Bytes>> {
        let request = GetStateMetadata {
            key: state_key.to_string(),
            collection: collection.to_string(),
        };
        let payload = self
            .invoke_and_await(ChaincodeMessage::for_tx(
                MessageType::GetStateMetadata,
                key,
                codec::encode(&request)?,
            ))
            .await?;
        let result: StateMetadataResult = codec::decode(&payload)?;
        Ok(result
            .entries
            .into_iter()
            .map(|entry| (entry.metakey, entry.value))
            .collect())
    }

    pub async fn put_state_metadata(
        &self,
        key: &TxKey,
        collection: &str,
        state_key: &str,
        metakey: &str,
        value: Bytes,
    ) -> ShimResult<()> {
        self.ensure_transaction(key, "put state metadata")?;
        let request = PutStateMetadata {
            key: state_key.to_string(),
            collection: collection.to_string(),
            metadata: StateMetadata {
                metakey: metakey.to_string(),
                value,
            },
        };
        self.invoke_and_await(ChaincodeMessage::for_tx(
            MessageType::PutStateMetadata,
            key,
            codec::encode(&request)?,
        ))
        .await?;
        Ok(())
    }

    pub fn range_request(
        key: &TxKey,
        collection: &str,
        start_key: &str,
        end_key: &str,
        metadata: Option<&QueryMetadata>,
    ) -> ShimResult<ChaincodeMessage> {
        let request = GetStateByRange {
            start_key: start_key.to_string(),
            end_key: end_key.to_string(),
            collection: collection.to_string(),
            metadata: encode_metadata(metadata)?,
        };
        Ok(ChaincodeMessage::for_tx(
            MessageType::GetStateByRange,
            key,
            codec::encode(&request)?,
        ))
    }

    pub fn rich_query_request(
        key: &TxKey,
        collection: &str,
        query: &str,
        metadata: Option<&QueryMetadata>,
    ) -> ShimResult<ChaincodeMessage> {
        let request = GetQueryResult {
            query: query.to_string(),
            collection: collection.to_string(),
            metadata: encode_metadata(metadata)?,
        };
        Ok(ChaincodeMessage::for_tx(
            MessageType::GetQueryResult,
            key,
            codec::encode(&request)?,
        ))
    }

    pub fn history_request(key: &TxKey, state_key: &str) -> ShimResult<ChaincodeMessage> {
        let request = GetHistoryForKey {
            key: state_key.to_string(),
        };
        Ok(ChaincodeMessage::for_tx(
            MessageType::GetHistoryForKey,
            key,
            codec::encode(&request)?,
        ))
    }

    /// Sends a query request and decodes the first page it returns.
    pub async fn query(&self, request: ChaincodeMessage) -> ShimResult<QueryResponse> {
        let payload = self.invoke_and_await(request).await?;
        codec::decode(&payload)
    }

    pub async fn get_state_by_range(
        &self,
        key: &TxKey,
        collection: &str,
        start_key: &str,
        end_key: &str,
        metadata: Option<&QueryMetadata>,
    ) -> ShimResult<QueryResponse> {
        self.query(Self::range_request(key, collection, start_key, end_key, metadata)?)
            .await
    }

    pub async fn get_query_result(
        &self,
        key: &TxKey,
        collection: &str,
        query: &str,
        metadata: Option<&QueryMetadata>,
    ) -> ShimResult<QueryResponse> {
        self.query(Self::rich_query_request(key, collection, query, metadata)?)
            .await
    }

    pub async fn get_history_for_key(&self, key: &TxKey, state_key: &str) -> ShimResult<QueryResponse> {
        self.query(Self::history_request(key, state_key)?).await
    }

    pub async fn query_state_next(&self, key: &TxKey, id: &str) -> ShimResult<QueryResponse> {
        let request = QueryStateNext { id: id.to_string() };
        self.query(ChaincodeMessage::for_tx(
            MessageType::QueryStateNext,
            key,
            codec::encode(&request)?,
        ))
        .await
    }

    pub async fn query_state_close(&self, key: &TxKey, id: &str) -> ShimResult<QueryResponse> {
        let request = QueryStateClose { id: id.to_string() };
        self.query(ChaincodeMessage::for_tx(
            MessageType::QueryStateClose,
            key,
            codec::encode(&request)?,
        ))
        .await
    }

    /// Calls another chaincode inside the current transaction.
    ///
    /// `chaincode_name` may carry a `/channel` suffix. The peer answers with
    /// the callee's own Completed or Error message wrapped in a Response.
    pub async fn invoke_chaincode(
        &self,
        key: &TxKey,
        chaincode_name: &str,
        args: Vec<Bytes>,
    ) -> ShimResult<Response> {
        let spec = ChaincodeSpec {
            chaincode_id: ChaincodeId::new(chaincode_name),
            input: ChaincodeInput::from_args(args),
        };
        let payload = self
            .invoke_and_await(ChaincodeMessage::for_tx(
                MessageType::InvokeChaincode,
                key,
                codec::encode(&spec)?,
            ))
            .await?;

        let inner: ChaincodeMessage = codec::decode(&payload)?;
        debug!(%key, kind = %inner.kind, chaincode = chaincode_name, "chaincode invocation returned");
        match inner.kind {
            MessageType::Completed => codec::decode(&inner.payload),
            _ => Ok(Response::error(inner.payload_text())),
        }
    }

    fn ensure_transaction(&self, key: &TxKey, operation: &'static str) -> ShimResult<()> {
        if self.contexts.is_transaction(key) {
            Ok(())
        } else {
            Err(ShimError::QueryContext { operation })
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("chaincode_id", &self.chaincode_id)
            .field("state", &self.state())
            .field("pending", &self.registry.len())
            .field("transactions", &self.contexts.len())
            .finish()
    }
}

fn dispatch(handler: Weak<Handler>) -> impl FnMut(&mut LifecycleEvent) + Send + 'static {
    move |event| match handler.upgrade() {
        Some(handler) => handler.spawn_transaction(event.args().clone()),
        None => event.cancel(Some(ShimError::HandlerGone)),
    }
}

fn deliver(registry: Arc<ResponseRegistry>) -> impl FnMut(&mut LifecycleEvent) + Send + 'static {
    move |event| {
        let message = event.args().clone();
        if let Err(err) = registry.deliver(&message.tx_key(), message) {
            event.set_error(err);
        }
    }
}

fn encode_metadata(metadata: Option<&QueryMetadata>) -> ShimResult<Bytes> {
    match metadata {
        Some(metadata) => codec::encode(metadata),
        None => Ok(Bytes::new()),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic in chaincode: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic in chaincode: {s}")
    } else {
        "panic in chaincode".to_string()
    }
}
