//! Lazily paged query results.
//!
//! A [`QueryResults`] owns one peer-side cursor. Pages are fetched on
//! demand and every element read is cached, so any number of
//! [`QueryIter`]s can walk the same results while each page is requested
//! from the peer only once.

use std::sync::Arc;

use futures::stream::{self, BoxStream};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ShimError, ShimResult};
use crate::handler::Handler;
use crate::ledger::{KeyModification, KeyValue};
use crate::message::{codec, ChaincodeMessage, QueryResponse, QueryResponseMetadata, QueryResultBytes, TxKey};

/// A record type that can be decoded from a query result element.
pub trait QueryRecord: Clone + Send + Sync + 'static {
    fn from_result_bytes(bytes: &[u8]) -> ShimResult<Self>;
}

impl QueryRecord for KeyValue {
    fn from_result_bytes(bytes: &[u8]) -> ShimResult<Self> {
        codec::decode(bytes)
    }
}

impl QueryRecord for KeyModification {
    fn from_result_bytes(bytes: &[u8]) -> ShimResult<Self> {
        codec::decode(bytes)
    }
}

enum CursorState {
    NotStarted,
    /// A page request is in flight. Seen only if that request was dropped
    /// half way.
    Fetching,
    HasPage {
        page: QueryResponse,
        position: usize,
    },
    Exhausted,
    Failed(String),
    Closed,
}

enum Step {
    Yield(QueryResultBytes),
    FetchFirst,
    FetchNext(String),
    Done,
}

struct Cursor {
    handler: Arc<Handler>,
    key: TxKey,
    request: ChaincodeMessage,
    state: CursorState,
    cursor_id: Option<String>,
    first_page: Option<QueryResponse>,
}

impl Cursor {
    /// Next raw element, fetching pages as needed. `Ok(None)` once every
    /// page has been drained.
    async fn advance(&mut self) -> ShimResult<Option<QueryResultBytes>> {
        loop {
            let step = match &mut self.state {
                CursorState::Closed => return Err(ShimError::QueryClosed),
                CursorState::Failed(message) => return Err(ShimError::query(message.clone())),
                CursorState::Fetching => {
                    return Err(ShimError::query("page request was interrupted"))
                }
                CursorState::Exhausted => Step::Done,
                CursorState::NotStarted => Step::FetchFirst,
                CursorState::HasPage { page, position } => match page.results.get(*position) {
                    Some(item) => {
                        *position += 1;
                        Step::Yield(item.clone())
                    }
                    None if page.has_more => Step::FetchNext(page.id.clone()),
                    None => Step::Done,
                },
            };

            match step {
                Step::Yield(item) => return Ok(Some(item)),
                Step::Done => {
                    self.state = CursorState::Exhausted;
                    return Ok(None);
                }
                Step::FetchFirst => self.fetch_first().await?,
                Step::FetchNext(id) => {
                    self.state = CursorState::Fetching;
                    let page = self.handler.query_state_next(&self.key, &id).await;
                    self.accept(page)?;
                }
            }
        }
    }

    fn accept(&mut self, page: ShimResult<QueryResponse>) -> ShimResult<QueryResponse> {
        match page {
            Ok(page) => {
                debug!(key = %self.key, cursor = %page.id, results = page.results.len(), has_more = page.has_more, "received query page");
                self.cursor_id = Some(page.id.clone());
                self.state = CursorState::HasPage {
                    page: page.clone(),
                    position: 0,
                };
                Ok(page)
            }
            Err(err) => {
                self.state = CursorState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn fetch_first(&mut self) -> ShimResult<()> {
        self.state = CursorState::Fetching;
        let page = self.handler.query(self.request.clone()).await;
        let page = self.accept(page)?;
        self.first_page = Some(page);
        Ok(())
    }

    async fn ensure_started(&mut self) -> ShimResult<()> {
        match &self.state {
            CursorState::NotStarted => self.fetch_first().await,
            CursorState::Closed => Err(ShimError::QueryClosed),
            CursorState::Failed(message) => Err(ShimError::query(message.clone())),
            _ => Ok(()),
        }
    }

    fn fail(&mut self, err: &ShimError) {
        self.state = CursorState::Failed(err.to_string());
    }

    async fn close(&mut self) {
        if matches!(self.state, CursorState::Closed) {
            return;
        }
        self.state = CursorState::Closed;

        let Some(id) = self.cursor_id.take() else {
            return;
        };
        if let Err(err) = self.handler.query_state_close(&self.key, &id).await {
            warn!(key = %self.key, cursor = %id, %err, "failed to close query cursor");
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if let Some(id) = &self.cursor_id {
            if !matches!(self.state, CursorState::Closed) {
                debug!(key = %self.key, cursor = %id, "query results dropped without close");
            }
        }
    }
}

struct Cache<T> {
    cursor: Cursor,
    items: Vec<T>,
}

/// Results of a range, rich or history query.
///
/// Nothing is sent to the peer until the results are first read. Call
/// [`QueryResults::close`] when done so the peer can release the cursor.
/// Dropping the results without closing them sends nothing and leaves the
/// cursor open on the peer until the transaction ends. The only path that
/// closes on its own is [`QueryResults::blocking_iter`], when the iterator
/// is exhausted, fails or is dropped.
pub struct QueryResults<T> {
    shared: Arc<Mutex<Cache<T>>>,
}

impl<T> Clone for QueryResults<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> QueryResults<T> {
    /// Tells the peer to release the cursor. Idempotent; failures are only
    /// logged.
    pub async fn close(&self) {
        self.shared.lock().await.cursor.close().await;
    }

    pub async fn is_closed(&self) -> bool {
        matches!(self.shared.lock().await.cursor.state, CursorState::Closed)
    }
}

impl<T: QueryRecord> QueryResults<T> {
    pub(crate) fn new(handler: Arc<Handler>, key: TxKey, request: ChaincodeMessage) -> Self {
        let cursor = Cursor {
            handler,
            key,
            request,
            state: CursorState::NotStarted,
            cursor_id: None,
            first_page: None,
        };
        Self {
            shared: Arc::new(Mutex::new(Cache {
                cursor,
                items: Vec::new(),
            })),
        }
    }

    /// A fresh iterator starting at the first element.
    pub fn iter(&self) -> QueryIter<T> {
        QueryIter {
            shared: Arc::clone(&self.shared),
            position: 0,
        }
    }

    /// Pagination metadata of the first page, if the query was paginated.
    pub async fn metadata(&self) -> ShimResult<Option<QueryResponseMetadata>> {
        let mut cache = self.shared.lock().await;
        cache.cursor.ensure_started().await?;
        match &cache.cursor.first_page {
            Some(page) if !page.metadata.is_empty() => Ok(Some(codec::decode(&page.metadata)?)),
            _ => Ok(None),
        }
    }

    /// Reads every remaining element into a vector.
    pub async fn collect(&self) -> ShimResult<Vec<T>> {
        let mut iter = self.iter();
        let mut items = Vec::new();
        while let Some(item) = iter.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    pub fn stream(&self) -> BoxStream<'static, ShimResult<T>> {
        Box::pin(stream::unfold(self.iter(), |mut iter| async move {
            iter.next().await.map(|item| (item, iter))
        }))
    }

    /// Synchronous iteration that closes the results when it ends.
    pub fn blocking_iter(&self) -> BlockingQueryIter<T> {
        BlockingQueryIter {
            results: self.clone(),
            inner: self.iter(),
            finished: false,
        }
    }
}

impl<T> std::fmt::Debug for QueryResults<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResults").finish_non_exhaustive()
    }
}

/// An independent position over shared [`QueryResults`].
pub struct QueryIter<T> {
    shared: Arc<Mutex<Cache<T>>>,
    position: usize,
}

impl<T: QueryRecord> QueryIter<T> {
    pub async fn next(&mut self) -> Option<ShimResult<T>> {
        let mut cache = self.shared.lock().await;
        if matches!(cache.cursor.state, CursorState::Closed) {
            return Some(Err(ShimError::QueryClosed));
        }

        if let Some(item) = cache.items.get(self.position) {
            self.position += 1;
            return Some(Ok(item.clone()));
        }

        match cache.cursor.advance().await {
            Ok(Some(raw)) => match T::from_result_bytes(&raw.result_bytes) {
                Ok(item) => {
                    cache.items.push(item.clone());
                    self.position += 1;
                    Some(Ok(item))
                }
                Err(err) => {
                    cache.cursor.fail(&err);
                    Some(Err(err))
                }
            },
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// [`Iterator`] adapter over [`QueryResults`].
///
/// Stops after the first error and closes the results once iteration ends
/// or the iterator is dropped early.
/// On a multi-threaded tokio runtime this parks the worker with
/// [`tokio::task::block_in_place`]; it must not be used on a
/// current-thread runtime.
pub struct BlockingQueryIter<T> {
    results: QueryResults<T>,
    inner: QueryIter<T>,
    finished: bool,
}

impl<T: QueryRecord> Iterator for BlockingQueryIter<T> {
    type Item = ShimResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let item = block_on(self.inner.next());
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
            block_on(self.results.close());
        }
        item
    }
}

impl<T> Drop for BlockingQueryIter<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            block_on(self.results.close());
        }
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(future)),
        Err(_) => futures::executor::block_on(future),
    }
}
