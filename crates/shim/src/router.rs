//! Name-based function routing for chaincode.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::chaincode::{Chaincode, Response};
use crate::stub::ChaincodeStub;

pub type RouteFuture<'a> = BoxFuture<'a, anyhow::Result<Response>>;

/// A routed chaincode function.
pub type RouteHandler = Arc<dyn for<'a> Fn(&'a mut ChaincodeStub) -> RouteFuture<'a> + Send + Sync>;

/// [`Chaincode`] that dispatches Invoke by the first argument.
///
/// Function names are matched case-insensitively. Handlers are plain
/// functions returning a boxed future:
///
/// ```rust,no_run
/// use chaincode_shim::{ChaincodeStub, Response, RouteFuture, Router};
///
/// fn ping(_stub: &mut ChaincodeStub) -> RouteFuture<'_> {
///     Box::pin(async move { Ok(Response::success("pong")) })
/// }
///
/// let router = Router::new().route("ping", ping);
/// ```
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<String, RouteHandler>,
    init: Option<RouteHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any earlier handler.
    pub fn route<F>(mut self, name: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut ChaincodeStub) -> RouteFuture<'a> + Send + Sync + 'static,
    {
        let name = name.to_lowercase();
        info!(function = %name, "registering chaincode function");
        self.routes.insert(name, Arc::new(handler));
        self
    }

    /// Handler for Init. Without one, Init succeeds with an empty payload.
    pub fn on_init<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut ChaincodeStub) -> RouteFuture<'a> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(handler));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(&name.to_lowercase())
    }

    /// Registered names, lower-cased and sorted.
    pub fn functions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("functions", &self.functions())
            .field("init", &self.init.is_some())
            .finish()
    }
}

#[async_trait]
impl Chaincode for Router {
    async fn init(&self, stub: &mut ChaincodeStub) -> anyhow::Result<Response> {
        match &self.init {
            Some(handler) => handler(stub).await,
            None => Ok(Response::success(Bytes::new())),
        }
    }

    async fn invoke(&self, stub: &mut ChaincodeStub) -> anyhow::Result<Response> {
        let function = stub.function().unwrap_or_default().to_lowercase();
        let Some(handler) = self.routes.get(&function) else {
            return Ok(Response::error(format!("Unknown function {}", function)));
        };

        debug!(function = %function, tx_id = %stub.tx_id(), "routing invoke");
        match handler(stub).await {
            Ok(response) => Ok(response),
            Err(err) => Ok(Response::error(format!("{:#}", err))),
        }
    }
}
