//! ApiServer: binds the RPC routes to the dispatcher, holds custom routes and middlewares.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::warn;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ApiError, RegistryError};
use crate::registry::ServiceMap;
use crate::router::{RouteId, RouteMatch, Router};
use crate::service::Receiver;
use crate::{RequestContext, Response};

/// Async middleware: return `Some(response)` to short-circuit, `None` to continue.
pub type Middleware =
    Box<dyn Fn(&RequestContext) -> BoxFuture<'static, Option<Response>> + Send + Sync>;

/// Handler for a custom (non-RPC) route.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn call(&self, req: RequestContext) -> Response;
}

#[async_trait]
impl<F> RouteHandler for F
where
    F: Fn(RequestContext) -> Response + Send + Sync,
{
    async fn call(&self, req: RequestContext) -> Response {
        self(req)
    }
}

enum Endpoint {
    Rpc,
    Custom(Arc<dyn RouteHandler>),
}

/// RPC server: `GET|POST {base_url}/:method` go to the dispatcher.
pub struct ApiServer {
    base_url: String,
    router: Router,
    endpoints: HashMap<RouteId, Endpoint>,
    next_route_id: u32,
    middlewares: Vec<Middleware>,
    dispatcher: Arc<Dispatcher>,
}

impl ApiServer {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let mut server = Self {
            base_url,
            router: Router::new(),
            endpoints: HashMap::new(),
            next_route_id: 0,
            middlewares: Vec::new(),
            dispatcher: Arc::new(Dispatcher::new(Arc::new(ServiceMap::new()))),
        };
        let pattern = format!("{}/:method", server.base_url);
        let id = server.alloc_route_id();
        for verb in crate::dispatch::ALLOWED_VERBS {
            server.router.add(verb, &pattern, id);
        }
        server.endpoints.insert(id, Endpoint::Rpc);
        server
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.base_url)
    }

    fn alloc_route_id(&mut self) -> RouteId {
        let id = RouteId(self.next_route_id);
        self.next_route_id += 1;
        id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a receiver. An empty `name` derives the service name from the type name.
    pub fn register_service<T: Receiver>(&self, receiver: T, name: &str) -> Result<(), RegistryError> {
        self.register_shared_service(Arc::new(receiver), name)
    }

    /// Register a receiver the caller keeps a handle to.
    pub fn register_shared_service<T: Receiver>(
        &self,
        receiver: Arc<T>,
        name: &str,
    ) -> Result<(), RegistryError> {
        self.dispatcher.services().register(receiver, name)
    }

    /// True if the dotted `Service.Method` is registered (no normalization applied).
    pub fn has_method(&self, method: &str) -> bool {
        self.dispatcher.services().has_method(method)
    }

    pub fn services(&self) -> &ServiceMap {
        self.dispatcher.services()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Add a plain route next to the RPC endpoint.
    pub fn add_route<H>(&mut self, method: &str, path: &str, handler: H) -> RouteId
    where
        H: RouteHandler + 'static,
    {
        let id = self.alloc_route_id();
        self.router.add(method, path, id);
        self.endpoints.insert(id, Endpoint::Custom(Arc::new(handler)));
        id
    }

    /// Middlewares run in registration order before every matched route.
    pub fn add_middleware<F, Fut>(&mut self, mw: F) -> &mut Self
    where
        F: Fn(&RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Response>> + Send + 'static,
    {
        self.middlewares.push(Box::new(move |ctx| Box::pin(mw(ctx))));
        self
    }

    /// Route, run middlewares, then dispatch. RPC calls run on the blocking pool.
    pub async fn handle(&self, mut req: RequestContext) -> Response {
        let (id, params) = match self.router.match_route(&req.method, &req.path) {
            RouteMatch::Found { id, params } => (id, params),
            RouteMatch::MethodNotAllowed { allowed } => {
                return ApiError::MethodNotAllowed {
                    allowed: allowed.join(" or "),
                    received: req.method,
                }
                .into_response(&crate::codec::JsonCodec);
            }
            RouteMatch::NotFound => {
                return ApiError::RouteNotFound(req.path).into_response(&crate::codec::JsonCodec);
            }
        };
        req.params = params;

        for mw in &self.middlewares {
            if let Some(resp) = mw(&req).await {
                return resp;
            }
        }

        match self.endpoints.get(&id) {
            Some(Endpoint::Rpc) => {
                let dispatcher = Arc::clone(&self.dispatcher);
                match tokio::task::spawn_blocking(move || dispatcher.dispatch(&req)).await {
                    Ok(resp) => resp,
                    Err(err) => {
                        warn!(error = %err, "dispatch task failed");
                        Response::text(500, "api: internal error")
                    }
                }
            }
            Some(Endpoint::Custom(handler)) => handler.call(req).await,
            None => ApiError::RouteNotFound(req.path).into_response(&crate::codec::JsonCodec),
        }
    }

    /// Bind and serve until Ctrl-C.
    pub fn listen_and_serve(
        self,
        config: &ServerConfig,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        crate::http::run(self, config)
    }
}
