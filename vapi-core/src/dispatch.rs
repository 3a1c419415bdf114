//! Dispatcher: one request in, one method invocation, one response out.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{Codec, Format, JsonCodec};
use crate::error::ApiError;
use crate::registry::ServiceMap;
use crate::{RequestContext, Response, NOSNIFF_HEADER};

/// Verbs accepted by the dispatcher, in the order reported to clients.
pub const ALLOWED_VERBS: [&str; 2] = ["POST", "GET"];

pub struct Dispatcher {
    services: Arc<ServiceMap>,
}

impl Dispatcher {
    pub fn new(services: Arc<ServiceMap>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<ServiceMap> {
        &self.services
    }

    /// Handle one RPC request. Never fails: every error becomes a response.
    ///
    /// The request must carry the `method` route parameter. Blocks for as long as the
    /// invoked method does.
    pub fn dispatch(&self, req: &RequestContext) -> Response {
        if !ALLOWED_VERBS.iter().any(|v| v.eq_ignore_ascii_case(&req.method)) {
            let err = ApiError::MethodNotAllowed {
                allowed: ALLOWED_VERBS.join(" or "),
                received: req.method.clone(),
            };
            debug!(verb = %req.method, "rejecting verb");
            return err.into_response(&JsonCodec);
        }

        let format = Format::from_request(req);
        match self.call(format, req) {
            Ok(body) => format
                .write_response(body)
                .with_header(NOSNIFF_HEADER.0, NOSNIFF_HEADER.1),
            Err(err) => {
                if err.is_structural() {
                    debug!(error = %err, "unresolved call");
                } else {
                    warn!(status = err.status(), error = %err, "call failed");
                }
                err.into_response(&format)
            }
        }
    }

    fn call(&self, format: Format, req: &RequestContext) -> Result<Vec<u8>, ApiError> {
        let method = format.method(req)?;
        let (service, handler) = self.services.get(&method).map_err(|err| {
            debug!(error = %err, "resolution failed");
            ApiError::MethodNotFound(method.clone())
        })?;
        debug!(method = %method, ?format, "dispatching");

        let mut args = handler.new_args();
        handler
            .read_args(format, req, &mut *args)
            .map_err(ApiError::Decode)?;
        let mut reply = handler.new_reply();
        service.invoke(&handler, req, &mut *args, &mut *reply)?;
        handler
            .write_reply(format, &*reply)
            .map_err(ApiError::Encode)
    }
}
