//! vapi core: service registry, dynamic method dispatch, codecs, routing, HTTP server.
//!
//! Receivers are registered under a service name; each of their handler methods becomes
//! callable as `Service.Method` through `GET|POST {base_url}/:method`.

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod names;
pub mod registry;
pub mod router;
pub mod server;
pub mod service;

pub use codec::{Codec, Format, JsonCodec, XmlCodec};
pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use error::{ApiError, CodecError, InvokeError, RegistryError, ServiceError};
pub use registry::ServiceMap;
pub use router::{RouteId, RouteMatch, Router};
pub use server::{ApiServer, Middleware, RouteHandler};
pub use service::{MethodSpec, Receiver, Service, ServiceMethod, Shape};

/// Response header that stops clients from MIME-sniffing away from the declared content type.
pub const NOSNIFF_HEADER: (&str, &str) = ("x-content-type-options", "nosniff");

/// One inbound HTTP request, as seen by middlewares, route handlers and service methods.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    /// Decoded query string pairs, in request order.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Route parameters captured by the router (e.g. `method` for `:method`).
    pub params: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RequestContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parse a raw (`a=1&b=two%20words`) query string into decoded pairs.
    pub fn parse_query(query_string: &str) -> Vec<(String, String)> {
        url::form_urlencoded::parse(query_string.as_bytes())
            .into_owned()
            .collect()
    }
}

/// Response produced by the dispatcher, a route handler or a middleware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status_code: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status_code,
            content_type: Some(content_type.to_owned()),
            headers: Vec::new(),
            body,
        }
    }

    /// Plain-text response, used for structural errors that never reach a codec.
    pub fn text(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(
            status_code,
            "text/plain; charset=utf-8",
            message.into().into_bytes(),
        )
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
