//! Error types for registration, codecs, invocation and request handling.

use thiserror::Error;

use crate::codec::Codec;
use crate::{Response, NOSNIFF_HEADER};

/// Registration and resolution failures of the service registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("api: type {0:?} is not exported")]
    NotExported(String),
    #[error("api: no service name for type {0:?}")]
    NoName(String),
    #[error("api: {0:?} has no exported methods of suitable type")]
    NoSuitableMethods(String),
    #[error("api: service already defined: {0:?}")]
    AlreadyDefined(String),
    #[error("api: service/method request ill-formed: {0:?}")]
    IllFormed(String),
    #[error("api: can't find service {0:?}")]
    ServiceNotFound(String),
    #[error("api: can't find method {0:?}")]
    MethodNotFound(String),
}

/// Failures while decoding a request into an argument or encoding a reply.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid XML: {0}")]
    Xml(String),
    #[error("invalid form: {0}")]
    Form(String),
    #[error("value is not of declared type {0}")]
    Shape(&'static str),
}

/// Outcome of calling one erased handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// The method ran and reported a failure.
    #[error("{0}")]
    Business(String),
    /// Receiver, argument or reply did not have the type the descriptor was built for.
    #[error("api: value is not of declared type {0}")]
    Shape(&'static str),
}

/// Ready-made business error for service methods.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Per-request failure. Every variant maps to one status code and one wire response.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("api: {allowed} method required, received {received}")]
    MethodNotAllowed { allowed: String, received: String },
    #[error("api: route not found: {0}")]
    RouteNotFound(String),
    #[error("api: method not found: {0}")]
    MethodNotFound(String),
    #[error("{0}")]
    Decode(CodecError),
    #[error("{0}")]
    Business(String),
    #[error("{0}")]
    Encode(CodecError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::MethodNotAllowed { .. } => 405,
            ApiError::RouteNotFound(_) | ApiError::MethodNotFound(_) => 404,
            ApiError::Decode(_) | ApiError::Business(_) => 400,
            ApiError::Encode(_) | ApiError::Internal(_) => 500,
        }
    }

    /// True for failures detected before any method could be resolved.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ApiError::MethodNotAllowed { .. } | ApiError::RouteNotFound(_) | ApiError::MethodNotFound(_)
        )
    }

    /// Wire form: structural errors are plain text, the rest go through the codec.
    pub fn into_response<C: Codec>(self, codec: &C) -> Response {
        let status = self.status();
        let resp = if self.is_structural() {
            Response::text(status, self.to_string())
        } else {
            codec.write_error(status, &self.to_string())
        };
        resp.with_header(NOSNIFF_HEADER.0, NOSNIFF_HEADER.1)
    }
}

impl From<InvokeError> for ApiError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Business(message) => ApiError::Business(message),
            shape @ InvokeError::Shape(_) => ApiError::Internal(shape.to_string()),
        }
    }
}
