//! vapi for Rust: re-exports the core engine and the `#[service]` attribute.
//!
//! ```ignore
//! use vapi_rs::{service, ApiServer, RequestContext, ServiceError};
//!
//! pub struct Greeter;
//!
//! #[service]
//! impl Greeter {
//!     pub fn hello(&self, _ctx: &RequestContext, name: &String, reply: &mut String) -> Result<(), ServiceError> {
//!         *reply = format!("hello {}", name);
//!         Ok(())
//!     }
//! }
//!
//! let server = ApiServer::new("/api");
//! server.register_service(Greeter, "")?;
//! ```

pub mod demo;

pub use vapi_core::*;
pub use vapi_macros::service;
