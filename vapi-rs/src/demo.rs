//! Demo services served by the `vapi` binary.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use vapi_core::{ApiServer, RegistryError, RequestContext, ServiceError};
use vapi_macros::service;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EchoArgs {
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EchoReply {
    pub message: String,
    /// Value of the `User-Agent` header, if the caller sent one.
    pub agent: String,
}

/// Echoes its input back.
#[derive(Default)]
pub struct Echo;

#[service]
impl Echo {
    pub fn echo(&self, ctx: &RequestContext, args: &EchoArgs, reply: &mut EchoReply) -> Result<(), ServiceError> {
        reply.message = args.message.clone();
        reply.agent = ctx.header("user-agent").unwrap_or_default().to_owned();
        Ok(())
    }

    pub fn upper(&self, _ctx: &RequestContext, args: &EchoArgs, reply: &mut EchoReply) -> Result<(), ServiceError> {
        if args.message.is_empty() {
            return Err(ServiceError::new("empty message"));
        }
        reply.message = args.message.to_uppercase();
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Operands {
    pub a: i64,
    pub b: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Quotient {
    pub quo: i64,
    pub rem: i64,
}

/// Integer arithmetic. Counts successful calls.
#[derive(Default)]
pub struct Arith {
    calls: AtomicU64,
}

#[service]
impl Arith {
    pub fn add(&self, _ctx: &RequestContext, args: &Operands, reply: &mut i64) -> Result<(), ServiceError> {
        *reply = args
            .a
            .checked_add(args.b)
            .ok_or_else(|| ServiceError::new("overflow"))?;
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn divide(&self, _ctx: &RequestContext, args: &Operands, reply: &mut Quotient) -> Result<(), ServiceError> {
        // Written before the check; a failed call must not leak it.
        reply.quo = -1;
        if args.b == 0 {
            return Err(ServiceError::new("divide by zero"));
        }
        reply.quo = args.a / args.b;
        reply.rem = args.a % args.b;
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Not a handler: wrong shape.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

/// Register the demo services under their type names.
pub fn register_all(server: &ApiServer) -> Result<(), RegistryError> {
    server.register_service(Echo, "")?;
    server.register_service(Arith::default(), "")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vapi_core::Receiver;

    #[test]
    fn only_handler_shaped_methods_are_listed() {
        let names: Vec<String> = Arith::methods()
            .into_iter()
            .map(|spec| spec.name().to_owned())
            .collect();
        assert_eq!(names, vec!["Add", "Divide"]);
    }

    #[test]
    fn divide_sets_partial_reply_before_failing() {
        let mut reply = Quotient::default();
        let err = Arith::default()
            .divide(&RequestContext::default(), &Operands { a: 1, b: 0 }, &mut reply)
            .unwrap_err();
        assert_eq!(err.message(), "divide by zero");
        assert_eq!(reply.quo, -1);
    }
}
