//! Service entries and method descriptors.
//!
//! A [`Receiver`] lists its handler methods as [`MethodSpec`]s (usually generated by the
//! `#[service]` attribute). Each spec is erased into a [`ServiceMethod`] that owns the
//! factories and codec hooks for its argument and reply types, so the dispatcher can run
//! any method without knowing those types.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{Codec, Format};
use crate::error::{CodecError, InvokeError};
use crate::RequestContext;

/// Erased argument or reply value.
pub type AnyValue = Box<dyn Any + Send>;

type DecodeFn = fn(Format, &RequestContext, &mut (dyn Any + Send)) -> Result<(), CodecError>;
type EncodeFn = fn(Format, &(dyn Any + Send)) -> Result<Vec<u8>, CodecError>;
type CallFn = Box<
    dyn Fn(
            &(dyn Any + Send + Sync),
            &RequestContext,
            &mut (dyn Any + Send),
            &mut (dyn Any + Send),
        ) -> Result<(), InvokeError>
        + Send
        + Sync,
>;

/// A type that exposes handler methods.
pub trait Receiver: Send + Sync + 'static {
    /// Candidate handler methods. Registration filters out those that are not exported.
    fn methods() -> Vec<MethodSpec<Self>>
    where
        Self: Sized;
}

/// Declared type of an argument or reply, with a factory for its zero value.
#[derive(Clone, Copy)]
pub struct Shape {
    type_name: &'static str,
    alloc: fn() -> AnyValue,
}

impl Shape {
    pub fn of<T: Default + Send + 'static>() -> Self {
        Self {
            type_name: type_name::<T>(),
            alloc: alloc_default::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fresh zero value of the shape.
    pub fn alloc(&self) -> AnyValue {
        (self.alloc)()
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// One callable method: argument and reply shapes plus the bound invoker.
pub struct ServiceMethod {
    name: String,
    args: Shape,
    reply: Shape,
    decode_args: DecodeFn,
    encode_reply: EncodeFn,
    call: CallFn,
}

impl ServiceMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args_shape(&self) -> Shape {
        self.args
    }

    pub fn reply_shape(&self) -> Shape {
        self.reply
    }

    pub fn new_args(&self) -> AnyValue {
        self.args.alloc()
    }

    pub fn new_reply(&self) -> AnyValue {
        self.reply.alloc()
    }

    /// Populate an argument allocated by [`new_args`](Self::new_args) from the request.
    pub fn read_args(
        &self,
        format: Format,
        req: &RequestContext,
        args: &mut (dyn Any + Send),
    ) -> Result<(), CodecError> {
        (self.decode_args)(format, req, args)
    }

    /// Encode a reply allocated by [`new_reply`](Self::new_reply).
    pub fn write_reply(&self, format: Format, reply: &(dyn Any + Send)) -> Result<Vec<u8>, CodecError> {
        (self.encode_reply)(format, reply)
    }
}

impl fmt::Debug for ServiceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMethod")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("reply", &self.reply)
            .finish()
    }
}

fn alloc_default<T: Default + Send + 'static>() -> AnyValue {
    Box::new(T::default())
}

fn decode_into<A: DeserializeOwned + Send + 'static>(
    format: Format,
    req: &RequestContext,
    slot: &mut (dyn Any + Send),
) -> Result<(), CodecError> {
    let target = slot
        .downcast_mut::<A>()
        .ok_or(CodecError::Shape(type_name::<A>()))?;
    format.read_request(req, target)
}

fn encode_from<R: Serialize + Send + 'static>(
    format: Format,
    slot: &(dyn Any + Send),
) -> Result<Vec<u8>, CodecError> {
    let value = slot
        .downcast_ref::<R>()
        .ok_or(CodecError::Shape(type_name::<R>()))?;
    format.encode(value)
}

/// Typed handler entry for receiver `T`, erased on construction.
pub struct MethodSpec<T> {
    method: ServiceMethod,
    _receiver: PhantomData<fn(&T)>,
}

impl<T: Send + Sync + 'static> MethodSpec<T> {
    /// Bind `handler` as method `name`.
    ///
    /// The handler receives the receiver, the request, a mutable argument already
    /// populated by the codec, and a zero-valued reply to fill in.
    pub fn new<A, R, E, F>(name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Default + Send + 'static,
        R: Serialize + Default + Send + 'static,
        E: fmt::Display,
        F: Fn(&T, &RequestContext, &mut A, &mut R) -> Result<(), E> + Send + Sync + 'static,
    {
        let call: CallFn = Box::new(
            move |receiver: &(dyn Any + Send + Sync),
                  req: &RequestContext,
                  args: &mut (dyn Any + Send),
                  reply: &mut (dyn Any + Send)|
                  -> Result<(), InvokeError> {
                let receiver = receiver
                    .downcast_ref::<T>()
                    .ok_or(InvokeError::Shape(type_name::<T>()))?;
                let args = args
                    .downcast_mut::<A>()
                    .ok_or(InvokeError::Shape(type_name::<A>()))?;
                let reply = reply
                    .downcast_mut::<R>()
                    .ok_or(InvokeError::Shape(type_name::<R>()))?;
                handler(receiver, req, args, reply)
                    .map_err(|e| InvokeError::Business(e.to_string()))
            },
        );
        Self {
            method: ServiceMethod {
                name: name.into(),
                args: Shape::of::<A>(),
                reply: Shape::of::<R>(),
                decode_args: decode_into::<A>,
                encode_reply: encode_from::<R>,
                call,
            },
            _receiver: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.method.name
    }

    pub(crate) fn into_method(self) -> ServiceMethod {
        self.method
    }
}

/// A registered receiver and its methods.
pub struct Service {
    name: String,
    receiver: Arc<dyn Any + Send + Sync>,
    receiver_type: &'static str,
    methods: HashMap<String, Arc<ServiceMethod>>,
}

impl Service {
    pub(crate) fn new(
        name: String,
        receiver: Arc<dyn Any + Send + Sync>,
        receiver_type: &'static str,
        methods: HashMap<String, Arc<ServiceMethod>>,
    ) -> Self {
        Self {
            name,
            receiver,
            receiver_type,
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full type name of the receiver.
    pub fn receiver_type(&self) -> &'static str {
        self.receiver_type
    }

    pub fn method(&self, name: &str) -> Option<&Arc<ServiceMethod>> {
        self.methods.get(name)
    }

    /// Method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Run `method` against this service's receiver.
    pub fn invoke(
        &self,
        method: &ServiceMethod,
        req: &RequestContext,
        args: &mut (dyn Any + Send),
        reply: &mut (dyn Any + Send),
    ) -> Result<(), InvokeError> {
        (method.call)(self.receiver.as_ref(), req, args, reply)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("receiver_type", &self.receiver_type)
            .field("methods", &self.method_names())
            .finish()
    }
}
