//! Method calls as channel messages.
//!
//! A call travels as the triple `[namespace, args, kwargs]`. The serializer
//! side builds calls against a target's declared [`Capabilities`]; the
//! deserializer side decodes them and invokes the matching method on a
//! [`Dispatch`] target. Both ends are fire-and-forget.

pub mod deserializer;
pub mod serializer;

use crate::channel::Receiver;
use crate::errors::ChannelError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Kwargs = BTreeMap<String, Value>;

type WireCall = (String, Vec<Value>, Kwargs);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireCall", into = "WireCall")]
pub struct MethodCall {
    /// Dotted attribute chain, e.g. `"store.put"`.
    pub namespace: String,
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
}

impl From<WireCall> for MethodCall {
    fn from((namespace, args, kwargs): WireCall) -> Self {
        Self {
            namespace,
            args,
            kwargs,
        }
    }
}

impl From<MethodCall> for WireCall {
    fn from(call: MethodCall) -> Self {
        (call.namespace, call.args, call.kwargs)
    }
}

impl MethodCall {
    pub fn new(namespace: impl Into<String>, args: Vec<Value>, kwargs: Kwargs) -> Self {
        Self {
            namespace: namespace.into(),
            args,
            kwargs,
        }
    }

    pub fn into_message(self) -> Value {
        Value::Array(vec![
            Value::String(self.namespace),
            Value::Array(self.args),
            Value::Object(self.kwargs.into_iter().collect()),
        ])
    }

    pub fn from_message(msg: Value) -> Result<Self, ChannelError> {
        serde_json::from_value(msg)
            .map_err(|e| ChannelError::Codec(format!("not a method call triple: {e}")))
    }
}

/// Build keyword arguments from `(name, value)` pairs.
pub fn kwargs<I, K>(pairs: I) -> Kwargs
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

// ── CallArgs ──────────────────────────────────────────────────────────────────

/// Arguments of a decoded call, with typed access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
}

impl CallArgs {
    pub fn positional<T: DeserializeOwned>(&self, index: usize) -> Result<T, ChannelError> {
        let value = self.args.get(index).ok_or_else(|| {
            ChannelError::Codec(format!(
                "missing positional argument {index} (got {})",
                self.args.len()
            ))
        })?;
        serde_json::from_value(value.clone())
            .map_err(|e| ChannelError::Codec(format!("positional argument {index}: {e}")))
    }

    pub fn keyword<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ChannelError> {
        self.kwargs
            .get(name)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|e| ChannelError::Codec(format!("keyword argument {name}: {e}")))
            })
            .transpose()
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Method,
    /// Declared class-level attribute; its own members form a nested namespace.
    Attribute(Capabilities),
    /// Plain instance data. Not reachable through a call proxy.
    Field,
}

/// The member set a target declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    members: BTreeMap<String, Member>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.members.insert(name.into(), Member::Method);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, nested: Capabilities) -> Self {
        self.members.insert(name.into(), Member::Attribute(nested));
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.members.insert(name.into(), Member::Field);
        self
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Follow a dotted path through nested attributes.
    pub fn resolve(&self, path: &str) -> Option<&Member> {
        let mut parts = path.split('.');
        let mut member = self.member(parts.next()?)?;
        for part in parts {
            member = match member {
                Member::Attribute(nested) => nested.member(part)?,
                Member::Method | Member::Field => return None,
            };
        }
        Some(member)
    }

    pub fn is_method(&self, path: &str) -> bool {
        matches!(self.resolve(path), Some(Member::Method))
    }
}

// ── Dispatch target ───────────────────────────────────────────────────────────

/// Optional capability of a dispatch target: accepting an inbound handler
/// so it can push messages back through the channel.
pub trait ReceiverSink: Send + Sync {
    fn set_receiver(&self, receiver: Receiver<Value>) -> Result<(), ChannelError>;
}

pub trait Dispatch: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Invoke `method` (a dotted path that `capabilities` lists as a method).
    /// The return value is discarded by the deserializer.
    fn dispatch(&self, method: &str, call: CallArgs) -> Result<Value, ChannelError>;

    fn receiver_sink(&self) -> Option<&dyn ReceiverSink> {
        None
    }
}
