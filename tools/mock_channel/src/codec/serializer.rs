use crate::channel::SharedChannel;
use crate::codec::{Capabilities, Kwargs, Member, MethodCall};
use crate::errors::ChannelError;
use serde_json::Value;

/// Call-forwarding proxy. Each `attr` step is validated against the target's
/// declared capabilities and yields a new proxy one namespace level deeper;
/// `call` sends the accumulated path with its arguments.
#[derive(Clone)]
pub struct MethodCallSerializer {
    channel: SharedChannel<Value>,
    scope: Capabilities,
    path: Vec<String>,
}

impl MethodCallSerializer {
    pub fn new(channel: SharedChannel<Value>, capabilities: Capabilities) -> Self {
        Self {
            channel,
            scope: capabilities,
            path: Vec::new(),
        }
    }

    /// Dotted namespace this proxy sends under. Empty for the root proxy.
    pub fn namespace(&self) -> String {
        self.path.join(".")
    }

    pub fn attr(&self, name: &str) -> Result<Self, ChannelError> {
        let qualified = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.namespace())
        };
        if name.is_empty() || name.starts_with('_') {
            return Err(ChannelError::AttributeAccess(qualified));
        }
        let scope = match self.scope.member(name) {
            Some(Member::Method) => Capabilities::new(),
            Some(Member::Attribute(nested)) => nested.clone(),
            Some(Member::Field) | None => return Err(ChannelError::AttributeAccess(qualified)),
        };
        let mut path = self.path.clone();
        path.push(name.to_string());
        Ok(Self {
            channel: self.channel.clone(),
            scope,
            path,
        })
    }

    /// Send one call message. Replies, if any, come back through the
    /// channel's receiver.
    pub fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<(), ChannelError> {
        let call = MethodCall::new(self.namespace(), args, kwargs);
        self.channel.send(call.into_message())
    }

    pub fn invoke(&self, name: &str, args: Vec<Value>, kwargs: Kwargs) -> Result<(), ChannelError> {
        self.attr(name)?.call(args, kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::FnChannel;
    use crate::codec::kwargs;
    use serde_json::json;
    use std::sync::Arc;

    fn target_caps() -> Capabilities {
        Capabilities::new()
            .method("foo")
            .field("args")
            .attribute(
                "store",
                Capabilities::new()
                    .method("put")
                    .attribute("index", Capabilities::new().method("rebuild")),
            )
    }

    fn sink() -> Arc<FnChannel<Value>> {
        Arc::new(FnChannel::new(|_msg: Value| None))
    }

    #[test]
    fn call_sends_namespace_args_and_kwargs() {
        let channel = sink();
        let proxy = MethodCallSerializer::new(channel.clone(), target_caps());
        proxy
            .invoke("foo", vec![json!("bar"), json!("baz")], kwargs([("blah", json!(3))]))
            .expect("invoke");
        assert_eq!(
            channel.sent(),
            vec![json!(["foo", ["bar", "baz"], {"blah": 3}])]
        );
    }

    #[test]
    fn nested_attributes_build_a_dotted_namespace() {
        let channel = sink();
        let proxy = MethodCallSerializer::new(channel.clone(), target_caps());
        let rebuild = proxy
            .attr("store")
            .and_then(|p| p.attr("index"))
            .and_then(|p| p.attr("rebuild"))
            .expect("resolve chain");
        assert_eq!(rebuild.namespace(), "store.index.rebuild");
        rebuild.call(vec![], Kwargs::new()).expect("call");
        proxy
            .attr("store")
            .expect("store")
            .invoke("put", vec![json!(1)], Kwargs::new())
            .expect("put");
        assert_eq!(
            channel.sent(),
            vec![
                json!(["store.index.rebuild", [], {}]),
                json!(["store.put", [1], {}]),
            ]
        );
    }

    #[test]
    fn fields_unknown_and_private_names_are_access_errors() {
        let channel = sink();
        let proxy = MethodCallSerializer::new(channel.clone(), target_caps());
        for name in ["args", "missing", "_private", ""] {
            assert!(matches!(
                proxy.attr(name),
                Err(ChannelError::AttributeAccess(attr)) if attr == name
            ));
        }
        assert_eq!(
            proxy.attr("store").and_then(|p| p.attr("nope")).err(),
            Some(ChannelError::AttributeAccess("store.nope".to_string()))
        );
        assert_eq!(
            proxy.attr("foo").and_then(|p| p.attr("bar")).err(),
            Some(ChannelError::AttributeAccess("foo.bar".to_string()))
        );
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn send_failure_propagates_to_caller() {
        let failing = Arc::new(FnChannel::fallible(|_msg: Value| {
            Err(ChannelError::Transport("down".to_string()))
        }));
        let proxy = MethodCallSerializer::new(failing, target_caps());
        assert_eq!(
            proxy.invoke("foo", vec![], Kwargs::new()),
            Err(ChannelError::Transport("down".to_string()))
        );
    }
}
