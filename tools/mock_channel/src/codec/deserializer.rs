use crate::channel::{Channel, Receiver};
use crate::codec::{CallArgs, Dispatch, MethodCall};
use crate::errors::ChannelError;
use crate::logging::{log_event, SharedLogger};
use serde_json::{json, Value};
use std::sync::Arc;

/// Receiving end of the codec: a channel whose `send` invokes methods on the
/// wrapped target.
pub struct MethodCallDeserializer<T: ?Sized> {
    target: Arc<T>,
    logger: Option<SharedLogger>,
}

impl<T: Dispatch + ?Sized> MethodCallDeserializer<T> {
    pub fn new(target: Arc<T>) -> Self {
        Self {
            target,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }
}

impl<T: Dispatch + ?Sized> Channel<Value> for MethodCallDeserializer<T> {
    /// Forwarded only when the target accepts a receiver; otherwise a no-op.
    fn set_receiver(&self, receiver: Receiver<Value>) -> Result<(), ChannelError> {
        match self.target.receiver_sink() {
            Some(sink) => sink.set_receiver(receiver),
            None => Ok(()),
        }
    }

    fn send(&self, msg: Value) -> Result<(), ChannelError> {
        let MethodCall {
            namespace,
            args,
            kwargs,
        } = MethodCall::from_message(msg)?;
        if !self.target.capabilities().is_method(&namespace) {
            return Err(ChannelError::MissingMethod(namespace));
        }
        let discarded = self.target.dispatch(&namespace, CallArgs { args, kwargs })?;
        log_event(
            self.logger.as_ref(),
            "debug",
            "codec.dispatched",
            json!({ "method": namespace, "discarded": discarded }),
        );
        Ok(())
    }
}
