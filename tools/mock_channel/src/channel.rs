//! The bidirectional channel contract shared by every component.
//!
//! A channel has exactly one inbound handler for its whole lifetime and an
//! asynchronous `send`: whatever the peer answers arrives later through the
//! installed receiver, never as a return value.

use crate::errors::ChannelError;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, OnceLock};

/// Anything that can cross a channel. Replay matching uses `PartialEq`.
pub trait Message: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> Message for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Single-argument inbound callback.
pub type Receiver<M> = Arc<dyn Fn(M) + Send + Sync>;

pub fn receiver<M, F>(f: F) -> Receiver<M>
where
    F: Fn(M) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub trait Channel<M>: Send + Sync {
    /// Install the inbound handler. A second call is a configuration error.
    fn set_receiver(&self, receiver: Receiver<M>) -> Result<(), ChannelError>;

    /// Transmit one message without waiting for a reply.
    fn send(&self, msg: M) -> Result<(), ChannelError>;
}

pub type SharedChannel<M> = Arc<dyn Channel<M>>;

// ── ReceiverSlot ──────────────────────────────────────────────────────────────

/// Set-once holder for a channel's receiver.
pub struct ReceiverSlot<M> {
    slot: OnceLock<Receiver<M>>,
}

impl<M> Default for ReceiverSlot<M> {
    fn default() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }
}

impl<M> ReceiverSlot<M> {
    pub fn install(&self, receiver: Receiver<M>) -> Result<(), ChannelError> {
        self.slot
            .set(receiver)
            .map_err(|_| ChannelError::ReceiverAlreadySet)
    }

    pub fn is_installed(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Hand `msg` to the installed receiver. Returns `false` when none is set.
    pub fn deliver(&self, msg: M) -> bool {
        match self.slot.get() {
            Some(receiver) => {
                receiver(msg);
                true
            }
            None => false,
        }
    }
}

// ── FnChannel ─────────────────────────────────────────────────────────────────

type Backend<M> = Box<dyn Fn(M) -> Result<Option<M>, ChannelError> + Send + Sync>;

/// In-process live channel backed by a closure. Each sent message is handed
/// to the backend and its reply, if any, is delivered synchronously to the
/// installed receiver.
pub struct FnChannel<M> {
    backend: Backend<M>,
    slot: ReceiverSlot<M>,
    sent: Mutex<Vec<M>>,
}

impl<M: Clone + Send + Sync + 'static> FnChannel<M> {
    pub fn new<F>(backend: F) -> Self
    where
        F: Fn(M) -> Option<M> + Send + Sync + 'static,
    {
        Self::fallible(move |msg| Ok(backend(msg)))
    }

    /// Backend that may refuse a message; the error propagates out of `send`.
    pub fn fallible<F>(backend: F) -> Self
    where
        F: Fn(M) -> Result<Option<M>, ChannelError> + Send + Sync + 'static,
    {
        Self {
            backend: Box::new(backend),
            slot: ReceiverSlot::default(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every message this backend has accepted, in order.
    pub fn sent(&self) -> Vec<M> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl<M: Clone + Send + Sync + 'static> Channel<M> for FnChannel<M> {
    fn set_receiver(&self, receiver: Receiver<M>) -> Result<(), ChannelError> {
        self.slot.install(receiver)
    }

    fn send(&self, msg: M) -> Result<(), ChannelError> {
        let reply = (self.backend)(msg.clone())?;
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(msg);
        if let Some(reply) = reply {
            if !self.slot.deliver(reply) {
                return Err(ChannelError::Transport(
                    "reply produced before a receiver was installed".to_string(),
                ));
            }
        }
        Ok(())
    }
}
