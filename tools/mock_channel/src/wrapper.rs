//! Single choke point for traffic between application code and a channel.

use crate::channel::{receiver, Channel, Message, Receiver, ReceiverSlot, SharedChannel};
use crate::errors::ChannelError;
use crate::logging::{debug_payload, log_event, SharedLogger};
use crate::replay::recorder::Recorder;
use crate::replay::recording::Direction;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Prod,
    /// Reserved for verifying live traffic against a recording. Currently
    /// identical to `Prod` and never derived by `ChannelWrapper::new`.
    ProdVerify,
    Record,
    Playback,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::ProdVerify => "prod_verify",
            Self::Record => "record",
            Self::Playback => "playback",
        }
    }
}

/// Receiver adapter installed on the underlying channel.
struct Inbound<M> {
    mode: Mode,
    recorder: Option<Arc<Recorder<M>>>,
    slot: ReceiverSlot<M>,
    logger: OnceLock<SharedLogger>,
}

impl<M: Message> Inbound<M> {
    fn receive(&self, msg: M) {
        log_event(
            self.logger.get(),
            "debug",
            "channel.receive",
            json!({ "mode": self.mode.as_str(), "message": debug_payload(&msg) }),
        );
        if let Some(recorder) = &self.recorder {
            recorder.record(Direction::Receive, msg.clone());
        }
        if !self.slot.is_installed() {
            log_event(
                self.logger.get(),
                "warn",
                "channel.receive_dropped",
                json!({ "mode": self.mode.as_str(), "message": debug_payload(&msg) }),
            );
            return;
        }
        self.slot.deliver(msg);
    }
}

pub struct ChannelWrapper<M> {
    server: SharedChannel<M>,
    inbound: Arc<Inbound<M>>,
}

impl<M: Message> ChannelWrapper<M> {
    /// Exactly one of `server` (live) and `mock_server` (replay) must be
    /// given. A recorder attached to a mock channel records the replayed
    /// traffic; the mode stays `Playback`.
    pub fn new(
        server: Option<SharedChannel<M>>,
        mock_server: Option<SharedChannel<M>>,
        recorder: Option<Arc<Recorder<M>>>,
    ) -> Result<Self, ChannelError> {
        let (mode, server) = match (server, mock_server) {
            (Some(server), None) if recorder.is_some() => (Mode::Record, server),
            (Some(server), None) => (Mode::Prod, server),
            (None, Some(mock_server)) => (Mode::Playback, mock_server),
            (None, None) => {
                return Err(ChannelError::InvalidConfig(
                    "channel wrapper needs a live or a mock channel".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ChannelError::InvalidConfig(
                    "channel wrapper takes a live or a mock channel, not both".to_string(),
                ))
            }
        };

        let inbound = Arc::new(Inbound {
            mode,
            recorder,
            slot: ReceiverSlot::default(),
            logger: OnceLock::new(),
        });
        let adapter = Arc::clone(&inbound);
        server.set_receiver(receiver(move |msg| adapter.receive(msg)))?;
        Ok(Self { server, inbound })
    }

    pub fn live(server: SharedChannel<M>) -> Result<Self, ChannelError> {
        Self::new(Some(server), None, None)
    }

    pub fn recording(
        server: SharedChannel<M>,
        recorder: Arc<Recorder<M>>,
    ) -> Result<Self, ChannelError> {
        Self::new(Some(server), None, Some(recorder))
    }

    pub fn playback(mock_server: SharedChannel<M>) -> Result<Self, ChannelError> {
        Self::new(None, Some(mock_server), None)
    }

    /// The first logger attached wins; later calls are ignored.
    pub fn with_logger(self, logger: SharedLogger) -> Self {
        let _ = self.inbound.logger.set(logger);
        self
    }

    pub fn mode(&self) -> Mode {
        self.inbound.mode
    }

    pub fn recorder(&self) -> Option<&Arc<Recorder<M>>> {
        self.inbound.recorder.as_ref()
    }
}

impl<M: Message> Channel<M> for ChannelWrapper<M> {
    fn set_receiver(&self, receiver: Receiver<M>) -> Result<(), ChannelError> {
        self.inbound.slot.install(receiver)
    }

    fn send(&self, msg: M) -> Result<(), ChannelError> {
        log_event(
            self.inbound.logger.get(),
            "debug",
            "channel.send",
            json!({ "mode": self.mode().as_str(), "message": debug_payload(&msg) }),
        );
        if let Some(recorder) = &self.inbound.recorder {
            recorder.record(Direction::Send, msg.clone());
        }
        self.server.send(msg)
    }
}
