//! Replay a recorded conversation in place of a live backend.
//!
//! Outbound messages are queued by `send` and verified, in order, by a
//! dedicated consumer thread. Every verified send releases the next recorded
//! reply, if one is left. The first divergence is fatal: the consumer stores
//! the mismatch and stops.

use crate::channel::{Channel, Message, Receiver, ReceiverSlot};
use crate::errors::ChannelError;
use crate::logging::{debug_payload, log_event, SharedLogger};
use crate::replay::recording::Recording;
use serde_json::json;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use tokio::sync::mpsc;

const END_OF_RECORDING: &str = "<end of recording>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayReport {
    pub sends_verified: usize,
    pub replies_emitted: usize,
    /// Recorded sends never matched.
    pub remaining_sends: usize,
    /// Recorded replies never emitted.
    pub remaining_replies: usize,
}

impl ReplayReport {
    /// True when every recorded message in both directions was used.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_sends == 0 && self.remaining_replies == 0
    }
}

pub struct ReplayEngine<M> {
    recording: Mutex<Option<Recording<M>>>,
    queue_tx: Mutex<Option<mpsc::UnboundedSender<M>>>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<M>>>,
    slot: Arc<ReceiverSlot<M>>,
    failure: Arc<OnceLock<ChannelError>>,
    consumer: Mutex<Option<thread::JoinHandle<ReplayReport>>>,
    logger: Option<SharedLogger>,
}

impl<M> Drop for ReplayEngine<M> {
    fn drop(&mut self) {
        // Closing the queue lets the consumer drain and exit.
        drop(self.queue_tx.get_mut().ok().and_then(Option::take));
        let handle = self.consumer.get_mut().ok().and_then(Option::take);
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl<M: Message> ReplayEngine<M> {
    pub fn new(recording: Recording<M>) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            recording: Mutex::new(Some(recording)),
            queue_tx: Mutex::new(Some(queue_tx)),
            queue_rx: Mutex::new(Some(queue_rx)),
            slot: Arc::new(ReceiverSlot::default()),
            failure: Arc::new(OnceLock::new()),
            consumer: Mutex::new(None),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Spawn the consumer. Sends made before this call are already queued.
    pub fn start(&self) -> Result<(), ChannelError> {
        let queue_rx = lock(&self.queue_rx)
            .take()
            .ok_or(ChannelError::AlreadyStarted)?;
        let recording = lock(&self.recording).take().unwrap_or_default();
        log_event(
            self.logger.as_ref(),
            "info",
            "replay.started",
            json!({
                "recorded_sends": recording.send.len(),
                "recorded_replies": recording.receive.len(),
            }),
        );

        let consumer = Consumer {
            recording,
            send_index: 0,
            replay_index: 0,
            slot: Arc::clone(&self.slot),
            failure: Arc::clone(&self.failure),
            logger: self.logger.clone(),
        };
        let handle = thread::Builder::new()
            .name("replay-consumer".to_string())
            .spawn(move || consumer.run(queue_rx))
            .map_err(|e| ChannelError::Io(e.to_string()))?;
        *lock(&self.consumer) = Some(handle);
        Ok(())
    }

    /// The mismatch that stopped the consumer, if any.
    pub fn failure(&self) -> Option<ChannelError> {
        self.failure.get().cloned()
    }

    /// Close the queue, wait for the consumer to finish what is queued and
    /// report. Returns the mismatch if the session failed.
    ///
    /// Fails without closing the queue when called from a receiver running on
    /// the consumer thread.
    pub fn join(&self) -> Result<ReplayReport, ChannelError> {
        let handle = {
            let mut consumer = lock(&self.consumer);
            let on_consumer = consumer
                .as_ref()
                .is_some_and(|handle| handle.thread().id() == thread::current().id());
            if on_consumer {
                return Err(ChannelError::InvalidConfig(
                    "join called from the replay consumer".to_string(),
                ));
            }
            consumer.take()
        };
        drop(lock(&self.queue_tx).take());
        let handle = handle.ok_or_else(|| {
            ChannelError::InvalidConfig("replay engine was not started".to_string())
        })?;
        let report = handle
            .join()
            .map_err(|_| ChannelError::Transport("replay consumer panicked".to_string()))?;
        if let Some(failure) = self.failure() {
            return Err(failure);
        }
        log_event(
            self.logger.as_ref(),
            "info",
            "replay.finished",
            json!({
                "sends_verified": report.sends_verified,
                "replies_emitted": report.replies_emitted,
                "remaining_sends": report.remaining_sends,
                "remaining_replies": report.remaining_replies,
            }),
        );
        Ok(report)
    }
}

impl<M: Message> Channel<M> for ReplayEngine<M> {
    fn set_receiver(&self, receiver: Receiver<M>) -> Result<(), ChannelError> {
        self.slot.install(receiver)
    }

    fn send(&self, msg: M) -> Result<(), ChannelError> {
        if let Some(failure) = self.failure() {
            return Err(failure);
        }
        let guard = lock(&self.queue_tx);
        let queue_tx = guard.as_ref().ok_or(ChannelError::Closed)?;
        queue_tx
            .send(msg)
            .map_err(|_| self.failure().unwrap_or(ChannelError::Closed))
    }
}

// ── Consumer ──────────────────────────────────────────────────────────────────

/// State owned by the consumer thread. The cursors never leave it.
struct Consumer<M> {
    recording: Recording<M>,
    send_index: usize,
    replay_index: usize,
    slot: Arc<ReceiverSlot<M>>,
    failure: Arc<OnceLock<ChannelError>>,
    logger: Option<SharedLogger>,
}

impl<M: Message> Consumer<M> {
    fn run(mut self, mut queue_rx: mpsc::UnboundedReceiver<M>) -> ReplayReport {
        while let Some(msg) = queue_rx.blocking_recv() {
            if let Err(mismatch) = self.verify(&msg) {
                log_event(
                    self.logger.as_ref(),
                    "error",
                    "replay.mismatch",
                    json!({ "error": mismatch.to_string() }),
                );
                let _ = self.failure.set(mismatch);
                break;
            }
            self.emit_reply();
        }
        self.report()
    }

    fn verify(&mut self, msg: &M) -> Result<(), ChannelError> {
        match self.recording.send.get(self.send_index) {
            Some(expected) if expected == msg => {
                self.send_index += 1;
                log_event(
                    self.logger.as_ref(),
                    "debug",
                    "replay.send_matched",
                    json!({ "position": self.send_index - 1, "message": debug_payload(msg) }),
                );
                Ok(())
            }
            expected => Err(ChannelError::ReplayMismatch {
                position: self.send_index,
                message: format!("{msg:?}"),
                expected: expected
                    .map(|e| format!("{e:?}"))
                    .unwrap_or_else(|| END_OF_RECORDING.to_string()),
            }),
        }
    }

    fn emit_reply(&mut self) {
        let Some(reply) = self.recording.receive.get(self.replay_index).cloned() else {
            return;
        };
        self.replay_index += 1;
        let payload = debug_payload(&reply);
        if self.slot.deliver(reply) {
            log_event(
                self.logger.as_ref(),
                "debug",
                "replay.reply_emitted",
                json!({ "position": self.replay_index - 1, "message": payload }),
            );
        } else {
            log_event(
                self.logger.as_ref(),
                "warn",
                "replay.reply_dropped",
                json!({ "position": self.replay_index - 1, "message": payload }),
            );
        }
    }

    fn report(&self) -> ReplayReport {
        ReplayReport {
            sends_verified: self.send_index,
            replies_emitted: self.replay_index,
            remaining_sends: self.recording.send.len() - self.send_index,
            remaining_replies: self.recording.receive.len() - self.replay_index,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
