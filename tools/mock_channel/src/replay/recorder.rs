//! Append-only log of the traffic crossing a wrapped channel.

use crate::replay::recording::{Direction, Recording};
use std::sync::Mutex;

pub struct Recorder<M> {
    data: Mutex<Recording<M>>,
}

impl<M> Default for Recorder<M> {
    fn default() -> Self {
        Self {
            data: Mutex::new(Recording::default()),
        }
    }
}

impl<M: Clone> Recorder<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, direction: Direction, msg: M) {
        self.data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .messages_mut(direction)
            .push(msg);
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Recording<M> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self, direction: Direction) -> usize {
        self.data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .messages(direction)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len(Direction::Send) == 0 && self.len(Direction::Receive) == 0
    }
}
