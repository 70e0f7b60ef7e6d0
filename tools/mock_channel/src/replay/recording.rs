//! Serializable recorded conversation.
//!
//! On disk a recording is a single JSON object with exactly two keys,
//! `"send"` and `"receive"`, each an ordered array of messages.

use crate::errors::ChannelError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Send,
    Receive,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

/// Two independent ordered logs. Interleaving between directions is not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recording<M> {
    pub send: Vec<M>,
    pub receive: Vec<M>,
}

impl<M> Default for Recording<M> {
    fn default() -> Self {
        Self {
            send: Vec::new(),
            receive: Vec::new(),
        }
    }
}

impl<M> Recording<M> {
    pub fn new(send: Vec<M>, receive: Vec<M>) -> Self {
        Self { send, receive }
    }

    pub fn messages(&self, direction: Direction) -> &[M] {
        match direction {
            Direction::Send => &self.send,
            Direction::Receive => &self.receive,
        }
    }

    pub(crate) fn messages_mut(&mut self, direction: Direction) -> &mut Vec<M> {
        match direction {
            Direction::Send => &mut self.send,
            Direction::Receive => &mut self.receive,
        }
    }
}

impl<M: Serialize> Recording<M> {
    pub fn save(&self, path: &Path) -> Result<(), ChannelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ChannelError::Io(e.to_string()))?;
        }
        let rendered = serde_json::to_string_pretty(self)
            .map_err(|e| ChannelError::RecordingParse(e.to_string()))?;
        fs::write(path, rendered).map_err(|e| ChannelError::Io(e.to_string()))
    }
}

impl<M: DeserializeOwned> Recording<M> {
    pub fn load(path: &Path) -> Result<Self, ChannelError> {
        let raw = fs::read_to_string(path).map_err(|e| ChannelError::Io(e.to_string()))?;
        serde_json::from_str(&raw)
            .map_err(|e| ChannelError::RecordingParse(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recording_serializes_with_send_and_receive_keys() {
        let recording = Recording::new(vec![2], vec![3]);
        let value = serde_json::to_value(&recording).expect("serialize");
        assert_eq!(value, json!({"send": [2], "receive": [3]}));
    }

    #[test]
    fn direction_strings_match_recording_keys() {
        assert_eq!(Direction::Send.as_str(), "send");
        assert_eq!(Direction::Receive.as_str(), "receive");
        assert_eq!(
            serde_json::to_value(Direction::Receive).expect("serialize"),
            json!("receive")
        );
    }

    #[test]
    fn save_then_load_preserves_heterogeneous_messages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fixtures/nested/session.json");
        let recording = Recording::new(
            vec![json!(2), json!({"op": "add"}), json!(["a", null])],
            vec![json!("three"), json!(4.5)],
        );
        recording.save(&path).expect("save");
        let back: Recording<serde_json::Value> = Recording::load(&path).expect("load");
        assert_eq!(back, recording);
    }

    #[test]
    fn load_rejects_extra_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"send": [], "receive": [], "other": []}"#).expect("write");
        let result: Result<Recording<i64>, _> = Recording::load(&path);
        assert!(matches!(result, Err(ChannelError::RecordingParse(_))));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result: Result<Recording<i64>, _> = Recording::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ChannelError::Io(_))));
    }
}
