use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("receiver already set")]
    ReceiverAlreadySet,
    #[error("replay engine already started")]
    AlreadyStarted,
    #[error("channel closed")]
    Closed,
    #[error("unexpected message at send #{position}: {message} (expected {expected})")]
    ReplayMismatch {
        position: usize,
        message: String,
        /// `Debug` form of the recorded send, or `"<end of recording>"`.
        expected: String,
    },
    #[error("attribute access error: {0}")]
    AttributeAccess(String),
    #[error("missing method: {0}")]
    MissingMethod(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("recording parse error: {0}")]
    RecordingParse(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChannelError {
    /// The offending message carried by a replay mismatch.
    pub fn unexpected_message(&self) -> Option<&str> {
        match self {
            Self::ReplayMismatch { message, .. } => Some(message),
            _ => None,
        }
    }
}
