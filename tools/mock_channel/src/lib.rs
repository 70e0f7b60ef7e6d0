//! Record/replay test doubles for message channels.
//!
//! A [`wrapper::ChannelWrapper`] sits between application code and a
//! [`channel::Channel`]. Against a live backend it passes traffic through,
//! optionally recording it; against a [`replay::replayer::ReplayEngine`] it
//! replays a recorded conversation so tests run without the backend. The
//! [`codec`] module layers method calls on top of any channel.

pub mod channel;
pub mod codec;
pub mod config;
pub mod errors;
pub mod fixture;
pub mod logging;
pub mod replay;
pub mod wrapper;

pub use channel::{receiver, Channel, FnChannel, Message, Receiver, SharedChannel};
pub use errors::ChannelError;
pub use replay::recorder::Recorder;
pub use replay::recording::{Direction, Recording};
pub use replay::replayer::{ReplayEngine, ReplayReport};
pub use wrapper::{ChannelWrapper, Mode};
