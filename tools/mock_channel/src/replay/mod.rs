//! Recording and deterministic replay of channel conversations.
//!
//! # Overview
//!
//! A [`recorder::Recorder`] attached to a `ChannelWrapper` logs every
//! outbound (`send`) and inbound (`receive`) message in arrival order. The
//! resulting [`recording::Recording`] seeds a [`replayer::ReplayEngine`],
//! which stands in for the live backend: it checks each outbound message
//! against the recorded sends and answers with the recorded replies.
//!
//! The two directions are stored as independent sequences, so only a strict
//! request/at-most-one-reply cadence replays faithfully. Unsolicited inbound
//! traffic or several replies per send is not reproduced.

pub mod recorder;
pub mod recording;
pub mod replayer;
