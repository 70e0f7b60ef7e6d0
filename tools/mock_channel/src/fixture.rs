//! Config-driven session setup for tests.
//!
//! The same test body runs against a live channel (`prod`), records a live
//! session to a JSON fixture (`record`), or replays that fixture without any
//! backend (`playback`).

use crate::channel::{Message, SharedChannel};
use crate::config::SessionConfig;
use crate::errors::ChannelError;
use crate::logging::{log_event, JsonlLogger, SharedLogger};
use crate::replay::recorder::Recorder;
use crate::replay::recording::{Direction, Recording};
use crate::replay::replayer::{ReplayEngine, ReplayReport};
use crate::wrapper::{ChannelWrapper, Mode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureOutcome {
    Live,
    Recorded {
        path: PathBuf,
        sends: usize,
        receives: usize,
    },
    Replayed(ReplayReport),
}

enum Backing<M> {
    Live,
    Recording {
        recorder: Arc<Recorder<M>>,
        path: PathBuf,
    },
    Replay(Arc<ReplayEngine<M>>),
}

pub struct Fixture<M> {
    wrapper: Arc<ChannelWrapper<M>>,
    backing: Backing<M>,
    logger: Option<SharedLogger>,
}

impl<M: Message + Serialize + DeserializeOwned> Fixture<M> {
    /// `live` is required in `prod` and `record` modes and unused in
    /// `playback`.
    pub fn open(
        config: &SessionConfig,
        live: Option<SharedChannel<M>>,
    ) -> Result<Self, ChannelError> {
        let logger: Option<SharedLogger> = config.logging.path.as_ref().map(|path| {
            Arc::new(
                JsonlLogger::new(path).with_max_payload_bytes(config.logging.max_payload_bytes),
            ) as SharedLogger
        });
        let mode = config.session.mode;
        let recording_path = || {
            config.session.recording_path.clone().ok_or_else(|| {
                ChannelError::InvalidConfig(format!(
                    "session.recording_path is required in {} mode",
                    mode.as_str()
                ))
            })
        };
        let require_live = |live: Option<SharedChannel<M>>| {
            live.ok_or_else(|| {
                ChannelError::InvalidConfig(format!(
                    "{} mode needs a live channel",
                    mode.as_str()
                ))
            })
        };

        let (wrapper, backing) = match mode {
            Mode::Prod | Mode::ProdVerify => {
                (ChannelWrapper::live(require_live(live)?)?, Backing::Live)
            }
            Mode::Record => {
                let path = recording_path()?;
                let recorder = Arc::new(Recorder::new());
                let wrapper = ChannelWrapper::recording(require_live(live)?, recorder.clone())?;
                (wrapper, Backing::Recording { recorder, path })
            }
            Mode::Playback => {
                let recording = Recording::load(&recording_path()?)?;
                let mut engine = ReplayEngine::new(recording);
                if let Some(logger) = &logger {
                    engine = engine.with_logger(logger.clone());
                }
                let engine = Arc::new(engine);
                let wrapper = ChannelWrapper::playback(engine.clone())?;
                engine.start()?;
                (wrapper, Backing::Replay(engine))
            }
        };
        let wrapper = match &logger {
            Some(logger) => wrapper.with_logger(logger.clone()),
            None => wrapper,
        };

        log_event(
            logger.as_ref(),
            "info",
            "fixture.opened",
            json!({ "mode": mode.as_str() }),
        );
        Ok(Self {
            wrapper: Arc::new(wrapper),
            backing,
            logger,
        })
    }

    pub fn mode(&self) -> Mode {
        self.wrapper.mode()
    }

    pub fn channel(&self) -> &ChannelWrapper<M> {
        &self.wrapper
    }

    /// The wrapper as a shareable channel, e.g. for a `MethodCallSerializer`.
    pub fn shared_channel(&self) -> SharedChannel<M> {
        self.wrapper.clone()
    }

    /// Persist the recording (record mode) or wait for the replay to drain
    /// and verify it (playback mode).
    pub fn finish(self) -> Result<FixtureOutcome, ChannelError> {
        let outcome = match self.backing {
            Backing::Live => FixtureOutcome::Live,
            Backing::Recording { recorder, path } => {
                let recording = recorder.snapshot();
                recording.save(&path)?;
                FixtureOutcome::Recorded {
                    path,
                    sends: recording.messages(Direction::Send).len(),
                    receives: recording.messages(Direction::Receive).len(),
                }
            }
            Backing::Replay(engine) => FixtureOutcome::Replayed(engine.join()?),
        };
        log_event(
            self.logger.as_ref(),
            "info",
            "fixture.finished",
            json!({ "outcome": format!("{outcome:?}") }),
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{receiver, Channel, FnChannel};
    use crate::config::{parse_config, ConfigOverrides};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    fn config(mode: Mode, recording_path: Option<PathBuf>) -> SessionConfig {
        let mut cfg = SessionConfig::default();
        cfg.session.mode = mode;
        cfg.session.recording_path = recording_path;
        cfg
    }

    fn doubler() -> SharedChannel<i64> {
        Arc::new(FnChannel::new(|msg: i64| Some(msg * 2)))
    }

    #[test]
    fn prod_and_record_need_a_live_channel() {
        let dir = tempfile::tempdir().expect("tempdir");
        for cfg in [
            config(Mode::Prod, None),
            config(Mode::ProdVerify, None),
            config(Mode::Record, Some(dir.path().join("r.json"))),
        ] {
            assert!(matches!(
                Fixture::<i64>::open(&cfg, None),
                Err(ChannelError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn prod_verify_behaves_like_prod() {
        let fixture = Fixture::open(&config(Mode::ProdVerify, None), Some(doubler()))
            .expect("open");
        assert_eq!(fixture.mode(), Mode::Prod);
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        fixture
            .channel()
            .set_receiver(receiver(move |msg| {
                let _ = tx.lock().expect("lock").send(msg);
            }))
            .expect("install");
        fixture.channel().send(4).expect("send");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).expect("reply"), 8);
        assert_eq!(fixture.finish().expect("finish"), FixtureOutcome::Live);
    }

    #[test]
    fn record_then_playback_through_config_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let recording_path = dir.path().join("fixtures/doubler.json");
        let log_path = dir.path().join("logs/session.jsonl");

        let record_cfg = parse_config(
            "[session]\nmode = \"record\"\n",
            &ConfigOverrides {
                recording_path: Some(recording_path.clone()),
                log_path: Some(log_path.clone()),
                ..ConfigOverrides::default()
            },
        )
        .expect("record config");
        let fixture = Fixture::open(&record_cfg, Some(doubler())).expect("open record");
        fixture
            .channel()
            .set_receiver(receiver(|_| {}))
            .expect("install");
        fixture.channel().send(1).expect("send");
        fixture.channel().send(5).expect("send");
        assert_eq!(
            fixture.finish().expect("finish"),
            FixtureOutcome::Recorded {
                path: recording_path.clone(),
                sends: 2,
                receives: 2,
            }
        );
        let saved: Recording<i64> = Recording::load(&recording_path).expect("load");
        assert_eq!(saved, Recording::new(vec![1, 5], vec![2, 10]));

        let playback_cfg = config(Mode::Playback, Some(recording_path));
        let fixture = Fixture::<i64>::open(&playback_cfg, None).expect("open playback");
        assert_eq!(fixture.mode(), Mode::Playback);
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        fixture
            .channel()
            .set_receiver(receiver(move |msg| {
                let _ = tx.lock().expect("lock").send(msg);
            }))
            .expect("install");
        fixture.channel().send(1).expect("send");
        fixture.channel().send(5).expect("send");
        let outcome = fixture.finish().expect("finish");
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![2, 10]);
        match outcome {
            FixtureOutcome::Replayed(report) => assert!(report.is_exhausted()),
            other => panic!("unexpected outcome {other:?}"),
        }

        let log = std::fs::read_to_string(&log_path).expect("read log");
        assert!(log.contains("\"event_type\":\"fixture.opened\""));
        assert!(log.contains("\"event_type\":\"channel.send\""));
    }

    #[test]
    fn playback_divergence_surfaces_at_finish() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("r.json");
        Recording::new(vec![1], vec![2]).save(&path).expect("save");

        let fixture = Fixture::<i64>::open(&config(Mode::Playback, Some(path)), None)
            .expect("open playback");
        fixture.channel().send(3).expect("enqueue");
        assert!(matches!(
            fixture.finish(),
            Err(ChannelError::ReplayMismatch { position: 0, .. })
        ));
    }

    #[test]
    fn playback_with_missing_fixture_fails_to_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = config(Mode::Playback, Some(dir.path().join("absent.json")));
        assert!(matches!(
            Fixture::<i64>::open(&cfg, None),
            Err(ChannelError::Io(_))
        ));
    }
}
