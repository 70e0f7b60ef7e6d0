use crate::errors::ChannelError;
use crate::logging::DEFAULT_MAX_PAYLOAD_BYTES;
use crate::wrapper::Mode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mode: Option<Mode>,
    pub recording_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub session: SessionSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    pub mode: Mode,
    pub recording_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session: SessionSection {
                mode: Mode::Prod,
                recording_path: None,
            },
            logging: LoggingConfig {
                path: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialSessionConfig {
    session: Option<PartialSessionSection>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialSessionSection {
    mode: Option<Mode>,
    recording_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
}

/// Defaults, then the TOML file at `path` (relative paths inside it resolve
/// against the file's directory), then `overrides`.
pub fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<SessionConfig, ChannelError> {
    let mut cfg = SessionConfig::default();

    if let Some(path) = path {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ChannelError::Io(e.to_string()))?;
        let partial = parse_partial(&contents)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        merge_partial_config(&mut cfg, partial, base);
    }

    apply_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Same as [`load_config`] for in-memory TOML; paths are kept as written.
pub fn parse_config(
    contents: &str,
    overrides: &ConfigOverrides,
) -> Result<SessionConfig, ChannelError> {
    let mut cfg = SessionConfig::default();
    merge_partial_config(&mut cfg, parse_partial(contents)?, Path::new(""));
    apply_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn parse_partial(contents: &str) -> Result<PartialSessionConfig, ChannelError> {
    toml::from_str(contents).map_err(|e| ChannelError::ConfigParse(e.to_string()))
}

fn merge_partial_config(cfg: &mut SessionConfig, partial: PartialSessionConfig, base: &Path) {
    if let Some(session) = partial.session {
        if let Some(mode) = session.mode {
            cfg.session.mode = mode;
        }
        if let Some(recording_path) = session.recording_path {
            cfg.session.recording_path = Some(base.join(recording_path));
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.path {
            cfg.logging.path = Some(base.join(path));
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
    }
}

fn apply_overrides(cfg: &mut SessionConfig, overrides: &ConfigOverrides) {
    if let Some(mode) = overrides.mode {
        cfg.session.mode = mode;
    }
    if let Some(path) = &overrides.recording_path {
        cfg.session.recording_path = Some(path.clone());
    }
    if let Some(path) = &overrides.log_path {
        cfg.logging.path = Some(path.clone());
    }
}

fn validate_config(cfg: &SessionConfig) -> Result<(), ChannelError> {
    if matches!(cfg.session.mode, Mode::Record | Mode::Playback)
        && cfg.session.recording_path.is_none()
    {
        return Err(ChannelError::InvalidConfig(format!(
            "session.recording_path is required in {} mode",
            cfg.session.mode.as_str()
        )));
    }
    if cfg.logging.max_payload_bytes == 0 {
        return Err(ChannelError::InvalidConfig(
            "logging.max_payload_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
