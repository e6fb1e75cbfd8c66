//! `scriptdbg.toml` loading.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use scriptdbg_analysis::{AnalysisSettings, Verbosity};

use crate::error::SessionError;
use crate::heartbeat::HeartbeatSettings;

pub const CONFIG_FILE_NAME: &str = "scriptdbg.toml";

/// Validated debugger configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebuggerSettings {
    pub analysis: AnalysisSettings,
    pub heartbeat: HeartbeatSettings,
}

impl DebuggerSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|err| SessionError::Io(format!("{CONFIG_FILE_NAME}: {err}").into()))?;
        Self::from_toml_str(&text)
    }

    /// Load `scriptdbg.toml` from `root`, falling back to defaults when absent.
    pub fn load_from_root(root: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = root.as_ref().join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        let raw: DebuggerToml = toml::from_str(text).map_err(|err| {
            SessionError::InvalidConfig(format!("{CONFIG_FILE_NAME}: {err}").into())
        })?;
        raw.into_settings()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DebuggerToml {
    analysis: Option<AnalysisSection>,
    heartbeat: Option<HeartbeatSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalysisSection {
    enabled: Option<bool>,
    verbosity: Option<String>,
    tick_interval_ms: Option<u64>,
    flush_threshold: Option<usize>,
    poll_interval_ms: Option<u64>,
    /// `0` waits for the worker without bound.
    stop_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct HeartbeatSection {
    interval_ms: Option<u64>,
    timeout_ms: Option<u64>,
    control_connection: Option<bool>,
    warn_on_timeout: Option<bool>,
}

impl DebuggerToml {
    fn into_settings(self) -> Result<DebuggerSettings, SessionError> {
        let analysis = self.analysis.unwrap_or_default().into_settings()?;
        let heartbeat = self.heartbeat.unwrap_or_default().into_settings()?;
        Ok(DebuggerSettings {
            analysis,
            heartbeat,
        })
    }
}

impl AnalysisSection {
    fn into_settings(self) -> Result<AnalysisSettings, SessionError> {
        let defaults = AnalysisSettings::default();
        let verbosity = match self.verbosity {
            Some(text) => Verbosity::parse(&text)?,
            None => defaults.verbosity,
        };
        let stop_timeout = match self.stop_timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.stop_timeout,
        };
        let settings = AnalysisSettings {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            verbosity,
            tick_interval: self
                .tick_interval_ms
                .map_or(defaults.tick_interval, Duration::from_millis),
            flush_threshold: self.flush_threshold.unwrap_or(defaults.flush_threshold),
            poll_interval: self
                .poll_interval_ms
                .map_or(defaults.poll_interval, Duration::from_millis),
            stop_timeout,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl HeartbeatSection {
    fn into_settings(self) -> Result<HeartbeatSettings, SessionError> {
        let defaults = HeartbeatSettings::default();
        let settings = HeartbeatSettings {
            interval: self
                .interval_ms
                .map_or(defaults.interval, Duration::from_millis),
            timeout: self
                .timeout_ms
                .map_or(defaults.timeout, Duration::from_millis),
            control_connection: self
                .control_connection
                .unwrap_or(defaults.control_connection),
            warn_on_timeout: self.warn_on_timeout.unwrap_or(defaults.warn_on_timeout),
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use scriptdbg_analysis::AnalysisError;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = DebuggerSettings::from_toml_str("").unwrap();
        assert_eq!(settings, DebuggerSettings::default());
    }

    #[test]
    fn parses_both_sections() {
        let settings = DebuggerSettings::from_toml_str(
            r#"
[analysis]
enabled = false
verbosity = "detailed"
tick_interval_ms = 250
flush_threshold = 8
poll_interval_ms = 20
stop_timeout_ms = 0

[heartbeat]
interval_ms = 1000
timeout_ms = 3000
control_connection = true
warn_on_timeout = false
"#,
        )
        .unwrap();

        assert!(!settings.analysis.enabled);
        assert_eq!(settings.analysis.verbosity, Verbosity::Detailed);
        assert_eq!(settings.analysis.tick_interval, Duration::from_millis(250));
        assert_eq!(settings.analysis.flush_threshold, 8);
        assert_eq!(settings.analysis.poll_interval, Duration::from_millis(20));
        assert_eq!(settings.analysis.stop_timeout, None);
        assert_eq!(settings.heartbeat.interval, Duration::from_secs(1));
        assert_eq!(settings.heartbeat.timeout, Duration::from_secs(3));
        assert!(settings.heartbeat.control_connection);
        assert!(!settings.heartbeat.warn_on_timeout);
    }

    #[test]
    fn invalid_verbosity_is_reported() {
        let err = DebuggerSettings::from_toml_str("[analysis]\nverbosity = \"loud\"\n").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Analysis(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        assert!(DebuggerSettings::from_toml_str("[analysis]\ntick_interval_ms = 0\n").is_err());
        assert!(matches!(
            DebuggerSettings::from_toml_str("[heartbeat]\ninterval_ms = 0\n"),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            DebuggerSettings::from_toml_str("[heartbeat]\nperiod = 3\n"),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_file_in_root_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("scriptdbg-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let settings = DebuggerSettings::load_from_root(&dir).unwrap();
        assert_eq!(settings, DebuggerSettings::default());

        std::fs::write(dir.join(CONFIG_FILE_NAME), "[heartbeat]\ntimeout_ms = 7000\n").unwrap();
        let settings = DebuggerSettings::load_from_root(&dir).unwrap();
        assert_eq!(settings.heartbeat.timeout, Duration::from_secs(7));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
