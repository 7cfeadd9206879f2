use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Either "command" (spawn a still-capture program) or "http" (fetch a snapshot URL).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Program and arguments that write one encoded still image to stdout.
    #[serde(default = "default_command")]
    pub command: Vec<String>,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    /// Length of one reference window in seconds.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
    /// Pause after each compared sample.
    #[serde(default = "default_pause_secs")]
    pub pause_secs: f64,
    /// Write the partially filled window on graceful shutdown instead of dropping it.
    #[serde(default)]
    pub flush_on_shutdown: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            command: default_command(),
            url: default_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            pause_secs: default_pause_secs(),
            flush_on_shutdown: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::from_toml(&content)?;
        debug!(path = path.display().to_string(), "config loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sampling = &self.sampling;
        if !sampling.delay_secs.is_finite() || sampling.delay_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sampling.delay_secs must be a non-negative number, got {}",
                sampling.delay_secs
            )));
        }
        if std::time::Duration::try_from_secs_f64(sampling.pause_secs).is_err() {
            return Err(ConfigError::Invalid(format!(
                "sampling.pause_secs must be a non-negative number of seconds, got {}",
                sampling.pause_secs
            )));
        }
        if self.camera.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "camera.timeout_secs must be greater than zero".into(),
            ));
        }
        match self.camera.mode.as_str() {
            "command" if self.camera.command.is_empty() => Err(ConfigError::Invalid(
                "camera.command must name a program in command mode".into(),
            )),
            "command" | "http" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "unknown camera mode '{other}', expected 'command' or 'http'"
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_mode() -> String {
    "command".into()
}
fn default_command() -> Vec<String> {
    ["libcamera-still", "-n", "-t", "1", "--encoding", "jpg", "-o", "-"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_url() -> String {
    "http://127.0.0.1:8080/frame".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_delay_secs() -> f64 {
    10.0
}
fn default_pause_secs() -> f64 {
    1.0
}
fn default_log_dir() -> String {
    "logs".into()
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.camera.mode, "command");
        assert_eq!(config.camera.command[0], "libcamera-still");
        assert_eq!(config.sampling.delay_secs, 10.0);
        assert_eq!(config.sampling.pause_secs, 1.0);
        assert!(!config.sampling.flush_on_shutdown);
        assert_eq!(config.output.log_dir, "logs");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [camera]
            mode = "http"
            url = "http://camera.local/frame"

            [sampling]
            delay_secs = 30
            flush_on_shutdown = true
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.mode, "http");
        assert_eq!(config.camera.url, "http://camera.local/frame");
        assert_eq!(config.camera.timeout_secs, 10);
        assert_eq!(config.sampling.delay_secs, 30.0);
        assert_eq!(config.sampling.pause_secs, 1.0);
        assert!(config.sampling.flush_on_shutdown);
    }

    #[test]
    fn rejects_negative_delay() {
        let err = Config::from_toml("[sampling]\ndelay_secs = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_pause_out_of_duration_range() {
        let err = Config::from_toml("[sampling]\npause_secs = 1e30").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("pause_secs"));

        let err = Config::from_toml("[sampling]\npause_secs = -0.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = Config::from_toml("[camera]\nmode = \"rtsp\"").unwrap_err();
        assert!(err.to_string().contains("rtsp"));
    }

    #[test]
    fn rejects_empty_command() {
        let err = Config::from_toml("[camera]\ncommand = []").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::from_toml("[sampling\ndelay_secs = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
