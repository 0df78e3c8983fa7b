use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Settings for the human-loop service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Query lifecycle settings
    #[serde(default)]
    pub query: QuerySettings,

    /// HTTP API settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Logger settings
    #[serde(default)]
    pub logger: LoggerSettings,
}

/// Settings controlling the query lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    /// How long an invocation waits for a human answer, in seconds
    #[serde(default = "default_answer_timeout_secs")]
    pub answer_timeout_secs: u64,

    /// Interval at which overdue pending queries are expired, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            answer_timeout_secs: default_answer_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Settings for the human-facing HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Host to bind the server to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the server to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Timeout for outbound HTTP calls (callbacks, client), in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Logger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to the console
    #[serde(default = "default_console")]
    pub console: bool,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: default_console(),
        }
    }
}

fn default_answer_timeout_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_console() -> bool {
    true
}

/// Load settings from a YAML file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let mut file = File::open(path)
        .map_err(|e| Error::Config(format!("Failed to open config file: {}", e)))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

    let settings: Settings = serde_yaml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

    Ok(settings)
}

/// Get settings, optionally from a specific file
pub fn get_settings(config_path: Option<&str>) -> Result<Settings> {
    match config_path {
        Some(path) => load_settings(path),
        None => {
            // Try to find config file in common locations
            let default_paths = vec![
                "human_loop.config.yaml",
                "config/human_loop.config.yaml",
                "../human_loop.config.yaml",
            ];

            for path in default_paths {
                if Path::new(path).exists() {
                    return load_settings(path);
                }
            }

            // Return default settings if no config file is found
            Ok(Settings::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.query.answer_timeout_secs, 300);
        assert_eq!(settings.query.sweep_interval_secs, 60);
        assert_eq!(settings.http.host, "127.0.0.1");
        assert_eq!(settings.http.port, 8001);
        assert_eq!(settings.logger.level, "info");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "query:\n  answer_timeout_secs: 30\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.query.answer_timeout_secs, 30);
        assert_eq!(settings.query.sweep_interval_secs, 60);
        assert_eq!(settings.http.port, 8001);
    }
}
