//! Process configuration: a TOML file merged with `OWEN_`-prefixed
//! environment overrides, mirroring `infra/settings.py` and
//! `app/api/config.py` from the original implementation.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::bus::SerialSettings;
use crate::registry::SensorSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

fn default_poller_connection_timeout() -> f64 {
    1.5
}

fn default_poll_delay() -> f64 {
    0.5
}

/// Top-level process configuration, deserialized from TOML and then
/// patched with any matching `OWEN_*` environment variable.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub receiver_url: Option<Url>,
    #[serde(default)]
    pub receiver_token: String,
    #[serde(default)]
    pub poller_active: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_poller_connection_timeout")]
    pub poller_connection_timeout_secs: f64,
    #[serde(default = "default_poll_delay")]
    pub poll_delay_secs: f64,
    pub serial: SerialSettings,
    #[serde(default)]
    pub sensors: Vec<SensorSettings>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OWEN_RECEIVER_URL") {
            if let Ok(url) = Url::parse(&v) {
                self.receiver_url = Some(url);
            }
        }
        if let Ok(v) = std::env::var("OWEN_RECEIVER_TOKEN") {
            self.receiver_token = v;
        }
        if let Ok(v) = std::env::var("OWEN_POLLER_ACTIVE") {
            if let Ok(b) = v.parse() {
                self.poller_active = b;
            }
        }
        if let Ok(v) = std::env::var("OWEN_DEBUG") {
            if let Ok(b) = v.parse() {
                self.debug = b;
            }
        }
        if let Ok(v) = std::env::var("OWEN_POLL_DELAY_SECS") {
            if let Ok(f) = v.parse() {
                self.poll_delay_secs = f;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poller_active && self.receiver_url.is_none() {
            return Err(ConfigError::Invalid {
                field: "receiver_url".into(),
                reason: "required when poller_active is set".into(),
            });
        }
        if self.poll_delay_secs < 0.0 {
            return Err(ConfigError::Invalid {
                field: "poll_delay_secs".into(),
                reason: "must be non-negative".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for sensor in &self.sensors {
            if !seen.insert(&sensor.name) {
                return Err(ConfigError::Invalid {
                    field: "sensors".into(),
                    reason: format!("duplicate sensor name: {}", sensor.name),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poller_active_without_receiver_url_is_rejected() {
        let config = Config {
            receiver_url: None,
            receiver_token: String::new(),
            poller_active: true,
            debug: false,
            poller_connection_timeout_secs: 1.5,
            poll_delay_secs: 0.5,
            serial: SerialSettings {
                port: "/dev/ttyUSB0".into(),
                baud: 9600,
                byte_size: 8,
                parity: crate::bus::Parity::N,
                stop_bits: 1,
                read_timeout_secs: 0.2,
            },
            sensors: Vec::new(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "receiver_url"
        ));
    }

    #[test]
    fn negative_poll_delay_is_rejected() {
        let config = Config {
            receiver_url: None,
            receiver_token: String::new(),
            poller_active: false,
            debug: false,
            poller_connection_timeout_secs: 1.5,
            poll_delay_secs: -1.0,
            serial: SerialSettings {
                port: "/dev/ttyUSB0".into(),
                baud: 9600,
                byte_size: 8,
                parity: crate::bus::Parity::N,
                stop_bits: 1,
                read_timeout_secs: 0.2,
            },
            sensors: Vec::new(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "poll_delay_secs"
        ));
    }
}
