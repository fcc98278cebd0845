use std::path::PathBuf;
use std::{env, fs};

use ace2mqtt::ace::AceConfig;
use ace2mqtt::mqtt_config::MqttConfig;
use anyhow::Context;
use chrono::TimeDelta;
use log::{info, warn};
use serde_derive::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub device_id: String,
    /// seconds
    pub poll_interval: Option<u64>,
    /// seconds
    pub ha_config_interval: Option<u64>,
    /// seconds
    pub window: Option<u64>,
    pub template_dir: Option<PathBuf>,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

impl Config {
    pub fn is_valid(&self) -> bool {
        !self.product_id.is_empty() && !self.device_id.is_empty() && self.mqtt.is_valid()
    }

    /// Reads `config.toml` from the working directory, or next to the
    /// executable, then applies environment overrides.
    pub fn load() -> anyhow::Result<Config> {
        let mut path = env::current_dir().context("can't retrieve current dir")?;
        path.push("config.toml");
        if !path.exists() {
            info!("{} does not exist. Trying relative path", path.display());
            path = env::current_exe().context("unable to get current executable path")?;
            path.pop();
            path.push("config.toml");
        }

        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => {
                info!("loading configuration from {}", path.display());
                Self::parse(&contents)
                    .with_context(|| format!("{} unparsable", path.display()))?
            }
            Err(e) => {
                warn!("Could not read {}: {e}", path.display());
                Config::default()
            }
        };
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Config> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(product_id) = var("ACE_PRODUCT_ID") {
            self.product_id = product_id;
        }
        if let Some(device_id) = var("ACE_DEVICE_ID") {
            self.device_id = device_id;
        }
        if let Some(host) = var("MQTT_BROKER_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = var("MQTT_PORT") {
            match port.parse() {
                Ok(port) => self.mqtt.port = Some(port),
                Err(e) => warn!("ignoring MQTT_PORT={port}: {e}"),
            }
        }
        if let Some(username) = var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
    }

    pub fn ace_config(&self) -> anyhow::Result<AceConfig> {
        let defaults = AceConfig::default();
        let seconds = |key: &str, value: Option<u64>, default: TimeDelta| match value {
            None => Ok(default),
            Some(s) => i64::try_from(s)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .with_context(|| format!("{key} = {s} is out of range")),
        };
        Ok(AceConfig {
            poll_interval: seconds("poll_interval", self.poll_interval, defaults.poll_interval)?,
            ha_config_interval: seconds(
                "ha_config_interval",
                self.ha_config_interval,
                defaults.ha_config_interval,
            )?,
            window: seconds("window", self.window, defaults.window)?,
            template_dir: self
                .template_dir
                .clone()
                .unwrap_or(defaults.template_dir),
            scheduler_resolution: defaults.scheduler_resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const CONFIG: &str = r#"
        product_id = "8bM93H"
        device_id = "ABC123"
        poll_interval = 30

        [mqtt]
        host = "broker.local"
        username = "ace"
    "#;

    #[test]
    fn parses_toml() {
        let config = Config::parse(CONFIG).unwrap();
        assert!(config.is_valid());
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.username.as_deref(), Some("ace"));

        let ace = config.ace_config().unwrap();
        assert_eq!(ace.poll_interval, TimeDelta::seconds(30));
        assert_eq!(ace.ha_config_interval, TimeDelta::seconds(600));
        assert_eq!(ace.window, TimeDelta::seconds(180));
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::parse(CONFIG).unwrap();
        let vars = HashMap::from([
            ("ACE_DEVICE_ID", "XYZ"),
            ("MQTT_BROKER_HOST", "10.0.0.2"),
            ("MQTT_PORT", "not a port"),
            ("MQTT_PASSWORD", "secret"),
        ]);
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.product_id, "8bM93H");
        assert_eq!(config.device_id, "XYZ");
        assert_eq!(config.mqtt.host, "10.0.0.2");
        assert_eq!(config.mqtt.port, None);
        assert_eq!(config.mqtt.password.as_deref(), Some("secret"));
    }

    #[test]
    fn out_of_range_durations_are_rejected() {
        let config = Config::parse("window = 10000000000000000").unwrap();
        let err = config.ace_config().unwrap_err();
        assert!(err.to_string().contains("window"));

        let config = Config::parse("poll_interval = 9300000000000000").unwrap();
        assert!(config.ace_config().is_err());
    }

    #[test]
    fn empty_config_is_invalid() {
        assert!(!Config::parse("").unwrap().is_valid());
    }
}
