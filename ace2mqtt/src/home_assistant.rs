use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, error, info, warn};

use crate::mqtt_wrapper::{MqttWrapper, QoS};
use crate::template::render;
use crate::topic::DeviceIdentity;

pub const DEFAULT_TEMPLATE_DIR: &str = "homeassistant/ace";

/// A Home Assistant MQTT discovery document on disk, named
/// `<type>.<name>.json`, e.g. `sensor.solarInputPower.json`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigTemplate {
    pub kind: String,
    pub name: String,
    pub path: PathBuf,
}

impl ConfigTemplate {
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let mut parts = stem.split('.');
        let kind = parts.next().filter(|s| !s.is_empty())?;
        let name = parts.next().filter(|s| !s.is_empty())?;
        Some(Self {
            kind: kind.to_string(),
            name: name.to_string(),
            path: path.to_path_buf(),
        })
    }
}

pub fn discover_templates(dir: &Path) -> anyhow::Result<Vec<ConfigTemplate>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("cannot read template directory {}", dir.display()))?;

    let mut templates = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        match ConfigTemplate::from_path(&path) {
            Some(template) => templates.push(template),
            None => warn!(
                "Skipping Homeassistant template {}: expected <type>.<name>.json",
                path.display()
            ),
        }
    }
    templates.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(templates)
}

/// Publishes the discovery documents that let Home Assistant know which
/// entities the hub provides and where their states live.
#[derive(Clone, Debug)]
pub struct HomeAssistant {
    template_dir: PathBuf,
}

impl HomeAssistant {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    pub fn publish_configs<MQTT: MqttWrapper>(
        &self,
        client: &MQTT,
        identity: &DeviceIdentity,
        fw_version: &str,
    ) -> anyhow::Result<usize> {
        info!("Publishing Homeassistant templates...");
        let templates = discover_templates(&self.template_dir)?;
        let vars = HashMap::from([
            ("product_id", identity.product_id().to_string()),
            ("device_id", identity.device_id().to_string()),
            ("fw_version", fw_version.to_string()),
        ]);

        let mut published = 0;
        for template in &templates {
            let source = match fs::read_to_string(&template.path) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Could not read {}: {e}", template.path.display());
                    continue;
                }
            };
            let config = match render(&source, &vars) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Could not render {}: {e}", template.path.display());
                    continue;
                }
            };
            let topic = identity.ha_config_topic(&template.kind, &template.name);
            debug!("Publishing to {topic} with payload {config}");
            match client.publish(topic, QoS::AtMostOnce, true, config) {
                Ok(()) => published += 1,
                Err(e) => error!("Failed to publish message: {e:?}"),
            }
        }

        info!("Published {published} Homeassistant templates for Ace.");
        Ok(published)
    }
}
