use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::clock::Clock;
use crate::error::DecodeError;
use crate::firmware::FirmwareVersion;
use crate::home_assistant::{HomeAssistant, DEFAULT_TEMPLATE_DIR};
use crate::mqtt_wrapper::{MqttWrapper, QoS};
use crate::router::{Dispatch, MessageRouter};
use crate::scheduler::{PeriodicScheduler, DEFAULT_RESOLUTION};
use crate::signal_monitor::{SignalMonitor, TriggerAction};
use crate::topic::DeviceIdentity;

#[derive(Clone, Debug)]
pub struct AceConfig {
    /// How often the hub is asked for a full property report.
    pub poll_interval: TimeDelta,
    /// How often the Home Assistant discovery documents are republished.
    pub ha_config_interval: TimeDelta,
    /// Span of the solar input history.
    pub window: TimeDelta,
    pub template_dir: PathBuf,
    pub scheduler_resolution: Duration,
}

impl Default for AceConfig {
    fn default() -> Self {
        Self {
            poll_interval: TimeDelta::seconds(60),
            ha_config_interval: TimeDelta::seconds(600),
            window: TimeDelta::seconds(180),
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            scheduler_resolution: DEFAULT_RESOLUTION,
        }
    }
}

// Everything the message path and the timers share.
struct Inner<MQTT> {
    client: Arc<MQTT>,
    identity: DeviceIdentity,
    router: MessageRouter,
    home_assistant: HomeAssistant,
    clock: Arc<dyn Clock>,
    // separate locks: a slow trigger holds the monitor, not the firmware
    monitor: Mutex<SignalMonitor<MQTT>>,
    firmware: Mutex<Option<FirmwareVersion>>,
}

impl<MQTT: MqttWrapper> Inner<MQTT> {
    fn poll(&self) -> anyhow::Result<()> {
        let topic = self.identity.read_topic();
        info!("Triggering Ace telemetry update: {topic}");
        self.client.publish(
            topic,
            QoS::AtMostOnce,
            false,
            json!({ "properties": ["getAll"] }).to_string(),
        )
    }

    fn publish_ha_configs(&self) -> anyhow::Result<usize> {
        let fw_version = self
            .firmware
            .lock()
            .map_or_else(|| "unknown".to_string(), |fw| fw.to_string());
        self.home_assistant
            .publish_configs(self.client.as_ref(), &self.identity, &fw_version)
    }

    fn dispatch(&self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Republish { topic, payload } => {
                debug!("Republishing {payload} to {topic}");
                if let Err(e) = self.client.publish(topic, QoS::AtMostOnce, false, payload) {
                    warn!("mqtt error: {e:?}");
                }
            }
            Dispatch::SolarInput(value) => {
                let now = self.clock.now();
                self.monitor
                    .lock()
                    .record(value, now, self.client.as_ref());
            }
            Dispatch::Firmware(version) => {
                debug!("Ace firmware version: {version}");
                *self.firmware.lock() = Some(version);
            }
            Dispatch::Unrecognized(metric) => {
                warn!("Ignoring solarflow-hub metric: {metric}");
            }
        }
    }
}

/// One Solarflow ACE hub: routes its messages, tracks its solar input and
/// keeps Home Assistant informed.
///
/// Construction only wires dependencies. [`start`](Self::start) subscribes and
/// arms the periodic poll and config republish, [`stop`](Self::stop) cancels
/// them. The trigger action runs while the signal monitor is locked and must
/// not call back into the session.
pub struct Ace<MQTT: MqttWrapper + Send + Sync + 'static> {
    inner: Arc<Inner<MQTT>>,
    poller: PeriodicScheduler,
    ha_publisher: PeriodicScheduler,
}

impl<MQTT: MqttWrapper + Send + Sync + 'static> Ace<MQTT> {
    pub fn new(
        client: Arc<MQTT>,
        identity: DeviceIdentity,
        trigger: TriggerAction<MQTT>,
        config: AceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let poller = PeriodicScheduler::new("ace-poll", config.poll_interval, clock.clone())
            .with_resolution(config.scheduler_resolution);
        let ha_publisher =
            PeriodicScheduler::new("ace-ha-config", config.ha_config_interval, clock.clone())
                .with_resolution(config.scheduler_resolution);

        let inner = Inner {
            client,
            router: MessageRouter::new(identity.clone()),
            identity,
            home_assistant: HomeAssistant::new(config.template_dir),
            clock,
            monitor: Mutex::new(SignalMonitor::new(config.window, trigger)),
            firmware: Mutex::new(None),
        };

        Self {
            inner: Arc::new(inner),
            poller,
            ha_publisher,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn subscribe(&self) -> anyhow::Result<()> {
        for topic in [
            self.inner.identity.report_topic(),
            self.inner.identity.metric_wildcard(),
        ] {
            self.inner.client.subscribe(&topic, QoS::AtMostOnce)?;
            info!("Ace subscribing: {topic}");
        }
        Ok(())
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        self.subscribe()?;

        let inner = self.inner.clone();
        self.ha_publisher
            .start(move || inner.publish_ha_configs().map(|_| ()))?;

        let inner = self.inner.clone();
        self.poller.start(move || inner.poll())?;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.poller.stop();
        self.ha_publisher.stop();
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_running() || self.ha_publisher.is_running()
    }

    /// Asks the hub for a full property report.
    pub fn poll(&self) -> anyhow::Result<()> {
        self.inner.poll()
    }

    pub fn publish_ha_configs(&self) -> anyhow::Result<usize> {
        self.inner.publish_ha_configs()
    }

    /// Handles one inbound message. Decode failures on tracked metrics and
    /// malformed reports are returned; everything else is logged.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<(), DecodeError> {
        for dispatch in self.inner.router.route(topic, payload)? {
            self.inner.dispatch(dispatch);
        }
        Ok(())
    }

    pub fn write_properties(&self, properties: Map<String, Value>) -> anyhow::Result<()> {
        let payload = json!({ "properties": properties }).to_string();
        self.inner
            .client
            .publish(self.inner.identity.write_topic(), QoS::AtMostOnce, false, payload)
    }

    pub fn set_buzzer(&self, on: bool) -> anyhow::Result<()> {
        let mut properties = Map::new();
        properties.insert("buzzerSwitch".to_string(), json!(u8::from(on)));
        self.write_properties(properties)?;
        info!("Turning hub buzzer {}", if on { "ON" } else { "OFF" });
        Ok(())
    }

    /// Latest solar input power, `-1` while unknown.
    pub fn solar_input_power(&self) -> i64 {
        self.inner.monitor.lock().current()
    }

    pub fn last_trigger_value(&self) -> Option<i64> {
        self.inner.monitor.lock().last_trigger_value()
    }

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        *self.inner.firmware.lock()
    }
}

impl<MQTT: MqttWrapper + Send + Sync + 'static> fmt::Display for Ace<MQTT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ACE: P:{} D:{}",
            self.inner.identity.product_id(),
            self.inner.identity.device_id()
        )
    }
}
