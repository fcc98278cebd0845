mod config;
mod logging;
mod rumqttc_wrapper;

use std::sync::Arc;

use ace2mqtt::ace::Ace;
use ace2mqtt::clock::SystemClock;
use ace2mqtt::mqtt_wrapper::MqttWrapper;
use ace2mqtt::topic::DeviceIdentity;
use anyhow::bail;
use config::Config;
use crossbeam_channel::Receiver;
use rumqttc_wrapper::{Inbound, RumqttcWrapper};

use log::{error, info, warn};

// Stand-in for the downstream limit controller: it never acts on the hub.
fn log_only_trigger(_client: &RumqttcWrapper) -> bool {
    info!("Solar input changed significantly, no limit controller attached");
    false
}

fn main() -> anyhow::Result<()> {
    logging::init_logger();
    info!("Running revision: {}", env!("GIT_HASH"));
    if std::env::args().len() > 1 {
        error!("Arguments passed. Tool is configured by config.toml in its path");
    }

    let config = Config::load()?;
    if !config.is_valid() {
        bail!("configuration needs product_id, device_id and an mqtt host");
    }
    info!("mqtt broker: {}", config.mqtt.host);

    let client = Arc::new(RumqttcWrapper::new(&config.mqtt, "-ace"));
    let inbound = client.incoming();

    let mut ace = Ace::new(
        client,
        DeviceIdentity::new(&config.product_id, &config.device_id),
        Box::new(log_only_trigger),
        config.ace_config()?,
        Arc::new(SystemClock),
    );
    info!("{ace}");
    ace.start()?;

    let handled = serve(&mut ace, &inbound);
    bail!("mqtt connection closed after {handled} messages");
}

/// Handles messages one at a time, in broker order, until the mqtt pump lets
/// go of the channel. Stops the session's timers on the way out.
fn serve<MQTT>(ace: &mut Ace<MQTT>, inbound: &Receiver<Inbound>) -> usize
where
    MQTT: MqttWrapper + Send + Sync + 'static,
{
    let mut handled = 0;
    for (topic, payload) in inbound.iter() {
        handled += 1;
        if let Err(e) = ace.handle_message(&topic, &payload) {
            error!("Failed to handle message on {topic}: {e}");
        }
    }

    warn!("inbound stream closed, stopping {ace}");
    ace.stop();
    handled
}

#[cfg(test)]
mod tests {
    use ace2mqtt::ace::AceConfig;
    use ace2mqtt::clock::ManualClock;
    use ace2mqtt::mqtt_config::MqttConfig;
    use ace2mqtt::mqtt_wrapper::QoS;
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        published: Mutex<Vec<String>>,
    }

    impl MqttWrapper for Recorder {
        fn subscribe(&self, _topic: &str, _qos: QoS) -> anyhow::Result<()> {
            Ok(())
        }

        fn publish<S, V>(&self, topic: S, _qos: QoS, _retain: bool, _payload: V) -> anyhow::Result<()>
        where
            S: Clone + Into<String>,
            V: Clone + Into<Vec<u8>>,
        {
            self.published.lock().push(topic.into());
            Ok(())
        }

        fn new(_config: &MqttConfig, _suffix: &str) -> Self {
            Self::default()
        }
    }

    #[test]
    fn closed_inbound_stream_stops_the_session() {
        let templates = tempfile::tempdir().unwrap();
        let client = Arc::new(Recorder::default());
        let mut ace = Ace::new(
            client.clone(),
            DeviceIdentity::new("8bM93H", "ABC123"),
            Box::new(|_: &Recorder| false),
            AceConfig {
                template_dir: templates.path().to_path_buf(),
                scheduler_resolution: std::time::Duration::from_millis(5),
                ..AceConfig::default()
            },
            Arc::new(ManualClock::default()),
        );
        ace.start().unwrap();

        let (sender, inbound) = unbounded();
        sender
            .send((
                "/8bM93H/ABC123/properties/report".to_string(),
                br#"{"properties": {"electricLevel": 80}}"#.to_vec(),
            ))
            .unwrap();
        sender
            .send(("/8bM93H/ABC123/properties/report".to_string(), b"{".to_vec()))
            .unwrap();
        drop(sender);

        assert_eq!(serve(&mut ace, &inbound), 2);
        assert!(!ace.is_running());
        assert!(client
            .published
            .lock()
            .contains(&"solarflow-hub/ABC123/telemetry/electricLevel".to_string()));
    }
}
