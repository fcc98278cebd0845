use std::sync::Arc;
use std::{thread, time::Duration};

use ace2mqtt::{
    mqtt_config::MqttConfig,
    mqtt_wrapper::{self},
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rumqttc::{
    tokio_rustls::{self, rustls::ClientConfig},
    Client, Event, MqttOptions, Packet, Transport,
};

/// Topic and raw payload of a message delivered by the broker.
pub type Inbound = (String, Vec<u8>);

pub struct RumqttcWrapper {
    client: Client,
    subscriptions: Arc<Mutex<Vec<(String, rumqttc::QoS)>>>,
    inbound: Receiver<Inbound>,
}

impl RumqttcWrapper {
    /// Messages from subscribed topics, in the order the broker sent them.
    pub fn incoming(&self) -> Receiver<Inbound> {
        self.inbound.clone()
    }
}

fn match_qos(qos: mqtt_wrapper::QoS) -> rumqttc::QoS {
    match qos {
        mqtt_wrapper::QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        mqtt_wrapper::QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        mqtt_wrapper::QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

fn tls_transport() -> Transport {
    // Use rustls-native-certs to load root certificates from the operating system.
    let mut roots = tokio_rustls::rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in native.errors {
        warn!("could not load platform cert: {e}");
    }
    for cert in native.certs {
        if let Err(e) = roots.add(cert) {
            warn!("skipping platform cert: {e}");
        }
    }

    let client_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Transport::tls_with_config(client_config.into())
}

impl mqtt_wrapper::MqttWrapper for RumqttcWrapper {
    fn subscribe(&self, topic: &str, qos: mqtt_wrapper::QoS) -> anyhow::Result<()> {
        let qos = match_qos(qos);
        self.client.subscribe(topic, qos)?;
        self.subscriptions.lock().push((topic.to_string(), qos));
        Ok(())
    }

    fn publish<S, V>(
        &self,
        topic: S,
        qos: mqtt_wrapper::QoS,
        retain: bool,
        payload: V,
    ) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>,
    {
        // try publishing up to three times
        for _ in 0..2 {
            if self
                .client
                .try_publish(topic.clone(), match_qos(qos), retain, payload.clone())
                .is_ok()
            {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(100));
        }
        Ok(self
            .client
            .try_publish(topic, match_qos(qos), retain, payload)?)
    }

    fn new(config: &MqttConfig, suffix: &str) -> Self {
        let use_tls = config.tls.is_some_and(|tls| tls);
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| "solarflow-ace-bridge".to_string());

        let mut mqttoptions =
            MqttOptions::new(client_id + suffix, &config.host, config.port_or_default());
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if use_tls {
            mqttoptions.set_transport(tls_transport());
        }

        //parse the mqtt authentication options
        if let Some((username, password)) = match (&config.username, &config.password) {
            (None, None) => None,
            (None, Some(_)) => None,
            (Some(username), None) => Some((username.clone(), "".into())),
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
        } {
            mqttoptions.set_credentials(username, password);
        }

        let (client, connection) = Client::new(mqttoptions, 512);
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        let (sender, inbound) = unbounded();

        let pump_client = client.clone();
        let pump_subscriptions = subscriptions.clone();
        thread::spawn(move || pump(connection, pump_client, pump_subscriptions, sender));

        Self {
            client,
            subscriptions,
            inbound,
        }
    }
}

// Drives the connection: forwards publishes to the session and restores
// subscriptions after every (re)connect. Ends when the receiving side is gone.
fn pump(
    mut connection: rumqttc::Connection,
    client: Client,
    subscriptions: Arc<Mutex<Vec<(String, rumqttc::QoS)>>>,
    sender: Sender<Inbound>,
) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if sender
                    .send((publish.topic, publish.payload.to_vec()))
                    .is_err()
                {
                    debug!("inbound receiver dropped, stopping mqtt pump");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("mqtt connected");
                for (topic, qos) in subscriptions.lock().iter() {
                    if let Err(e) = client.try_subscribe(topic.as_str(), *qos) {
                        warn!("re-subscribe {topic} failed: {e}");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("mqtt error: {e}");
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
}
