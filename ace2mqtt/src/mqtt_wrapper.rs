use crate::mqtt_config::MqttConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

pub trait MqttWrapper {
    // This trait decouples the bridge logic from a concrete MQTT client. The
    // binary wraps its client in a new type implementing it, tests use an
    // in-memory recorder.
    //
    // Methods take `&self`: one handle is shared by the inbound message path,
    // the periodic timers and the trigger action.

    fn subscribe(&self, topic: &str, qos: QoS) -> anyhow::Result<()>;

    fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> anyhow::Result<()>
    where
        S: Clone + Into<String>,
        V: Clone + Into<Vec<u8>>;

    fn new(config: &MqttConfig, suffix: &str) -> Self;
}
