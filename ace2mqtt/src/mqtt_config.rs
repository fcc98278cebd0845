use serde_derive::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub tls: Option<bool>,
}

impl MqttConfig {
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty()
    }

    /// Broker port, falling back to the well-known port for the transport.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(if self.tls.is_some_and(|tls| tls) {
            8883
        } else {
            1883
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_depends_on_tls() {
        let mut config = MqttConfig {
            host: "broker".into(),
            ..Default::default()
        };
        assert_eq!(config.port_or_default(), 1883);
        config.tls = Some(true);
        assert_eq!(config.port_or_default(), 8883);
        config.port = Some(1234);
        assert_eq!(config.port_or_default(), 1234);
    }

    #[test]
    fn host_is_required() {
        assert!(!MqttConfig::default().is_valid());
    }
}
