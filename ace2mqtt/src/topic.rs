/// Root of the normalized topic space the hub's properties are republished to.
pub const NORMALIZED_ROOT: &str = "solarflow-hub";

/// Product and device id of one hub, as used in its topics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    product_id: String,
    device_id: String,
}

impl DeviceIdentity {
    pub fn new(product_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            device_id: device_id.into(),
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Where to ask the hub for a full property report.
    pub fn read_topic(&self) -> String {
        format!("iot/{}/{}/properties/read", self.product_id, self.device_id)
    }

    pub fn write_topic(&self) -> String {
        format!("iot/{}/{}/properties/write", self.product_id, self.device_id)
    }

    pub fn report_topic(&self) -> String {
        format!("/{}/{}/properties/report", self.product_id, self.device_id)
    }

    pub fn metric_prefix(&self) -> String {
        format!("{NORMALIZED_ROOT}/{}", self.device_id)
    }

    pub fn metric_wildcard(&self) -> String {
        format!("{}/#", self.metric_prefix())
    }

    pub fn ha_config_topic(&self, kind: &str, name: &str) -> String {
        format!("homeassistant/{kind}/ace-{}-{name}/config", self.device_id)
    }
}

pub fn telemetry_topic(device_id: &str, property: &str) -> String {
    format!("{NORMALIZED_ROOT}/{device_id}/telemetry/{property}")
}

/// Slash-separated segments of a topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicParts<'a> {
    segments: Vec<&'a str>,
}

impl<'a> TopicParts<'a> {
    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    /// Third segment, which carries the device id in hub report topics
    /// (`/P/D/properties/report`).
    pub fn device_id(&self) -> Option<&'a str> {
        self.segments.get(2).copied().filter(|s| !s.is_empty())
    }

    pub fn metric(&self) -> Option<&'a str> {
        self.segments.last().copied().filter(|s| !s.is_empty())
    }
}

pub fn parse_topic(topic: &str) -> TopicParts<'_> {
    TopicParts {
        segments: topic.split('/').collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_device_topics() {
        let ace = DeviceIdentity::new("8bM93H", "ABC123");
        assert_eq!(ace.read_topic(), "iot/8bM93H/ABC123/properties/read");
        assert_eq!(ace.write_topic(), "iot/8bM93H/ABC123/properties/write");
        assert_eq!(ace.report_topic(), "/8bM93H/ABC123/properties/report");
        assert_eq!(ace.metric_prefix(), "solarflow-hub/ABC123");
        assert_eq!(ace.metric_wildcard(), "solarflow-hub/ABC123/#");
        assert_eq!(
            ace.ha_config_topic("sensor", "solarInputPower"),
            "homeassistant/sensor/ace-ABC123-solarInputPower/config"
        );
        assert_eq!(
            telemetry_topic("ABC123", "electricLevel"),
            "solarflow-hub/ABC123/telemetry/electricLevel"
        );
    }

    #[test]
    fn report_topic_carries_device_in_third_segment() {
        let parts = parse_topic("/8bM93H/ABC123/properties/report");
        assert_eq!(parts.segments(), ["", "8bM93H", "ABC123", "properties", "report"]);
        assert_eq!(parts.device_id(), Some("ABC123"));
        assert_eq!(parts.metric(), Some("report"));
    }

    #[test]
    fn metric_is_last_segment() {
        let parts = parse_topic("solarflow-hub/ABC123/telemetry/solarInputPower");
        assert_eq!(parts.metric(), Some("solarInputPower"));
    }

    #[test]
    fn short_or_trailing_slash_topics() {
        assert_eq!(parse_topic("a/b").device_id(), None);
        assert_eq!(parse_topic("a/b/").metric(), None);
        assert_eq!(parse_topic("").metric(), None);
    }
}
