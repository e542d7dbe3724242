use crate::error::{Error, Result};

/// Default topic prefix for bridge traffic.
pub const DEFAULT_TOPIC_PREFIX: &str = "trydan";

/// Builder for the bridge's MQTT topics.
///
/// Topics follow the pattern `<prefix>/<kind>[/<name>]`:
/// - `<prefix>/sensor/<field>` for per-field telemetry
/// - `<prefix>/data` for the aggregate JSON snapshot
/// - `<prefix>/availability` for the liveness flag
/// - `<prefix>/command/<name>` for inbound commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    prefix: String,
}

impl TopicBuilder {
    /// Create a builder for a prefix. A trailing `/` is stripped.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the topic for a single snapshot field.
    ///
    /// # Example
    /// ```
    /// use trydan_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("trydan");
    /// assert_eq!(topics.sensor("charging_power"), "trydan/sensor/charging_power");
    /// ```
    pub fn sensor(&self, field: &str) -> String {
        format!("{}/sensor/{}", self.prefix, field)
    }

    /// Build the aggregate snapshot topic.
    ///
    /// # Example
    /// ```
    /// use trydan_common::topics::TopicBuilder;
    ///
    /// assert_eq!(TopicBuilder::new("garage/ev").data(), "garage/ev/data");
    /// ```
    pub fn data(&self) -> String {
        format!("{}/data", self.prefix)
    }

    /// Build the availability topic.
    pub fn availability(&self) -> String {
        format!("{}/availability", self.prefix)
    }

    /// Build the topic for one command.
    pub fn command(&self, name: &str) -> String {
        format!("{}/command/{}", self.prefix, name)
    }

    /// Build the subscription filter matching every command.
    ///
    /// # Example
    /// ```
    /// use trydan_common::topics::TopicBuilder;
    ///
    /// assert_eq!(TopicBuilder::new("trydan").command_filter(), "trydan/command/+");
    /// ```
    pub fn command_filter(&self) -> String {
        format!("{}/command/+", self.prefix)
    }

    /// Extract the command name from an inbound topic.
    ///
    /// Returns `None` when the topic is not a direct child of the command
    /// namespace under this prefix.
    pub fn parse_command<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let name = topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix("/command/")?;

        if name.is_empty() || name.contains('/') {
            return None;
        }

        Some(name)
    }
}

impl Default for TopicBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX)
    }
}

/// Check that a topic prefix can be used to build publish topics.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(Error::Topic("topic prefix cannot be empty".to_string()));
    }

    if prefix.contains(|c: char| c == '+' || c == '#') {
        return Err(Error::Topic(format!(
            "topic prefix '{}' cannot contain wildcards",
            prefix
        )));
    }

    if prefix.starts_with('/') || prefix.ends_with('/') || prefix.contains("//") {
        return Err(Error::Topic(format!(
            "topic prefix '{}' has an empty level",
            prefix
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let topics = TopicBuilder::new("trydan/");
        assert_eq!(topics.prefix(), "trydan");
        assert_eq!(topics.sensor("paused"), "trydan/sensor/paused");
        assert_eq!(topics.data(), "trydan/data");
        assert_eq!(topics.availability(), "trydan/availability");
        assert_eq!(topics.command("lock"), "trydan/command/lock");
    }

    #[test]
    fn test_parse_command() {
        let topics = TopicBuilder::new("home/trydan");
        assert_eq!(
            topics.parse_command("home/trydan/command/set_charge_current"),
            Some("set_charge_current")
        );
        assert_eq!(topics.parse_command("home/trydan/command/"), None);
        assert_eq!(topics.parse_command("home/trydan/command/a/b"), None);
        assert_eq!(topics.parse_command("home/trydan/data"), None);
        assert_eq!(topics.parse_command("home/trydanx/command/pause"), None);
        assert_eq!(topics.parse_command("other/command/pause"), None);
    }

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix("trydan").is_ok());
        assert!(validate_prefix("home/garage/trydan").is_ok());
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("trydan/#").is_err());
        assert!(validate_prefix("+/trydan").is_err());
        assert!(validate_prefix("/trydan").is_err());
        assert!(validate_prefix("home//trydan").is_err());
    }
}
