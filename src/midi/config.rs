//! MIDI configuration: device selection and channel filter.

use serde::{Deserialize, Serialize};

/// The `midi` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiConfig {
    /// Preferred MIDI device name (substring match). None = first available.
    #[serde(default)]
    pub device_name: Option<String>,
    /// Only accept messages on this MIDI channel (0-15). None = all channels.
    #[serde(default)]
    pub channel_filter: Option<u8>,
    /// Root MIDI control incoming events are delivered to.
    #[serde(default = "MidiConfig::default_control")]
    pub control: String,
}

impl MidiConfig {
    fn default_control() -> String {
        "midi".to_string()
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            channel_filter: None,
            control: Self::default_control(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MidiConfig::default();
        assert!(config.device_name.is_none());
        assert!(config.channel_filter.is_none());
        assert_eq!(config.control, "midi");
    }

    #[test]
    fn custom_config_deserialize() {
        let yaml = r#"
device_name: "Arturia"
channel_filter: 0
control: keys
"#;
        let config: MidiConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.device_name.as_deref(), Some("Arturia"));
        assert_eq!(config.channel_filter, Some(0));
        assert_eq!(config.control, "keys");
    }
}
