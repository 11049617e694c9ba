use std::path::Path;
use std::time::Duration;

use mac_address::MacAddress;
use serde_derive::Deserialize;

use crate::error::ConfigError;
use crate::occupancy::AggregationMode;

const DEFAULT_INTERVAL_SECONDS: u64 = 1800;
const DEFAULT_SITE: &str = "default";
/// Upper bound for configured periods; one year.
const MAX_PERIOD_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub controller: ControllerConfig,
    pub mqtt: MqttConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SensorConfig {
    pub name: String,
    pub watch: Vec<WatchSpec>,
    pub watch_guests: Option<bool>,
    #[serde(default)]
    pub mode: AggregationMode,
    pub interval_seconds: Option<u64>,
    pub debounce_seconds: Option<u64>,
}

/// A watch list entry: either a bare device address, or a table pinning the
/// device to one access point.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum WatchSpec {
    Device(MacAddress),
    Pinned {
        device: MacAddress,
        ap: Option<MacAddress>,
    },
}

#[derive(Deserialize, Debug, Clone)]
pub struct ControllerConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub site: Option<String>,
    pub secure: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub publisher_id: Option<String>,
    pub topic_path: Option<String>,
    pub keep_alive_seconds: Option<u64>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::de::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.url.trim().is_empty() {
            return Err(ConfigError::Invalid("controller.url is empty".into()));
        }
        if self.controller.username.is_empty() || self.controller.password.is_empty() {
            return Err(ConfigError::Invalid(
                "controller credentials are required".into(),
            ));
        }
        if self.sensor.interval_seconds == Some(0) {
            return Err(ConfigError::Invalid(
                "sensor.interval_seconds must be positive".into(),
            ));
        }
        for (key, value) in [
            ("interval_seconds", self.sensor.interval_seconds),
            ("debounce_seconds", self.sensor.debounce_seconds),
        ] {
            if value.is_some_and(|seconds| seconds > MAX_PERIOD_SECONDS) {
                return Err(ConfigError::Invalid(format!(
                    "sensor.{key} must not exceed {MAX_PERIOD_SECONDS}"
                )));
            }
        }
        Ok(())
    }
}

impl SensorConfig {
    pub fn watch_guests(&self) -> bool {
        self.watch_guests.unwrap_or(false)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_seconds.unwrap_or(0))
    }
}

impl ControllerConfig {
    pub fn site(&self) -> &str {
        self.site.as_deref().unwrap_or(DEFAULT_SITE)
    }

    pub fn secure(&self) -> bool {
        self.secure.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        [controller]
        url = "https://unifi.local:8443"
        username = "user"
        password = "pass"

        [mqtt]
        host = "localhost"
    "#;

    fn with_sensor(sensor: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::parse(&format!("{BASE}\n[sensor]\n{sensor}"))
    }

    #[test]
    fn test_config() {
        let config = with_sensor(
            r#"
            name = "Living Room"
            watch = ["aa:bb:cc:dd:ee:01", { device = "AA:BB:CC:DD:EE:02", ap = "11:22:33:44:55:66" }]
            watch_guests = true
            mode = "all"
            interval_seconds = 60
            debounce_seconds = 5
        "#,
        )
        .unwrap();

        assert_eq!(config.sensor.name, "Living Room");
        assert_eq!(config.sensor.mode, AggregationMode::All);
        assert!(config.sensor.watch_guests());
        assert_eq!(config.sensor.interval(), Duration::from_secs(60));
        assert_eq!(config.sensor.debounce(), Duration::from_secs(5));
        assert_eq!(
            config.sensor.watch[0],
            WatchSpec::Device("aa:bb:cc:dd:ee:01".parse().unwrap())
        );
        assert_eq!(
            config.sensor.watch[1],
            WatchSpec::Pinned {
                device: "aa:bb:cc:dd:ee:02".parse().unwrap(),
                ap: Some("11:22:33:44:55:66".parse().unwrap()),
            }
        );
    }

    #[test]
    fn test_defaults() {
        let config = with_sensor(
            r#"
            name = "Hall"
            watch = ["aa:bb:cc:dd:ee:01"]
        "#,
        )
        .unwrap();

        assert_eq!(config.sensor.mode, AggregationMode::Any);
        assert!(!config.sensor.watch_guests());
        assert_eq!(config.sensor.interval(), Duration::from_secs(1800));
        assert!(config.sensor.debounce().is_zero());
        assert_eq!(config.controller.site(), "default");
        assert!(!config.controller.secure());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let result = with_sensor(
            r#"
            name = "Hall"
            watch = ["aa:bb:cc:dd:ee:01"]
            mode = "most"
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_watch_list_is_rejected() {
        let result = with_sensor(r#"name = "Hall""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let result = with_sensor(
            r#"
            name = "Hall"
            watch = ["not-a-mac"]
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_oversized_debounce_is_rejected() {
        let result = with_sensor(&format!(
            "name = \"Hall\"\nwatch = []\ndebounce_seconds = {}",
            i64::MAX
        ));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_oversized_interval_is_rejected() {
        let result = with_sensor(&format!(
            "name = \"Hall\"\nwatch = []\ninterval_seconds = {}",
            MAX_PERIOD_SECONDS + 1
        ));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = with_sensor(&format!(
            "name = \"Hall\"\nwatch = []\ninterval_seconds = {MAX_PERIOD_SECONDS}"
        ))
        .unwrap();
        assert_eq!(config.sensor.interval(), Duration::from_secs(MAX_PERIOD_SECONDS));
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        let result = AppConfig::parse(
            r#"
            [controller]
            url = "https://unifi.local:8443"
            username = "user"
            password = ""

            [mqtt]
            host = "localhost"

            [sensor]
            name = "Hall"
            watch = []
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
