use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ControllerError {
    #[error("HTTP request to controller failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Controller event stream error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Controller rejected credentials")]
    Unauthorized,

    #[error("Controller API error: {0}")]
    Api(String),

    #[error("Invalid controller URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(ThisError, Debug)]
pub enum SinkError {
    #[error("MQTT publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}
