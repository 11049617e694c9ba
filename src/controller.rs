//! Boundary between the occupancy core and the wireless controller.

use async_trait::async_trait;
use mac_address::MacAddress;
use serde_derive::Deserialize;

use crate::error::ControllerError;

/// One connected client as reported by the controller.
///
/// Every field is optional: a record missing its address simply never
/// matches a watch entry.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ClientRecord {
    pub mac: Option<String>,
    pub ap_mac: Option<String>,
    pub hostname: Option<String>,
    pub is_guest: Option<bool>,
    pub essid: Option<String>,
}

impl ClientRecord {
    pub fn device(&self) -> Option<MacAddress> {
        self.mac.as_deref()?.parse().ok()
    }

    pub fn access_point(&self) -> Option<MacAddress> {
        self.ap_mac.as_deref()?.parse().ok()
    }

    pub fn is_guest(&self) -> bool {
        self.is_guest.unwrap_or(false)
    }

    /// Human readable label for log lines.
    pub fn label(&self) -> String {
        match (&self.hostname, &self.mac) {
            (Some(hostname), Some(mac)) => format!("{hostname} ({mac})"),
            (None, Some(mac)) => mac.clone(),
            (Some(hostname), None) => format!("{hostname} (no address)"),
            (None, None) => "<unknown>".to_string(),
        }
    }
}

/// Fetches the current connected-client list.
#[async_trait]
pub trait ClientSource: Send + Sync {
    async fn clients(&self) -> Result<Vec<ClientRecord>, ControllerError>;
}
