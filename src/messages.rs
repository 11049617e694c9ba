#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionChange {
    Connected,
    Disconnected,
}

/// A connect/disconnect notification from the controller's event stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerEvent {
    pub change: ConnectionChange,
    pub device: Option<String>,
    pub message: String,
}

/// Inbound messages for the update scheduler.
#[derive(Clone, Debug)]
pub enum Trigger {
    Controller(ControllerEvent),
    /// Manual re-evaluation request (e.g. over MQTT)
    Refresh,
    Shutdown,
}
