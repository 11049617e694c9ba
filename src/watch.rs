use mac_address::MacAddress;

use crate::config::WatchSpec;
use crate::controller::ClientRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct WatchedEntry {
    pub device: MacAddress,
    pub access_point: Option<MacAddress>,
}

impl WatchedEntry {
    /// An unpinned entry matches on the device address alone; a pinned entry
    /// also requires the client to be associated with that access point.
    pub fn matches(&self, record: &ClientRecord) -> bool {
        if record.device() != Some(self.device) {
            return false;
        }
        match self.access_point {
            None => true,
            Some(ap) => record.access_point() == Some(ap),
        }
    }
}

impl From<&WatchSpec> for WatchedEntry {
    fn from(spec: &WatchSpec) -> Self {
        match spec {
            WatchSpec::Device(device) => WatchedEntry {
                device: *device,
                access_point: None,
            },
            WatchSpec::Pinned { device, ap } => WatchedEntry {
                device: *device,
                access_point: *ap,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WatchRegistry {
    entries: Vec<WatchedEntry>,
}

impl WatchRegistry {
    pub fn new(entries: Vec<WatchedEntry>) -> Self {
        WatchRegistry { entries }
    }

    pub fn from_config(watch: &[WatchSpec]) -> Self {
        Self::new(watch.iter().map(WatchedEntry::from).collect())
    }

    pub fn is_watched(&self, record: &ClientRecord) -> bool {
        self.entries.iter().any(|entry| entry.matches(record))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[WatchedEntry] {
        &self.entries
    }
}
