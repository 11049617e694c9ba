use std::fmt;

use log::{debug, info, trace};
use serde_derive::{Deserialize, Serialize};

use crate::controller::ClientRecord;
use crate::watch::WatchRegistry;

/// How the set of matched devices is turned into a single verdict.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Occupied while at least one watched device is connected.
    #[default]
    Any,
    /// Occupied only while every watched device is connected.
    All,
    /// Occupied while no watched device is connected.
    None,
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMode::Any => write!(f, "any"),
            AggregationMode::All => write!(f, "all"),
            AggregationMode::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyVerdict {
    Detected,
    NotDetected,
}

impl OccupancyVerdict {
    pub fn is_detected(self) -> bool {
        self == OccupancyVerdict::Detected
    }
}

impl From<bool> for OccupancyVerdict {
    fn from(detected: bool) -> Self {
        if detected {
            OccupancyVerdict::Detected
        } else {
            OccupancyVerdict::NotDetected
        }
    }
}

impl fmt::Display for OccupancyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccupancyVerdict::Detected => write!(f, "occupancy detected"),
            OccupancyVerdict::NotDetected => write!(f, "occupancy not detected"),
        }
    }
}

/// Non-guest devices always count; guest devices only when guests are watched.
pub fn counts_as_present(is_guest: bool, watch_guests: bool) -> bool {
    !is_guest || watch_guests
}

/// Reduce one client snapshot to a verdict.
///
/// `All` is satisfied once every watch entry is matched by some counted
/// client, so duplicate entries cannot hold it back. An empty registry is
/// trivially satisfied and reports `Detected`.
pub fn evaluate(
    snapshot: &[ClientRecord],
    registry: &WatchRegistry,
    watch_guests: bool,
    mode: AggregationMode,
) -> OccupancyVerdict {
    let matched: Vec<&ClientRecord> = snapshot
        .iter()
        .filter(|record| {
            if !registry.is_watched(record) {
                trace!("{} is not watched", record.label());
                return false;
            }
            let counts = counts_as_present(record.is_guest(), watch_guests);
            debug!(
                "{} is watched (guest: {}, ap: {}, ssid: {}), counts: {}",
                record.label(),
                record.is_guest(),
                record.ap_mac.as_deref().unwrap_or("-"),
                record.essid.as_deref().unwrap_or("-"),
                counts
            );
            counts
        })
        .collect();

    let verdict: OccupancyVerdict = match mode {
        AggregationMode::None => matched.is_empty(),
        AggregationMode::All => registry
            .entries()
            .iter()
            .all(|entry| matched.iter().any(|record| entry.matches(record))),
        AggregationMode::Any => !matched.is_empty(),
    }
    .into();

    info!(
        "{} of {} connected client(s) matched {} watched device(s) in mode {}: {}",
        matched.len(),
        snapshot.len(),
        registry.len(),
        mode,
        verdict
    );
    verdict
}

/// The fixed evaluation parameters of one sensor.
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: WatchRegistry,
    watch_guests: bool,
    mode: AggregationMode,
}

impl Evaluator {
    pub fn new(registry: WatchRegistry, watch_guests: bool, mode: AggregationMode) -> Self {
        Evaluator {
            registry,
            watch_guests,
            mode,
        }
    }

    pub fn evaluate(&self, snapshot: &[ClientRecord]) -> OccupancyVerdict {
        evaluate(snapshot, &self.registry, self.watch_guests, self.mode)
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// The verdict this evaluator reaches with no watched devices, which is
    /// fixed regardless of what the controller reports.
    pub fn unwatched_verdict(&self) -> OccupancyVerdict {
        evaluate(&[], &WatchRegistry::default(), self.watch_guests, self.mode)
    }
}
