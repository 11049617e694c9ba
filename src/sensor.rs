//! Published occupancy state and the sink it is forwarded to.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;

use crate::error::SinkError;
use crate::occupancy::OccupancyVerdict;

/// Last published verdict, readable from any task without evaluating.
///
/// Starts out as "not detected" until the first verdict is published.
#[derive(Debug, Default)]
pub struct SensorState {
    detected: AtomicBool,
    version: AtomicU32,
}

impl SensorState {
    pub fn get(&self) -> OccupancyVerdict {
        self.detected.load(Ordering::SeqCst).into()
    }

    /// Store a verdict. Returns true and bumps the version if it changed.
    pub fn set(&self, verdict: OccupancyVerdict) -> bool {
        let old = self.detected.swap(verdict.is_detected(), Ordering::SeqCst);
        if old != verdict.is_detected() {
            self.version.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }
}

/// Host platform side of the sensor.
#[async_trait]
pub trait OccupancySink: Send + Sync {
    async fn publish(&self, verdict: OccupancyVerdict) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SensorState::default();
        assert_eq!(state.get(), OccupancyVerdict::NotDetected);
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn test_set_increments_version() {
        let state = SensorState::default();

        assert!(state.set(OccupancyVerdict::Detected));
        assert_eq!(state.get(), OccupancyVerdict::Detected);
        assert_eq!(state.version(), 1);

        // Setting same value doesn't increment
        assert!(!state.set(OccupancyVerdict::Detected));
        assert_eq!(state.version(), 1);

        assert!(state.set(OccupancyVerdict::NotDetected));
        assert_eq!(state.get(), OccupancyVerdict::NotDetected);
        assert_eq!(state.version(), 2);
    }
}
