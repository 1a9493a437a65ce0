//! Latest-value store for the station channels.

use super::frame::{BandState, Distance, Presence, PumpState, SensorReading, Temperature};
use serde::{Deserialize, Serialize};

/// Shown for a channel until its first value arrives.
pub const AWAITING_DATA: &str = "Awaiting data...";

/// Latest value of every channel plus the conveyor's commanded state.
///
/// Values are only ever overwritten by newer readings.
#[derive(Debug, Clone, Default)]
pub struct TelemetryState {
    presence: Option<Presence>,
    distance: Option<Distance>,
    temperature: Option<Temperature>,
    pump: Option<PumpState>,
    band: BandState,
}

/// Formatted view of the four sensor channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub presence: String,
    pub distance: String,
    pub temperature: String,
    pub pump: String,
}

impl TelemetryState {
    /// Create a state where every channel is awaiting data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a full reading into the state.
    pub fn apply(&mut self, reading: &SensorReading) {
        self.presence = Some(reading.presence);
        self.distance = Some(reading.distance.clone());
        self.temperature = Some(reading.temperature);
        self.pump = Some(reading.pump);
    }

    /// Record the conveyor state.
    pub fn set_band(&mut self, band: BandState) {
        self.band = band;
    }

    /// Last commanded or reported conveyor state.
    pub fn band(&self) -> BandState {
        self.band
    }

    /// Formatted distance, or the placeholder.
    pub fn distance_display(&self) -> String {
        display_or_placeholder(self.distance.as_ref())
    }

    /// Formatted temperature, or the placeholder.
    pub fn temperature_display(&self) -> String {
        display_or_placeholder(self.temperature.as_ref())
    }

    /// Formatted view of all sensor channels.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            presence: display_or_placeholder(self.presence.as_ref()),
            distance: self.distance_display(),
            temperature: self.temperature_display(),
            pump: display_or_placeholder(self.pump.as_ref()),
        }
    }
}

fn display_or_placeholder<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| AWAITING_DATA.to_string(), ToString::to_string)
}
