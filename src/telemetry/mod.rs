//! Telemetry ingestion: line parsing, latest-value state and fill events.

pub mod events;
pub mod frame;
pub mod reader;
pub mod state;

// Re-export commonly used items
pub use events::{EventDetector, EventHistory, FillEvent, FillLog, FillPhase, FillReport};
pub use frame::{
    parse_line, BandState, Distance, LineUpdate, Presence, PumpState, SensorReading, Temperature,
    WireFormat,
};
pub use state::{TelemetrySnapshot, TelemetryState, AWAITING_DATA};
