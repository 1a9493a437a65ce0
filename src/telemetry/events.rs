//! Fill events and the edge detector that derives them.

use super::frame::{Presence, PumpState, SensorReading};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Timestamp format used in event records and reports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Stage of a cup's fill cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPhase {
    /// A cup arrived under the nozzle
    Placed,
    /// The pump switched off after filling
    Completed,
}

impl fmt::Display for FillPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placed => write!(f, "Placed"),
            Self::Completed => write!(f, "Fill completed"),
        }
    }
}

/// Immutable record of one fill-cycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    /// Object type; always "cup"
    pub kind: String,
    pub phase: FillPhase,
    /// Local time, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
    /// Distance channel at the moment of the edge
    pub level: String,
    /// Temperature channel at the moment of the edge
    pub temperature: String,
}

impl FillEvent {
    /// Create a cup event stamped with the current local time.
    pub fn cup(phase: FillPhase, level: impl Into<String>, temperature: impl Into<String>) -> Self {
        Self {
            kind: "cup".to_string(),
            phase,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            level: level.into(),
            temperature: temperature.into(),
        }
    }
}

/// Bounded, insertion-ordered event store. Appending past capacity evicts
/// the oldest entry.
#[derive(Debug, Clone)]
pub struct EventHistory {
    events: VecDeque<FillEvent>,
    capacity: usize,
}

impl EventHistory {
    /// Create an empty history holding at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, evicting the oldest if full.
    pub fn push(&mut self, event: FillEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &FillEvent> {
        self.events.iter()
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::with_capacity(crate::DEFAULT_HISTORY_CAPACITY)
    }
}

/// Event history together with the completed-fill counter.
#[derive(Debug, Clone, Default)]
pub struct FillLog {
    history: EventHistory,
    fill_count: u64,
}

/// Snapshot of the fill log for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    /// Completed fills since start-up
    pub fill_count: u64,
    /// Events in insertion order
    pub events: Vec<FillEvent>,
}

impl FillLog {
    /// Create an empty log with the given history capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            history: EventHistory::with_capacity(capacity),
            fill_count: 0,
        }
    }

    /// Record an event. Completed fills also bump the counter.
    pub fn record(&mut self, event: FillEvent) {
        if event.phase == FillPhase::Completed {
            self.fill_count += 1;
        }
        self.history.push(event);
    }

    pub fn report(&self) -> FillReport {
        FillReport {
            fill_count: self.fill_count,
            events: self.history.iter().cloned().collect(),
        }
    }
}

/// Edge-triggered detector over the presence and pump channels.
#[derive(Debug, Clone)]
pub struct EventDetector {
    last_presence: Presence,
    last_pump: PumpState,
}

impl Default for EventDetector {
    fn default() -> Self {
        Self {
            last_presence: Presence::Absent,
            last_pump: PumpState::Off,
        }
    }
}

impl EventDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `reading` with the previous one and return the phases of the
    /// events it triggers: `Placed` on absent to detected, `Completed` on
    /// pump on to off. The opposite transitions trigger nothing.
    pub fn observe(&mut self, reading: &SensorReading) -> Vec<FillPhase> {
        let mut phases = Vec::new();

        if self.last_presence == Presence::Absent && reading.presence == Presence::Detected {
            phases.push(FillPhase::Placed);
        }
        self.last_presence = reading.presence;

        if self.last_pump == PumpState::On && reading.pump == PumpState::Off {
            phases.push(FillPhase::Completed);
        }
        self.last_pump = reading.pump;

        phases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::frame::parse_structured;

    fn frame(ir: u8, bomba: &str) -> SensorReading {
        parse_structured(&format!(
            r#"{{"IR":{},"ULTRA":5,"TEMP":20.0,"BOMBA":"{}"}}"#,
            ir, bomba
        ))
        .unwrap()
    }

    #[test]
    fn test_single_placed_event_after_absent_run() {
        let mut detector = EventDetector::new();
        assert!(detector.observe(&frame(1, "OFF")).is_empty());
        assert!(detector.observe(&frame(1, "OFF")).is_empty());
        assert!(detector.observe(&frame(1, "OFF")).is_empty());
        assert_eq!(detector.observe(&frame(0, "OFF")), vec![FillPhase::Placed]);
        assert!(detector.observe(&frame(0, "OFF")).is_empty());
    }

    #[test]
    fn test_removal_produces_nothing() {
        let mut detector = EventDetector::new();
        detector.observe(&frame(0, "OFF"));
        assert!(detector.observe(&frame(1, "OFF")).is_empty());
    }

    #[test]
    fn test_pump_edges() {
        let mut detector = EventDetector::new();
        assert!(detector.observe(&frame(1, "ON")).is_empty());
        assert!(detector.observe(&frame(1, "ON")).is_empty());
        assert_eq!(detector.observe(&frame(1, "OFF")), vec![FillPhase::Completed]);
        assert!(detector.observe(&frame(1, "OFF")).is_empty());
    }

    #[test]
    fn test_both_edges_in_one_reading() {
        let mut detector = EventDetector::new();
        detector.observe(&frame(1, "ON"));
        assert_eq!(
            detector.observe(&frame(0, "OFF")),
            vec![FillPhase::Placed, FillPhase::Completed]
        );
    }

    #[test]
    fn test_history_keeps_most_recent() {
        let mut log = FillLog::with_capacity(100);
        for i in 0..150 {
            log.record(FillEvent::cup(FillPhase::Placed, format!("{} cm", i), "20.0 °C"));
        }
        let report = log.report();
        assert_eq!(report.events.len(), 100);
        assert_eq!(report.events.first().unwrap().level, "50 cm");
        assert_eq!(report.events.last().unwrap().level, "149 cm");
        assert_eq!(report.fill_count, 0);
    }

    #[test]
    fn test_completed_counts_even_when_evicted() {
        let mut log = FillLog::with_capacity(2);
        for _ in 0..5 {
            log.record(FillEvent::cup(FillPhase::Completed, "2 cm", "22.0 °C"));
        }
        let report = log.report();
        assert_eq!(report.fill_count, 5);
        assert_eq!(report.events.len(), 2);
    }

    #[test]
    fn test_event_timestamp_format() {
        let event = FillEvent::cup(FillPhase::Placed, "4 cm", "21.9 °C");
        assert!(chrono::NaiveDateTime::parse_from_str(&event.timestamp, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(event.kind, "cup");
    }
}
