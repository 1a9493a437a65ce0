//! Frame parser: decodes one text line from the station into a reading.
//!
//! Two wire formats are accepted, tried in order:
//!
//! 1. Structured: `{"IR":0,"ULTRA":4,"TEMP":21.9,"BOMBA":"ON"}`
//! 2. Legacy: `IR:0,ULTRA:4,TEMP:21.9,BOMBA:1`
//!
//! Independently of both, a `BANDA:ON` / `BANDA:OFF` token anywhere in the
//! line reports the conveyor state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Object presence under the filling nozzle.
///
/// The IR sensor is active-low: a raw `0` means a cup is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Absent,
    Detected,
}

impl Presence {
    fn from_raw_ir(detected: bool) -> Self {
        if detected {
            Self::Detected
        } else {
            Self::Absent
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "No cup"),
            Self::Detected => write!(f, "Cup detected"),
        }
    }
}

/// Pump relay state as reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpState {
    Off,
    On,
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::On => write!(f, "On"),
        }
    }
}

/// Conveyor band (actuator) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BandState {
    On,
    #[default]
    Off,
}

impl BandState {
    /// Lowercase name used in command responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for BandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distance reading, kept in the textual form the device sent it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distance(String);

impl Distance {
    /// The number as received, without unit.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cm", self.0)
    }
}

/// Temperature reading. A value that is not numeric degrades to `Error`
/// without invalidating the rest of the line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Temperature {
    Celsius(f64),
    Error,
}

impl Temperature {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map_or(Self::Error, Self::Celsius),
            Value::String(s) => Self::from_text(s),
            _ => Self::Error,
        }
    }

    fn from_text(text: &str) -> Self {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Celsius(v),
            _ => Self::Error,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius(v) => write!(f, "{:.1} °C", v),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// One decoded sample of all four station channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub presence: Presence,
    pub distance: Distance,
    pub temperature: Temperature,
    pub pump: PumpState,
}

/// Which wire format a reading was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Structured,
    Legacy,
}

/// Everything extracted from one line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineUpdate {
    /// Conveyor state announced in the line, if any
    pub band: Option<BandState>,
    /// Full sensor reading, if the line matched either format
    pub reading: Option<(SensorReading, WireFormat)>,
}

impl LineUpdate {
    /// True if the line carried nothing usable.
    pub fn is_empty(&self) -> bool {
        self.band.is_none() && self.reading.is_none()
    }
}

/// Parse a trimmed line.
pub fn parse_line(line: &str) -> LineUpdate {
    let reading = parse_structured(line)
        .map(|r| (r, WireFormat::Structured))
        .or_else(|| parse_legacy(line).map(|r| (r, WireFormat::Legacy)));

    LineUpdate {
        band: band_signal(line),
        reading,
    }
}

/// Extract a `BANDA:ON` / `BANDA:OFF` token from anywhere in the line.
pub fn band_signal(line: &str) -> Option<BandState> {
    if line.contains("BANDA:ON") {
        Some(BandState::On)
    } else if line.contains("BANDA:OFF") {
        Some(BandState::Off)
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StructuredFrame {
    #[serde(rename = "IR", default = "default_ir")]
    ir: Value,
    #[serde(rename = "ULTRA", default = "default_number")]
    ultra: serde_json::Number,
    #[serde(rename = "TEMP", default = "default_temp")]
    temp: Value,
    #[serde(rename = "BOMBA", default = "default_bomba")]
    bomba: Value,
}

fn default_ir() -> Value {
    Value::from(1)
}

fn default_number() -> serde_json::Number {
    serde_json::Number::from(0)
}

fn default_temp() -> Value {
    Value::from(0)
}

fn default_bomba() -> Value {
    Value::from("OFF")
}

/// Decode the structured (JSON object) format.
pub fn parse_structured(line: &str) -> Option<SensorReading> {
    if !(line.starts_with('{') && line.ends_with('}')) {
        return None;
    }
    let frame: StructuredFrame = serde_json::from_str(line).ok()?;

    let detected = frame.ir.as_f64() == Some(0.0);
    Some(SensorReading {
        presence: Presence::from_raw_ir(detected),
        distance: Distance(frame.ultra.to_string()),
        temperature: Temperature::from_value(&frame.temp),
        pump: if frame.bomba.as_str() == Some("ON") {
            PumpState::On
        } else {
            PumpState::Off
        },
    })
}

/// Decode the legacy `KEY:value,...` format. All four keys must be present
/// exactly once; any deviation rejects the whole line.
pub fn parse_legacy(line: &str) -> Option<SensorReading> {
    let mut ir = None;
    let mut ultra = None;
    let mut temp = None;
    let mut bomba = None;

    let mut fields = 0;
    for part in line.split(',') {
        fields += 1;
        let (key, value) = part.split_once(':')?;
        let slot = match key {
            "IR" if is_integer(value) => &mut ir,
            "ULTRA" if is_decimal(value) => &mut ultra,
            "TEMP" if is_decimal(value) => &mut temp,
            "BOMBA" if value == "0" || value == "1" => &mut bomba,
            _ => return None,
        };
        if slot.replace(value).is_some() {
            return None;
        }
    }
    if fields != 4 {
        return None;
    }

    Some(SensorReading {
        presence: Presence::from_raw_ir(ir? == "0"),
        distance: Distance(ultra?.to_string()),
        temperature: Temperature::from_text(temp?),
        pump: if bomba? == "1" {
            PumpState::On
        } else {
            PumpState::Off
        },
    })
}

fn is_integer(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

// `123`, `123.` or `123.45`
fn is_decimal(text: &str) -> bool {
    match text.split_once('.') {
        Some((whole, frac)) => is_integer(whole) && frac.bytes().all(|b| b.is_ascii_digit()),
        None => is_integer(text),
    }
}
