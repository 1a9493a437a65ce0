//! # Fill Station - Serial Telemetry Bridge
//!
//! Bridges a microcontroller driving a conveyor band and a cup-filling pump
//! to a small web dashboard. The device streams one sensor line at a time over
//! a serial link; this crate keeps the link alive, decodes both wire formats,
//! tracks fill events and forwards band commands back to the device.
//!
//! ## Features
//!
//! - **Resilient serial link**: discovery, settle delay, reconnect and failover
//!   when the port is held by another process
//! - **Two wire formats**: JSON objects and legacy `KEY:VALUE` lines
//! - **Fill events**: cup placed / fill completed edges with a bounded history
//! - **Web dashboard**: JSON API, band control and CSV export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fill_station::{start_web_server, SerialBackend, Station, StationConfig, WebConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let station = Station::new(StationConfig::default())?;
//!     let _tasks = station.spawn(SerialBackend);
//!
//!     start_web_server(WebConfig::default(), station).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod station;
pub mod telemetry;
pub mod web;

// Re-export public API
pub use config::StationConfig;
pub use error::{Result, StationError};
pub use link::{
    discover, list_host_ports, ConnectionStatus, LinkBackend, LinkHandle, LinkManager,
    LinkStatus, PortDescription, SerialBackend,
};
pub use station::{CommandOutcome, CommandRequest, ConnectionSnapshot, Station, StationTasks};
pub use telemetry::{
    parse_line, BandState, FillEvent, FillPhase, FillReport, SensorReading, TelemetrySnapshot,
};
pub use web::{create_app, start_web_server, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 5000;

/// The default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// The serial port tried first
#[cfg(windows)]
pub const DEFAULT_SERIAL_PORT: &str = "COM4";

/// The serial port tried first
#[cfg(not(windows))]
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";

/// The default number of fill events kept in memory
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
