//! Station configuration.

use crate::error::{Result, StationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the serial link and the telemetry loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Initial device to connect to
    pub port: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Read timeout of the underlying port
    pub read_timeout: Duration,
    /// Wait after opening the port before declaring it connected
    pub settle_delay: Duration,
    /// Wait between connection attempts
    pub retry_backoff: Duration,
    /// Idle interval of the read loop
    pub poll_interval: Duration,
    /// How many times each actuator command is written
    pub command_repeats: u32,
    /// Delay between repeated command writes
    pub command_interval: Duration,
    /// Capacity of the fill event history
    pub history_capacity: usize,
    /// Stop the link manager after this many connection attempts.
    /// `None` keeps it running for the lifetime of the process.
    pub max_attempts: Option<u32>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: crate::DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            retry_backoff: Duration::from_secs(3),
            poll_interval: Duration::from_millis(100),
            command_repeats: 3,
            command_interval: Duration::from_millis(100),
            history_capacity: crate::DEFAULT_HISTORY_CAPACITY,
            max_attempts: None,
        }
    }
}

impl StationConfig {
    /// Create a configuration targeting a specific port and baud rate.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the initial port.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the port read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the post-open settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the reconnect backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the read loop poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how many times a command is written and the gap between writes.
    pub fn with_command_repeats(mut self, repeats: u32, interval: Duration) -> Self {
        self.command_repeats = repeats;
        self.command_interval = interval;
        self
    }

    /// Set the event history capacity.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Bound the number of connection attempts.
    pub fn with_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Check the configuration for values the link cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(StationError::config_error("Serial port name is empty"));
        }
        if self.baud_rate == 0 {
            return Err(StationError::config_error("Baud rate must be non-zero"));
        }
        if self.history_capacity == 0 {
            return Err(StationError::config_error(
                "History capacity must be at least 1",
            ));
        }
        if self.command_repeats == 0 {
            return Err(StationError::config_error(
                "Commands must be written at least once",
            ));
        }
        Ok(())
    }
}
