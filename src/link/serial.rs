//! Serial port transport built on the `serialport` crate.

use super::transport::{take_line, Transport};
use crate::error::Result;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{info, warn};

/// Lines longer than this without a terminator are treated as line noise.
const MAX_PENDING_BYTES: usize = 4096;

/// Serial transport for the station's USB UART.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open a serial port with 8N1 framing and no flow control.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "COM4" or "/dev/ttyACM0")
    /// * `baud_rate` - Baud rate (the station firmware uses 9600)
    /// * `timeout` - Read timeout of the port
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(device_path(path), baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(Self {
            port,
            name: path.to_string(),
            pending: Vec::with_capacity(256),
        })
    }
}

// COM ports above 9 need the device namespace prefix on Windows.
#[cfg(windows)]
fn device_path(path: &str) -> String {
    if path.starts_with("COM") {
        format!(r"\\.\{}", path)
    } else {
        path.to_string()
    }
}

#[cfg(not(windows))]
fn device_path(path: &str) -> String {
    path.to_string()
}

impl Transport for SerialTransport {
    fn read_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = take_line(&mut self.pending) {
            return Ok(Some(line));
        }

        let waiting = self.port.bytes_to_read()? as usize;
        if waiting == 0 {
            return Ok(None);
        }

        let mut chunk = vec![0u8; waiting.min(1024)];
        let n = match self.port.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(e.into()),
        };
        self.pending.extend_from_slice(&chunk[..n]);

        let line = take_line(&mut self.pending);
        if line.is_none() && self.pending.len() > MAX_PENDING_BYTES {
            warn!(
                "Dropping {} bytes without a line terminator from {}",
                self.pending.len(),
                self.name
            );
            self.pending.clear();
        }
        Ok(line)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.pending.clear();
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.port.flush()?;
        Ok(())
    }
}
