//! In-memory link used by tests and simulations.

use super::manager::LinkBackend;
use super::transport::{take_line, Transport};
use crate::config::StationConfig;
use crate::error::{Result, StationError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock transport for unit testing.
///
/// Clones share the same buffers, so a test can keep one clone to inject
/// input and inspect output while the station owns the other.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: Vec<u8>,
    read_failures: VecDeque<std::io::ErrorKind>,
    write_buffer: Vec<u8>,
    write_count: usize,
    fail_writes: bool,
    fail_close: bool,
    clear_count: usize,
    closed: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Inject raw bytes to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner().read_buffer.extend_from_slice(data);
    }

    /// Inject one newline-terminated line
    pub fn inject_line(&self, line: &str) {
        let mut inner = self.inner();
        inner.read_buffer.extend_from_slice(line.as_bytes());
        inner.read_buffer.push(b'\n');
    }

    /// Make the next read fail with the given kind
    pub fn fail_next_read(&self, kind: std::io::ErrorKind) {
        self.inner().read_failures.push_back(kind);
    }

    /// Make every write fail until reset
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner().fail_writes = fail;
    }

    /// Make `close` report an error
    pub fn set_fail_close(&self, fail: bool) {
        self.inner().fail_close = fail;
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner().write_buffer.clone()
    }

    /// Number of successful `write_all` calls
    pub fn write_count(&self) -> usize {
        self.inner().write_count
    }

    /// Number of times pending input was discarded
    pub fn clear_count(&self) -> usize {
        self.inner().clear_count
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner().closed
    }
}

impl Transport for MockTransport {
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut inner = self.inner();
        if let Some(kind) = inner.read_failures.pop_front() {
            return Err(std::io::Error::new(kind, "injected read failure").into());
        }
        Ok(take_line(&mut inner.read_buffer))
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner();
        if inner.fail_writes {
            return Err(
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "injected write failure")
                    .into(),
            );
        }
        inner.write_buffer.extend_from_slice(data);
        inner.write_count += 1;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        let mut inner = self.inner();
        inner.read_buffer.clear();
        inner.clear_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut inner = self.inner();
        inner.closed = true;
        if inner.fail_close {
            return Err(
                std::io::Error::new(std::io::ErrorKind::Other, "injected close failure").into(),
            );
        }
        Ok(())
    }
}

/// Outcome of opening a port on a [`MockBackend`].
#[derive(Clone)]
pub enum MockPort {
    /// Opening succeeds with this transport
    Ready(MockTransport),
    /// The port is held by another program
    Denied,
    /// Opening fails with a generic error
    Failing(String),
}

/// Link backend with a fixed set of ports and scripted open results.
///
/// Ports without a script fail as if the device were unplugged.
#[derive(Clone, Default)]
pub struct MockBackend {
    discovered: Vec<String>,
    ports: Arc<Mutex<HashMap<String, MockPort>>>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Create a backend whose discovery returns `discovered`.
    pub fn new<S: Into<String>>(discovered: impl IntoIterator<Item = S>) -> Self {
        Self {
            discovered: discovered.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Script the result of opening `port`.
    pub fn with_port(self, port: impl Into<String>, outcome: MockPort) -> Self {
        self.set_port(port, outcome);
        self
    }

    /// Replace the scripted result of opening `port`.
    pub fn set_port(&self, port: impl Into<String>, outcome: MockPort) {
        self.ports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(port.into(), outcome);
    }

    /// Ports passed to `open`, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LinkBackend for MockBackend {
    fn discover(&self) -> Vec<String> {
        self.discovered.clone()
    }

    async fn open(&self, port: &str, _config: &StationConfig) -> Result<Box<dyn Transport>> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(port.to_string());

        let outcome = self
            .ports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(port)
            .cloned();

        match outcome {
            Some(MockPort::Ready(transport)) => Ok(Box::new(transport)),
            Some(MockPort::Denied) => Err(StationError::permission_denied(port)),
            Some(MockPort::Failing(msg)) => {
                Err(std::io::Error::new(std::io::ErrorKind::Other, msg).into())
            }
            None => Err(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                format!("could not open port {}", port),
            )
            .into()),
        }
    }
}
