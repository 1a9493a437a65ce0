//! Link manager: owns the serial connection lifecycle.
//!
//! The manager is a perpetual task cycling through
//! `Connecting -> Connected -> Failed -> Connecting`. A successful open waits
//! for the settle delay, clears stale input and publishes the link; any fault
//! closes the link, publishes the failure and retries after a fixed backoff.
//! An access-denied failure additionally moves the target to another
//! discovered port.

use super::discovery;
use super::handle::{LinkFault, LinkHandle};
use super::serial::SerialTransport;
use super::transport::Transport;
use crate::config::StationConfig;
use crate::error::{Result, StationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Health of the serial link as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail")]
pub enum ConnectionStatus {
    /// An attempt to open the link is in progress
    Connecting,
    /// The link is open and settled
    Connected,
    /// Access to the port was refused
    PermissionDenied(String),
    /// Any other link failure
    Error(String),
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting..."),
            Self::Connected => write!(f, "Connected"),
            Self::PermissionDenied(port) => write!(f, "Error: Access denied to {}", port),
            Self::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Everything the link manager publishes about the link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStatus {
    /// Current link health
    pub status: ConnectionStatus,
    /// Port the manager is targeting
    pub active_port: String,
    /// Result of the last port discovery
    pub discovered_ports: Vec<String>,
}

impl LinkStatus {
    /// Initial status for a manager targeting `port`.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            active_port: port.into(),
            discovered_ports: Vec::new(),
        }
    }
}

/// Source of serial links: discovers candidate ports and opens them.
#[async_trait]
pub trait LinkBackend: Send + Sync + 'static {
    /// Candidate device identifiers present on the host.
    fn discover(&self) -> Vec<String>;

    /// Open `port` using the link settings in `config`.
    async fn open(&self, port: &str, config: &StationConfig) -> Result<Box<dyn Transport>>;
}

/// Backend opening real serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

#[async_trait]
impl LinkBackend for SerialBackend {
    fn discover(&self) -> Vec<String> {
        discovery::discover()
    }

    async fn open(&self, port: &str, config: &StationConfig) -> Result<Box<dyn Transport>> {
        let port = port.to_string();
        let baud_rate = config.baud_rate;
        let timeout = config.read_timeout;

        let transport = tokio::task::spawn_blocking(move || {
            SerialTransport::open(&port, baud_rate, timeout)
        })
        .await
        .map_err(|e| StationError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        Ok(Box::new(transport))
    }
}

/// Outcome of closing a link that is being abandoned.
#[derive(Debug)]
pub enum CloseOutcome {
    /// The link closed cleanly
    Closed,
    /// Closing failed; the handle was dropped anyway
    Ignored(StationError),
}

/// Close `transport`, logging and otherwise ignoring any failure.
pub fn close_quietly(port: &str, mut transport: Box<dyn Transport>) -> CloseOutcome {
    match transport.close() {
        Ok(()) => {
            debug!("Closed link on {}", port);
            CloseOutcome::Closed
        }
        Err(e) => {
            debug!("Ignoring failure to close {}: {}", port, e);
            CloseOutcome::Ignored(e)
        }
    }
}

/// Supervises the serial link for the lifetime of the process.
pub struct LinkManager<B: LinkBackend> {
    backend: B,
    config: StationConfig,
    link: LinkHandle,
    status: Arc<RwLock<LinkStatus>>,
    target: String,
    discovered: Vec<String>,
}

impl<B: LinkBackend> LinkManager<B> {
    /// Create a manager that will publish into `link` and `status`.
    pub fn new(
        backend: B,
        config: StationConfig,
        link: LinkHandle,
        status: Arc<RwLock<LinkStatus>>,
    ) -> Self {
        let target = config.port.clone();
        Self {
            backend,
            config,
            link,
            status,
            target,
            discovered: Vec::new(),
        }
    }

    /// Run the connection loop.
    ///
    /// Never returns unless `max_attempts` is configured.
    pub async fn run(mut self) {
        self.discovered = self.backend.discover();
        info!("Available ports: {:?}", self.discovered);
        self.publish(ConnectionStatus::Connecting);

        let mut attempts: u32 = 0;
        loop {
            if let Some(max) = self.config.max_attempts {
                if attempts >= max {
                    info!("Link manager stopping after {} attempts", attempts);
                    return;
                }
            }
            attempts += 1;

            self.attempt().await;
            tokio::time::sleep(self.config.retry_backoff).await;
        }
    }

    async fn attempt(&mut self) {
        self.publish(ConnectionStatus::Connecting);
        info!("Connecting to {}...", self.target);

        let fault = match self.connect().await {
            Ok(()) => {
                let fault = self.link.fault_raised().await;
                self.disconnect();
                fault
            }
            Err(e) => LinkFault::from_error(&e),
        };
        self.fail(fault);
    }

    async fn connect(&mut self) -> Result<()> {
        let mut transport = self.backend.open(&self.target, &self.config).await?;
        tokio::time::sleep(self.config.settle_delay).await;

        if let Err(e) = transport.clear_input() {
            close_quietly(&self.target, transport);
            return Err(e);
        }

        self.link.install(&self.target, transport);
        self.publish(ConnectionStatus::Connected);
        info!("Connection established on {}", self.target);
        Ok(())
    }

    fn disconnect(&self) {
        if let Some(transport) = self.link.detach() {
            close_quietly(&self.target, transport);
        }
    }

    fn fail(&mut self, fault: LinkFault) {
        self.link.record_error(fault.clone());

        if fault.permission_denied {
            warn!(
                "Access denied to {}. Is it open in another program?",
                self.target
            );
            let denied = self.target.clone();
            if let Some(next) = self.fail_over() {
                info!("Trying alternate port {}", next);
            }
            self.publish(ConnectionStatus::PermissionDenied(denied));
        } else {
            error!("Connection error on {}: {}", self.target, fault.message);
            self.publish(ConnectionStatus::Error(fault.message));
        }
    }

    /// Move the target to the first discovered port other than the current
    /// one. Returns the new target, or `None` if there is no alternative.
    pub fn fail_over(&mut self) -> Option<&str> {
        let next = self
            .discovered
            .iter()
            .find(|port| **port != self.target)?
            .clone();
        self.target = next;
        Some(&self.target)
    }

    /// Replace the discovered port pool.
    pub fn set_discovered(&mut self, ports: Vec<String>) {
        self.discovered = ports;
    }

    fn publish(&self, status: ConnectionStatus) {
        let mut board = self.status.write().unwrap_or_else(|e| e.into_inner());
        board.status = status;
        board.active_port = self.target.clone();
        board.discovered_ports = self.discovered.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::mock::{MockBackend, MockPort, MockTransport};
    use std::time::Duration;

    fn fast_config(port: &str, attempts: u32) -> StationConfig {
        StationConfig::default()
            .with_port(port)
            .with_settle_delay(Duration::from_millis(1))
            .with_retry_backoff(Duration::from_millis(1))
            .with_max_attempts(Some(attempts))
    }

    fn manager(
        backend: MockBackend,
        config: StationConfig,
    ) -> (LinkManager<MockBackend>, LinkHandle, Arc<RwLock<LinkStatus>>) {
        let link = LinkHandle::new();
        let status = Arc::new(RwLock::new(LinkStatus::new(&config.port)));
        let manager = LinkManager::new(backend, config, link.clone(), Arc::clone(&status));
        (manager, link, status)
    }

    #[tokio::test]
    async fn test_permission_denied_fails_over_to_discovered_port() {
        let backend = MockBackend::new(["A", "B"])
            .with_port("A", MockPort::Denied)
            .with_port("B", MockPort::Denied);
        let (manager, _link, status) = manager(backend.clone(), fast_config("A", 2));

        manager.run().await;

        assert_eq!(backend.attempts(), vec!["A", "B"]);
        let status = status.read().unwrap().clone();
        assert_eq!(status.status, ConnectionStatus::PermissionDenied("B".to_string()));
        assert_eq!(status.discovered_ports, vec!["A", "B"]);
        // B was denied too, so the next attempt goes back to A
        assert_eq!(status.active_port, "A");
    }

    #[tokio::test]
    async fn test_other_errors_retry_same_port() {
        let backend = MockBackend::new(["A", "B"])
            .with_port("A", MockPort::Failing("device unplugged".to_string()));
        let (manager, _link, status) = manager(backend.clone(), fast_config("A", 3));

        manager.run().await;

        assert_eq!(backend.attempts(), vec!["A", "A", "A"]);
        let status = status.read().unwrap().clone();
        assert!(matches!(
            status.status,
            ConnectionStatus::Error(ref msg) if msg.contains("device unplugged")
        ));
        assert_eq!(status.active_port, "A");
    }

    #[tokio::test]
    async fn test_no_alternative_port_keeps_target() {
        let backend = MockBackend::new(["A"]).with_port("A", MockPort::Denied);
        let (manager, _link, _status) = manager(backend.clone(), fast_config("A", 2));

        manager.run().await;
        assert_eq!(backend.attempts(), vec!["A", "A"]);
    }

    #[tokio::test]
    async fn test_connect_then_fault_closes_link() {
        let mock = MockTransport::new();
        mock.inject_line("stale line from before the reset");
        let backend = MockBackend::new(Vec::<String>::new())
            .with_port("A", MockPort::Ready(mock.clone()));
        let (manager, link, status) = manager(backend, fast_config("A", 1));

        let task = tokio::spawn(manager.run());

        tokio::time::timeout(Duration::from_secs(5), async {
            while status.read().unwrap().status != ConnectionStatus::Connected {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("link should open");

        assert!(link.is_open());
        assert_eq!(mock.clear_count(), 1);
        assert_eq!(link.device().as_deref(), Some("A"));

        mock.set_fail_close(true);
        link.report_fault(LinkFault {
            message: "I/O error: broken pipe".to_string(),
            permission_denied: false,
        });

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("manager should stop")
            .unwrap();

        assert!(!link.is_open());
        assert!(mock.is_closed());
        assert_eq!(
            status.read().unwrap().status,
            ConnectionStatus::Error("I/O error: broken pipe".to_string())
        );
    }

    #[test]
    fn test_fail_over_picks_first_other_port() {
        let (mut manager, _link, _status) =
            manager(MockBackend::default(), fast_config("COM4", 1));
        assert!(manager.fail_over().is_none());

        manager.set_discovered(vec!["COM4".into(), "COM5".into(), "COM6".into()]);
        assert_eq!(manager.fail_over(), Some("COM5"));
        assert_eq!(manager.fail_over(), Some("COM4"));
    }

    #[test]
    fn test_close_failure_is_ignored() {
        let mock = MockTransport::new();
        mock.set_fail_close(true);
        let outcome = close_quietly("COM4", Box::new(mock.clone()));
        assert!(matches!(outcome, CloseOutcome::Ignored(_)));
        assert!(mock.is_closed());

        let outcome = close_quietly("COM4", Box::new(MockTransport::new()));
        assert!(matches!(outcome, CloseOutcome::Closed));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "Connecting...");
        assert_eq!(ConnectionStatus::Connected.to_string(), "Connected");
        assert_eq!(
            ConnectionStatus::PermissionDenied("COM4".into()).to_string(),
            "Error: Access denied to COM4"
        );
    }
}
