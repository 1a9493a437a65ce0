//! Shared handle to the single serial link.
//!
//! Every read and write on the device goes through [`LinkHandle`], which
//! holds the transport behind one mutex. The link manager installs and
//! removes the transport; the read loop and the command channel borrow it
//! one operation at a time.

use super::transport::Transport;
use crate::error::{Result, StationError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// A failure observed on an open link, reported to the link manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFault {
    /// Human-readable cause
    pub message: String,
    /// Whether the OS refused access to the port
    pub permission_denied: bool,
}

impl LinkFault {
    /// Build a fault from the error that caused it.
    pub fn from_error(err: &StationError) -> Self {
        Self {
            message: err.to_string(),
            permission_denied: err.is_permission_denied(),
        }
    }
}

/// The exclusive connection to the device.
#[derive(Default)]
pub struct SerialLink {
    device: Option<String>,
    transport: Option<Box<dyn Transport>>,
    last_error: Option<LinkFault>,
    pending_fault: Option<LinkFault>,
}

impl SerialLink {
    /// Whether a transport is installed.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }
}

/// Cloneable handle to the shared [`SerialLink`].
#[derive(Clone, Default)]
pub struct LinkHandle {
    link: Arc<Mutex<SerialLink>>,
    fault: Arc<Notify>,
}

impl LinkHandle {
    /// Create a handle with no open link.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SerialLink> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the link is currently open.
    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }

    /// Device the link is (or was last) opened on.
    pub fn device(&self) -> Option<String> {
        self.lock().device.clone()
    }

    /// Most recent failure recorded on the link.
    pub fn last_error(&self) -> Option<LinkFault> {
        self.lock().last_error.clone()
    }

    /// Install a freshly opened transport. Faults reported against a previous
    /// transport are discarded.
    pub(crate) fn install(&self, device: &str, transport: Box<dyn Transport>) {
        let mut link = self.lock();
        link.device = Some(device.to_string());
        link.transport = Some(transport);
        link.pending_fault = None;
    }

    /// Remove the transport so it can be closed outside the lock.
    pub(crate) fn detach(&self) -> Option<Box<dyn Transport>> {
        self.lock().transport.take()
    }

    /// Record a failure of the open link and wake the link manager.
    /// Ignored when no link is open.
    pub fn report_fault(&self, fault: LinkFault) {
        {
            let mut link = self.lock();
            if !link.is_open() {
                return;
            }
            link.last_error = Some(fault.clone());
            link.pending_fault = Some(fault);
        }
        self.fault.notify_one();
    }

    pub(crate) fn record_error(&self, fault: LinkFault) {
        self.lock().last_error = Some(fault);
    }

    /// Wait until a fault is reported on the current link.
    pub(crate) async fn fault_raised(&self) -> LinkFault {
        loop {
            if let Some(fault) = self.lock().pending_fault.take() {
                return fault;
            }
            self.fault.notified().await;
        }
    }

    /// Run one blocking operation against the open transport.
    ///
    /// The operation runs on the blocking pool while holding the link mutex,
    /// so reads and writes from different tasks never interleave mid-operation.
    pub async fn with_transport<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut dyn Transport) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let link = Arc::clone(&self.link);
        tokio::task::spawn_blocking(move || {
            let mut link = link.lock().unwrap_or_else(|e| e.into_inner());
            match link.transport.as_mut() {
                Some(transport) => op(&mut **transport),
                None => Err(StationError::NotConnected),
            }
        })
        .await
        .map_err(|e| StationError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}
