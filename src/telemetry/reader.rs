//! The read loop: pulls lines off the open link and feeds them to the station.

use crate::error::StationError;
use crate::link::LinkFault;
use crate::station::Station;
use crate::telemetry::frame::LineUpdate;
use tracing::{debug, info, warn};

/// Result of one pass over the link.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No link, or no complete line waiting
    Idle,
    /// A line was read and applied
    Line(LineUpdate),
    /// Reading failed; the fault was handed to the link manager
    Failed,
}

/// Read and apply at most one line.
/// The link is only touched from the blocking pool.
pub async fn poll_once(station: &Station) -> PollOutcome {
    let link = station.link();
    match link.with_transport(|transport| transport.read_line()).await {
        Ok(Some(line)) if line.is_empty() => PollOutcome::Line(LineUpdate::default()),
        Ok(Some(line)) => PollOutcome::Line(station.ingest_line(&line)),
        Ok(None) | Err(StationError::NotConnected) => PollOutcome::Idle,
        Err(e) => {
            warn!("Serial read error: {}", e);
            if let Err(clear_err) = link.with_transport(|t| t.clear_input()).await {
                debug!("Could not clear input after read error: {}", clear_err);
            }
            link.report_fault(LinkFault::from_error(&e));
            PollOutcome::Failed
        }
    }
}

/// Run the read loop forever. Lines are drained back to back; the loop only
/// sleeps for the poll interval when there is nothing to read.
pub async fn run_reader(station: Station) {
    let interval = station.config().poll_interval;
    info!("Telemetry reader started");

    loop {
        match poll_once(&station).await {
            PollOutcome::Line(_) => {}
            PollOutcome::Idle | PollOutcome::Failed => tokio::time::sleep(interval).await,
        }
    }
}
