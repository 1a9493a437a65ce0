//! The station: shared telemetry state and the operations exposed to the
//! presentation and export layers.
//!
//! A [`Station`] is a cheap, cloneable handle. Each field group (telemetry,
//! link status, fill log) sits behind its own lock and has exactly one writer:
//! the read loop for telemetry and fills, the link manager for status. Readers
//! always get the latest snapshot and never wait on I/O.

use crate::config::StationConfig;
use crate::error::{Result, StationError};
use crate::link::{ConnectionStatus, LinkBackend, LinkHandle, LinkManager, LinkStatus};
use crate::telemetry::{
    parse_line, reader, BandState, EventDetector, FillEvent, FillLog, FillReport, LineUpdate,
    TelemetrySnapshot, TelemetryState,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Request accepted by [`Station::send_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandRequest {
    /// Start the conveyor
    On,
    /// Stop the conveyor
    Off,
    /// Report the last commanded state without touching the link
    Query,
}

impl CommandRequest {
    /// Conveyor state this request drives towards, if it writes at all.
    pub fn target(&self) -> Option<BandState> {
        match self {
            Self::On => Some(BandState::On),
            Self::Off => Some(BandState::Off),
            Self::Query => None,
        }
    }
}

impl FromStr for CommandRequest {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "query" | "status" | "estado" => Ok(Self::Query),
            other => Err(StationError::parse_error(format!(
                "Unknown band command: {}",
                other
            ))),
        }
    }
}

/// Result of a band command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Band state after the request
    pub state: BandState,
    /// Operator-facing result message
    pub message: String,
    /// Whether the request did what it asked for
    pub success: bool,
}

/// Link health as exposed to collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    /// Human-readable status line
    pub status: String,
    /// Machine-readable status
    pub state: ConnectionStatus,
    pub active_port: String,
    pub discovered_ports: Vec<String>,
}

impl From<LinkStatus> for ConnectionSnapshot {
    fn from(status: LinkStatus) -> Self {
        Self {
            status: status.status.to_string(),
            state: status.status,
            active_port: status.active_port,
            discovered_ports: status.discovered_ports,
        }
    }
}

/// Handles of the two background tasks.
pub struct StationTasks {
    pub link_manager: JoinHandle<()>,
    pub reader: JoinHandle<()>,
}

struct StationShared {
    config: StationConfig,
    link: LinkHandle,
    status: Arc<RwLock<LinkStatus>>,
    telemetry: RwLock<TelemetryState>,
    fills: RwLock<FillLog>,
    detector: Mutex<EventDetector>,
    command_gate: tokio::sync::Mutex<()>,
}

/// Shared station state and its public operations.
#[derive(Clone)]
pub struct Station {
    shared: Arc<StationShared>,
}

impl Station {
    /// Create a station with no link open.
    pub fn new(config: StationConfig) -> Result<Self> {
        config.validate()?;

        let shared = StationShared {
            status: Arc::new(RwLock::new(LinkStatus::new(&config.port))),
            fills: RwLock::new(FillLog::with_capacity(config.history_capacity)),
            telemetry: RwLock::new(TelemetryState::new()),
            detector: Mutex::new(EventDetector::new()),
            link: LinkHandle::new(),
            command_gate: tokio::sync::Mutex::new(()),
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn config(&self) -> &StationConfig {
        &self.shared.config
    }

    /// The shared serial link.
    pub fn link(&self) -> &LinkHandle {
        &self.shared.link
    }

    /// Latest value of each sensor channel.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        read(&self.shared.telemetry).snapshot()
    }

    /// Last commanded or reported conveyor state.
    pub fn band_state(&self) -> BandState {
        read(&self.shared.telemetry).band()
    }

    /// Link health, target port and discovered ports.
    pub fn connection_status(&self) -> ConnectionSnapshot {
        read(&self.shared.status).clone().into()
    }

    /// Completed-fill count and event history.
    pub fn report(&self) -> FillReport {
        read(&self.shared.fills).report()
    }

    /// Parse one line from the device and fold it into the shared state.
    ///
    /// Edges are evaluated after the line's values are stored, so events
    /// carry the distance and temperature in effect at the transition.
    pub fn ingest_line(&self, line: &str) -> LineUpdate {
        let update = parse_line(line);
        if update.is_empty() {
            debug!("Ignoring unrecognized line: {:?}", line);
            return update;
        }

        let mut detector = self
            .shared
            .detector
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let mut telemetry = write(&self.shared.telemetry);

        if let Some(band) = update.band {
            telemetry.set_band(band);
        }

        if let Some((reading, format)) = &update.reading {
            debug!("Decoded {:?} reading: {:?}", format, reading);
            telemetry.apply(reading);

            let phases = detector.observe(reading);
            if !phases.is_empty() {
                let level = telemetry.distance_display();
                let temperature = telemetry.temperature_display();
                let mut fills = write(&self.shared.fills);
                for phase in phases {
                    info!("Cup event: {} (level {}, {})", phase, level, temperature);
                    fills.record(FillEvent::cup(phase, level.clone(), temperature.clone()));
                }
            }
        }

        update
    }

    /// Command the conveyor, or query its last commanded state.
    ///
    /// `On`/`Off` write the command byte `command_repeats` times; `Query`
    /// never touches the link. Failures are reported in the outcome and
    /// leave the link status to the link manager.
    pub async fn send_command(&self, request: CommandRequest) -> CommandOutcome {
        let Some(target) = request.target() else {
            return CommandOutcome {
                state: self.band_state(),
                message: "Current state queried.".to_string(),
                success: true,
            };
        };

        let _gate = self.shared.command_gate.lock().await;
        match self.write_command(target).await {
            Ok(()) => {
                write(&self.shared.telemetry).set_band(target);
                info!("Band {} command sent", target);
                CommandOutcome {
                    state: target,
                    message: format!("Band {} - command sent", target.as_str().to_uppercase()),
                    success: true,
                }
            }
            Err(e) => {
                warn!("Band {} command failed: {}", target, e);
                let message = match e {
                    StationError::NotConnected => e.to_string(),
                    other => format!("Error: {}", other),
                };
                CommandOutcome {
                    state: self.band_state(),
                    message,
                    success: false,
                }
            }
        }
    }

    async fn write_command(&self, target: BandState) -> Result<()> {
        let payload: &'static [u8] = match target {
            BandState::On => b"1\n",
            BandState::Off => b"0\n",
        };
        let repeats = self.shared.config.command_repeats;

        for i in 0..repeats {
            self.link()
                .with_transport(move |transport| transport.write_all(payload))
                .await?;
            if i + 1 < repeats {
                tokio::time::sleep(self.shared.config.command_interval).await;
            }
        }
        Ok(())
    }

    /// Build a link manager publishing into this station.
    pub fn link_manager<B: LinkBackend>(&self, backend: B) -> LinkManager<B> {
        LinkManager::new(
            backend,
            self.shared.config.clone(),
            self.shared.link.clone(),
            Arc::clone(&self.shared.status),
        )
    }

    /// Start the link manager and the read loop on the current runtime.
    pub fn spawn<B: LinkBackend>(&self, backend: B) -> StationTasks {
        let link_manager = tokio::spawn(self.link_manager(backend).run());
        let reader = tokio::spawn(reader::run_reader(self.clone()));
        StationTasks {
            link_manager,
            reader,
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
