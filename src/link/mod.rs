//! Serial link: discovery, transport and connection lifecycle.

pub mod discovery;
pub mod handle;
pub mod manager;
pub mod mock;
pub mod serial;
pub mod transport;

// Re-export commonly used items
pub use discovery::{discover, list_host_ports, PortDescription};
pub use handle::{LinkFault, LinkHandle, SerialLink};
pub use manager::{ConnectionStatus, LinkBackend, LinkManager, LinkStatus, SerialBackend};
pub use serial::SerialTransport;
pub use transport::Transport;
