//! Error handling for the fill station crate.

/// A specialized `Result` type for fill station operations.
pub type Result<T> = std::result::Result<T, StationError>;

/// The main error type for fill station operations.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port driver error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The operating system refused access to the port
    #[error("Access denied to {port}")]
    PermissionDenied { port: String },

    /// No open link to the device
    #[error("Device not available")]
    NotConnected,

    /// A line or value could not be decoded
    #[error("Failed to parse: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Report export error
    #[error("Export error: {0}")]
    Export(String),
}

impl StationError {
    /// Create a new permission denied error
    pub fn permission_denied(port: impl Into<String>) -> Self {
        Self::PermissionDenied { port: port.into() }
    }

    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new export error
    pub fn export_error(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Whether this error means the port exists but another process (or the
    /// OS) is refusing us access to it.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            Self::Serial(e) => {
                matches!(
                    e.kind,
                    serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied)
                ) || mentions_access_denied(&e.description)
            }
            _ => false,
        }
    }
}

// Windows reports a busy COM port as a generic error whose text is the only clue.
fn mentions_access_denied(description: &str) -> bool {
    let lower = description.to_ascii_lowercase();
    lower.contains("access is denied")
        || lower.contains("permission denied")
        || lower.contains("acceso denegado")
}

impl From<csv::Error> for StationError {
    fn from(err: csv::Error) -> Self {
        Self::Export(err.to_string())
    }
}
