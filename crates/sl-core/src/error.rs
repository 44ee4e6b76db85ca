//! Core error types for swarmlink

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the node agent
#[derive(Error, Debug)]
pub enum SwarmError {
    /// Discovery, verification or registration failure
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Execution transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SwarmError {
    /// Whether the connection supervisor should back off and try again.
    ///
    /// Configuration errors and a transport command that cannot be run at
    /// all are fatal. Everything observed on the wire is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            SwarmError::Protocol(_) => true,
            SwarmError::Transport(TransportError::Spawn(e)) => !matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            SwarmError::Transport(_) => true,
            SwarmError::Config(_) => false,
        }
    }
}

/// Retryable failures talking to a coordinator
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Nobody answered the UDP broadcast in time
    #[error("No coordinator responded to broadcast on {address}")]
    NoResponse { address: String },

    /// Coordinator answered with an unexpected HTTP status
    #[error("{operation} failed with HTTP {status}: {body}")]
    BadStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// Response body could not be parsed
    #[error("Malformed response from {operation}: {reason}")]
    Malformed {
        operation: &'static str,
        reason: String,
    },

    /// Coordinator requires credentials
    #[error("Authentication required by {url}; configure a username and password")]
    AuthenticationRequired { url: String },

    /// Target does not look like a coordinator
    #[error("{url} does not look like a coordinator")]
    NotACoordinator { url: String },

    /// HTTP client failure (connect, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket failure during discovery
    #[error("Discovery I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the external execution transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// Transport could not be started
    #[error("Failed to start transport: {0}")]
    Spawn(#[source] std::io::Error),

    /// Transport ended with a failure status
    #[error("Transport exited with status {0}")]
    ExitStatus(i32),

    /// Transport was killed by a signal
    #[error("Transport terminated by signal")]
    Signaled,

    /// Connection to the coordinator was lost
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// Soft label update failures
#[derive(Error, Debug)]
pub enum LabelUpdateError {
    /// Label file could not be read
    #[error("Failed to read label file {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A coordinator call failed part way through the update
    #[error("Coordinator rejected label update: {0}")]
    Coordinator(#[from] ProtocolError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Malformed coordinator URL
    #[error("Invalid coordinator URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Options that cannot be combined
    #[error("Options {0} and {1} are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
