//! Node agent configuration

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::backoff::BackoffConfig;
use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::types::{with_trailing_slash, LabelSet, NodeMode};

/// Well-known UDP port coordinators listen on for discovery broadcasts
pub const DEFAULT_DISCOVERY_PORT: u16 = 33848;

/// Environment variable overriding the discovery port
const DISCOVERY_PORT_ENV: &str = "SWARM_UDP_PORT";

/// Older name for the same override, still honoured
const LEGACY_DISCOVERY_PORT_ENV: &str = "HUDSON_UDP";

/// Discovery port from the environment, falling back to the well-known port
pub fn default_discovery_port() -> u16 {
    discovery_port_from(
        std::env::var(DISCOVERY_PORT_ENV).ok().as_deref(),
        std::env::var(LEGACY_DISCOVERY_PORT_ENV).ok().as_deref(),
    )
}

fn discovery_port_from(current: Option<&str>, legacy: Option<&str>) -> u16 {
    current
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| legacy.and_then(|v| v.trim().parse().ok()))
        .unwrap_or(DEFAULT_DISCOVERY_PORT)
}

/// Configuration for a swarm node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Coordinator URL. When absent the coordinator is found by UDP broadcast.
    pub url: Option<String>,

    /// Discover by broadcast even when `url` is set; responders then only
    /// need to provide the secret.
    pub broadcast: bool,

    /// Address the discovery datagram is sent to
    pub discovery_address: String,

    /// Port the discovery datagram is sent to
    pub discovery_port: u16,

    /// How long to collect broadcast responses
    #[serde(with = "duration_secs")]
    pub discovery_window: Duration,

    /// Node name (defaults to hostname)
    pub name: Option<String>,

    /// Free-form description shown by the coordinator
    pub description: Option<String>,

    /// Number of executors to offer
    pub executors: u32,

    /// Remote filesystem root for builds
    pub fs_root: PathBuf,

    /// Static labels
    pub labels: Vec<String>,

    /// File holding labels that may change while the node runs
    pub labels_file: Option<PathBuf>,

    /// Scheduling mode
    pub mode: NodeMode,

    /// Tool installations available on this node, keyed by tool name
    pub tool_locations: BTreeMap<String, String>,

    /// Ask the coordinator to replace a node with the same name
    pub delete_existing_clients: bool,

    /// Do not send the machine identity hash
    pub disable_unique_id: bool,

    /// Username for basic authentication
    pub username: Option<String>,

    /// Password or API token for basic authentication
    pub password: Option<String>,

    /// Accept any server certificate
    pub disable_ssl_verification: bool,

    /// Accepted SHA-256 server certificate fingerprints
    pub ssl_fingerprints: Vec<String>,

    /// Connection attempts before giving up; negative means forever
    pub retry: i64,

    /// Back-off between attempts
    pub backoff: BackoffConfig,

    /// Exit after the first connection ends instead of reconnecting
    pub no_retry_after_connected: bool,

    /// How often the label file is checked
    #[serde(with = "duration_secs")]
    pub label_poll_interval: Duration,

    /// Program and arguments that carry the execution channel
    pub transport_command: Vec<String>,

    /// Where to record our PID
    pub pid_file: Option<PathBuf>,

    /// Timeout for individual HTTP requests
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: None,
            broadcast: false,
            discovery_address: "255.255.255.255".to_string(),
            discovery_port: default_discovery_port(),
            discovery_window: Duration::from_secs(5),
            name: None,
            description: None,
            executors: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            fs_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            labels: vec![],
            labels_file: None,
            mode: NodeMode::Normal,
            tool_locations: BTreeMap::new(),
            delete_existing_clients: false,
            disable_unique_id: false,
            username: None,
            password: None,
            disable_ssl_verification: false,
            ssl_fingerprints: vec![],
            retry: -1,
            backoff: BackoffConfig::default(),
            no_retry_after_connected: false,
            label_poll_interval: Duration::from_secs(10),
            transport_command: vec![],
            pid_file: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl NodeConfig {
    /// Get the node name, falling back to hostname
    pub fn node_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned())
    }

    /// Parsed coordinator URL, normalized with a trailing slash
    pub fn coordinator_url(&self) -> Result<Option<Url>, ConfigError> {
        let Some(raw) = self.url.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Some(with_trailing_slash(url)))
    }

    /// Whether basic-auth credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Finite retry budget, or `None` to retry forever
    pub fn retry_budget(&self) -> Option<u32> {
        if self.retry < 0 {
            None
        } else {
            Some(u32::try_from(self.retry).unwrap_or(u32::MAX))
        }
    }

    /// Static labels from the configuration
    pub fn static_labels(&self) -> LabelSet {
        self.labels
            .iter()
            .flat_map(|l| l.split_whitespace())
            .collect()
    }

    /// Reject configurations that cannot work before touching the network
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coordinator_url()?;

        if self.disable_ssl_verification && !self.ssl_fingerprints.is_empty() {
            return Err(ConfigError::MutuallyExclusive(
                "disable_ssl_verification",
                "ssl_fingerprints",
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::MissingField(
                if self.username.is_some() {
                    "password"
                } else {
                    "username"
                }
                .to_string(),
            ));
        }
        if self.executors == 0 {
            return Err(ConfigError::Invalid(
                "executors must be at least 1".to_string(),
            ));
        }
        if self.retry == 0 {
            return Err(ConfigError::Invalid(
                "retry must be positive, or negative to retry forever".to_string(),
            ));
        }
        if self.backoff.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "backoff.interval must be at least one second".to_string(),
            ));
        }
        if self.backoff.max_interval < self.backoff.interval {
            return Err(ConfigError::Invalid(format!(
                "backoff.max_interval ({}s) is smaller than backoff.interval ({}s)",
                self.backoff.max_interval.as_secs(),
                self.backoff.interval.as_secs()
            )));
        }
        if self.label_poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "label_poll_interval must be at least one second".to_string(),
            ));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("name must not be blank".to_string()));
            }
        }
        for key in self.tool_locations.keys() {
            if key.contains(':') {
                return Err(ConfigError::Invalid(format!(
                    "tool location key '{}' must not contain ':'",
                    key
                )));
            }
        }
        Ok(())
    }
}
