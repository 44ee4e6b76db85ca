//! Coordinator discovery
//!
//! Either broadcast on the local network or ask a configured URL directly.

pub mod broadcast;
pub mod direct;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use sl_core::config::NodeConfig;
use sl_core::error::{ConfigError, ProtocolError};
use sl_core::traits::CoordinatorDiscovery;
use sl_core::Candidate;

use crate::http::HttpContext;

/// How a coordinator is located
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Ask the coordinator at this URL
    Direct(Url),
    /// Broadcast on the local network
    Broadcast {
        address: String,
        port: u16,
        window: Duration,
        pinned: Option<Url>,
    },
}

impl DiscoveryMode {
    /// Discovery mode described by the node configuration
    pub fn from_config(config: &NodeConfig) -> Result<Self, ConfigError> {
        let url = config.coordinator_url()?;
        Ok(match url {
            Some(url) if !config.broadcast => DiscoveryMode::Direct(url),
            pinned => DiscoveryMode::Broadcast {
                address: config.discovery_address.clone(),
                port: config.discovery_port,
                window: config.discovery_window,
                pinned,
            },
        })
    }
}

/// Finds coordinators using the shared HTTP client
pub struct Resolver {
    http: HttpContext,
    mode: DiscoveryMode,
}

impl Resolver {
    /// Create a resolver
    pub fn new(http: HttpContext, mode: DiscoveryMode) -> Self {
        Self { http, mode }
    }
}

#[async_trait]
impl CoordinatorDiscovery for Resolver {
    async fn discover(&self) -> Result<Candidate, ProtocolError> {
        match &self.mode {
            DiscoveryMode::Direct(url) => direct::discover(&self.http, url).await,
            DiscoveryMode::Broadcast {
                address,
                port,
                window,
                pinned,
            } => broadcast::discover(address, *port, *window, pinned.as_ref()).await,
        }
    }

    async fn verify(&self, candidate: &Candidate) -> Result<(), ProtocolError> {
        direct::verify_coordinator(&self.http, &candidate.url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_selects_direct_mode() {
        let config = NodeConfig {
            url: Some("http://ci.example.com".to_string()),
            ..Default::default()
        };
        let mode = DiscoveryMode::from_config(&config).unwrap();
        assert_eq!(
            mode,
            DiscoveryMode::Direct(Url::parse("http://ci.example.com/").unwrap())
        );
    }

    #[test]
    fn test_no_url_selects_broadcast() {
        let config = NodeConfig {
            discovery_port: 40000,
            ..Default::default()
        };
        match DiscoveryMode::from_config(&config).unwrap() {
            DiscoveryMode::Broadcast {
                address,
                port,
                window,
                pinned,
            } => {
                assert_eq!(address, "255.255.255.255");
                assert_eq!(port, 40000);
                assert_eq!(window, Duration::from_secs(5));
                assert!(pinned.is_none());
            }
            other => panic!("expected broadcast, got {:?}", other),
        }
    }

    #[test]
    fn test_forced_broadcast_pins_url() {
        let config = NodeConfig {
            url: Some("http://ci.example.com/".to_string()),
            broadcast: true,
            ..Default::default()
        };
        match DiscoveryMode::from_config(&config).unwrap() {
            DiscoveryMode::Broadcast { pinned, .. } => {
                assert_eq!(pinned.unwrap().as_str(), "http://ci.example.com/");
            }
            other => panic!("expected broadcast, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_url_is_config_error() {
        let config = NodeConfig {
            url: Some("::nope".to_string()),
            ..Default::default()
        };
        assert!(DiscoveryMode::from_config(&config).is_err());
    }
}
