//! Retry back-off configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// How the wait between connection attempts grows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Always wait the base interval
    #[default]
    None,
    /// Wait grows by one interval per attempt
    Linear,
    /// Wait doubles with every attempt
    Exponential,
}

impl FromStr for BackoffPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(BackoffPolicy::None),
            "linear" => Ok(BackoffPolicy::Linear),
            "exponential" => Ok(BackoffPolicy::Exponential),
            other => Err(format!(
                "unknown back-off policy '{}' (expected none, linear or exponential)",
                other
            )),
        }
    }
}

impl fmt::Display for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffPolicy::None => write!(f, "none"),
            BackoffPolicy::Linear => write!(f, "linear"),
            BackoffPolicy::Exponential => write!(f, "exponential"),
        }
    }
}

/// Back-off configuration for reconnection attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Growth policy
    pub policy: BackoffPolicy,

    /// Base wait between attempts
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Upper bound on any single wait
    #[serde(with = "duration_secs")]
    pub max_interval: Duration,

    /// Replace each wait with a uniform random value in `[0, wait]`
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            policy: BackoffPolicy::None,
            interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(60),
            jitter: false,
        }
    }
}
