//! Core domain types

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Label the coordinator attaches to every swarm node on its own.
pub const COORDINATOR_MANAGED_LABEL: &str = "swarm";

/// A discovered coordinator endpoint plus its shared secret
#[derive(Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Base URL of the coordinator, always ending in `/`
    pub url: Url,
    /// Shared secret handed out by the coordinator
    pub secret: String,
}

impl Candidate {
    /// Create a candidate, normalizing the URL to end with a slash
    pub fn new(url: Url, secret: impl Into<String>) -> Self {
        Self {
            url: with_trailing_slash(url),
            secret: secret.into(),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("url", &self.url.as_str())
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Ensure a coordinator URL ends with `/` so relative paths join beneath it
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Short-lived anti-CSRF header issued by the coordinator
#[derive(Clone, PartialEq, Eq)]
pub struct Crumb {
    /// Header name to send
    pub header_name: String,
    /// Header value to send
    pub header_value: String,
}

impl Crumb {
    /// Parse the `field:value` body returned by the crumb issuer
    pub fn parse(body: &str) -> Option<Self> {
        let (name, value) = body.trim().split_once(':')?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self {
            header_name: name.to_string(),
            header_value: value.to_string(),
        })
    }
}

impl fmt::Debug for Crumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crumb")
            .field("header_name", &self.header_name)
            .finish_non_exhaustive()
    }
}

/// Set of whitespace-free capability labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeSet<String>);

impl LabelSet {
    /// Create an empty label set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse whitespace-separated labels
    pub fn parse(text: &str) -> Self {
        Self(text.split_whitespace().map(str::to_string).collect())
    }

    /// Add a single label, ignoring anything that is not a single token
    pub fn insert(&mut self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || label.contains(char::is_whitespace) {
            return false;
        }
        self.0.insert(label.to_string())
    }

    /// Merge another set into this one
    pub fn extend(&mut self, other: &LabelSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Drop the label the coordinator manages itself
    pub fn without_coordinator_managed(mut self) -> Self {
        self.0.remove(COORDINATOR_MANAGED_LABEL);
        self
    }

    /// Check if the set contains a label
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    /// Labels in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no labels
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical space-joined serialization
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(" ")
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl<S: AsRef<str>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for label in iter {
            set.insert(label.as_ref());
        }
        set
    }
}

/// How the coordinator schedules work onto this node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Use this node as much as possible
    #[default]
    Normal,
    /// Only run jobs whose label expression matches this node
    Exclusive,
}

impl NodeMode {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeMode::Normal => "normal",
            NodeMode::Exclusive => "exclusive",
        }
    }
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
