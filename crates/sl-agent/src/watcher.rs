//! Label file reconciliation
//!
//! While the node is connected, the label file is polled. When its contents
//! change, the node's labels are swapped on the coordinator in place (a
//! soft update). If any call in that sequence fails, the watcher asks for a
//! hard update: the supervisor drops the connection and restarts the node
//! with its original command line so it registers from scratch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sl_core::error::LabelUpdateError;
use sl_core::traits::NodeRegistrar;
use sl_core::{Candidate, LabelSet};

/// How the watcher should behave
#[derive(Debug, Clone)]
pub struct LabelWatchSettings {
    /// File to watch
    pub path: PathBuf,
    /// Delay between checks
    pub poll_interval: Duration,
    /// Labels from the configuration that always stay on the node
    pub static_labels: LabelSet,
    /// Command line the node restarts with on a hard update
    pub argv: Vec<String>,
}

/// Why the watcher stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherOutcome {
    /// Stop signal received
    Stopped,
    /// Soft update failed; the node has to register again
    HardUpdateRequired,
}

/// Keeps coordinator labels in line with the label file
pub struct LabelWatcher {
    registrar: Arc<dyn NodeRegistrar>,
    candidate: Candidate,
    node_name: String,
    settings: LabelWatchSettings,
    baseline: Option<String>,
}

impl LabelWatcher {
    /// Create a watcher for a registered node.
    ///
    /// `baseline` is the label file content the node registered with, if any.
    pub fn new(
        registrar: Arc<dyn NodeRegistrar>,
        candidate: Candidate,
        node_name: String,
        settings: LabelWatchSettings,
        baseline: Option<String>,
    ) -> Self {
        Self {
            registrar,
            candidate,
            node_name,
            settings,
            baseline,
        }
    }

    /// Poll until stopped or a hard update is needed
    pub async fn run(mut self, stop: CancellationToken) -> WatcherOutcome {
        tracing::info!(
            "Watching {:?} for label changes every {:?}",
            self.settings.path,
            self.settings.poll_interval
        );

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::debug!("Label watcher for {} stopping", self.node_name);
                    return WatcherOutcome::Stopped;
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }

            if let Err(e) = self.poll_once().await {
                tracing::warn!("Soft label update failed: {}", e);
                tracing::warn!(
                    "Node {} needs a restart to apply label changes; builds running on it will be interrupted",
                    self.node_name
                );
                return WatcherOutcome::HardUpdateRequired;
            }
        }
    }

    /// Check the file once and apply a change if there is one
    async fn poll_once(&mut self) -> Result<(), LabelUpdateError> {
        let contents = match read_label_file(&self.settings.path).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("{}; will retry", e);
                return Ok(());
            }
        };

        if self
            .baseline
            .as_deref()
            .is_some_and(|baseline| same_labels(baseline, &contents))
        {
            return Ok(());
        }

        tracing::info!("Label file changed, updating labels of {}", self.node_name);
        self.soft_update(&contents).await?;
        self.baseline = Some(contents);
        Ok(())
    }

    /// Replace the node's labels with the static labels plus `contents`
    pub async fn soft_update(&self, contents: &str) -> Result<(), LabelUpdateError> {
        let current = self
            .registrar
            .get_labels(&self.candidate, &self.node_name)
            .await?
            .without_coordinator_managed();

        let mut desired = self.settings.static_labels.clone();
        desired.extend(&LabelSet::parse(contents));
        let desired = desired.without_coordinator_managed();

        if !current.is_empty() {
            tracing::debug!("Removing {} labels", current.len());
            self.registrar
                .remove_labels(&self.candidate, &self.node_name, &current)
                .await?;
        }
        if !desired.is_empty() {
            tracing::debug!("Adding {} labels", desired.len());
            self.registrar
                .add_labels(&self.candidate, &self.node_name, &desired)
                .await?;
        }

        tracing::info!("Labels of {} are now: {}", self.node_name, desired);
        Ok(())
    }

}

/// Read the label file
pub async fn read_label_file(path: &Path) -> Result<String, LabelUpdateError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LabelUpdateError::File {
            path: path.to_path_buf(),
            source,
        })
}

fn same_labels(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
