//! Connection supervisor
//!
//! Drives one node through discover -> verify -> register -> connect, and
//! backs off and starts over whenever any step fails or the connection
//! drops. It is the only place that decides between retrying and exiting.

mod retry;

pub use retry::{jittered, wait_for_retry, RetryScheduler, RetryState};

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sl_core::config::BackoffConfig;
use sl_core::error::SwarmError;
use sl_core::traits::{CoordinatorDiscovery, NodeRegistrar, NodeRegistration, NodeTransport, Restarter};
use sl_core::LabelSet;

use crate::watcher::{read_label_file, LabelWatchSettings, LabelWatcher, WatcherOutcome};

/// Why the supervisor returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Connection ended and reconnecting is disabled
    Disconnected,
    /// Retry budget used up
    RetriesExhausted,
    /// Handed over to a fresh process after a failed soft label update
    Restarted,
}

impl SupervisorExit {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorExit::Disconnected | SupervisorExit::Restarted => 0,
            SupervisorExit::RetriesExhausted => 1,
        }
    }
}

/// Knobs for the supervisor loop
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// What to register
    pub registration: NodeRegistration,
    /// Run the pre-flight coordinator check (skipped with credentials)
    pub verify_coordinator: bool,
    /// Attempts before giving up; `None` retries forever
    pub retry_budget: Option<u32>,
    /// Back-off between attempts
    pub backoff: BackoffConfig,
    /// Exit once the first connection ends
    pub no_retry_after_connected: bool,
    /// Label file watching, if a label file is configured
    pub label_watch: Option<LabelWatchSettings>,
}

/// How a connection attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    /// Transport returned cleanly
    Closed,
    /// Label watcher needs the node to register again
    HardUpdate,
}

/// Supervises the node's connection to a coordinator
pub struct Supervisor {
    discovery: Arc<dyn CoordinatorDiscovery>,
    registrar: Arc<dyn NodeRegistrar>,
    transport: Arc<dyn NodeTransport>,
    restarter: Arc<dyn Restarter>,
    settings: SupervisorSettings,
}

impl Supervisor {
    /// Create a supervisor from its collaborators
    pub fn new(
        discovery: Arc<dyn CoordinatorDiscovery>,
        registrar: Arc<dyn NodeRegistrar>,
        transport: Arc<dyn NodeTransport>,
        restarter: Arc<dyn Restarter>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            discovery,
            registrar,
            transport,
            restarter,
            settings,
        }
    }

    /// Run until the retry budget is spent or a clean exit is requested.
    ///
    /// Non-retryable errors are returned immediately.
    pub async fn run(&self) -> Result<SupervisorExit, SwarmError> {
        let mut retry = RetryScheduler::from_config(&self.settings.backoff);

        loop {
            match self.attempt().await {
                Ok(ConnectionEnd::HardUpdate) => {
                    if self.hard_update() {
                        return Ok(SupervisorExit::Restarted);
                    }
                }
                Ok(ConnectionEnd::Closed) if self.settings.no_retry_after_connected => {
                    tracing::warn!("Connection closed, exiting");
                    return Ok(SupervisorExit::Disconnected);
                }
                Ok(ConnectionEnd::Closed) => tracing::warn!("Connection to coordinator closed"),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => tracing::error!("Connection attempt failed: {}", e),
            }

            let wait = retry.next_wait();
            if let Some(budget) = self.settings.retry_budget {
                if retry.attempts() >= budget {
                    tracing::error!("Retry limit of {} reached, exiting", budget);
                    return Ok(SupervisorExit::RetriesExhausted);
                }
                tracing::warn!("Remaining retries: {}", budget - retry.attempts());
            }

            tracing::info!("Retrying in {} seconds", wait.as_secs());
            tokio::time::sleep(wait).await;
        }
    }

    /// One pass through discovery, registration and the connection
    async fn attempt(&self) -> Result<ConnectionEnd, SwarmError> {
        tracing::info!("Discovering coordinator");
        let candidate = self.discovery.discover().await?;

        if self.settings.verify_coordinator {
            self.discovery.verify(&candidate).await?;
        }

        let mut registration = self.settings.registration.clone();
        let baseline = match &self.settings.label_watch {
            Some(watch) => match read_label_file(&watch.path).await {
                Ok(contents) => {
                    registration.labels.extend(&LabelSet::parse(&contents));
                    Some(contents)
                }
                Err(e) => {
                    tracing::warn!("{}; registering without file labels", e);
                    None
                }
            },
            None => None,
        };

        let node_name = self
            .registrar
            .create_node(&candidate, &registration)
            .await?;
        tracing::info!("Registered as {} with {}", node_name, candidate);

        let stop = CancellationToken::new();
        let mut watcher = self.settings.label_watch.clone().map(|watch| {
            let watcher = LabelWatcher::new(
                Arc::clone(&self.registrar),
                candidate.clone(),
                node_name.clone(),
                watch,
                baseline,
            );
            tokio::spawn(watcher.run(stop.clone()))
        });

        tracing::info!("Connecting to {} as {}", candidate, node_name);
        // Losing the select drops the connection, which ends the transport
        let end = tokio::select! {
            result = self.transport.connect(&candidate, &node_name) => {
                result.map(|()| ConnectionEnd::Closed)
            }
            () = hard_update_requested(&mut watcher) => Ok(ConnectionEnd::HardUpdate),
        };

        stop.cancel();
        if let Some(handle) = watcher.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Label watcher ended abnormally: {}", e);
            }
        }

        end.map_err(SwarmError::from)
    }

    /// Restart the node. Returns false if the restart failed and the
    /// supervisor should register again itself.
    fn hard_update(&self) -> bool {
        let argv = self
            .settings
            .label_watch
            .as_ref()
            .map(|watch| watch.argv.as_slice())
            .unwrap_or_default();
        tracing::warn!("Restarting node to apply label changes");
        match self.restarter.restart(argv) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to restart node: {}", e);
                false
            }
        }
    }
}

/// Resolves once the watcher asks for a hard update; pends otherwise
async fn hard_update_requested(watcher: &mut Option<JoinHandle<WatcherOutcome>>) {
    if let Some(handle) = watcher.as_mut() {
        let outcome = handle.await;
        *watcher = None;
        match outcome {
            Ok(WatcherOutcome::HardUpdateRequired) => return,
            Ok(WatcherOutcome::Stopped) => {}
            Err(e) => tracing::warn!("Label watcher ended abnormally: {}", e),
        }
    }
    std::future::pending().await
}
