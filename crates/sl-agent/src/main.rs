//! swarmlink node agent
//!
//! Finds a coordinator, registers this machine as a build node and keeps it
//! connected until told to stop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sl_agent::discovery::DiscoveryMode;
use sl_agent::restart::ReexecRestarter;
use sl_agent::supervisor::SupervisorSettings;
use sl_agent::transport::CommandTransport;
use sl_agent::watcher::LabelWatchSettings;
use sl_agent::{Credentials, HttpContext, RegistrationClient, Resolver, Supervisor, TrustConfig};
use sl_core::config::{self, BackoffPolicy, NodeConfig};
use sl_core::identity::identity_hash;
use sl_core::pidfile::PidFileGuard;
use sl_core::traits::NodeRegistration;
use sl_core::NodeMode;

#[derive(Parser)]
#[command(name = "sl-agent")]
#[command(about = "swarmlink node agent - joins a build coordinator as a swarm node")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Coordinator URL (broadcast discovery when omitted)
    #[arg(short, long)]
    url: Option<String>,

    /// Use broadcast discovery even when a URL is given
    #[arg(long)]
    broadcast: bool,

    /// Node name (defaults to hostname)
    #[arg(short, long)]
    name: Option<String>,

    /// Node description
    #[arg(long)]
    description: Option<String>,

    /// Number of executors
    #[arg(short, long)]
    executors: Option<u32>,

    /// Remote filesystem root
    #[arg(long)]
    fs_root: Option<PathBuf>,

    /// Static labels, space separated or repeated
    #[arg(short, long)]
    labels: Vec<String>,

    /// File with labels to keep in sync while connected
    #[arg(long)]
    labels_file: Option<PathBuf>,

    /// Scheduling mode
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<NodeMode>,

    /// Tool location as NAME=PATH (repeatable)
    #[arg(short, long = "tool-location", value_parser = parse_tool_location)]
    tool_locations: Vec<(String, String)>,

    /// Replace an existing node with the same name
    #[arg(long)]
    delete_existing_clients: bool,

    /// Do not send the machine identity hash
    #[arg(long)]
    disable_unique_id: bool,

    /// Username for basic authentication
    #[arg(long)]
    username: Option<String>,

    /// Password or API token for basic authentication
    #[arg(long, env = "SWARM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Accept any server certificate
    #[arg(long)]
    disable_ssl_verification: bool,

    /// Accepted SHA-256 certificate fingerprint (repeatable)
    #[arg(long = "ssl-fingerprint")]
    ssl_fingerprints: Vec<String>,

    /// Connection attempts before giving up; negative retries forever
    #[arg(long, allow_hyphen_values = true)]
    retry: Option<i64>,

    /// Back-off between attempts (none, linear, exponential)
    #[arg(long)]
    retry_backoff_strategy: Option<BackoffPolicy>,

    /// Base back-off interval in seconds
    #[arg(long)]
    retry_interval: Option<u64>,

    /// Longest back-off interval in seconds
    #[arg(long)]
    max_retry_interval: Option<u64>,

    /// Exit once the first connection ends
    #[arg(long)]
    no_retry_after_connected: bool,

    /// Write our PID to this file
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Transport command and its arguments
    #[arg(last = true)]
    transport_command: Vec<String>,
}

fn parse_mode(s: &str) -> Result<NodeMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "normal" => Ok(NodeMode::Normal),
        "exclusive" => Ok(NodeMode::Exclusive),
        other => Err(format!("unknown mode '{}' (expected normal or exclusive)", other)),
    }
}

fn parse_tool_location(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), path.to_string()))
        }
        _ => Err(format!("expected NAME=PATH, got '{}'", s)),
    }
}

impl Args {
    /// Layer command-line values over the file configuration
    fn apply(self, config: &mut NodeConfig) {
        if let Some(url) = self.url {
            config.url = Some(url);
        }
        config.broadcast |= self.broadcast;
        if let Some(name) = self.name {
            config.name = Some(name);
        }
        if let Some(description) = self.description {
            config.description = Some(description);
        }
        if let Some(executors) = self.executors {
            config.executors = executors;
        }
        if let Some(fs_root) = self.fs_root {
            config.fs_root = fs_root;
        }
        config.labels.extend(self.labels);
        if let Some(labels_file) = self.labels_file {
            config.labels_file = Some(labels_file);
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        config.tool_locations.extend(self.tool_locations);
        config.delete_existing_clients |= self.delete_existing_clients;
        config.disable_unique_id |= self.disable_unique_id;
        if let Some(username) = self.username {
            config.username = Some(username);
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        config.disable_ssl_verification |= self.disable_ssl_verification;
        config.ssl_fingerprints.extend(self.ssl_fingerprints);
        if let Some(retry) = self.retry {
            config.retry = retry;
        }
        if let Some(policy) = self.retry_backoff_strategy {
            config.backoff.policy = policy;
        }
        if let Some(interval) = self.retry_interval {
            config.backoff.interval = std::time::Duration::from_secs(interval);
        }
        if let Some(max_interval) = self.max_retry_interval {
            config.backoff.max_interval = std::time::Duration::from_secs(max_interval);
        }
        config.no_retry_after_connected |= self.no_retry_after_connected;
        if let Some(pid_file) = self.pid_file {
            config.pid_file = Some(pid_file);
        }
        if !self.transport_command.is_empty() {
            config.transport_command = self.transport_command;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let argv: Vec<String> = std::env::args().collect();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("swarmlink agent starting...");

    // Load configuration
    let mut config = match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => {
            let path = config::default_config_path();
            if path.exists() {
                config::load_config(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))?
            } else {
                NodeConfig::default()
            }
        }
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let transport = CommandTransport::new(&config.transport_command).ok_or_else(|| {
        anyhow::anyhow!(
            "No transport command configured. Set transport_command in the config file \
             or pass it after `--`."
        )
    })?;

    let pid_guard = match &config.pid_file {
        Some(path) => Some(
            PidFileGuard::acquire(path.clone(), std::process::id())
                .context("Failed to write PID file")?,
        ),
        None => None,
    };

    let http = HttpContext::new(
        &TrustConfig::from_config(&config)?,
        Credentials::from_config(&config),
        config.request_timeout,
    )?;
    let mode = DiscoveryMode::from_config(&config)?;
    tracing::info!("Discovery: {:?}", mode);

    let fs_root = config.fs_root.to_string_lossy().into_owned();
    let hash = if config.disable_unique_id {
        None
    } else {
        Some(identity_hash(&config.fs_root))
    };
    let registration = NodeRegistration {
        name: config.node_name(),
        description: config.description.clone(),
        executors: config.executors,
        fs_root,
        labels: config.static_labels(),
        tool_locations: config.tool_locations.clone(),
        mode: config.mode,
        hash,
        delete_existing_clients: config.delete_existing_clients,
    };

    let label_watch = config.labels_file.clone().map(|path| LabelWatchSettings {
        path,
        poll_interval: config.label_poll_interval,
        static_labels: config.static_labels(),
        argv,
    });

    let settings = SupervisorSettings {
        registration,
        verify_coordinator: !config.has_credentials(),
        retry_budget: config.retry_budget(),
        backoff: config.backoff.clone(),
        no_retry_after_connected: config.no_retry_after_connected,
        label_watch,
    };

    let supervisor = Supervisor::new(
        Arc::new(Resolver::new(http.clone(), mode)),
        Arc::new(RegistrationClient::new(http)),
        Arc::new(transport),
        Arc::new(ReexecRestarter),
        settings,
    );

    let code = tokio::select! {
        result = supervisor.run() => result?.exit_code(),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
            0
        }
    };

    drop(pid_guard);
    std::process::exit(code);
}
