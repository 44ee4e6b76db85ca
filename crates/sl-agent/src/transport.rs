//! Process-backed execution transport
//!
//! The remoting channel itself lives in an external program. The agent
//! starts it once per connection with the coordinator details in its
//! environment and treats its exit as the end of the connection.

use async_trait::async_trait;
use tokio::process::Command;

use sl_core::error::TransportError;
use sl_core::traits::NodeTransport;
use sl_core::Candidate;

/// Coordinator URL handed to the transport
pub const ENV_URL: &str = "SWARM_URL";
/// Coordinator secret handed to the transport
pub const ENV_SECRET: &str = "SWARM_SECRET";
/// Final node name handed to the transport
pub const ENV_NODE_NAME: &str = "SWARM_NODE_NAME";

/// Runs a configured command for each connection
#[derive(Debug, Clone)]
pub struct CommandTransport {
    program: String,
    args: Vec<String>,
}

impl CommandTransport {
    /// Build from a command line. Returns `None` for an empty command.
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl NodeTransport for CommandTransport {
    async fn connect(&self, candidate: &Candidate, node_name: &str) -> Result<(), TransportError> {
        tracing::debug!("Starting transport {} {:?}", self.program, self.args);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(ENV_URL, candidate.url.as_str())
            .env(ENV_SECRET, &candidate.secret)
            .env(ENV_NODE_NAME, node_name)
            .kill_on_drop(true)
            .spawn()
            .map_err(TransportError::Spawn)?;

        let status = child.wait().await.map_err(TransportError::Spawn)?;
        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(TransportError::ExitStatus(code)),
            None => Err(TransportError::Signaled),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::candidate;

    fn shell(script: &str) -> CommandTransport {
        CommandTransport::new(&["sh".to_string(), "-c".to_string(), script.to_string()]).unwrap()
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(CommandTransport::new(&[]).is_none());
    }

    #[tokio::test]
    async fn test_clean_exit_is_disconnect() {
        assert!(shell("exit 0").connect(&candidate(), "node-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_failure_status_is_reported() {
        let err = shell("exit 3").connect(&candidate(), "node-1").await.unwrap_err();
        assert!(matches!(err, TransportError::ExitStatus(3)));
    }

    #[tokio::test]
    async fn test_signal_is_reported() {
        let err = shell("kill -9 $$").connect(&candidate(), "node-1").await.unwrap_err();
        assert!(matches!(err, TransportError::Signaled));
    }

    #[tokio::test]
    async fn test_environment_carries_connection_details() {
        let script = r#"test "$SWARM_URL" = "http://ci.example.com/" \
            && test "$SWARM_SECRET" = "secret" \
            && test "$SWARM_NODE_NAME" = "node-1a2b""#;
        shell(script)
            .connect(&candidate(), "node-1a2b")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let transport = CommandTransport::new(&["/nonexistent/transport".to_string()]).unwrap();
        let err = transport.connect(&candidate(), "node-1").await.unwrap_err();
        assert!(matches!(err, TransportError::Spawn(_)));
    }
}
