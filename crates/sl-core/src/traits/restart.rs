//! Process restart trait

/// Replaces the running node process with a fresh one.
///
/// Used for hard label updates, where the node registers again from scratch.
pub trait Restarter: Send + Sync {
    /// Restart with the given command line. Only returns on failure, or
    /// when the implementation does not actually replace the process.
    fn restart(&self, argv: &[String]) -> std::io::Result<()>;
}
