//! sl-agent: swarm node agent
//!
//! The agent finds a coordinator (by UDP broadcast or a configured URL),
//! registers this machine as a build node, hands the connection to the
//! execution transport and reconnects with back-off when it drops. While
//! connected, a watcher keeps the node's labels in sync with a label file.

pub mod discovery;
pub mod http;
pub mod registration;
pub mod restart;
pub mod supervisor;
pub mod transport;
pub mod watcher;
mod xml;

#[cfg(test)]
pub(crate) mod testing;

pub use discovery::Resolver;
pub use http::{Credentials, HttpContext, TrustConfig};
pub use registration::RegistrationClient;
pub use supervisor::{Supervisor, SupervisorExit};
pub use watcher::LabelWatcher;
