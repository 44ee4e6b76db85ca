//! Collaborator traits used by the connection supervisor

mod discovery;
mod registry;
mod restart;
mod transport;

pub use discovery::CoordinatorDiscovery;
pub use registry::{NodeRegistrar, NodeRegistration};
pub use restart::Restarter;
pub use transport::NodeTransport;
