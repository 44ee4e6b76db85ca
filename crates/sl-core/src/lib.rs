//! sl-core: Core abstractions and configuration for swarmlink
//!
//! This crate provides the shared types, error taxonomy, traits and
//! configuration structures used by the node agent.

pub mod config;
pub mod error;
pub mod identity;
pub mod pidfile;
pub mod traits;
pub mod types;

pub use error::SwarmError;
pub use types::{Candidate, Crumb, LabelSet, NodeMode};
