pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod replication;
pub mod sentinel;

pub use config::{DiscoveryConfig, SentinelEndpoint};
pub use error::{Error, Result};
pub use replication::{ConnectionDescriptor, ConnectionSet, ReplicationManager, ReplicationRole};
pub use sentinel::{DiscoveryOrchestrator, ReplicationTopology};
