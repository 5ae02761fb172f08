//! Sentinel-backed topology discovery
//!
//! Finds the current master and its replicas by asking a pool of sentinels,
//! one at a time, and republishes the answer to a replication manager.
//!
//! - `pool`: ordered sentinel candidates, permanent discard on failure
//! - `client`: connection and query seam, blocking TCP implementation
//! - `topology`: reply parsing into master/slave descriptors
//! - `discovery`: the retry state machine tying it together
//! - `events`: discard/publication notifications

pub mod client;
pub mod discovery;
pub mod events;
pub mod pool;
pub mod topology;

pub use client::{SentinelConnection, SentinelConnector, TcpSentinelConnection, TcpSentinelConnector};
pub use discovery::DiscoveryOrchestrator;
pub use events::{
    DiscardReason, DiscoveryEvent, DiscoveryEventPublisher, DiscoveryObserver, EventLog,
    LogObserver,
};
pub use pool::{ActiveSentinel, EndpointPool, PoolLease};
pub use topology::{MasterDescriptor, ReplicationTopology, SlaveDescriptor, TopologyBuilder};
