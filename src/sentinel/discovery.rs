//! Sentinel Topology Discovery
//!
//! Walks the sentinel pool until one sentinel answers both
//! `GET-MASTER-ADDR-BY-NAME` and `SLAVES` cleanly, then republishes that
//! topology to the replication manager.
//!
//! State machine:
//! AcquireEndpoint -> QueryMaster -> QuerySlaves -> Publish -> Done
//! Any recoverable failure discards the current sentinel and goes back to
//! AcquireEndpoint, dropping whatever that sentinel already returned.
//! An empty pool ends in Exhausted. Every failure shrinks the pool by one,
//! so a cycle makes at most `pool.len()` failed attempts.

use crate::config::{DiscoveryConfig, SentinelEndpoint};
use crate::error::{Error, Result};
use crate::protocol::{RespValue, SentinelCommand};
use crate::replication::{ConnectionDescriptor, ReplicationManager, ReplicationRole};

use super::client::{SentinelConnector, TcpSentinelConnector};
use super::events::{DiscoveryEvent, DiscoveryEventPublisher, DiscoveryObserver};
use super::pool::{EndpointPool, PoolLease};
use super::topology::{MasterDescriptor, ReplicationTopology, TopologyBuilder};

use std::sync::Arc;

/// Discovery cycle states
#[derive(Debug)]
enum DiscoveryState {
    AcquireEndpoint,
    QueryMaster,
    QuerySlaves(MasterDescriptor),
    Publish(ReplicationTopology),
    Exhausted,
    Done(ReplicationTopology),
}

/// Drives discovery and owns the replication manager it publishes to
pub struct DiscoveryOrchestrator<C: SentinelConnector, M: ReplicationManager> {
    master_name: String,
    pool: EndpointPool,
    connector: C,
    manager: M,
    events: DiscoveryEventPublisher,
}

impl<M: ReplicationManager> DiscoveryOrchestrator<TcpSentinelConnector, M> {
    /// Orchestrator talking to sentinels over TCP, built from config
    pub fn from_config(config: &DiscoveryConfig, manager: M) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.sentinels.clone(),
            config.master_name.clone(),
            TcpSentinelConnector::from_config(config),
            manager,
        ))
    }
}

impl<C: SentinelConnector, M: ReplicationManager> DiscoveryOrchestrator<C, M> {
    pub fn new(
        sentinels: Vec<SentinelEndpoint>,
        master_name: impl Into<String>,
        connector: C,
        manager: M,
    ) -> Self {
        Self {
            master_name: master_name.into(),
            pool: EndpointPool::new(sentinels),
            connector,
            manager,
            events: DiscoveryEventPublisher::logging(),
        }
    }

    /// Replace the default log observer with a custom publisher
    pub fn with_events(mut self, events: DiscoveryEventPublisher) -> Self {
        self.events = events;
        self
    }

    /// Add an observer alongside the existing ones
    pub fn subscribe(&mut self, observer: Arc<dyn DiscoveryObserver>) {
        self.events.subscribe(observer);
    }

    pub fn master_name(&self) -> &str {
        &self.master_name
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut M {
        &mut self.manager
    }

    pub fn into_manager(self) -> M {
        self.manager
    }

    /// Refresh the topology from sentinels, then let the manager validate itself
    pub fn check(&mut self) -> Result<()> {
        self.discover()?;
        self.manager.check()
    }

    /// Run one discovery cycle and publish the result.
    ///
    /// Returns the published topology, or `Error::NoSentinelsAvailable`
    /// once every sentinel has been discarded.
    pub fn discover(&mut self) -> Result<ReplicationTopology> {
        let initial = self.pool.len();
        let mut failures = 0usize;
        let mut lease = self.pool.lease(&self.connector, &self.events);
        let mut state = DiscoveryState::AcquireEndpoint;

        loop {
            state = match state {
                DiscoveryState::AcquireEndpoint => match lease.acquire() {
                    Ok(active) => {
                        log::debug!("Querying sentinel {} for '{}'", active.endpoint(), self.master_name);
                        DiscoveryState::QueryMaster
                    }
                    Err(Error::NoSentinelsAvailable) => DiscoveryState::Exhausted,
                    Err(e) => retry(&mut lease, e, &mut failures)?,
                },
                DiscoveryState::QueryMaster => {
                    let command = SentinelCommand::get_master_addr_by_name(&self.master_name);
                    match query(&mut lease, &command).and_then(|r| TopologyBuilder::parse_master(&r)) {
                        Ok(master) => DiscoveryState::QuerySlaves(master),
                        Err(e) => retry(&mut lease, e, &mut failures)?,
                    }
                }
                DiscoveryState::QuerySlaves(master) => {
                    let command = SentinelCommand::slaves(&self.master_name);
                    match query(&mut lease, &command).and_then(|r| TopologyBuilder::parse_slaves(&r)) {
                        Ok(slaves) => DiscoveryState::Publish(ReplicationTopology::new(master, slaves)),
                        // the master answer from this sentinel goes too
                        Err(e) => retry(&mut lease, e, &mut failures)?,
                    }
                }
                DiscoveryState::Publish(topology) => {
                    publish(&mut self.manager, &topology);

                    if let (Some(sentinel), Some(master)) = (lease.current(), &topology.master) {
                        self.events.publish(DiscoveryEvent::TopologyPublished {
                            master_name: self.master_name.clone(),
                            sentinel: sentinel.clone(),
                            master_host: master.host.clone(),
                            master_port: master.port,
                            slaves: topology.slaves.len(),
                        });
                    }
                    DiscoveryState::Done(topology)
                }
                DiscoveryState::Exhausted => {
                    debug_assert_eq!(failures, initial);
                    self.events.publish(DiscoveryEvent::SentinelsExhausted {
                        master_name: self.master_name.clone(),
                    });
                    return Err(Error::NoSentinelsAvailable);
                }
                DiscoveryState::Done(topology) => {
                    debug_assert!(failures < initial);
                    return Ok(topology);
                }
            };
        }
    }
}

fn query<C: SentinelConnector>(
    lease: &mut PoolLease<'_, C>,
    command: &SentinelCommand,
) -> Result<RespValue> {
    lease.acquire()?.query(command)
}

/// Discard the current sentinel for a recoverable error, else give up
fn retry<C: SentinelConnector>(
    lease: &mut PoolLease<'_, C>,
    error: Error,
    failures: &mut usize,
) -> Result<DiscoveryState> {
    if !error.is_recoverable() {
        return Err(error);
    }
    if lease.discard(&error).is_some() {
        *failures += 1;
    }
    Ok(DiscoveryState::AcquireEndpoint)
}

/// Full replacement: clear, then master, then slaves in order
fn publish<M: ReplicationManager>(manager: &mut M, topology: &ReplicationTopology) {
    manager.clear();
    if let Some(master) = &topology.master {
        manager.add(ConnectionDescriptor::from(master), ReplicationRole::Master);
    }
    for slave in &topology.slaves {
        manager.add(ConnectionDescriptor::from(slave), ReplicationRole::Slave);
    }
}
