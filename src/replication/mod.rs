//! Replication Manager Interface
//!
//! The layer that routes reads and writes once the topology is known.
//! Discovery only ever clears it and re-adds every node, master first,
//! so each publication fully replaces the previous one.

use crate::error::{Error, Result};
use crate::sentinel::topology::{MasterDescriptor, SlaveDescriptor};

/// Alias given to the master connection
pub const MASTER_ALIAS: &str = "master";

/// Replication role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationRole {
    Master,
    Slave,
}

impl ReplicationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Slave => "slave",
        }
    }
}

/// Parameters for one node connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub alias: Option<String>,
}

impl ConnectionDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            alias: None,
        }
    }
}

impl From<&MasterDescriptor> for ConnectionDescriptor {
    fn from(master: &MasterDescriptor) -> Self {
        Self {
            host: master.host.clone(),
            port: master.port,
            alias: Some(MASTER_ALIAS.to_string()),
        }
    }
}

impl From<&SlaveDescriptor> for ConnectionDescriptor {
    fn from(slave: &SlaveDescriptor) -> Self {
        Self::new(slave.host.clone(), slave.port)
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}({}:{})", alias, self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Receiver of discovered topologies
pub trait ReplicationManager {
    /// Drop every known connection
    fn clear(&mut self);

    /// Register one node connection
    fn add(&mut self, connection: ConnectionDescriptor, role: ReplicationRole);

    /// Validate the connection set after a refresh
    fn check(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Master/slave connection set carrying an opaque routing strategy
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet<S = ()> {
    strategy: S,
    master: Option<ConnectionDescriptor>,
    slaves: Vec<ConnectionDescriptor>,
}

impl<S> ConnectionSet<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            master: None,
            slaves: Vec::new(),
        }
    }

    /// Routing strategy; never interpreted by discovery
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn master(&self) -> Option<&ConnectionDescriptor> {
        self.master.as_ref()
    }

    pub fn slaves(&self) -> &[ConnectionDescriptor] {
        &self.slaves
    }

    /// All connections, master first
    pub fn connections(&self) -> impl Iterator<Item = (&ConnectionDescriptor, ReplicationRole)> {
        self.master
            .iter()
            .map(|m| (m, ReplicationRole::Master))
            .chain(self.slaves.iter().map(|s| (s, ReplicationRole::Slave)))
    }

    pub fn len(&self) -> usize {
        self.slaves.len() + usize::from(self.master.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> ReplicationManager for ConnectionSet<S> {
    fn clear(&mut self) {
        self.master = None;
        self.slaves.clear();
    }

    fn add(&mut self, connection: ConnectionDescriptor, role: ReplicationRole) {
        match role {
            ReplicationRole::Master => {
                if let Some(old) = self.master.replace(connection) {
                    log::debug!("Replacing master connection {}", old);
                }
            }
            ReplicationRole::Slave => self.slaves.push(connection),
        }
    }

    fn check(&mut self) -> Result<()> {
        if self.master.is_none() {
            return Err(Error::Replication(
                "replication needs a master connection".to_string(),
            ));
        }
        Ok(())
    }
}
