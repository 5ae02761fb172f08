//! Sentinel Endpoint Pool
//!
//! Ordered queue of candidate sentinels. The head is the endpoint in use;
//! a failed head is removed for good and the pool is never refilled.
//! Connections live in a [`PoolLease`], which spans a single discovery cycle.

use std::collections::VecDeque;

use crate::config::SentinelEndpoint;
use crate::error::{Error, Result};
use crate::protocol::{RespValue, SentinelCommand};

use super::client::{SentinelConnection, SentinelConnector};
use super::events::{DiscardReason, DiscoveryEvent, DiscoveryEventPublisher};

/// Candidate sentinels in configuration order
#[derive(Debug, Clone, Default)]
pub struct EndpointPool {
    endpoints: VecDeque<SentinelEndpoint>,
}

impl EndpointPool {
    pub fn new(endpoints: impl IntoIterator<Item = SentinelEndpoint>) -> Self {
        Self {
            endpoints: endpoints.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoint the next cycle will try first
    pub fn head(&self) -> Option<&SentinelEndpoint> {
        self.endpoints.front()
    }

    /// Start a cycle-scoped lease that owns at most one live connection
    pub fn lease<'a, C: SentinelConnector>(
        &'a mut self,
        connector: &'a C,
        events: &'a DiscoveryEventPublisher,
    ) -> PoolLease<'a, C> {
        PoolLease {
            pool: self,
            connector,
            events,
            active: None,
        }
    }
}

/// The sentinel currently in use and its lazily opened connection
#[derive(Debug)]
pub struct ActiveSentinel<T> {
    endpoint: SentinelEndpoint,
    connection: Option<T>,
}

impl<T: SentinelConnection> ActiveSentinel<T> {
    pub fn endpoint(&self) -> &SentinelEndpoint {
        &self.endpoint
    }

    pub fn query(&mut self, command: &SentinelCommand) -> Result<RespValue> {
        match self.connection.as_mut() {
            Some(conn) => conn.query(command),
            None => Err(Error::connection(&self.endpoint, "not connected")),
        }
    }
}

/// Acquire/discard access to an [`EndpointPool`] for one discovery cycle
pub struct PoolLease<'a, C: SentinelConnector> {
    pool: &'a mut EndpointPool,
    connector: &'a C,
    events: &'a DiscoveryEventPublisher,
    active: Option<ActiveSentinel<C::Connection>>,
}

impl<'a, C: SentinelConnector> PoolLease<'a, C> {
    /// Head of the pool, connected. Reuses the live connection if there is one.
    ///
    /// A connect failure leaves the head marked active so that
    /// [`discard`](Self::discard) removes it.
    pub fn acquire(&mut self) -> Result<&mut ActiveSentinel<C::Connection>> {
        let active = match self.active.take() {
            Some(active) => active,
            None => ActiveSentinel {
                endpoint: self
                    .pool
                    .head()
                    .cloned()
                    .ok_or(Error::NoSentinelsAvailable)?,
                connection: None,
            },
        };
        let active = self.active.insert(active);

        if active.connection.is_none() {
            active.connection = Some(self.connector.connect(&active.endpoint)?);
        }

        Ok(active)
    }

    /// Endpoint marked active, if any
    pub fn current(&self) -> Option<&SentinelEndpoint> {
        self.active.as_ref().map(|a| &a.endpoint)
    }

    /// Close the active connection and drop the head endpoint for good.
    /// No-op when nothing is active.
    pub fn discard(&mut self, cause: &Error) -> Option<SentinelEndpoint> {
        let active = self.active.take()?;
        drop(active.connection);

        let removed = self.pool.endpoints.pop_front();
        debug_assert_eq!(removed.as_ref(), Some(&active.endpoint));

        self.events.publish(DiscoveryEvent::SentinelDiscarded {
            endpoint: active.endpoint.clone(),
            reason: cause.discard_reason().unwrap_or(DiscardReason::Connection),
            detail: cause.to_string(),
            remaining: self.pool.len(),
        });

        Some(active.endpoint)
    }

    pub fn remaining(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentinel::events::EventLog;
    use std::cell::Cell;
    use std::sync::Arc;

    #[derive(Debug)]
    struct NullConnection;

    impl SentinelConnection for NullConnection {
        fn query(&mut self, _command: &SentinelCommand) -> Result<RespValue> {
            Ok(RespValue::NullArray)
        }
    }

    /// Refuses endpoints on port 1, counts connects
    #[derive(Default)]
    struct CountingConnector {
        connects: Cell<usize>,
    }

    impl SentinelConnector for CountingConnector {
        type Connection = NullConnection;

        fn connect(&self, endpoint: &SentinelEndpoint) -> Result<NullConnection> {
            self.connects.set(self.connects.get() + 1);
            if endpoint.port == 1 {
                return Err(Error::connection(endpoint, "connection refused"));
            }
            Ok(NullConnection)
        }
    }

    fn pool() -> EndpointPool {
        EndpointPool::new([
            SentinelEndpoint::new("10.0.0.11", 1),
            SentinelEndpoint::new("10.0.0.12", 26379),
        ])
    }

    #[test]
    fn test_acquire_returns_head_without_removing() {
        let mut pool = EndpointPool::new([SentinelEndpoint::new("10.0.0.12", 26379)]);
        let connector = CountingConnector::default();
        let events = DiscoveryEventPublisher::new();

        let mut lease = pool.lease(&connector, &events);
        assert_eq!(lease.acquire().unwrap().endpoint().host, "10.0.0.12");
        // second acquire reuses the live connection
        lease.acquire().unwrap();
        assert_eq!(connector.connects.get(), 1);
        assert_eq!(lease.remaining(), 1);
        drop(lease);

        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_discard_removes_head_permanently() {
        let mut pool = pool();
        let connector = CountingConnector::default();
        let log = Arc::new(EventLog::new());
        let mut events = DiscoveryEventPublisher::new();
        events.subscribe(log.clone());

        let mut lease = pool.lease(&connector, &events);
        let err = lease.acquire().unwrap_err();
        assert!(matches!(err, Error::SentinelConnection { .. }));
        assert_eq!(lease.current().map(|e| e.port), Some(1));

        let discarded = lease.discard(&err).unwrap();
        assert_eq!(discarded.port, 1);
        assert_eq!(lease.acquire().unwrap().endpoint().port, 26379);
        drop(lease);

        assert_eq!(pool.head().map(|e| e.port), Some(26379));
        assert_eq!(log.discards(), vec![(discarded, DiscardReason::Connection)]);
    }

    #[test]
    fn test_discard_without_active_is_noop() {
        let mut pool = pool();
        let connector = CountingConnector::default();
        let log = Arc::new(EventLog::new());
        let mut events = DiscoveryEventPublisher::new();
        events.subscribe(log.clone());

        let mut lease = pool.lease(&connector, &events);
        assert!(lease.discard(&Error::malformed("bad reply")).is_none());
        assert_eq!(lease.remaining(), 2);
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_acquire_on_empty_pool() {
        let mut pool = EndpointPool::default();
        let connector = CountingConnector::default();
        let events = DiscoveryEventPublisher::new();

        let mut lease = pool.lease(&connector, &events);
        assert!(matches!(lease.acquire(), Err(Error::NoSentinelsAvailable)));
        assert_eq!(connector.connects.get(), 0);
    }
}
