//! Discovery Events
//!
//! Every discard and every publication is reported to the injected
//! observers. Channel names follow Redis Sentinel's `+event` / `-event` style.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SentinelEndpoint;

/// Why a sentinel was dropped from the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Refused, timed out, reset or closed mid-request
    Connection,
    /// Replied with data that violates the sentinel reply schema
    MalformedReply,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection-failure",
            Self::MalformedReply => "malformed-reply",
        }
    }
}

/// Discovery event types
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    /// A sentinel failed and was removed from the pool for good
    SentinelDiscarded {
        endpoint: SentinelEndpoint,
        reason: DiscardReason,
        detail: String,
        remaining: usize,
    },
    /// A topology was handed to the replication manager
    TopologyPublished {
        master_name: String,
        sentinel: SentinelEndpoint,
        master_host: String,
        master_port: u16,
        slaves: usize,
    },
    /// The pool ran dry without a successful discovery
    SentinelsExhausted { master_name: String },
}

impl DiscoveryEvent {
    /// Get the channel name for this event
    pub fn channel_name(&self) -> &'static str {
        match self {
            Self::SentinelDiscarded { .. } => "-sentinel",
            Self::TopologyPublished { .. } => "+topology",
            Self::SentinelsExhausted { .. } => "-sentinels-exhausted",
        }
    }

    /// Format the event message
    pub fn format_message(&self) -> String {
        match self {
            Self::SentinelDiscarded {
                endpoint,
                reason,
                detail,
                remaining,
            } => {
                format!(
                    "sentinel {} {} {} #remaining {}",
                    endpoint,
                    reason.as_str(),
                    detail,
                    remaining
                )
            }
            Self::TopologyPublished {
                master_name,
                sentinel,
                master_host,
                master_port,
                slaves,
            } => {
                format!(
                    "master {} {} {} #slaves {} @ sentinel {}",
                    master_name, master_host, master_port, slaves, sentinel
                )
            }
            Self::SentinelsExhausted { master_name } => {
                format!("master {} #no working sentinels", master_name)
            }
        }
    }
}

/// Receiver of discovery events. Implementations must not block or panic.
pub trait DiscoveryObserver: Send + Sync {
    fn on_event(&self, event: &DiscoveryEvent);
}

/// Default observer: writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl DiscoveryObserver for LogObserver {
    fn on_event(&self, event: &DiscoveryEvent) {
        match event {
            DiscoveryEvent::SentinelDiscarded { .. } | DiscoveryEvent::SentinelsExhausted { .. } => {
                log::warn!("{} {}", event.channel_name(), event.format_message())
            }
            DiscoveryEvent::TopologyPublished { .. } => {
                log::info!("{} {}", event.channel_name(), event.format_message())
            }
        }
    }
}

/// Keeps every event it sees; handy for callers that inspect discards afterwards
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<DiscoveryEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiscoveryEvent> {
        self.events.lock().clone()
    }

    pub fn discards(&self) -> Vec<(SentinelEndpoint, DiscardReason)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DiscoveryEvent::SentinelDiscarded {
                    endpoint, reason, ..
                } => Some((endpoint.clone(), *reason)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DiscoveryObserver for EventLog {
    fn on_event(&self, event: &DiscoveryEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Event publisher fanning out to every registered observer
#[derive(Clone, Default)]
pub struct DiscoveryEventPublisher {
    observers: Vec<Arc<dyn DiscoveryObserver>>,
}

impl DiscoveryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publisher with the log observer attached
    pub fn logging() -> Self {
        let mut publisher = Self::new();
        publisher.subscribe(Arc::new(LogObserver));
        publisher
    }

    pub fn subscribe(&mut self, observer: Arc<dyn DiscoveryObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Publish an event to all observers
    pub fn publish(&self, event: DiscoveryEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}

impl std::fmt::Debug for DiscoveryEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryEventPublisher")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_channel_names() {
        let event = DiscoveryEvent::SentinelsExhausted {
            master_name: "mymaster".to_string(),
        };
        assert_eq!(event.channel_name(), "-sentinels-exhausted");
        assert_eq!(event.format_message(), "master mymaster #no working sentinels");
    }

    #[test]
    fn test_discard_format() {
        let event = DiscoveryEvent::SentinelDiscarded {
            endpoint: SentinelEndpoint::new("10.0.0.9", 26379),
            reason: DiscardReason::MalformedReply,
            detail: "slave record 0 lacks port".to_string(),
            remaining: 2,
        };

        assert_eq!(event.channel_name(), "-sentinel");
        assert_eq!(
            event.format_message(),
            "sentinel 10.0.0.9:26379 malformed-reply slave record 0 lacks port #remaining 2"
        );
    }

    #[test]
    fn test_publisher_fans_out() {
        let first = Arc::new(EventLog::new());
        let second = Arc::new(EventLog::new());
        let mut publisher = DiscoveryEventPublisher::logging();
        publisher.subscribe(first.clone());
        publisher.subscribe(second.clone());
        assert_eq!(publisher.observer_count(), 3);

        publisher.publish(DiscoveryEvent::SentinelDiscarded {
            endpoint: SentinelEndpoint::new("10.0.0.9", 26379),
            reason: DiscardReason::Connection,
            detail: "connection refused".to_string(),
            remaining: 0,
        });

        assert_eq!(first.discards().len(), 1);
        assert_eq!(second.events().len(), 1);
        assert_eq!(first.discards()[0].1, DiscardReason::Connection);
    }
}
