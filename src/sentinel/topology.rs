//! Topology Builder
//!
//! Turns raw sentinel replies into master/slave descriptors.
//!
//! Reply shapes:
//! - `SENTINEL GET-MASTER-ADDR-BY-NAME <name>` -> `[host, port]`
//! - `SENTINEL SLAVES <name>` -> list of flat `field, value, ...` records,
//!   with the host at offset 3 (`ip` value) and the port at offset 5
//!   (`port` value)

use crate::error::{Error, Result};
use crate::protocol::RespValue;
use crate::replication::ReplicationRole;

/// Offset of the host value in a SENTINEL SLAVES record
pub const SLAVE_HOST_OFFSET: usize = 3;
/// Offset of the port value in a SENTINEL SLAVES record
pub const SLAVE_PORT_OFFSET: usize = 5;

/// The writable primary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterDescriptor {
    pub host: String,
    pub port: u16,
}

impl MasterDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub const fn role(&self) -> ReplicationRole {
        ReplicationRole::Master
    }
}

impl std::fmt::Display for MasterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A read-only replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveDescriptor {
    pub host: String,
    pub port: u16,
}

impl SlaveDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub const fn role(&self) -> ReplicationRole {
        ReplicationRole::Slave
    }
}

impl std::fmt::Display for SlaveDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One master plus its slaves, in sentinel-reported order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationTopology {
    pub master: Option<MasterDescriptor>,
    pub slaves: Vec<SlaveDescriptor>,
}

impl ReplicationTopology {
    pub fn new(master: MasterDescriptor, slaves: Vec<SlaveDescriptor>) -> Self {
        Self {
            master: Some(master),
            slaves,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.master.is_none() && self.slaves.is_empty()
    }
}

/// Parses sentinel replies. Every failure is `Error::MalformedReply`.
pub struct TopologyBuilder;

impl TopologyBuilder {
    /// Parse a GET-MASTER-ADDR-BY-NAME reply
    pub fn parse_master(reply: &RespValue) -> Result<MasterDescriptor> {
        let items = expect_array(reply, "master address")?;
        if items.len() < 2 {
            return Err(Error::malformed(format!(
                "master address reply has {} element(s), expected 2",
                items.len()
            )));
        }

        let host = field_host(&items[0], "master host")?;
        let port = field_port(&items[1], "master port")?;
        Ok(MasterDescriptor { host, port })
    }

    /// Parse a SLAVES reply. One bad record rejects the whole batch.
    pub fn parse_slaves(reply: &RespValue) -> Result<Vec<SlaveDescriptor>> {
        let records = expect_array(reply, "slaves")?;
        let mut slaves = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let fields = record.as_array().ok_or_else(|| {
                Error::malformed(format!("slave record {} is a {}", i, record.kind()))
            })?;

            let host = fields
                .get(SLAVE_HOST_OFFSET)
                .ok_or_else(|| Error::malformed(format!("slave record {} lacks host", i)))?;
            let port = fields
                .get(SLAVE_PORT_OFFSET)
                .ok_or_else(|| Error::malformed(format!("slave record {} lacks port", i)))?;

            slaves.push(SlaveDescriptor {
                host: field_host(host, "slave host")?,
                port: field_port(port, "slave port")?,
            });
        }

        Ok(slaves)
    }
}

fn expect_array<'a>(reply: &'a RespValue, what: &str) -> Result<&'a [RespValue]> {
    match reply {
        RespValue::Array(items) => Ok(items),
        RespValue::Error(e) => Err(Error::malformed(format!(
            "{} query failed: {}",
            what,
            String::from_utf8_lossy(e)
        ))),
        other => Err(Error::malformed(format!(
            "{} reply is a {}, expected array",
            what,
            other.kind()
        ))),
    }
}

fn field_host(value: &RespValue, what: &str) -> Result<String> {
    let bytes = value
        .as_bytes()
        .ok_or_else(|| Error::malformed(format!("{} is a {}", what, value.kind())))?;
    let host = std::str::from_utf8(bytes)
        .map_err(|_| Error::malformed(format!("{} is not valid utf-8", what)))?;
    if host.is_empty() {
        return Err(Error::malformed(format!("{} is empty", what)));
    }
    Ok(host.to_string())
}

fn field_port(value: &RespValue, what: &str) -> Result<u16> {
    value
        .as_int()
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| Error::malformed(format!("{} is not a valid port", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slave_record(ip: &str, port: &str) -> RespValue {
        RespValue::array(vec![
            RespValue::bulk_string("name"),
            RespValue::bulk_string(&format!("{}:{}", ip, port)),
            RespValue::bulk_string("ip"),
            RespValue::bulk_string(ip),
            RespValue::bulk_string("port"),
            RespValue::bulk_string(port),
            RespValue::bulk_string("runid"),
            RespValue::bulk_string("8f2d"),
            RespValue::bulk_string("flags"),
            RespValue::bulk_string("slave"),
        ])
    }

    #[test]
    fn test_parse_master() {
        let hosts = ["10.0.0.1", "redis-master.internal", "::1"];
        let ports = [1u16, 6379, 65535];
        for host in hosts {
            for port in ports {
                let reply = RespValue::array(vec![
                    RespValue::bulk_string(host),
                    RespValue::bulk_string(&port.to_string()),
                ]);
                let master = TopologyBuilder::parse_master(&reply).unwrap();
                assert_eq!(master, MasterDescriptor::new(host, port));
                assert_eq!(master.role(), ReplicationRole::Master);
            }
        }
    }

    #[test]
    fn test_parse_master_short_reply() {
        let reply = RespValue::array(vec![RespValue::bulk_string("10.0.0.1")]);
        assert!(matches!(
            TopologyBuilder::parse_master(&reply),
            Err(Error::MalformedReply(_))
        ));
        assert!(matches!(
            TopologyBuilder::parse_master(&RespValue::NullArray),
            Err(Error::MalformedReply(_))
        ));
    }

    #[test]
    fn test_parse_master_bad_port() {
        let reply = RespValue::array(vec![
            RespValue::bulk_string("10.0.0.1"),
            RespValue::bulk_string("70000"),
        ]);
        assert!(matches!(
            TopologyBuilder::parse_master(&reply),
            Err(Error::MalformedReply(_))
        ));
    }

    #[test]
    fn test_parse_master_error_reply() {
        let reply = RespValue::error("ERR No such master with that name");
        match TopologyBuilder::parse_master(&reply) {
            Err(Error::MalformedReply(msg)) => assert!(msg.contains("No such master")),
            other => panic!("expected malformed reply, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_slaves_preserves_order() {
        let reply = RespValue::array(vec![
            slave_record("10.0.0.3", "6381"),
            slave_record("10.0.0.2", "6380"),
        ]);
        let slaves = TopologyBuilder::parse_slaves(&reply).unwrap();
        assert_eq!(
            slaves,
            vec![
                SlaveDescriptor::new("10.0.0.3", 6381),
                SlaveDescriptor::new("10.0.0.2", 6380),
            ]
        );
        assert!(slaves.iter().all(|s| s.role() == ReplicationRole::Slave));
    }

    #[test]
    fn test_parse_slaves_reads_fixed_offsets_only() {
        let record = RespValue::array(vec![
            RespValue::Integer(0),
            RespValue::Null,
            RespValue::bulk_string("ignored"),
            RespValue::bulk_string("10.0.0.2"),
            RespValue::Integer(42),
            RespValue::Integer(6380),
        ]);
        let slaves = TopologyBuilder::parse_slaves(&RespValue::array(vec![record])).unwrap();
        assert_eq!(slaves, vec![SlaveDescriptor::new("10.0.0.2", 6380)]);
    }

    #[test]
    fn test_parse_slaves_empty() {
        let slaves = TopologyBuilder::parse_slaves(&RespValue::array(vec![])).unwrap();
        assert!(slaves.is_empty());
    }

    #[test]
    fn test_parse_slaves_missing_port_rejects_batch() {
        let truncated = RespValue::array(vec![
            RespValue::bulk_string("name"),
            RespValue::bulk_string("10.0.0.4:6382"),
            RespValue::bulk_string("ip"),
            RespValue::bulk_string("10.0.0.4"),
            RespValue::bulk_string("port"),
        ]);
        let reply = RespValue::array(vec![slave_record("10.0.0.2", "6380"), truncated]);

        match TopologyBuilder::parse_slaves(&reply) {
            Err(Error::MalformedReply(msg)) => assert_eq!(msg, "slave record 1 lacks port"),
            other => panic!("expected malformed reply, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_slaves_non_array_record() {
        let reply = RespValue::array(vec![RespValue::bulk_string("10.0.0.2:6380")]);
        assert!(matches!(
            TopologyBuilder::parse_slaves(&reply),
            Err(Error::MalformedReply(_))
        ));
    }
}
