use bytes::Bytes;

/// A SENTINEL subcommand with its ordered arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl SentinelCommand {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// SENTINEL GET-MASTER-ADDR-BY-NAME <name>
    pub fn get_master_addr_by_name(master_name: &str) -> Self {
        Self::new("get-master-addr-by-name", vec![master_name.to_string()])
    }

    /// SENTINEL SLAVES <name>
    pub fn slaves(master_name: &str) -> Self {
        Self::new("slaves", vec![master_name.to_string()])
    }

    /// Full wire form: SENTINEL <name> <args...>
    pub fn encode(&self) -> Bytes {
        let mut parts: Vec<&str> = Vec::with_capacity(self.args.len() + 2);
        parts.push("SENTINEL");
        parts.push(&self.name);
        parts.extend(self.args.iter().map(String::as_str));
        encode_command(&parts)
    }
}

impl std::fmt::Display for SentinelCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SENTINEL {}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Serialize a command to RESP multi-bulk format
pub fn encode_command(parts: &[&str]) -> Bytes {
    let mut buf = Vec::with_capacity(256);
    buf.push(b'*');
    buf.extend_from_slice(itoa::Buffer::new().format(parts.len()).as_bytes());
    buf.extend_from_slice(b"\r\n");

    for part in parts {
        buf.push(b'$');
        buf.extend_from_slice(itoa::Buffer::new().format(part.len()).as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(part.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    Bytes::from(buf)
}
