//! Discovery configuration
//!
//! Sentinel endpoints, the monitored master name and connection settings,
//! loaded from a sentinel.conf-style file and/or command-line flags.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default sentinel port
pub const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// A candidate sentinel, in configuration order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SentinelEndpoint {
    pub host: String,
    pub port: u16,
    pub alias: Option<String>,
}

impl SentinelEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// host:port, suitable for connecting. IPv6 hosts are bracketed.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for SentinelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}({})", alias, self.addr()),
            None => write!(f, "{}", self.addr()),
        }
    }
}

/// Parses `host[:port][@alias]`; the port defaults to 26379.
/// IPv6 hosts are written bare (`::1`) or bracketed (`[::1]:26380`).
impl FromStr for SentinelEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, alias) = match s.split_once('@') {
            Some((addr, alias)) if !alias.is_empty() => (addr, Some(alias)),
            Some(_) => return Err(Error::Config(format!("empty alias in '{}'", s))),
            None => (s, None),
        };

        let parse_port = |port: &str| {
            port.parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid sentinel port in '{}'", s)))
        };

        let (host, port) = if let Some(bracketed) = addr.strip_prefix('[') {
            let (host, rest) = bracketed
                .split_once(']')
                .ok_or_else(|| Error::Config(format!("unterminated '[' in '{}'", s)))?;
            match rest {
                "" => (host, DEFAULT_SENTINEL_PORT),
                _ => match rest.strip_prefix(':') {
                    Some(port) => (host, parse_port(port)?),
                    None => return Err(Error::Config(format!("unexpected '{}' in '{}'", rest, s))),
                },
            }
        } else if addr.matches(':').count() > 1 {
            (addr, DEFAULT_SENTINEL_PORT)
        } else {
            match addr.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port)?),
                None => (addr, DEFAULT_SENTINEL_PORT),
            }
        };

        if host.is_empty() {
            return Err(Error::Config(format!("missing sentinel host in '{}'", s)));
        }

        let mut endpoint = SentinelEndpoint::new(host, port);
        endpoint.alias = alias.map(str::to_string);
        Ok(endpoint)
    }
}

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Candidate sentinels, tried in this order
    pub sentinels: Vec<SentinelEndpoint>,
    /// Master name as configured in the sentinels
    pub master_name: String,
    /// TCP connect timeout in milliseconds (default 500)
    pub connect_timeout_ms: u64,
    /// Per-reply read timeout in milliseconds (default 2000)
    pub read_timeout_ms: u64,
    /// Password for authenticating with sentinels
    pub sentinel_pass: Option<String>,
    /// Username for authenticating with sentinels (Redis 6+ ACL)
    pub sentinel_user: Option<String>,
    /// Log level
    pub loglevel: String,
    /// Log file path, empty for stderr
    pub logfile: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sentinels: Vec::new(),
            master_name: String::new(),
            connect_timeout_ms: 500,
            read_timeout_ms: 2000,
            sentinel_pass: None,
            sentinel_user: None,
            loglevel: "notice".to_string(),
            logfile: String::new(),
        }
    }
}

impl DiscoveryConfig {
    pub fn new(sentinels: Vec<SentinelEndpoint>, master_name: impl Into<String>) -> Self {
        Self {
            sentinels,
            master_name: master_name.into(),
            ..Default::default()
        }
    }

    /// Load from a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse config file contents. Bad lines are logged and skipped.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Err(e) = config.apply_line(line) {
                log::warn!("config line {}: {}", line_num + 1, e);
            }
        }

        config
    }

    fn apply_line(&mut self, line: &str) -> Result<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let directive = parts[0].to_lowercase();
        let value = |what: &str| {
            parts
                .get(1)
                .copied()
                .ok_or_else(|| Error::Config(format!("{} directive requires {}", directive, what)))
        };

        match directive.as_str() {
            "sentinel" => {
                if parts.len() < 3 {
                    return Err(Error::Config(
                        "sentinel directive requires <host> <port> [alias]".to_string(),
                    ));
                }
                let port = parts[2]
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port '{}'", parts[2])))?;
                let mut endpoint = SentinelEndpoint::new(parts[1], port);
                if let Some(alias) = parts.get(3) {
                    endpoint = endpoint.with_alias(*alias);
                }
                self.sentinels.push(endpoint);
            }
            "master-name" => self.master_name = value("a name")?.to_string(),
            "connect-timeout" => self.connect_timeout_ms = parse_ms(value("milliseconds")?)?,
            "read-timeout" => self.read_timeout_ms = parse_ms(value("milliseconds")?)?,
            "sentinel-pass" => self.sentinel_pass = Some(value("a password")?.to_string()),
            "sentinel-user" => self.sentinel_user = Some(value("a username")?.to_string()),
            "loglevel" => self.loglevel = value("a level")?.to_string(),
            "logfile" => self.logfile = value("a path")?.trim_matches('"').to_string(),
            _ => return Err(Error::Config(format!("unknown directive '{}'", parts[0]))),
        }

        Ok(())
    }

    /// Reject configurations discovery cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.master_name.is_empty() {
            return Err(Error::Config("master-name is required".to_string()));
        }
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn parse_ms(s: &str) -> Result<u64> {
    s.parse()
        .map_err(|_| Error::Config(format!("invalid milliseconds value '{}'", s)))
}
