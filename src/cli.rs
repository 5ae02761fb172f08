use crate::config::{DiscoveryConfig, SentinelEndpoint};
use crate::error::Result;
use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sentinel-discover")]
#[command(author = "Sockudo Team")]
#[command(version)]
#[command(about = "Discover the current master and replicas through Redis Sentinel", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(value_name = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Sentinel endpoint as HOST[:PORT][@ALIAS], repeatable, tried in order.
    /// Replaces the sentinels from the config file.
    #[arg(long = "sentinel", value_name = "HOST:PORT")]
    pub sentinels: Vec<SentinelEndpoint>,

    /// Master name as known to the sentinels
    #[arg(long)]
    pub master_name: Option<String>,

    /// Connect timeout in milliseconds (default: 500)
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Read timeout in milliseconds (default: 2000)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// Password for sentinel AUTH
    #[arg(long)]
    pub sentinel_pass: Option<String>,

    /// Username for sentinel AUTH
    #[arg(long)]
    pub sentinel_user: Option<String>,

    /// Log level (debug, verbose, notice, warning, nothing)
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Log file path
    #[arg(long)]
    pub logfile: Option<String>,
}

impl Cli {
    /// Parse arguments and build the effective configuration
    pub fn load_config() -> Result<DiscoveryConfig> {
        Self::parse().into_config()
    }

    /// Config file first, flags on top
    pub fn into_config(self) -> Result<DiscoveryConfig> {
        let mut config = match &self.config_file {
            Some(path) => DiscoveryConfig::from_file(path)?,
            None => DiscoveryConfig::default(),
        };

        if !self.sentinels.is_empty() {
            config.sentinels = self.sentinels;
        }
        if let Some(name) = self.master_name {
            config.master_name = name;
        }
        if let Some(ms) = self.connect_timeout {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = self.read_timeout {
            config.read_timeout_ms = ms;
        }
        if let Some(pass) = self.sentinel_pass {
            config.sentinel_pass = Some(pass);
        }
        if let Some(user) = self.sentinel_user {
            config.sentinel_user = Some(user);
        }
        if let Some(level) = self.loglevel {
            config.loglevel = level;
        }
        if let Some(file) = self.logfile {
            config.logfile = file;
        }

        config.validate()?;
        Ok(config)
    }
}
