//! sentinel-discover
//!
//! Asks the configured sentinels for the current master and replicas of a
//! named master and prints the topology.

use std::process::ExitCode;

use sockudo_sentinel::cli::Cli;
use sockudo_sentinel::{ConnectionSet, DiscoveryOrchestrator, ReplicationManager};

fn main() -> ExitCode {
    let config = match Cli::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = sockudo_sentinel::logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
        env_logger::init();
    }

    log::info!(
        "Discovering master '{}' through {} sentinel(s)",
        config.master_name,
        config.sentinels.len()
    );

    let mut orchestrator = match DiscoveryOrchestrator::from_config(&config, ConnectionSet::new(())) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let topology = match orchestrator.discover() {
        Ok(topology) => topology,
        Err(e) => {
            log::error!("Discovery failed: {}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = orchestrator.manager_mut().check() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    if let Some(master) = &topology.master {
        println!("master {} {}", master.host, master.port);
    }
    for slave in &topology.slaves {
        println!("slave {} {}", slave.host, slave.port);
    }

    ExitCode::SUCCESS
}
