//! List command - show tracked processes with live status.

use anyhow::Result;
use port_arranger_core::{
    DockerCompose, ProcessStatus, Registry, StatusReporter, SystemProcessControl,
};

use super::truncate;

pub async fn run(registry: Registry, json: bool) -> Result<()> {
    let reporter = StatusReporter::new(registry, SystemProcessControl::new(), DockerCompose::new());
    let snapshot = reporter.snapshot().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("No tracked processes.");
        println!("Start one with: pa run \"<command>\"");
        return Ok(());
    }

    // Table header
    println!(
        "{:<20} {:<6} {:<8} {:<8} {:<8} COMMAND",
        "NAME", "PORT", "PID", "STATUS", "TYPE"
    );
    println!("{}", "-".repeat(80));

    for (name, mapping) in &snapshot {
        let status = match mapping.status {
            ProcessStatus::Running => "running",
            ProcessStatus::Stopped => "stopped",
        };

        println!(
            "{:<20} {:<6} {:<8} {:<8} {:<8} {}",
            truncate(name, 20),
            mapping.port,
            mapping.pid,
            status,
            mapping.injection_type,
            truncate(&mapping.original_command, 30)
        );

        for service in mapping.compose_ports.iter().flatten() {
            let state = match service.running {
                Some(true) => "running",
                Some(false) => "stopped",
                None => "-",
            };
            println!("  └ {:<16} {:<6} {:<8}", truncate(&service.service_name, 16), service.port, state);
        }
    }

    println!("\nTotal: {} processes", snapshot.len());
    Ok(())
}
