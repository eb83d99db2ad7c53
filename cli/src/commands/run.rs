//! Run command - start a process on a free port.

use anyhow::Result;
use port_arranger_core::{
    InjectionType, OsPortProber, Registry, RunRequest, RunService, SystemProcessControl,
};

pub async fn run(
    registry: Registry,
    command: String,
    name: Option<String>,
    port: Option<u16>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let mut request = RunRequest::new(command, cwd).dry_run(dry_run);
    request.name = name;
    request.port = port;

    let service = RunService::new(registry, OsPortProber::new(), SystemProcessControl::new());
    let outcome = service.run(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let plan = &outcome.plan;
    if plan.injection_type == InjectionType::Compose {
        println!("[{}] docker compose", plan.name);
        match &plan.compose_ports {
            Some(services) if !services.is_empty() => {
                for service in services {
                    println!("  {:<20} port {}", service.service_name, service.port);
                }
            }
            _ => println!("  no published ports"),
        }
        if let Some(path) = &plan.override_path {
            println!("  override: {}", path.display());
        }
    } else {
        println!("[{}] port {} assigned ({}, {})", plan.name, plan.port, plan.tool_name, plan.injection_type);
    }

    if plan.command != plan.original_command {
        println!("  command: {}", plan.command);
    }
    for (key, value) in &plan.env {
        println!("  env: {}={}", key, value);
    }

    match outcome.pid {
        None => println!("\n[dry-run] not executed"),
        Some(pid) => {
            println!("\nStarted (PID: {})", pid);
            if plan.port != 0 {
                println!("http://localhost:{}", plan.port);
            }
        }
    }

    Ok(())
}
