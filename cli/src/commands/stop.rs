//! Stop command - stop tracked processes.

use anyhow::{bail, Result};
use port_arranger_core::{DockerCompose, Registry, StopOutcome, StopService, SystemProcessControl};
use serde_json::json;

fn service(registry: Registry) -> StopService<SystemProcessControl, DockerCompose> {
    StopService::new(registry, SystemProcessControl::new(), DockerCompose::new())
}

fn describe(name: &str, outcome: &StopOutcome) -> String {
    match outcome {
        StopOutcome::Stopped { pid } => format!("Process '{}' stopped (PID: {})", name, pid),
        StopOutcome::AlreadyStopped { pid } => {
            format!("Process '{}' already stopped (PID: {}), removed from registry", name, pid)
        }
    }
}

pub async fn one(registry: Registry, name: &str, json: bool) -> Result<()> {
    let outcome = service(registry).stop(name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&json!({ "name": name, "result": outcome }))?);
    } else {
        println!("{}", describe(name, &outcome));
    }
    Ok(())
}

pub async fn all(registry: Registry, json: bool) -> Result<()> {
    let reports = service(registry).stop_all().await?;

    if json {
        let entries: Vec<_> = reports
            .iter()
            .map(|report| match &report.result {
                Ok(outcome) => json!({ "name": report.name, "result": outcome }),
                Err(e) => json!({ "name": report.name, "error": e.to_string() }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if reports.is_empty() {
        println!("No processes to stop.");
        return Ok(());
    } else {
        for report in &reports {
            match &report.result {
                Ok(outcome) => println!("  ✓ {}", describe(&report.name, outcome)),
                Err(e) => println!("  ✗ {}: {}", report.name, e),
            }
        }
    }

    let failed = reports.iter().filter(|r| r.result.is_err()).count();
    if failed > 0 {
        bail!("{} of {} processes failed to stop", failed, reports.len());
    }
    if !json {
        println!("\nAll processes stopped ({})", reports.len());
    }
    Ok(())
}
