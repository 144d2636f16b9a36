use std::path::Path;

use cloudplace_core::{Stratum, format_constraint};
use cloudplace_placement::PlacementController;
use serde_json::json;

use super::session::Session;

pub fn init(config: &Path) -> anyhow::Result<()> {
    let session = Session::open(config)?;
    match &session.loaded {
        Some(report) => println!(
            "✓ Loaded {} machines from {} ({} placeholders, {} skipped)",
            report.machines,
            session.placements_path.display(),
            report.placeholders,
            report.skipped.len()
        ),
        None => println!(
            "✓ Generated default placement in {}",
            session.placements_path.display()
        ),
    }
    print_status(&session.controller);
    if session.review_needed() {
        println!("Placement needs review before deploying.");
    }
    Ok(())
}

pub fn status(config: &Path) -> anyhow::Result<()> {
    let session = Session::open(config)?;
    print_status(&session.controller);
    Ok(())
}

fn print_status(controller: &PlacementController) {
    let unplaced = controller.unplaced_services();
    if unplaced.is_empty() {
        println!("All services placed.");
    } else {
        println!("Unplaced services:");
        for service in unplaced {
            let marker = if controller.service_is_core(service) {
                "required"
            } else {
                "optional"
            };
            println!("  {} ({marker})", service.display_name);
        }
    }
    println!("Machines used: {}", controller.machines_used().len());
    println!("Can deploy:    {}", controller.can_deploy());
    println!("Default:       {}", controller.is_default());
}

pub fn show(config: &Path, format: &str) -> anyhow::Result<()> {
    let session = Session::open(config)?;
    let store = session.controller.store();

    match format {
        "json" => {
            let machines: serde_json::Map<String, serde_json::Value> = store
                .iter()
                .map(|entry| {
                    let strata: serde_json::Map<String, serde_json::Value> = entry
                        .services
                        .iter()
                        .filter(|(_, names)| !names.is_empty())
                        .map(|(stratum, names)| (stratum.to_string(), json!(names)))
                        .collect();
                    (
                        entry.machine.instance_id.clone(),
                        json!({
                            "hostname": entry.machine.hostname,
                            "placeholder": entry.machine.is_placeholder(),
                            "assignments": strata,
                        }),
                    )
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&machines)?);
        }
        _ => {
            if store.is_empty() {
                println!("No assignments.");
            }
            for entry in store.iter() {
                println!("{}", entry.machine.filter_label());
                for stratum in Stratum::ALL {
                    let names = &entry.services[stratum];
                    if !names.is_empty() {
                        println!("  {:<10} {}", stratum.to_string(), names.join(", "));
                    }
                }
            }
        }
    }

    Ok(())
}

pub fn machines(config: &Path, filter: &str, service: Option<&str>) -> anyhow::Result<()> {
    let session = Session::open(config)?;
    let controller = &session.controller;

    let constraints = match service {
        Some(name) => {
            let definition = controller
                .catalog()
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("service not found: {name}"))?;
            let rendered: Vec<String> = definition
                .constraints
                .iter()
                .map(|(k, v)| format_constraint(k, v))
                .collect();
            println!("Machines satisfying {name} [{}]:", rendered.join(" "));
            Some(&definition.constraints)
        }
        None => None,
    };

    for machine in controller.filter_machines(filter, constraints) {
        let load = controller.store().machine_load(&machine.instance_id);
        println!("{}  ({load} services)", machine.filter_label());
    }
    Ok(())
}
