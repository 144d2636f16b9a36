use std::path::Path;

use cloudplace_core::Stratum;

use super::session::Session;

pub fn assign(config: &Path, machine: &str, service: &str, stratum: &str) -> anyhow::Result<()> {
    let stratum: Stratum = stratum.parse()?;
    let mut session = Session::open(config)?;
    let target = session.controller.find_machine(machine)?;
    session.controller.assign(&target, service, stratum)?;
    session.save()?;
    println!("✓ {service} → {} ({stratum})", target.hostname);
    Ok(())
}

pub fn unassign(config: &Path, machine: &str, service: &str, all: bool) -> anyhow::Result<()> {
    let mut session = Session::open(config)?;
    if all {
        let removed = session.controller.remove_all_assignments(machine, service)?;
        println!("✓ Removed {removed} units of {service} from {machine}");
    } else {
        let stratum = session.controller.remove_one_assignment(machine, service)?;
        println!("✓ Removed {service} from {machine} ({stratum})");
    }
    session.save()
}

pub fn clear(config: &Path, machine: Option<&str>) -> anyhow::Result<()> {
    let mut session = Session::open(config)?;
    match machine {
        Some(id) => {
            session.controller.clear_assignments(id)?;
            println!("✓ Cleared {id}");
        }
        None => {
            session.controller.clear_all_assignments();
            println!("✓ Cleared all assignments");
        }
    }
    session.save()
}

pub fn defaults(config: &Path) -> anyhow::Result<()> {
    let mut session = Session::open(config)?;
    session.controller.reset_to_defaults();
    session.save()?;
    println!(
        "✓ Reset to defaults ({} machines used, {} services unplaced)",
        session.controller.machines_used().len(),
        session.controller.unplaced_services().len()
    );
    Ok(())
}

pub fn autoplace(config: &Path) -> anyhow::Result<()> {
    let mut session = Session::open(config)?;
    let outcome = session.controller.autoplace_unplaced();
    session.save()?;
    if outcome.success {
        println!("✓ All services placed");
        Ok(())
    } else {
        anyhow::bail!(outcome.message)
    }
}
