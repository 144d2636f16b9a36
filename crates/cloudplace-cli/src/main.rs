use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "cloudplace",
    about = "cloudplace — decide which machine hosts which service",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to cloudplace.toml
    #[arg(short, long, global = true, default_value = "cloudplace.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load saved placements (or generate defaults) and save them
    Init,
    /// Show unplaced services and whether deployment can start
    Status,
    /// Show assignments per machine
    Show {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// List machines in the pool
    Machines {
        /// Substring matched against hostname and hardware summary
        #[arg(short, long, default_value = "")]
        filter: String,
        /// Only machines satisfying this service's constraints
        #[arg(short, long)]
        service: Option<String>,
    },
    /// Place a service on a machine
    Assign {
        machine: String,
        service: String,
        /// bare-metal, lxc or kvm
        #[arg(long, default_value = "bare-metal")]
        stratum: String,
    },
    /// Remove a service from a machine
    Unassign {
        machine: String,
        service: String,
        /// Remove every unit on the machine, not just one
        #[arg(long)]
        all: bool,
    },
    /// Clear one machine, or every machine when none is given
    Clear { machine: Option<String> },
    /// Replace all assignments with generated defaults
    Defaults,
    /// Place unplaced services on empty machines
    Autoplace,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cloudplace=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_path();

    match cli.command {
        Commands::Init => commands::status::init(config),
        Commands::Status => commands::status::status(config),
        Commands::Show { format } => commands::status::show(config, &format),
        Commands::Machines { filter, service } => {
            commands::status::machines(config, &filter, service.as_deref())
        }
        Commands::Assign {
            machine,
            service,
            stratum,
        } => commands::edit::assign(config, &machine, &service, &stratum),
        Commands::Unassign {
            machine,
            service,
            all,
        } => commands::edit::unassign(config, &machine, &service, all),
        Commands::Clear { machine } => commands::edit::clear(config, machine.as_deref()),
        Commands::Defaults => commands::edit::defaults(config),
        Commands::Autoplace => commands::edit::autoplace(config),
    }
}
