//! Operator CLI for inspecting resolved template defaults and host
//! virtualization capabilities.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{Report, Result};

use virt_osinfo::{Capabilities, HypervisorConnection, OsInfo, TemplateEra};

/// Default location of the operator override file.
const DEFAULT_CONFIG_PATH: &str = "/etc/virt/template.conf";

/// Inspect the template defaults and capabilities the virtualization
/// plugin would serve on this host.
#[derive(Parser)]
struct Cli {
    /// Path to the template override file
    #[clap(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available osinfo queries.
#[derive(Subcommand)]
enum Commands {
    /// Show the merged process-wide template defaults
    Defaults,

    /// Resolve template parameters for a guest distro/version
    Lookup {
        /// Guest distro identifier (e.g. "fedora")
        distro: Option<String>,
        /// Guest version string (e.g. "22")
        version: Option<String>,
    },

    /// Show one field of the old or modern template defaults
    TemplateDefault {
        /// Device era to merge
        era: TemplateEra,
        /// Field name (e.g. "disk_bus")
        field: String,
    },

    /// Probe host virtualization capabilities
    Capabilities {
        /// Connection to libvirt
        #[clap(long, short = 'c', default_value = "qemu:///system")]
        connection: String,
    },
}

/// Install and configure the tracing/logging system.
///
/// Structured logging with environment-based filtering, error layer
/// integration, and console output on stderr. Filtered by RUST_LOG,
/// defaulting to 'info'.
fn install_tracing() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

fn main() -> Result<(), Report> {
    install_tracing();
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Defaults => {
            let osinfo = OsInfo::from_host(Some(&cli.config))?;
            println!("{}", serde_json::to_string_pretty(osinfo.defaults())?);
        }
        Commands::Lookup { distro, version } => {
            let osinfo = OsInfo::from_host(Some(&cli.config))?;
            let params = osinfo.lookup(distro.as_deref(), version.as_deref());
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
        Commands::TemplateDefault { era, field } => {
            let osinfo = OsInfo::from_host(Some(&cli.config))?;
            let value = osinfo.get_template_default(era, &field)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Capabilities { connection } => {
            let conn = HypervisorConnection::new(connection);
            let caps = Capabilities::probe(Some(&conn))?;
            println!("{}", serde_json::to_string_pretty(&caps)?);
        }
    }
    Ok(())
}
