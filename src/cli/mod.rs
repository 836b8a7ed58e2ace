use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::model::{Host, Interface, ScanMode};
use crate::orchestrator::{self, ScanConfig};
use crate::osadapt::{RoutingTable, ShellRoutingTable};
use crate::render;
use crate::util::Cidr;

#[derive(Parser)]
#[command(name = "netterrain")]
#[command(author = "NetTerrain Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Local-network discovery and topology engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Discover hosts, services, and topology on the local network")]
    Discover {
        #[arg(long, help = "Scan every local interface subnet (quick mode)")]
        lan: bool,

        #[arg(short, long, help = "Explicit CIDR to scan, bypassing the range planner")]
        target: Option<String>,

        #[arg(long, value_enum, default_value = "normal", help = "Scan mode")]
        mode: ScanMode,

        #[arg(long, default_value = "3", help = "Intelligent Discovery thoroughness (1-5)")]
        thoroughness: u8,

        #[arg(long, help = "Disable the mDNS/SSDP/multicast/broadcast service aggregator")]
        no_services: bool,

        #[arg(long, help = "Disable bulk reverse DNS resolution")]
        no_dns: bool,

        #[arg(long, default_value = "2", help = "Per-protocol service discovery budget, in seconds")]
        service_timeout: u64,

        #[arg(long, help = "Device-classification rules YAML (overrides the embedded default)")]
        rules: Option<PathBuf>,

        #[arg(short, long, help = "Write the frozen host set as JSON to this path")]
        output: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Discover {
            lan,
            target,
            mode,
            thoroughness,
            no_services,
            no_dns,
            service_timeout,
            rules,
            output,
        } => {
            let resolved_mode = if lan { ScanMode::Quick } else { mode };
            let target = target.map(|t| t.parse::<Cidr>()).transpose()?;

            let config = ScanConfig {
                mode: resolved_mode,
                thoroughness: thoroughness.clamp(1, 5),
                enable_services: !no_services,
                enable_dns: !no_dns,
                service_timeout: Duration::from_secs(service_timeout),
                rules_path: rules,
                target,
            };

            let (interfaces, hosts) = orchestrator::run(config).await?;

            if let Some(path) = output {
                write_json(&hosts, &path)?;
                println!("{} {}", "saved results to".green(), path.display());
            } else {
                print_topology(&interfaces, hosts).await;
            }
        }
    }

    Ok(())
}

fn write_json(hosts: &[Host], path: &PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(hosts)?;
    std::fs::write(path, json)?;
    Ok(())
}

async fn print_topology(interfaces: &[Interface], hosts: Vec<Host>) {
    let routing_table = ShellRoutingTable;
    let routes = routing_table.routes().await;
    let groupings = render::group_by_interface(interfaces, hosts, &routes);
    print!("{}", render::render_text(&groupings));
}
