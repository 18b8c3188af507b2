// NetVisor: Network Hypervisor for Virtual Big Switches
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use netvisor::config::{Deployment, HypervisorConfig};
use netvisor::datapath::{Switch, VirtualSwitch};
use netvisor::types::SwitchId;

use clap::{Parser, Subcommand};
use log::*;
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    // run clap
    let args = CommandLineArguments::parse();

    // initialize the env logger
    pretty_env_logger::init();

    match args.cmd {
        MainCommand::Check { config } => {
            let config = HypervisorConfig::from_file(&config)?;
            config.validate()?;
            println!(
                "Configuration is valid: {} physical switches, {} links, {} tenants",
                config.switches.len(),
                config.links.len(),
                config.tenants.len()
            );
        }
        MainCommand::Run { config, fail } => {
            let config = HypervisorConfig::from_file(&config)?;
            let deployment = config.build()?;
            print_routes(&deployment);

            for dpid in fail {
                let id = SwitchId(dpid);
                let sw = deployment
                    .physical_switch(id)
                    .ok_or_else(|| format!("Unknown physical switch {}", id))?;
                info!("Failing physical switch {}", id);
                println!("\nFailure of {} ({}):", sw.name(), id);
                for (tenant, result) in sw.unregister_tracked().join() {
                    match result {
                        Ok(outcome) => println!("  {}: {:?}", tenant, outcome),
                        Err(e) => println!("  {}: {}", tenant, e),
                    }
                }
                print_routes(&deployment);
            }

            deployment.hypervisor.shutdown();
        }
    }

    Ok(())
}

/// Print the state and the cached routes of every big switch.
fn print_routes(deployment: &Deployment) {
    for bs in deployment.big_switches.iter() {
        println!("\n{} ({} of {}): {:?}", bs.name(), bs.switch_id(), bs.tenant_id(), bs.state());
        let mut routes: Vec<_> =
            bs.route_map().into_iter().flat_map(|(_, r)| r.into_iter().map(|(_, r)| r)).collect();
        routes.sort_by_key(|r| (r.src_port(), r.dst_port()));
        for route in routes {
            println!("  {}", route);
        }
    }
}

#[derive(Parser, Debug)]
#[clap(name = "NetVisor", author = "Tibor Schneider")]
struct CommandLineArguments {
    /// Action to perform
    #[clap(subcommand)]
    cmd: MainCommand,
}

#[derive(Subcommand, Debug)]
enum MainCommand {
    /// Validate a deployment description without building it
    #[clap(name = "check")]
    Check {
        /// JSON file describing the deployment
        #[clap(short = 'c', long = "config")]
        config: PathBuf,
    },
    /// Build the deployment, print all routes, and optionally fail physical switches
    #[clap(name = "run")]
    Run {
        /// JSON file describing the deployment
        #[clap(short = 'c', long = "config")]
        config: PathBuf,
        /// Datapath id of a physical switch to fail after the deployment is built. Can be given
        /// multiple times.
        #[clap(short = 'f', long = "fail")]
        fail: Vec<u64>,
    },
}
