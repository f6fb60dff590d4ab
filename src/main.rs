// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexGate.
//
// PlexGate is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexGate is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexGate. If not, see <https://www.gnu.org/licenses/>.

//! PlexGate command-line entry point.

use clap::{Parser, Subcommand};
use plexgate::config::ConfigLoader;
use plexgate::{exit, init_tracing, Gateway};

#[derive(Parser)]
#[command(name = "plexgate", version, about = "A pluggable database gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a gateway instance.
    Run {
        /// Global config file.
        #[arg(short, long, default_value = "./plexgate.yaml")]
        config: String,

        /// Plugin config file.
        #[arg(short, long, default_value = "./plexgate_plugins.yaml")]
        plugin_config: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            config,
            plugin_config,
        } => run(&config, &plugin_config).await,
    };
    std::process::exit(code);
}

async fn run(config_path: &str, plugin_config_path: &str) -> i32 {
    let loader = ConfigLoader::new();
    let global = match loader.load_global(config_path).await {
        Ok(global) => global,
        Err(e) => {
            eprintln!("plexgate: {e}");
            return exit::GENERIC;
        }
    };
    let plugin_cfg = match loader.load_plugins(plugin_config_path).await {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("plexgate: {e}");
            return exit::GENERIC;
        }
    };

    init_tracing(&global.default_logger());

    let gateway = match Gateway::bootstrap(global, plugin_cfg).await {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("plexgate: {e}");
            return e.exit_code();
        }
    };

    match gateway.run().await {
        Ok(()) => {
            gateway.join_background_tasks().await;
            exit::SUCCESS
        }
        Err(e) => {
            eprintln!("plexgate: {e}");
            e.exit_code()
        }
    }
}
