//! This is the `simdroned` replay driver.
//!
//! It reads the recorded moves of every drone and replays them, printing one line on stdout
//! each time a drone passes close to a tube station.  Logs go to stderr.
//!

use clap::{crate_version, Parser};
use eyre::Result;
use tracing::{info, trace};

use simdrone_common::{close_logging, init_logging};

use crate::cli::{Opts, SubCommand};
use crate::cmds::{list_drones, list_stations, replay};
use crate::config::{init_runtime, Settings};

mod cli;
mod cmds;
mod config;
mod diag;
mod error;

/// Binary name
const NAME: &str = env!("CARGO_BIN_NAME");

/// Binary version
const VERSION: &str = crate_version!();

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();

    let guard = init_logging(NAME, opts.use_tree, opts.use_file.clone())?;
    trace!("{NAME} starting");

    let res = handle_subcmd(&opts).await;

    close_logging(guard);
    res
}

async fn handle_subcmd(opts: &Opts) -> Result<()> {
    match &opts.subcmd {
        SubCommand::Drones => {
            trace!("drones");

            let ctx = init_runtime(opts)?;
            let str = list_drones(&ctx.datadir, &ctx.config.drones).await?;
            println!("{str}");
        }
        SubCommand::Stations => {
            trace!("stations");

            let ctx = init_runtime(opts)?;
            let str = list_stations(&ctx.datadir).await?;
            println!("{str}");
        }
        SubCommand::Run(ropts) => {
            trace!("run");

            let ctx = init_runtime(opts)?;
            info!("data from {:?}", ctx.datadir);

            let settings = Settings::resolve(&ctx.config, ropts)?;
            replay(&ctx.datadir, settings).await?;
        }
        // Nothing to load for this one.
        //
        SubCommand::Version => {
            println!(
                "{NAME}/{VERSION} {} {}",
                simdrone_common::version(),
                simdrone_engine::version()
            );
        }
    }
    Ok(())
}
