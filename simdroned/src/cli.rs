//! Module describing all possible commands and sub-commands to the `simdroned` binary
//!

use std::path::PathBuf;

use clap::{crate_authors, crate_description, crate_name, crate_version, Parser};

use simdrone_engine::DroneId;

/// CLI options
#[derive(Debug, Parser)]
#[command(disable_version_flag = true)]
#[clap(name = crate_name!(), about = crate_description!())]
#[clap(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// Configuration file.
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Directory with `tube.csv` and one `<id>.csv` per drone.
    #[clap(short = 'd', long)]
    pub datadir: Option<PathBuf>,
    /// Hierarchical logging output.
    #[clap(short = 'T', long)]
    pub use_tree: bool,
    /// Also log into hourly files in this directory.
    #[clap(short = 'L', long)]
    pub use_file: Option<String>,
    /// Sub-commands (see below).
    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

// ------

/// All sub-commands:
///
/// - `drones`
/// - `run`
/// - `stations`
/// - `version`
///
#[derive(Debug, Parser, PartialEq)]
pub enum SubCommand {
    /// List drones and their number of moves
    Drones,
    /// Replay every drone
    Run(RunOpts),
    /// List all stations
    Stations,
    /// List all package versions
    Version,
}

/// Options for `run`, they override the configuration file.
///
#[derive(Debug, Default, Parser, PartialEq)]
pub struct RunOpts {
    /// Only replay these drones (comma-separated).
    #[clap(short = 'D', long, value_delimiter = ',')]
    pub drones: Vec<DroneId>,
    /// Seed for traffic conditions.
    #[clap(short = 's', long)]
    pub seed: Option<u64>,
    /// Seconds allowed for shutdown.
    #[clap(short = 't', long)]
    pub timeout: Option<u64>,
    /// Replay speed-up, 1 is real time.
    #[clap(short = 'p', long)]
    pub pacing: Option<u32>,
    /// Size of each drone queue.
    #[clap(long)]
    pub capacity: Option<usize>,
    /// Stop everything once a drone reaches this time of day (HH:MM).
    #[clap(long)]
    pub cutover: Option<String>,
    /// Diagnostics port on localhost.
    #[clap(short = 'P', long)]
    pub diag_port: Option<u16>,
    /// No diagnostics endpoint.
    #[clap(long)]
    pub no_diag: bool,
    /// Exit once every drone is done instead of waiting for a signal.
    #[clap(short = 'x', long)]
    pub exit_when_done: bool,
}
