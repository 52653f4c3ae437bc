//! Configuration module
//!
//! Values come from, in order of precedence, the command line, the environment (for the data
//! directory), the configuration file and finally our defaults.
//!
//! Version History:
//!
//! - v1 is the first one
//!

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use eyre::Result;
use serde::Deserialize;
use tracing::{debug, trace};

use simdrone_common::{ConfigFile, IntoConfig, Versioned};
use simdrone_engine::{Cutover, DroneId, PACING, QUEUE_CAPACITY};

use crate::cli::{Opts, RunOpts};
use crate::error::Status;

/// Config filename
const CONFIG: &str = "simdroned.hcl";

/// Current version
const CVERSION: usize = 1;

/// Default data directory, relative to where we run
const DEF_DATADIR: &str = "storage/data";

/// Default time allowed for shutdown
const DEF_TIMEOUT: u64 = 5;

/// Default diagnostics port
const DEF_DIAG_PORT: u16 = 8080;

/// Configuration file for `simdroned`, everything is optional.
///
#[derive(Debug, Default, Deserialize)]
pub struct ReplayConfig {
    pub version: usize,
    /// Where the CSV files are
    pub datadir: Option<PathBuf>,
    /// Only these drones
    #[serde(default)]
    pub drones: Vec<DroneId>,
    /// Seconds allowed for shutdown
    pub timeout: Option<u64>,
    pub capacity: Option<usize>,
    pub pacing: Option<u32>,
    pub seed: Option<u64>,
    /// HH:MM
    pub cutover: Option<String>,
    pub diag_port: Option<u16>,
    /// Do not wait for a signal once all drones are done
    pub exit_when_done: Option<bool>,
}

impl Versioned for ReplayConfig {
    fn version(&self) -> usize {
        self.version
    }
}

impl IntoConfig for ReplayConfig {
    const FILENAME: &'static str = CONFIG;
    const VERSION: usize = CVERSION;
}

/// This holds our context, meaning common stuff
///
#[derive(Debug)]
pub struct Context {
    /// Data directory, checked to exist
    pub datadir: PathBuf,
    /// Loaded configuration or defaults
    pub config: ReplayConfig,
}

/// Everything `run` needs, resolved.
///
#[derive(Debug, PartialEq)]
pub struct Settings {
    pub drones: Vec<DroneId>,
    pub timeout: Duration,
    pub capacity: usize,
    pub pacing: u32,
    pub seed: Option<u64>,
    pub cutover: Option<Cutover>,
    pub diag: Option<SocketAddr>,
    pub exit_when_done: bool,
}

/// Load configuration and find our data.
///
#[tracing::instrument]
pub fn init_runtime(opts: &Opts) -> Result<Context> {
    let cfile = ConfigFile::<ReplayConfig>::load(opts.config.as_deref())?;
    match cfile.path() {
        Some(path) => debug!("configuration loaded from {path:?}"),
        None => debug!("no configuration file, using defaults"),
    }
    let config = cfile.into_inner();

    let datadir = resolve_datadir(opts.datadir.clone(), std::env::var("SIMDRONE_DATADIR").ok(), &config);
    trace!("datadir = {datadir:?}");
    if !datadir.is_dir() {
        return Err(Status::MissingDataDir(datadir).into());
    }

    Ok(Context { datadir, config })
}

fn resolve_datadir(cli: Option<PathBuf>, env: Option<String>, config: &ReplayConfig) -> PathBuf {
    cli.or(env.map(PathBuf::from))
        .or(config.datadir.clone())
        .unwrap_or_else(|| PathBuf::from(DEF_DATADIR))
}

impl Settings {
    /// Merge `run` options over the configuration file.
    ///
    #[tracing::instrument]
    pub fn resolve(config: &ReplayConfig, ropts: &RunOpts) -> Result<Self> {
        let drones = if ropts.drones.is_empty() {
            config.drones.clone()
        } else {
            ropts.drones.clone()
        };

        let cutover = match ropts.cutover.as_ref().or(config.cutover.as_ref()) {
            Some(s) => Some(
                s.parse::<Cutover>()
                    .map_err(|e| Status::BadCutover(e.to_string()))?,
            ),
            None => None,
        };

        let diag = if ropts.no_diag {
            None
        } else {
            let port = ropts.diag_port.or(config.diag_port).unwrap_or(DEF_DIAG_PORT);
            Some(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
        };

        Ok(Settings {
            drones,
            timeout: Duration::from_secs(ropts.timeout.or(config.timeout).unwrap_or(DEF_TIMEOUT)),
            capacity: ropts.capacity.or(config.capacity).unwrap_or(QUEUE_CAPACITY),
            pacing: ropts.pacing.or(config.pacing).unwrap_or(PACING as u32),
            seed: ropts.seed.or(config.seed),
            cutover,
            diag,
            exit_when_done: ropts.exit_when_done || config.exit_when_done.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn config() -> ReplayConfig {
        hcl::from_str(
            r##"
version = 1
datadir = "/srv/simdrone"
drones = [5937, 6043]
timeout = 10
pacing = 100
cutover = "08:10"
diag_port = 6060
"##,
        )
        .unwrap()
    }

    #[test]
    fn test_settings_defaults() {
        let s = Settings::resolve(&ReplayConfig::default(), &RunOpts::default()).unwrap();

        assert!(s.drones.is_empty());
        assert_eq!(Duration::from_secs(DEF_TIMEOUT), s.timeout);
        assert_eq!(QUEUE_CAPACITY, s.capacity);
        assert_eq!(10, s.pacing);
        assert_eq!(None, s.seed);
        assert_eq!(None, s.cutover);
        assert_eq!(Some("127.0.0.1:8080".parse().unwrap()), s.diag);
        assert!(!s.exit_when_done);
    }

    #[test]
    fn test_settings_from_config() {
        let s = Settings::resolve(&config(), &RunOpts::default()).unwrap();

        assert_eq!(vec![5937, 6043], s.drones);
        assert_eq!(Duration::from_secs(10), s.timeout);
        assert_eq!(100, s.pacing);
        assert_eq!(Some(Cutover::new(8, 10).unwrap()), s.cutover);
        assert_eq!(Some("127.0.0.1:6060".parse().unwrap()), s.diag);
    }

    #[test]
    fn test_settings_cli_wins() {
        let ropts = RunOpts {
            drones: vec![42],
            timeout: Some(1),
            cutover: Some("09:00".to_string()),
            no_diag: true,
            exit_when_done: true,
            ..Default::default()
        };
        let s = Settings::resolve(&config(), &ropts).unwrap();

        assert_eq!(vec![42], s.drones);
        assert_eq!(Duration::from_secs(1), s.timeout);
        assert_eq!(Some(Cutover::new(9, 0).unwrap()), s.cutover);
        assert_eq!(None, s.diag);
        assert!(s.exit_when_done);
    }

    #[test]
    fn test_settings_bad_cutover() {
        let ropts = RunOpts {
            cutover: Some("8h10".to_string()),
            ..Default::default()
        };
        assert!(Settings::resolve(&ReplayConfig::default(), &ropts).is_err());
    }

    #[rstest]
    #[case(Some("/cli"), Some("/env"), "/cli")]
    #[case(None, Some("/env"), "/env")]
    #[case(None, None, "/srv/simdrone")]
    fn test_resolve_datadir(#[case] cli: Option<&str>, #[case] env: Option<&str>, #[case] expected: &str) {
        let d = resolve_datadir(cli.map(PathBuf::from), env.map(String::from), &config());
        assert_eq!(PathBuf::from(expected), d);
    }

    #[test]
    fn test_sample_config() {
        let cfg: ReplayConfig = hcl::from_str(include_str!("../simdroned.hcl")).unwrap();

        assert_eq!(CVERSION, cfg.version());
        assert_eq!(vec![5937, 6043], cfg.drones);

        let s = Settings::resolve(&cfg, &RunOpts::default()).unwrap();
        assert_eq!(None, s.cutover);
        assert!(!s.exit_when_done);
    }

    #[test]
    fn test_resolve_datadir_default() {
        let d = resolve_datadir(None, None, &ReplayConfig::default());
        assert_eq!(PathBuf::from(DEF_DATADIR), d);
    }
}
