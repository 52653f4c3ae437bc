//! This is the `ConfigFile` struct.
//!
//! This is for finding the right default locations for various configuration files for
//! `simdrone`.  This is a configuration file/struct neutral loading engine, storing only the
//! base directory and with `load()` read the proper file or the default one.
//!
//! This encapsulates the configuration file, available with `.inner()` or `.inner_mut()`.
//!

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use eyre::Result;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, trace};

use crate::makepath;

/// Main name for the directory base
const TAG: &str = "simdrone";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Bad config file version v{0}, need v{1}")]
    BadFileVersion(usize, usize),
    #[error("Unknown config file {0:?}")]
    UnknownFile(PathBuf),
    #[error("No home directory, can not find default config")]
    NoHomeDir,
}

/// Every configuration file carries a version number.
///
pub trait Versioned {
    fn version(&self) -> usize;
}

/// What a struct needs to be loaded through `ConfigFile`.
///
pub trait IntoConfig: Versioned + Debug + Default + DeserializeOwned {
    /// Base filename, looked up in the default directory.
    const FILENAME: &'static str;
    /// Version we expect to find in the file.
    const VERSION: usize;
}

/// Configuration file wrapper, remembers where things were found.
///
#[derive(Debug)]
pub struct ConfigFile<T: IntoConfig> {
    /// This is the base directory for all files.
    basedir: PathBuf,
    /// File actually loaded, if any.
    path: Option<PathBuf>,
    inner: T,
}

impl<T> ConfigFile<T>
where
    T: IntoConfig,
{
    #[tracing::instrument]
    fn new(tag: &str) -> Result<Self> {
        let base = BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;

        #[cfg(unix)]
        let basedir: PathBuf = makepath!(base.home_dir(), ".config", tag);

        #[cfg(windows)]
        let basedir: PathBuf = makepath!(base.data_local_dir(), tag);

        debug!("base = {basedir:?}");
        Ok(ConfigFile {
            basedir,
            path: None,
            inner: T::default(),
        })
    }

    /// Returns the path of the default config directory
    ///
    pub fn config_path(&self) -> &Path {
        &self.basedir
    }

    /// Returns the path of the default config file
    ///
    pub fn default_file(&self) -> PathBuf {
        self.basedir.join(T::FILENAME)
    }

    /// Returns the file we got our data from (`None` means defaults).
    ///
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the file and return a struct T in the right format.
    ///
    /// Use the following search path:
    /// - file specified on CLI, it must exist
    /// - default file in basedir (based on $HOME or $LOCALAPPDATA), defaults if absent
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<&Path>) -> Result<ConfigFile<T>> {
        let mut cfg = ConfigFile::<T>::new(TAG)?;

        let fname = match fname {
            Some(fname) if fname.exists() => fname.canonicalize()?,
            Some(fname) => return Err(ConfigError::UnknownFile(fname.to_path_buf()).into()),
            None => {
                let def = cfg.default_file();
                if !def.exists() {
                    trace!("No default file in {:?}, using defaults", cfg.config_path());
                    return Ok(cfg);
                }
                def
            }
        };

        trace!("Loading config file {fname:?}");
        cfg.inner = Self::read(&fname)?;
        cfg.path = Some(fname);
        Ok(cfg)
    }

    /// Read and check one file.
    ///
    #[tracing::instrument]
    fn read(fname: &Path) -> Result<T> {
        let data = fs::read_to_string(fname)?;
        let data: T = hcl::from_str(&data)?;
        debug!("struct data = {data:?}");

        if data.version() != T::VERSION {
            return Err(ConfigError::BadFileVersion(data.version(), T::VERSION).into());
        }
        Ok(data)
    }

    /// Return the inner configuration file
    ///
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Return the inner configuration file as putable
    ///
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// We are done with the wrapper, keep the data.
    ///
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde::Deserialize;
    use tempfile::NamedTempFile;

    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct Foo {
        version: usize,
        name: String,
    }

    impl Versioned for Foo {
        fn version(&self) -> usize {
            self.version
        }
    }

    impl IntoConfig for Foo {
        const FILENAME: &'static str = "foo.hcl";
        const VERSION: usize = 1;
    }

    fn write_config(body: &str) -> NamedTempFile {
        let mut fh = NamedTempFile::new().unwrap();
        fh.write_all(body.as_bytes()).unwrap();
        fh
    }

    #[test_pretty_log::test]
    fn test_config_load_file() -> Result<()> {
        let fh = write_config("version = 1\nname = \"bar\"\n");

        let cfg = ConfigFile::<Foo>::load(Some(fh.path()))?;
        assert_eq!(1, cfg.inner().version());
        assert_eq!("bar", cfg.inner().name);
        assert!(cfg.path().is_some());
        Ok(())
    }

    #[test_pretty_log::test]
    fn test_config_bad_version() {
        let fh = write_config("version = 2\nname = \"bar\"\n");

        let cfg = ConfigFile::<Foo>::load(Some(fh.path()));
        assert!(cfg.is_err());
        let err = cfg.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::BadFileVersion(2, 1))
        ));
    }

    #[test_pretty_log::test]
    fn test_config_missing_file() {
        let cfg = ConfigFile::<Foo>::load(Some(Path::new("/nonexistent/foo.hcl")));
        assert!(cfg.is_err());
    }

    #[test]
    fn test_config_default_file_name() -> Result<()> {
        let cfg = ConfigFile::<Foo>::new(TAG)?;
        assert!(cfg.default_file().ends_with("simdrone/foo.hcl"));
        assert!(cfg.path().is_none());
        Ok(())
    }
}
