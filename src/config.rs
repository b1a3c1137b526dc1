//! Process-wide settings: where the install root and the databases live,
//! which repositories are configured, and how chatty to be.
//!
//! Settings come from three places, later ones winning: built-in
//! defaults, `pacman.conf`, command-line overrides.

use std::path::{Path, PathBuf};

use crate::{buffer_try_from_path, Error, Result};

pub const DEFAULT_ROOT_DIR: &str = "/";
pub const DEFAULT_DB_PATH: &str = "/var/lib/pacman/";
pub const DEFAULT_CONFIG_FILE: &str = "/etc/pacman.conf";

/// Values given on the command line, `None`/`false` when not given
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub root_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
    pub debug: bool,
}

/// The parts of `pacman.conf` we use
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PacmanConf {
    pub root_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    /// Every section other than `[options]`, in file order
    pub repos: Vec<String>,
}

impl PacmanConf {
    pub fn parse(text: &str) -> Result<Self> {
        let mut conf = Self::default();
        let mut section: Option<&str> = None;
        for (id, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue
            }
            if let Some(name) = line.strip_prefix('[') {
                let Some(name) = name.strip_suffix(']')
                    .filter(|name| ! name.is_empty()) else
                {
                    log::error!("Bad section header at line {}: '{}'",
                        id + 1, line);
                    return Err(Error::BrokenConfig(
                        format!("line {}: bad section header", id + 1)))
                };
                if name != "options" && ! conf.repos.iter().any(|repo| repo == name) {
                    conf.repos.push(name.to_string())
                }
                section = Some(name);
                continue
            }
            let Some(section) = section else {
                log::error!("Directive outside of any section at line {}: \
                    '{}'", id + 1, line);
                return Err(Error::BrokenConfig(
                    format!("line {}: directive outside of section", id + 1)))
            };
            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (line, None),
            };
            match (section, key, value) {
                ("options", "RootDir", Some(value)) =>
                    conf.root_dir = Some(value.into()),
                ("options", "DBPath", Some(value)) =>
                    conf.db_path = Some(value.into()),
                (_, "Include", _) =>
                    log::debug!("Not following Include in [{}]", section),
                _ => (),
            }
        }
        Ok(conf)
    }

    pub fn try_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buffer = buffer_try_from_path(&path)?;
        let text = String::from_utf8_lossy(&buffer);
        Self::parse(&text).inspect_err(|_|
            log::error!("Failed to parse config file '{}'",
                path.as_ref().display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_file: PathBuf,
    pub verbose: bool,
    pub debug: bool,
    /// Sync repositories in priority order, empty means every `*.db`
    /// found under `<db_path>/sync`
    pub repos: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: DEFAULT_ROOT_DIR.into(),
            db_path: DEFAULT_DB_PATH.into(),
            config_file: DEFAULT_CONFIG_FILE.into(),
            verbose: false,
            debug: false,
            repos: Vec::new(),
        }
    }
}

impl Config {
    /// Merge `conf` and `overrides` over the defaults. When only the root
    /// is relocated the DB path follows it.
    pub fn merge(conf: PacmanConf, overrides: Overrides) -> Self {
        let defaults = Self::default();
        let root_dir = overrides.root_dir
            .or(conf.root_dir)
            .unwrap_or(defaults.root_dir);
        let db_path = overrides.db_path
            .or(conf.db_path)
            .unwrap_or_else(|| if root_dir == Path::new(DEFAULT_ROOT_DIR) {
                defaults.db_path
            } else {
                root_dir.join(DEFAULT_DB_PATH.trim_start_matches('/'))
            });
        Self {
            root_dir,
            db_path,
            config_file: overrides.config_file
                .unwrap_or(defaults.config_file),
            verbose: overrides.verbose,
            debug: overrides.debug,
            repos: conf.repos,
        }
    }

    /// Read the config file and apply the overrides. A missing file is
    /// only fatal if it was asked for explicitly.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let path = overrides.config_file.clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
        let conf = if overrides.config_file.is_none() && ! path.exists() {
            log::warn!("Config file '{}' not found, using defaults",
                path.display());
            PacmanConf::default()
        } else {
            PacmanConf::try_from_path(&path)?
        };
        let config = Self::merge(conf, overrides);
        log::debug!("Using config: {:?}", config);
        Ok(config)
    }

    pub fn local_db_path(&self) -> PathBuf {
        self.db_path.join("local")
    }

    pub fn sync_db_dir(&self) -> PathBuf {
        self.db_path.join("sync")
    }

    pub fn sync_db_path(&self, repo: &str) -> PathBuf {
        self.sync_db_dir().join(format!("{}.db", repo))
    }
}
