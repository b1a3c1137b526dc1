use std::{fmt::Display, fs::File, io::Read, path::Path};

pub mod compress;
pub mod config;
pub mod db;
pub mod handle;
pub mod info;
pub mod package;
pub mod query;
pub mod version;

pub use config::Config;
pub use db::{Db, Dbs};
pub use handle::Handle;
pub use package::{Depend, DependMod, Package, Reason};
pub use query::{query, QueryOptions};
pub use version::vercmp;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    BrokenDB,
    DuplicatedDB,
    BrokenPackage(String),
    BrokenConfig(String),
    UnsupportedCompression(&'static str),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::BrokenDB => write!(f, "broken database"),
            Error::DuplicatedDB => write!(f, "duplicated database"),
            Error::BrokenPackage(entry) =>
                write!(f, "broken package entry '{}'", entry),
            Error::BrokenConfig(reason) =>
                write!(f, "broken config: {}", reason),
            Error::UnsupportedCompression(format) =>
                write!(f, "unsupported compression: {}", format),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn buffer_try_from_reader<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match reader.read_to_end(&mut buffer) {
        Ok(_) => Ok(buffer),
        Err(e) => {
            log::error!("Failed to read file into buffer: {}", e);
            Err(e.into())
        },
    }
}

pub(crate) fn file_try_from_path<P: AsRef<Path>>(path: P) -> Result<File> {
    File::open(&path).map_err(|e|{
        log::error!("Failed to open file from path '{}': {}",
            path.as_ref().display(), e);
        e.into()
    })
}

pub(crate) fn buffer_try_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    buffer_try_from_reader(&mut file_try_from_path(path)?)
}
