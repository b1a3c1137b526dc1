use std::{collections::HashMap, fs::read_dir, path::Path};

use crate::{
    buffer_try_from_path, compress::{is_buffer_tar, Compression},
    package::Package, Error, Result,
};

/// An in-memory package database, either the local one (installed
/// packages) or a sync one (a repository snapshot).
#[derive(Debug, Default)]
pub struct Db {
    pub name: String,
    packages: Vec<Package>,
    index: HashMap<String, usize>,
}

/// The files inside a package entry we care about
const ENTRY_FILES: [&[u8]; 3] = [b"desc", b"depends", b"files"];

impl Db {
    /// Build a database from already parsed packages, keeping their order.
    /// A later package with an already seen name is dropped.
    pub fn from_packages<S: Into<String>>(
        name: S, packages: impl IntoIterator<Item = Package>
    ) -> Self {
        let mut db = Self { name: name.into(), ..Default::default() };
        for package in packages {
            db.push(package)
        }
        db
    }

    fn push(&mut self, package: Package) {
        if self.index.contains_key(&package.name) {
            log::warn!("Duplicated package '{}' in DB '{}', ignored",
                package.name, self.name);
            return
        }
        self.index.insert(package.name.clone(), self.packages.len());
        self.packages.push(package)
    }

    /// All packages, in catalog order
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.index.get(name).map(|id| &self.packages[*id])
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    fn try_from_buffer_tar(name: &str, buffer: &[u8]) -> Result<Self> {
        let mut archive = tar::Archive::new(buffer);
        let entries = match archive.entries() {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Failed to parse tar entries: {}", e);
                return Err(Error::BrokenDB)
            },
        };
        // Entries of one package may come in any order, so collect them
        // per directory first
        let mut dirs: Vec<Package> = Vec::new();
        let mut dir_ids: HashMap<Vec<u8>, usize> = HashMap::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::error!("Failed to parse tar entry : {}", e);
                    return Err(Error::BrokenDB)
                },
            };
            let path_bytes = entry.path_bytes().into_owned();
            let Some(split) = path_bytes.iter().rposition(|c| *c == b'/')
            else {
                continue
            };
            let (dir, file) = (&path_bytes[..split], &path_bytes[split + 1..]);
            if dir.is_empty() || ! ENTRY_FILES.contains(&file) {
                continue
            }
            let id = *dir_ids.entry(dir.to_vec()).or_insert_with(|| {
                dirs.push(Package::default());
                dirs.len() - 1
            });
            if let Err(e) = dirs[id].merge_reader(entry) {
                log::error!("Failed to parse entry '{}' of DB '{}'",
                    String::from_utf8_lossy(&path_bytes), name);
                return Err(e)
            }
        }
        for package in dirs.iter() {
            package.check()?
        }
        let db = Self::from_packages(name, dirs);
        log::info!("Loaded {} packages from DB '{}'", db.len(), name);
        Ok(db)
    }

    fn try_from_buffer_any(name: &str, buffer: &[u8]) -> Result<Self> {
        // repo-add writes a zero-byte file for an empty repo
        if buffer.is_empty() {
            log::warn!("DB '{}' is an empty file, treating it as empty", name);
            return Ok(Self { name: name.into(), ..Default::default() })
        }
        let Some(compression) = Compression::from_magic(buffer) else {
            log::error!("Failed to parse buffer of DB '{}' as either plain \
                tar or compressed tar", name);
            return Err(Error::BrokenDB)
        };
        log::debug!("DB '{}' has compression {}", name, compression.name());
        let decoded = compression.decompress(buffer)?;
        if compression != Compression::None && ! is_buffer_tar(&decoded)
            && ! decoded.iter().all(|c| *c == 0)
        {
            log::warn!("Decompressed DB '{}' does not look like tar, \
                trying anyway", name);
        }
        Self::try_from_buffer_tar(name, &decoded)
    }

    /// Read a sync DB file, e.g. `/var/lib/pacman/sync/core.db`. The DB is
    /// named after the file stem.
    pub fn try_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path.file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        let name = name.strip_suffix(".db").unwrap_or(&name);
        log::debug!("Reading sync DB '{}' from '{}'", name, path.display());
        Self::try_from_buffer_any(name, &buffer_try_from_path(path)?)
    }

    /// Read the local DB directory, commonly `/var/lib/pacman/local`.
    /// Entries are taken in directory name order.
    pub fn try_from_local_dir<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let dir = match read_dir(path) {
            Ok(dir) => dir,
            Err(e) => {
                log::error!("Failed to open local DB dir '{}' to scan: {}",
                    path.display(), e);
                return Err(e.into())
            },
        };
        let mut entries = Vec::new();
        for entry in dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::error!("Failed to read entry from local DB dir \
                        '{}': {}", path.display(), e);
                    return Err(e.into())
                },
            };
            match entry.file_type() {
                Ok(file_type) => if ! file_type.is_dir() {
                    continue
                },
                Err(e) => {
                    log::error!("Failed to read file type of entry from \
                        local DB dir '{}': {}", path.display(), e);
                    return Err(e.into())
                },
            }
            entries.push(entry.path())
        }
        entries.sort_unstable();
        let mut db = Self { name: "local".into(), ..Default::default() };
        for entry in entries {
            let desc = entry.join("desc");
            if ! desc.exists() {
                log::warn!("Local DB entry '{}' has no desc, skipped",
                    entry.display());
                continue
            }
            let mut package = Package::try_from_desc(
                &buffer_try_from_path(&desc)?)?;
            let files = entry.join("files");
            if files.exists() {
                package.merge_buffer(&buffer_try_from_path(&files)?)?
            }
            package.has_scriptlet = entry.join("install").exists();
            db.push(package)
        }
        log::info!("Loaded {} installed packages from '{}'",
            db.len(), path.display());
        Ok(db)
    }
}

#[derive(Default)]
pub struct Dbs {
    dbs: Vec<Db>,
}

impl Dbs {
    /// Try to read DBs from a folder, commonly `/var/lib/pacman/sync`,
    /// ordered by DB name
    pub fn try_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let dir = match read_dir(path) {
            Ok(dir) => dir,
            Err(e) => {
                log::error!("Failed to open DBs dir '{}' to scan: {}",
                    path.display(), e);
                return Err(e.into())
            },
        };
        let mut dbs = Self::default();
        for entry in dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::error!("Failed to read entry from DB dir '{}': {}",
                        path.display(), e);
                    return Err(e.into())
                },
            };
            match entry.file_type() {
                Ok(file_type) => if file_type.is_dir() {
                    continue
                },
                Err(e) => {
                    log::error!("Failed to read file type of entry from DB dir \
                        '{}': {}", path.display(), e);
                    return Err(e.into())
                },
            }
            let file_name = entry.file_name();
            if ! file_name.as_encoded_bytes().ends_with(b".db") {
                continue
            }
            log::info!("Adding DB {}", file_name.to_string_lossy());
            dbs.add(Db::try_from_path(entry.path())?)?
        }
        dbs.dbs.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(dbs)
    }

    pub fn add(&mut self, db: Db) -> Result<()> {
        if self.dbs.iter().any(|existing| existing.name == db.name) {
            log::error!("Duplicated DB '{}'", db.name);
            return Err(Error::DuplicatedDB)
        }
        self.dbs.push(db);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Db> {
        self.dbs.iter()
    }

    pub fn into_vec(self) -> Vec<Db> {
        self.dbs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str, version: &str) -> Package {
        Package {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    fn tar_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in entries {
            let mut header = tar::Header::new_ustar();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_from_packages() {
        let db = Db::from_packages("core", [
            package("b", "1"), package("a", "1"), package("b", "2")]);
        assert_eq!(db.len(), 2);
        assert_eq!(db.packages()[0].name, "b");
        assert_eq!(db.package("b").unwrap().version, "1");
        assert!(db.package("c").is_none());
    }

    #[test]
    fn test_plain_tar() {
        let buffer = tar_of(&[
            ("foo-1.0-1/depends", "%DEPENDS%\nbar\n\n"),
            ("foo-1.0-1/desc", "%NAME%\nfoo\n\n%VERSION%\n1.0-1\n\n"),
            ("bar-2.0-1/desc", "%NAME%\nbar\n\n%VERSION%\n2.0-1\n\n"),
            ("bar-2.0-1/mtree", "garbage"),
        ]);
        let db = Db::try_from_buffer_any("core", &buffer).unwrap();
        assert_eq!(db.name, "core");
        assert_eq!(db.len(), 2);
        let foo = db.package("foo").unwrap();
        assert_eq!(foo.version, "1.0-1");
        assert_eq!(foo.depends[0].name, "bar");
    }

    #[cfg(feature = "db_gz")]
    #[test]
    fn test_gzip_tar() {
        use std::io::Write;
        let mut encoder = flate2::write::GzEncoder::new(
            Vec::new(), flate2::Compression::default());
        encoder.write_all(&tar_of(&[
            ("foo-1.0-1/desc", "%NAME%\nfoo\n\n%VERSION%\n1.0-1\n\n"),
        ])).unwrap();
        let db = Db::try_from_buffer_any("extra", &encoder.finish().unwrap())
            .unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.package("foo").unwrap().version, "1.0-1");
    }

    #[test]
    fn test_compressed_garbage_is_broken() {
        let mut buffer = vec![0x1f, 0x8b, 0x08, 0x00];
        buffer.extend_from_slice(b"definitely not deflate");
        assert!(Db::try_from_buffer_any("junk", &buffer).is_err());
    }

    #[test]
    fn test_entry_without_desc() {
        let buffer = tar_of(&[("foo-1.0-1/depends", "%DEPENDS%\nbar\n\n")]);
        assert!(Db::try_from_buffer_any("core", &buffer).is_err());
    }

    #[test]
    fn test_empty_and_garbage() {
        assert!(Db::try_from_buffer_any("empty", b"").unwrap().is_empty());
        assert!(matches!(Db::try_from_buffer_any("junk", b"not a db"),
            Err(Error::BrokenDB)));
    }

    #[test]
    fn test_dbs_duplicated() {
        let mut dbs = Dbs::default();
        dbs.add(Db::from_packages("core", [])).unwrap();
        assert!(matches!(dbs.add(Db::from_packages("core", [])),
            Err(Error::DuplicatedDB)));
        assert_eq!(dbs.iter().count(), 1);
    }
}
