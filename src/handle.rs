use crate::{config::Config, db::{Db, Dbs}, package::Package, Result};

/// The local database and the sync databases in priority order, with the
/// cross-database queries built on top of them.
#[derive(Debug, Default)]
pub struct Handle {
    local: Db,
    syncdbs: Vec<Db>,
}

impl Handle {
    pub fn new(local: Db, syncdbs: Vec<Db>) -> Self {
        Self { local, syncdbs }
    }

    /// Load the local DB, and the sync DBs too if `with_sync` is set.
    /// A configured repository without a DB file is skipped with a
    /// warning, as it simply has not been synced yet.
    pub fn try_from_config(config: &Config, with_sync: bool) -> Result<Self> {
        let local = Db::try_from_local_dir(config.local_db_path())?;
        if ! with_sync {
            return Ok(Self::new(local, Vec::new()))
        }
        let mut syncdbs = Vec::new();
        if ! config.repos.is_empty() {
            for repo in config.repos.iter() {
                let path = config.sync_db_path(repo);
                if ! path.exists() {
                    log::warn!("Database file for '{}' does not exist \
                        (expected at '{}')", repo, path.display());
                    continue
                }
                let mut db = Db::try_from_path(&path)?;
                db.name = repo.clone();
                syncdbs.push(db)
            }
        } else if config.sync_db_dir().is_dir() {
            syncdbs = Dbs::try_from_path(config.sync_db_dir())?.into_vec()
        } else {
            log::warn!("No repositories configured and no sync DB dir at \
                '{}'", config.sync_db_dir().display())
        }
        log::info!("Using {} sync DBs", syncdbs.len());
        Ok(Self::new(local, syncdbs))
    }

    /// Every installed package, in catalog order
    pub fn pkgcache(&self) -> &[Package] {
        self.local.packages()
    }

    /// Look up an installed package
    pub fn get_pkg(&self, name: &str) -> Option<&Package> {
        self.local.package(name)
    }

    pub fn syncdbs(&self) -> &[Db] {
        &self.syncdbs
    }

    fn installed_depending_on<'a, F>(&'a self, pkg: &Package, depends: F)
        -> Vec<&'a str>
    where
        F: Fn(&'a Package) -> &'a [crate::Depend],
    {
        self.pkgcache().iter()
            .filter(|other| depends(*other).iter()
                .any(|depend| pkg.satisfies(depend)))
            .map(|other| other.name.as_str())
            .collect()
    }

    /// Names of installed packages with a hard dependency `pkg` fulfils
    pub fn compute_requiredby(&self, pkg: &Package) -> Vec<&str> {
        self.installed_depending_on(pkg, |other| other.depends.as_slice())
    }

    /// Names of installed packages with an optional dependency `pkg`
    /// fulfils
    pub fn compute_optionalfor(&self, pkg: &Package) -> Vec<&str> {
        self.installed_depending_on(pkg, |other| other.optdepends.as_slice())
    }

    /// The sync package newer than `pkg`, if any. Only the first sync DB
    /// carrying the name is considered.
    pub fn sync_newversion(&self, pkg: &Package) -> Option<&Package> {
        let spkg = self.syncdbs.iter().find_map(|db| db.package(&pkg.name))?;
        if crate::vercmp(&spkg.version, &pkg.version).is_gt() {
            log::debug!("'{}' {} has newer version {} in sync DBs",
                pkg.name, pkg.version, spkg.version);
            Some(spkg)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str, version: &str, depends: &[&str]) -> Package {
        Package {
            name: name.into(),
            version: version.into(),
            depends: depends.iter().map(|d| d.parse().unwrap()).collect(),
            ..Default::default()
        }
    }

    fn handle() -> Handle {
        let mut sh = package("bash", "5.2-1", &["glibc"]);
        sh.provides = vec!["sh".parse().unwrap()];
        let mut app = package("app", "1.0-1", &["sh", "glibc>=2.40", "glibc"]);
        app.optdepends = vec!["bash: for scripts".parse().unwrap()];
        let local = Db::from_packages("local", [
            package("glibc", "2.39-1", &[]), sh, app,
            package("zlib", "1.3-1", &[]),
        ]);
        let core = Db::from_packages("core", [
            package("glibc", "2.40-1", &[]),
            package("bash", "5.2-1", &[]),
        ]);
        let extra = Db::from_packages("extra", [
            package("bash", "5.3-1", &[]),
            package("zlib", "1.3.1-1", &[]),
        ]);
        Handle::new(local, vec![core, extra])
    }

    #[test]
    fn test_requiredby() {
        let handle = handle();
        let glibc = handle.get_pkg("glibc").unwrap();
        // app wants glibc twice but is listed once
        assert_eq!(handle.compute_requiredby(glibc), ["bash", "app"]);
        let bash = handle.get_pkg("bash").unwrap();
        assert_eq!(handle.compute_requiredby(bash), ["app"]);
        assert_eq!(handle.compute_optionalfor(bash), ["app"]);
        let app = handle.get_pkg("app").unwrap();
        assert!(handle.compute_requiredby(app).is_empty());
    }

    #[test]
    fn test_newversion_first_db_wins() {
        let handle = handle();
        let glibc = handle.get_pkg("glibc").unwrap();
        assert_eq!(handle.sync_newversion(glibc).unwrap().version, "2.40-1");
        // core has bash at the same version, extra's newer one is shadowed
        let bash = handle.get_pkg("bash").unwrap();
        assert!(handle.sync_newversion(bash).is_none());
        let zlib = handle.get_pkg("zlib").unwrap();
        assert!(handle.sync_newversion(zlib).is_some());
        let app = handle.get_pkg("app").unwrap();
        assert!(handle.sync_newversion(app).is_none());
    }
}
