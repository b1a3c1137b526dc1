//! Query installed packages: resolve the targets, filter them, print them.

use std::{collections::HashSet, io::{self, Write}};

use jiff::tz::TimeZone;

use crate::{
    handle::Handle, info::display_pkginfo,
    package::{Package, Reason},
};

/// Which packages to show and how. Filters are exclusion criteria that
/// all have to pass; display flags pick one of the output forms.
#[derive(Debug, Default, Clone)]
pub struct QueryOptions {
    /// Only packages installed as dependencies
    pub deps: bool,
    /// Only explicitly installed packages
    pub explicit: bool,
    /// Detail level of the information block, 0 for none
    pub info: u8,
    pub listfiles: bool,
    /// Only packages found in no sync DB
    pub foreign: bool,
    pub quiet: bool,
    /// Only packages no installed package depends on
    pub unrequired: bool,
    /// Only packages with a newer version in the sync DBs
    pub upgrades: bool,
    /// Packages to show, all installed ones when empty
    pub pkgnames: Vec<String>,
}

impl QueryOptions {
    /// Whether any filter needs the sync DBs loaded
    pub fn needs_syncdbs(&self) -> bool {
        self.foreign || self.upgrades
    }
}

/// Names of every package in every sync DB
pub fn sync_pkgnames(handle: &Handle) -> HashSet<&str> {
    handle.syncdbs().iter()
        .flat_map(|db| db.packages())
        .map(|pkg| pkg.name.as_str())
        .collect()
}

fn keep(
    handle: &Handle, pkg: &Package, options: &QueryOptions,
    syncpkgs: Option<&HashSet<&str>>
) -> bool {
    if options.deps && pkg.reason == Reason::Explicit {
        return false
    }
    if options.explicit && pkg.reason == Reason::Dependency {
        return false
    }
    if options.unrequired && ! handle.compute_requiredby(pkg).is_empty() {
        return false
    }
    if let Some(syncpkgs) = syncpkgs {
        if syncpkgs.contains(pkg.name.as_str()) {
            return false
        }
    }
    if options.upgrades && handle.sync_newversion(pkg).is_none() {
        return false
    }
    true
}

/// Drop every package some active filter excludes, keeping the order.
/// The sync name set for `foreign` is built once here, not per package.
pub fn filter_pkglist<'a>(
    handle: &Handle, pkglist: Vec<&'a Package>, options: &QueryOptions
) -> Vec<&'a Package> {
    let syncpkgs = options.foreign.then(|| sync_pkgnames(handle));
    let total = pkglist.len();
    let result: Vec<_> = pkglist.into_iter()
        .filter(|pkg| keep(handle, pkg, options, syncpkgs.as_ref()))
        .collect();
    log::debug!("{} of {} packages passed the filters", result.len(), total);
    result
}

/// Everything the engine needs besides the options: the databases, loaded
/// from the process-wide settings by [`Handle::try_from_config`].
pub struct Engine<'a> {
    handle: &'a Handle,
    tz: TimeZone,
}

impl<'a> Engine<'a> {
    pub fn new(handle: &'a Handle) -> Self {
        Self { handle, tz: TimeZone::system() }
    }

    /// Dates in information blocks are shown in `tz` instead of the
    /// system time zone
    pub fn with_time_zone(mut self, tz: TimeZone) -> Self {
        self.tz = tz;
        self
    }

    /// The named packages in the given order, or all installed ones if
    /// none are named. Unknown names are reported to `err` and make the
    /// second value `false`.
    pub fn resolve<E: Write>(&self, pkgnames: &[String], err: &mut E)
        -> io::Result<(Vec<&'a Package>, bool)>
    {
        if pkgnames.is_empty() {
            return Ok((self.handle.pkgcache().iter().collect(), true))
        }
        let mut found_all = true;
        let mut pkglist = Vec::with_capacity(pkgnames.len());
        for pkgname in pkgnames {
            match self.handle.get_pkg(pkgname) {
                Some(pkg) => pkglist.push(pkg),
                None => {
                    writeln!(err, "error: package \"{}\" not found", pkgname)?;
                    found_all = false
                },
            }
        }
        Ok((pkglist, found_all))
    }

    /// Print one package: the information block if asked for, else its
    /// files, else its name and version
    pub fn display_pkg<W: Write>(
        &self, out: &mut W, pkg: &Package, options: &QueryOptions
    ) -> io::Result<()> {
        if options.info > 0 {
            return display_pkginfo(out, self.handle, pkg, options.info, &self.tz)
        }
        if options.listfiles {
            // Always shown from `/`, whatever root the DB belongs to
            for file in pkg.files.iter() {
                if options.quiet {
                    writeln!(out, "/{}", file)?
                } else {
                    writeln!(out, "{} /{}", pkg.name, file)?
                }
            }
            return Ok(())
        }
        if options.quiet {
            writeln!(out, "{}", pkg.name)
        } else {
            writeln!(out, "{} {}", pkg.name, pkg.version)
        }
    }

    /// Run the whole query. The status is 1 if a named package was not
    /// found, 0 otherwise; an empty result is not a failure.
    pub fn run<W: Write, E: Write>(
        &self, options: &QueryOptions, out: &mut W, err: &mut E
    ) -> io::Result<u8> {
        let (pkglist, found_all) = self.resolve(&options.pkgnames, err)?;
        for pkg in filter_pkglist(self.handle, pkglist, options) {
            self.display_pkg(out, pkg, options)?
        }
        Ok(if found_all { 0 } else { 1 })
    }
}

/// Run a query with the system time zone, see [`Engine::run`]
pub fn query<W: Write, E: Write>(
    handle: &Handle, options: &QueryOptions, out: &mut W, err: &mut E
) -> io::Result<u8> {
    Engine::new(handle).run(options, out, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;

    fn package(name: &str, version: &str, reason: Reason, depends: &[&str])
        -> Package
    {
        Package {
            name: name.into(),
            version: version.into(),
            reason,
            depends: depends.iter().map(|d| d.parse().unwrap()).collect(),
            ..Default::default()
        }
    }

    /// foo: explicit, in core, outdated
    /// bar: dependency of foo, in core, current
    /// baz: explicit, foreign
    /// qux: dependency, foreign, nothing needs it
    fn handle() -> Handle {
        let mut foo = package("foo", "1.0", Reason::Explicit, &["bar"]);
        foo.files = vec!["usr/bin/foo".into(), "etc/foo.conf".into()];
        let local = Db::from_packages("local", [
            foo,
            package("bar", "2.0", Reason::Dependency, &[]),
            package("baz", "0.1", Reason::Explicit, &[]),
            package("qux", "3.0", Reason::Dependency, &[]),
        ]);
        let core = Db::from_packages("core", [
            package("foo", "1.1", Reason::Explicit, &[]),
            package("bar", "2.0", Reason::Explicit, &[]),
        ]);
        Handle::new(local, vec![core])
    }

    fn run(options: QueryOptions) -> (String, String, u8) {
        let handle = handle();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let status = Engine::new(&handle)
            .with_time_zone(TimeZone::UTC)
            .run(&options, &mut out, &mut err)
            .unwrap();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap(), status)
    }

    fn names(options: QueryOptions) -> Vec<String> {
        run(QueryOptions { quiet: true, ..options }).0
            .lines().map(String::from).collect()
    }

    #[test]
    fn test_default_lists_all() {
        let (out, err, status) = run(QueryOptions::default());
        assert_eq!(out, "foo 1.0\nbar 2.0\nbaz 0.1\nqux 3.0\n");
        assert!(err.is_empty());
        assert_eq!(status, 0);
    }

    #[test]
    fn test_quiet() {
        assert_eq!(names(QueryOptions::default()), ["foo", "bar", "baz", "qux"]);
    }

    #[test]
    fn test_filters() {
        assert_eq!(names(QueryOptions { deps: true, ..Default::default() }),
            ["bar", "qux"]);
        assert_eq!(names(QueryOptions { explicit: true, ..Default::default() }),
            ["foo", "baz"]);
        assert_eq!(names(QueryOptions { unrequired: true, ..Default::default() }),
            ["foo", "baz", "qux"]);
        assert_eq!(names(QueryOptions { foreign: true, ..Default::default() }),
            ["baz", "qux"]);
        assert_eq!(names(QueryOptions { upgrades: true, ..Default::default() }),
            ["foo"]);
    }

    #[test]
    fn test_filters_combine() {
        assert_eq!(names(QueryOptions {
            deps: true, foreign: true, ..Default::default()
        }), ["qux"]);
        assert_eq!(names(QueryOptions {
            deps: true, unrequired: true, ..Default::default()
        }), ["qux"]);
        assert!(names(QueryOptions {
            deps: true, explicit: true, ..Default::default()
        }).is_empty());
        assert!(names(QueryOptions {
            foreign: true, upgrades: true, ..Default::default()
        }).is_empty());
    }

    #[test]
    fn test_named_with_missing() {
        let (out, err, status) = run(QueryOptions {
            pkgnames: vec!["baz".into(), "missing".into(), "foo".into()],
            ..Default::default()
        });
        assert_eq!(out, "baz 0.1\nfoo 1.0\n");
        assert_eq!(err, "error: package \"missing\" not found\n");
        assert_eq!(status, 1);
    }

    #[test]
    fn test_named_filtered_empty_is_success() {
        let (out, err, status) = run(QueryOptions {
            pkgnames: vec!["bar".into()],
            explicit: true,
            ..Default::default()
        });
        assert!(out.is_empty());
        assert!(err.is_empty());
        assert_eq!(status, 0);
    }

    #[test]
    fn test_listfiles() {
        let options = QueryOptions {
            listfiles: true,
            pkgnames: vec!["foo".into(), "bar".into()],
            ..Default::default()
        };
        assert_eq!(run(options.clone()).0, "foo /usr/bin/foo\nfoo /etc/foo.conf\n");
        assert_eq!(run(QueryOptions { quiet: true, ..options }).0,
            "/usr/bin/foo\n/etc/foo.conf\n");
    }

    #[test]
    fn test_listfiles_keeps_dirs() {
        let handle = handle();
        let pkg = Package {
            name: "foo".into(),
            files: vec!["usr/".into(), "usr/bin/".into(), "usr/bin/foo".into()],
            ..Default::default()
        };
        let mut out = Vec::new();
        Engine::new(&handle)
            .display_pkg(&mut out, &pkg,
                &QueryOptions { listfiles: true, quiet: true, ..Default::default() })
            .unwrap();
        assert_eq!(out, b"/usr/\n/usr/bin/\n/usr/bin/foo\n");
    }

    #[test]
    fn test_info_wins_over_listfiles() {
        let (out, _, _) = run(QueryOptions {
            info: 1,
            listfiles: true,
            pkgnames: vec!["foo".into()],
            ..Default::default()
        });
        assert!(out.starts_with("Name            : foo\n"));
        assert!(!out.contains("/usr/bin/foo"));
    }

    #[test]
    fn test_sync_pkgnames() {
        let handle = handle();
        let names = sync_pkgnames(&handle);
        assert_eq!(names.len(), 2);
        assert!(names.contains("foo") && names.contains("bar"));
    }
}
