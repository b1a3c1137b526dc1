//! The detailed `-i` block, laid out like pacman's.

use std::io::{self, Write};

use jiff::{tz::TimeZone, Timestamp};

use crate::{handle::Handle, package::Package};

const LABEL_WIDTH: usize = 16;
const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

fn field<W: Write>(out: &mut W, label: &str, value: &str) -> io::Result<()> {
    writeln!(out, "{:<width$}: {}", label, value, width = LABEL_WIDTH)
}

fn list_field<W, I, S>(out: &mut W, label: &str, values: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: ToString,
{
    let values: Vec<String> = values.into_iter()
        .map(|value| value.to_string())
        .collect();
    field(out, label, &or_none(&values.join("  ")))
}

/// One value per line, continuation lines aligned under the first
fn lines_field<W: Write>(out: &mut W, label: &str, values: &[String])
    -> io::Result<()>
{
    let Some((first, rest)) = values.split_first() else {
        return field(out, label, "None")
    };
    field(out, label, first)?;
    for value in rest {
        writeln!(out, "{:width$}{}", "", value, width = LABEL_WIDTH + 2)?
    }
    Ok(())
}

fn or_none(value: &str) -> String {
    if value.is_empty() { "None".into() } else { value.into() }
}

/// Binary units, scaled while the value stays at or above 2048 of a unit
pub fn humanize_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 2048.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1
    }
    format!("{:.2} {}", value, UNITS[unit])
}

pub fn format_date(seconds: Option<i64>, tz: &TimeZone) -> String {
    let Some(seconds) = seconds else {
        return "None".into()
    };
    match Timestamp::from_second(seconds) {
        Ok(timestamp) => timestamp.to_zoned(tz.clone())
            .strftime("%a %d %b %Y %H:%M:%S %Z").to_string(),
        Err(e) => {
            log::warn!("Timestamp {} out of range: {}", seconds, e);
            seconds.to_string()
        },
    }
}

fn validation(methods: &[String]) -> String {
    if methods.is_empty() {
        return "Unknown".into()
    }
    methods.iter().map(|method| match method.as_str() {
        "none" => "None",
        "md5" => "MD5 Sum",
        "sha256" => "SHA-256 Sum",
        "pgp" => "Signature",
        other => other,
    }).collect::<Vec<_>>().join("  ")
}

/// Print the information block of an installed package. Level 2 and
/// above adds the backup files.
pub fn display_pkginfo<W: Write>(
    out: &mut W, handle: &Handle, pkg: &Package, level: u8, tz: &TimeZone
) -> io::Result<()> {
    field(out, "Name", &pkg.name)?;
    field(out, "Version", &pkg.version)?;
    field(out, "Description", &or_none(&pkg.desc))?;
    field(out, "Architecture", &or_none(&pkg.arch))?;
    field(out, "URL", &or_none(&pkg.url))?;
    list_field(out, "Licenses", &pkg.licenses)?;
    list_field(out, "Groups", &pkg.groups)?;
    list_field(out, "Provides", &pkg.provides)?;
    list_field(out, "Depends On", &pkg.depends)?;
    let optdepends: Vec<String> = pkg.optdepends.iter().map(|optdepend| {
        let installed = handle.pkgcache().iter()
            .any(|other| other.satisfies(optdepend));
        if installed {
            format!("{} [installed]", optdepend)
        } else {
            optdepend.to_string()
        }
    }).collect();
    lines_field(out, "Optional Deps", &optdepends)?;
    list_field(out, "Required By", handle.compute_requiredby(pkg))?;
    list_field(out, "Optional For", handle.compute_optionalfor(pkg))?;
    list_field(out, "Conflicts With", &pkg.conflicts)?;
    list_field(out, "Replaces", &pkg.replaces)?;
    field(out, "Installed Size", &humanize_size(pkg.isize))?;
    field(out, "Packager", &or_none(&pkg.packager))?;
    field(out, "Build Date", &format_date(pkg.builddate, tz))?;
    field(out, "Install Date", &format_date(pkg.installdate, tz))?;
    field(out, "Install Reason", &pkg.reason.to_string())?;
    field(out, "Install Script",
        if pkg.has_scriptlet { "Yes" } else { "No" })?;
    field(out, "Validated By", &validation(&pkg.validation))?;
    if level > 1 {
        let backup: Vec<String> = pkg.backup.iter()
            .map(|backup| format!("/{}", backup.path))
            .collect();
        lines_field(out, "Backup Files", &backup)?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::Db, package::{Backup, Reason}};

    fn handle() -> Handle {
        let foo = Package {
            name: "foo".into(),
            version: "1.0-1".into(),
            desc: "The foo tool".into(),
            arch: "x86_64".into(),
            isize: 3 * 1024 * 1024,
            builddate: Some(0),
            reason: Reason::Dependency,
            licenses: vec!["MIT".into(), "BSD".into()],
            depends: vec!["glibc>=2".parse().unwrap()],
            optdepends: vec![
                "bar: for bar support".parse().unwrap(),
                "baz: for baz".parse().unwrap(),
            ],
            validation: vec!["pgp".into()],
            backup: vec![Backup { path: "etc/foo.conf".into(), md5: String::new() }],
            ..Default::default()
        };
        let bar = Package {
            name: "bar".into(),
            version: "2.0-1".into(),
            depends: vec!["foo".parse().unwrap()],
            ..Default::default()
        };
        Handle::new(Db::from_packages("local", [foo, bar]), Vec::new())
    }

    fn render(level: u8) -> String {
        let handle = handle();
        let mut out = Vec::new();
        display_pkginfo(&mut out, &handle, handle.get_pkg("foo").unwrap(),
            level, &TimeZone::UTC).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_pkginfo() {
        let text = render(1);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Name            : foo");
        assert_eq!(lines[1], "Version         : 1.0-1");
        assert!(lines.contains(&"Licenses        : MIT  BSD"));
        assert!(lines.contains(&"Groups          : None"));
        assert!(lines.contains(&"Depends On      : glibc>=2"));
        assert!(lines.contains(&"Optional Deps   : bar: for bar support [installed]"));
        assert!(lines.contains(&"                  baz: for baz"));
        assert!(lines.contains(&"Required By     : bar"));
        assert!(lines.contains(&"Installed Size  : 3.00 MiB"));
        assert!(lines.contains(&"Build Date      : Thu 01 Jan 1970 00:00:00 UTC"));
        assert!(lines.contains(&"Install Date    : None"));
        assert!(lines.contains(&
            "Install Reason  : Installed as a dependency for another package"));
        assert!(lines.contains(&"Validated By    : Signature"));
        assert!(!text.contains("Backup Files"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_pkginfo_level2() {
        assert!(render(2).contains("Backup Files    : /etc/foo.conf\n"));
    }

    #[test]
    fn test_humanize_size() {
        assert_eq!(humanize_size(0), "0.00 B");
        assert_eq!(humanize_size(2047), "2047.00 B");
        assert_eq!(humanize_size(2048), "2.00 KiB");
        assert_eq!(humanize_size(1536 * 1024), "1536.00 KiB");
    }
}
