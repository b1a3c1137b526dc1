use std::{borrow::Cow, cmp::Ordering, fmt::Display, io::Read, str::FromStr};

use base64::Engine;

use crate::{buffer_try_from_reader, version::vercmp, Error, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    #[default]
    Explicit,
    Dependency,
}

impl Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::Explicit => write!(f, "Explicitly installed"),
            Reason::Dependency =>
                write!(f, "Installed as a dependency for another package"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DependMod {
    #[default]
    Any,
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

impl DependMod {
    fn as_str(&self) -> &'static str {
        match self {
            DependMod::Any => "",
            DependMod::Eq => "=",
            DependMod::Ge => ">=",
            DependMod::Le => "<=",
            DependMod::Gt => ">",
            DependMod::Lt => "<",
        }
    }

    /// Whether `version` fulfils `self` against the wanted `other`
    pub fn accepts(&self, version: &str, other: &str) -> bool {
        if *self == DependMod::Any {
            return true
        }
        let order = vercmp(version, other);
        match self {
            DependMod::Any => true,
            DependMod::Eq => order == Ordering::Equal,
            DependMod::Ge => order != Ordering::Less,
            DependMod::Le => order != Ordering::Greater,
            DependMod::Gt => order == Ordering::Greater,
            DependMod::Lt => order == Ordering::Less,
        }
    }
}

/// A dependency expression like `glibc>=2.38`, or for optional
/// dependencies `python-foo: for the foo backend`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Depend {
    pub name: String,
    pub depmod: DependMod,
    pub version: String,
    pub desc: Option<String>,
}

impl FromStr for Depend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (expr, desc) = match s.split_once(": ") {
            Some((expr, desc)) => (expr, Some(desc.to_string())),
            None => (s, None),
        };
        let (name, depmod, version) =
            match expr.find(|c| matches!(c, '<' | '>' | '=')) {
                Some(pos) => {
                    let (name, rest) = expr.split_at(pos);
                    let (depmod, len) =
                        if rest.starts_with(">=") { (DependMod::Ge, 2) }
                        else if rest.starts_with("<=") { (DependMod::Le, 2) }
                        else if rest.starts_with('>') { (DependMod::Gt, 1) }
                        else if rest.starts_with('<') { (DependMod::Lt, 1) }
                        else { (DependMod::Eq, 1) };
                    (name, depmod, &rest[len..])
                },
                None => (expr, DependMod::Any, ""),
            };
        if name.is_empty() {
            log::error!("Dependency expression '{}' has no name", s);
            return Err(Error::BrokenPackage(s.to_string()))
        }
        Ok(Self {
            name: name.to_string(),
            depmod,
            version: version.to_string(),
            desc,
        })
    }
}

impl Display for Depend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.name, self.depmod.as_str(), self.version)?;
        if let Some(desc) = &self.desc {
            write!(f, ": {}", desc)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Backup {
    pub path: String,
    pub md5: String,
}

#[derive(Debug, Default, Clone)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub base: String,
    pub desc: String,
    pub url: String,
    pub arch: String,
    pub packager: String,
    pub builddate: Option<i64>,
    pub installdate: Option<i64>,
    /// Installed size in bytes
    pub isize: u64,
    pub reason: Reason,
    pub licenses: Vec<String>,
    pub groups: Vec<String>,
    pub validation: Vec<String>,
    pub depends: Vec<Depend>,
    pub optdepends: Vec<Depend>,
    pub conflicts: Vec<Depend>,
    pub provides: Vec<Depend>,
    pub replaces: Vec<Depend>,
    /// Paths relative to the install root, directories end with `/`
    pub files: Vec<String>,
    pub backup: Vec<Backup>,
    pub has_scriptlet: bool,
    // sync only
    pub filename: String,
    pub csize: u64,
    pub md5sum: Option<[u8; 16]>,
    pub sha256sum: Option<[u8; 32]>,
    pub pgpsig: Vec<u8>,
}

/// Split the `%KEY%` sectioned text used by both `desc` and `files`.
/// A section runs from its header line to the next empty line.
fn sections(text: &str) -> Vec<(&str, Vec<&str>)> {
    let mut sections = Vec::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(key) = line.strip_prefix('%')
            .and_then(|line| line.strip_suffix('%')) else
        {
            if ! line.is_empty() {
                log::debug!("Skipping stray line '{}'", line);
            }
            continue
        };
        let values = lines.by_ref()
            .take_while(|line| ! line.is_empty())
            .collect();
        sections.push((key, values));
    }
    sections
}

/// pacman stores file names as raw bytes, so invalid UTF-8 is replaced
/// rather than rejected
fn text_from_buffer(buffer: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(buffer);
    if let Cow::Owned(_) = text {
        log::warn!("Package metadata has invalid UTF-8, replaced lossily");
    }
    text
}

fn single<'a>(key: &str, values: &[&'a str]) -> Result<&'a str> {
    match values {
        [value] => Ok(*value),
        _ => {
            log::error!("Section %{}% expects one value, got {}",
                key, values.len());
            Err(Error::BrokenPackage(key.to_string()))
        },
    }
}

fn number<T: FromStr>(key: &str, values: &[&str]) -> Result<T> {
    let value = single(key, values)?;
    value.parse().map_err(|_| {
        log::error!("Section %{}% has non-numeric value '{}'", key, value);
        Error::BrokenPackage(key.to_string())
    })
}

fn hash<const N: usize>(key: &str, values: &[&str]) -> Result<[u8; N]> {
    let value = single(key, values)?;
    let mut hash = [0; N];
    match hex::decode_to_slice(value, &mut hash) {
        Ok(_) => Ok(hash),
        Err(e) => {
            log::error!("Section %{}% has bad hex '{}': {}", key, value, e);
            Err(Error::BrokenPackage(key.to_string()))
        },
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn depends(values: &[&str]) -> Result<Vec<Depend>> {
    values.iter().map(|value| value.parse()).collect()
}

impl Package {
    /// Parse a `desc` entry of either a local or a sync database
    pub fn try_from_desc(buffer: &[u8]) -> Result<Self> {
        let mut package = Self::default();
        package.merge_buffer(buffer)?;
        package.check()?;
        Ok(package)
    }

    /// A usable entry needs at least a name and a version
    pub(crate) fn check(&self) -> Result<()> {
        if self.name.is_empty() || self.version.is_empty() {
            log::error!("Package entry '{}' lacks %NAME% or %VERSION%",
                self.name);
            return Err(Error::BrokenPackage(self.name.clone()))
        }
        Ok(())
    }

    pub(crate) fn merge_reader<R: Read>(&mut self, reader: R) -> Result<()> {
        self.merge_buffer(&buffer_try_from_reader(reader)?)
    }

    /// Merge another sectioned entry (`files`, or the legacy `depends`
    /// of old sync databases) into this package
    pub fn merge_buffer(&mut self, buffer: &[u8]) -> Result<()> {
        for (key, values) in sections(&text_from_buffer(buffer)) {
            self.merge_section(key, &values)?
        }
        Ok(())
    }

    fn merge_section(&mut self, key: &str, values: &[&str]) -> Result<()> {
        match key {
            "NAME" => self.name = single(key, values)?.to_string(),
            "VERSION" => self.version = single(key, values)?.to_string(),
            "BASE" => self.base = single(key, values)?.to_string(),
            "DESC" => self.desc = values.join(" "),
            "URL" => self.url = single(key, values)?.to_string(),
            "ARCH" => self.arch = single(key, values)?.to_string(),
            "PACKAGER" => self.packager = single(key, values)?.to_string(),
            "BUILDDATE" => self.builddate = Some(number(key, values)?),
            "INSTALLDATE" => self.installdate = Some(number(key, values)?),
            "SIZE" | "ISIZE" => self.isize = number(key, values)?,
            "CSIZE" => self.csize = number(key, values)?,
            "REASON" => self.reason = match number::<u8>(key, values)? {
                0 => Reason::Explicit,
                _ => Reason::Dependency,
            },
            "LICENSE" => self.licenses = strings(values),
            "GROUPS" => self.groups = strings(values),
            "VALIDATION" => self.validation = strings(values),
            "DEPENDS" => self.depends = depends(values)?,
            "OPTDEPENDS" => self.optdepends = depends(values)?,
            "CONFLICTS" => self.conflicts = depends(values)?,
            "PROVIDES" => self.provides = depends(values)?,
            "REPLACES" => self.replaces = depends(values)?,
            "FILES" => self.files = strings(values),
            "BACKUP" => self.backup = values.iter().map(|value| {
                let (path, md5) = value.split_once('\t')
                    .unwrap_or((value, ""));
                Backup { path: path.to_string(), md5: md5.to_string() }
            }).collect(),
            "FILENAME" => self.filename = single(key, values)?.to_string(),
            "MD5SUM" => self.md5sum = Some(hash(key, values)?),
            "SHA256SUM" => self.sha256sum = Some(hash(key, values)?),
            "PGPSIG" => {
                let value = single(key, values)?;
                self.pgpsig = base64::engine::general_purpose::STANDARD
                    .decode(value).map_err(|e| {
                        log::error!("Bad base64 in %PGPSIG% of '{}': {}",
                            self.name, e);
                        Error::BrokenPackage(self.name.clone())
                    })?
            },
            _ => log::debug!("Ignoring section %{}% of '{}'", key, self.name),
        }
        Ok(())
    }

    /// Whether this package can fulfil `depend`, either by itself or by
    /// one of its versioned provides
    pub fn satisfies(&self, depend: &Depend) -> bool {
        if self.name == depend.name &&
            depend.depmod.accepts(&self.version, &depend.version)
        {
            return true
        }
        self.provides.iter().any(|provide| {
            provide.name == depend.name && (
                depend.depmod == DependMod::Any ||
                (provide.depmod == DependMod::Eq &&
                    depend.depmod.accepts(&provide.version, &depend.version))
            )
        })
    }
}
