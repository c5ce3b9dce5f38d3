//! Class name discovery under a namespace root
//!
//! A namespace root such as `whomine.msdecor` names a subtree of classes. The
//! [`ClassScanner`] asks a [`ClassSource`] for every fully-qualified class
//! name below that root. Sources enumerate in parallel into one shared
//! collector and the scanner returns the names sorted, so the result does not
//! depend on thread scheduling.

use crate::config::HostConfig;
use crate::plugin::component::ComponentTable;
use dashmap::DashSet;
use rayon::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// Extension of compiled unit files when none is configured
pub const DEFAULT_UNIT_EXTENSION: &str = "class";

/// Scan errors
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Namespace {namespace} does not exist in {location}")]
    RootMissing { namespace: String, location: String },

    #[error("Namespace {namespace} could not be read from {location}: {source}")]
    RootUnreadable {
        namespace: String,
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive {path} could not be opened: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Sub-namespace {namespace} could not be read: {message}")]
    SubNamespace { namespace: String, message: String },

    #[error("Invalid namespace root '{0}'")]
    InvalidRoot(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// A place class names can be enumerated from.
///
/// Implementations insert names into `collector` and may do so from several
/// threads. Failure to read a nested sub-namespace must be logged and skipped;
/// only failure to read the root itself is returned.
pub trait ClassSource: Send + Sync {
    /// Human-readable location used in logs and errors
    fn location(&self) -> String;

    /// Collect every class name under `root` into `collector`
    fn collect(&self, root: &str, collector: &DashSet<String>) -> Result<()>;
}

/// Whether `segment` is a valid identifier (`module-info` is not)
fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Map a `/`-separated unit path to a class name, or `None` if it is not a unit
fn class_name_of(path: &str, extension: &str) -> Option<String> {
    let stem = path.strip_suffix(extension)?.strip_suffix('.')?;
    let mut segments = Vec::new();
    for segment in stem.split('/') {
        if !is_identifier(segment) {
            return None;
        }
        segments.push(segment);
    }
    Some(segments.join("."))
}

fn warn_partial(error: &ScanError) {
    tracing::warn!("{}, continuing with a partial class list", error);
}

/// Exploded tree of unit files, e.g. `classes/whomine/msdecor/Foo.class`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    base: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            extension: DEFAULT_UNIT_EXTENSION.to_string(),
        }
    }

    /// Directory source using the host's configured unit extension
    pub fn for_host(base: impl Into<PathBuf>, config: &HostConfig) -> Self {
        Self::new(base).with_extension(config.unit_extension.as_str())
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn relative_unit(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base).ok()?;
        let joined = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?
            .join("/");
        class_name_of(&joined, &self.extension)
    }

    /// Collect every unit below `dir`. Entries that cannot be read are
    /// logged, skipped and returned.
    fn walk_sub_namespace(&self, dir: &Path, collector: &DashSet<String>) -> Vec<ScanError> {
        let mut skipped = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Some(class_name) = self.relative_unit(entry.path()) {
                        collector.insert(class_name);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let error = ScanError::SubNamespace {
                        namespace: e
                            .path()
                            .unwrap_or(dir)
                            .strip_prefix(&self.base)
                            .unwrap_or(dir)
                            .display()
                            .to_string(),
                        message: e.to_string(),
                    };
                    warn_partial(&error);
                    skipped.push(error);
                }
            }
        }
        skipped
    }
}

impl ClassSource for DirectorySource {
    fn location(&self) -> String {
        self.base.display().to_string()
    }

    fn collect(&self, root: &str, collector: &DashSet<String>) -> Result<()> {
        let root_dir = root.split('.').fold(self.base.clone(), |path, segment| path.join(segment));
        if !root_dir.is_dir() {
            return Err(ScanError::RootMissing {
                namespace: root.to_string(),
                location: self.location(),
            });
        }

        let unreadable = |source| ScanError::RootUnreadable {
            namespace: root.to_string(),
            location: self.location(),
            source,
        };
        let entries = std::fs::read_dir(&root_dir)
            .map_err(unreadable)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<PathBuf>>>()
            .map_err(unreadable)?;

        entries.par_iter().for_each(|path| {
            if path.is_dir() {
                let _ = self.walk_sub_namespace(path, collector);
            } else if let Some(class_name) = self.relative_unit(path) {
                collector.insert(class_name);
            }
        });

        Ok(())
    }
}

/// Packaged zip archive of unit files
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    path: PathBuf,
    extension: String,
}

impl ArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extension: DEFAULT_UNIT_EXTENSION.to_string(),
        }
    }

    pub fn for_host(path: impl Into<PathBuf>, config: &HostConfig) -> Self {
        Self::new(path).with_extension(config.unit_extension.as_str())
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl ClassSource for ArchiveSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn collect(&self, root: &str, collector: &DashSet<String>) -> Result<()> {
        let file = File::open(&self.path).map_err(|source| ScanError::RootUnreadable {
            namespace: root.to_string(),
            location: self.location(),
            source,
        })?;
        let archive = zip::ZipArchive::new(file).map_err(|source| ScanError::Archive {
            path: self.path.clone(),
            source,
        })?;

        let prefix = format!("{}/", root.replace('.', "/"));
        let names: Vec<&str> = archive
            .file_names()
            .filter(|name| name.starts_with(&prefix) && !name.ends_with('/'))
            .collect();

        if names.is_empty() && !archive.file_names().any(|name| name.starts_with(&prefix)) {
            return Err(ScanError::RootMissing {
                namespace: root.to_string(),
                location: self.location(),
            });
        }

        names.par_iter().for_each(|name| {
            if let Some(class_name) = class_name_of(name, &self.extension) {
                collector.insert(class_name);
            }
        });

        Ok(())
    }
}

/// Class names taken from an in-process declaration table
#[derive(Debug, Clone, Default)]
pub struct TableSource {
    names: Vec<String>,
}

impl TableSource {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_table(table: &ComponentTable) -> Self {
        Self::new(table.class_names())
    }
}

impl ClassSource for TableSource {
    fn location(&self) -> String {
        "declaration table".to_string()
    }

    fn collect(&self, root: &str, collector: &DashSet<String>) -> Result<()> {
        let prefix = format!("{}.", root);
        let mut found = false;

        for name in self.names.iter().filter(|name| name.starts_with(&prefix)) {
            found = true;
            if name.split('.').all(is_identifier) {
                collector.insert(name.clone());
            }
        }

        if found {
            Ok(())
        } else {
            Err(ScanError::RootMissing {
                namespace: root.to_string(),
                location: self.location(),
            })
        }
    }
}

/// Enumerates class names under a namespace root
#[derive(Clone)]
pub struct ClassScanner {
    source: Arc<dyn ClassSource>,
}

impl ClassScanner {
    pub fn new(source: Arc<dyn ClassSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn ClassSource> {
        &self.source
    }

    /// Every class name under `root`, sorted and without duplicates.
    ///
    /// Runs on the current rayon pool; call it inside `ThreadPool::install`
    /// to bound the parallelism.
    pub fn scan(&self, root: &str) -> Result<Vec<String>> {
        if !root.split('.').all(is_identifier) {
            return Err(ScanError::InvalidRoot(root.to_string()));
        }

        let collector = DashSet::new();
        self.source.collect(root, &collector)?;

        let mut names: Vec<String> = collector.into_iter().collect();
        names.sort_unstable();

        tracing::debug!("Found {} classes under {} in {}", names.len(), root, self.source.location());
        Ok(names)
    }
}

impl std::fmt::Debug for ClassScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassScanner")
            .field("source", &self.source.location())
            .finish()
    }
}
