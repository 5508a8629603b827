//! ManifestStore - content-hash baselines for watched directories
//!
//! A manifest is the sorted list of `<sha256>  <path>` lines for every regular
//! file below a set of roots. The stored manifest is the last baseline an alert
//! was actually sent for; it only advances when the caller reports a delivered
//! alert, so drift accumulates across throttled scans.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use super::error::{StateError, StateResult};
use super::lock::{RecordLock, write_atomic};
use super::throttle::sanitize_key;

/// Sorted `path → hash` mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Hash every regular file below `roots`. Missing roots and files that
    /// disappear mid-scan are skipped.
    pub fn compute(roots: &[PathBuf]) -> Manifest {
        let mut entries = BTreeMap::new();
        for root in roots {
            // the root itself is followed; links below it are not
            match fs::metadata(root) {
                Ok(meta) if meta.is_file() => hash_into(root, &mut entries),
                Ok(meta) if meta.is_dir() => walk_dir(root, &mut entries),
                Ok(_) => warn!("skipping watched root {}: not a file or directory", root.display()),
                Err(e) => warn!("skipping watched root {}: {e}", root.display()),
            }
        }
        Manifest { entries }
    }

    pub fn from_entries<I, P, H>(entries: I) -> Manifest
    where
        I: IntoIterator<Item = (P, H)>,
        P: Into<String>,
        H: Into<String>,
    {
        Manifest {
            entries: entries
                .into_iter()
                .map(|(p, h)| (p.into(), h.into()))
                .collect(),
        }
    }

    /// Parse the on-disk text form. Lines that are not `<hash>  <path>` are
    /// dropped.
    pub fn parse(text: &str) -> Manifest {
        let entries = text
            .lines()
            .filter_map(|line| line.split_once("  "))
            .filter(|(hash, path)| !hash.is_empty() && !path.is_empty())
            .map(|(hash, path)| (path.to_string(), hash.to_string()))
            .collect();
        Manifest { entries }
    }

    pub fn to_text(&self) -> String {
        self.lines().map(|line| line + "\n").collect()
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.entries
            .iter()
            .map(|(path, hash)| format!("{hash}  {path}"))
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Line-level difference from `self` (old) to `new`.
    pub fn diff(&self, new: &Manifest) -> ManifestDiff {
        let old_lines: Vec<String> = self.lines().collect();
        let new_lines: Vec<String> = new.lines().collect();
        let old_set: HashSet<&String> = old_lines.iter().collect();
        let new_set: HashSet<&String> = new_lines.iter().collect();

        ManifestDiff {
            removed: old_lines
                .iter()
                .filter(|line| !new_set.contains(line))
                .cloned()
                .collect(),
            added: new_lines
                .iter()
                .filter(|line| !old_set.contains(line))
                .cloned()
                .collect(),
        }
    }
}

/// Added and removed manifest lines, without context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    pub fn len(&self) -> usize {
        self.removed.len() + self.added.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.removed {
            out.push_str("- ");
            out.push_str(line);
            out.push('\n');
        }
        for line in &self.added {
            out.push_str("+ ");
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// What happened to a baseline during one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No baseline existed; the fresh manifest became the baseline
    Baseline { files: usize },
    /// Fresh manifest matches the baseline
    Unchanged,
    /// Drift was reported and the baseline advanced
    Alerted(ManifestDiff),
    /// Drift was found but the alert was held back; baseline kept
    Suppressed(ManifestDiff),
}

#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn open(dir: impl Into<PathBuf>) -> StateResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|_| StateError::InvalidStateDir(dir.clone()))?;
        Ok(Self { dir })
    }

    /// Stored baseline, or `None` when missing or unreadable.
    pub fn load(&self, name: &str) -> Option<Manifest> {
        let path = self.manifest_path(name).ok()?;
        match fs::read_to_string(&path) {
            Ok(text) => Some(Manifest::parse(&text)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("unreadable manifest {}: {e}", path.display());
                None
            }
        }
    }

    pub fn save(&self, name: &str, manifest: &Manifest) -> StateResult<()> {
        let path = self.manifest_path(name)?;
        write_atomic(&path, manifest.to_text().as_bytes())
    }

    /// Compare `fresh` with the stored baseline under the baseline's lock.
    ///
    /// `notify` is only called for a non-empty diff and returns whether the
    /// alert went out; the baseline advances only when it did.
    pub fn reconcile<F>(&self, name: &str, fresh: Manifest, notify: F) -> StateResult<Reconciliation>
    where
        F: FnOnce(&ManifestDiff) -> bool,
    {
        let path = self.manifest_path(name)?;
        let _lock = RecordLock::acquire(&path)?;

        let Some(baseline) = self.load(name) else {
            debug!("{name}: no baseline, storing {} entries", fresh.len());
            self.save(name, &fresh)?;
            return Ok(Reconciliation::Baseline { files: fresh.len() });
        };

        let diff = baseline.diff(&fresh);
        if diff.is_empty() {
            trace!("{name}: unchanged ({} entries)", fresh.len());
            return Ok(Reconciliation::Unchanged);
        }

        if notify(&diff) {
            self.save(name, &fresh)?;
            Ok(Reconciliation::Alerted(diff))
        } else {
            debug!("{name}: {} changed lines held back, baseline kept", diff.len());
            Ok(Reconciliation::Suppressed(diff))
        }
    }

    fn manifest_path(&self, name: &str) -> StateResult<PathBuf> {
        Ok(self.dir.join(format!("{}.manifest", sanitize_key(name)?)))
    }
}

fn walk(path: &Path, entries: &mut BTreeMap<String, String>) {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => {
            warn!("cannot stat {}: {e}", path.display());
            return;
        }
    };

    if meta.is_file() {
        hash_into(path, entries);
    } else if meta.is_dir() {
        walk_dir(path, entries);
    }
}

fn hash_into(path: &Path, entries: &mut BTreeMap<String, String>) {
    match hash_file(path) {
        Ok(hash) => {
            entries.insert(path.to_string_lossy().replace('\n', "\\n"), hash);
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("cannot hash {}: {e}", path.display()),
    }
}

fn walk_dir(path: &Path, entries: &mut BTreeMap<String, String>) {
    let dir = match fs::read_dir(path) {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => {
            warn!("cannot list {}: {e}", path.display());
            return;
        }
    };

    for entry in dir.flatten() {
        walk(&entry.path(), entries);
    }
}

pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
