//! Excluded Applications
//!
//! The set of application identifiers the user keeps out of the VPN,
//! persisted as one identifier per line.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed set of excluded application identifiers
#[derive(Debug, Clone)]
pub struct BlockedApps {
    path: PathBuf,
    apps: BTreeSet<String>,
}

impl BlockedApps {
    /// Load the store. A missing file is an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let apps = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read blocked apps: {}", path.display()))?;
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect()
        } else {
            BTreeSet::new()
        };
        debug!("Loaded {} blocked apps from {}", apps.len(), path.display());
        Ok(Self { path, apps })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.apps.iter().map(String::as_str)
    }

    /// Sorted copy of the identifiers
    pub fn to_vec(&self) -> Vec<String> {
        self.apps.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn is_blocked(&self, app: &str) -> bool {
        self.apps.contains(app)
    }

    /// Block or unblock one application.
    ///
    /// Returns whether the set changed; the file is only rewritten on change.
    pub fn set_blocked(&mut self, app: &str, blocked: bool) -> Result<bool> {
        let changed = if blocked {
            self.apps.insert(app.to_string())
        } else {
            self.apps.remove(app)
        };
        if changed {
            self.persist()?;
        }
        Ok(changed)
    }

    /// Replace the whole set
    pub fn import<I, S>(&mut self, apps: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apps = apps.into_iter().map(Into::into).collect();
        self.persist()
    }

    /// Remove every entry
    pub fn reset(&mut self) -> Result<()> {
        self.apps.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
        let raw = self.apps.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write blocked apps: {}", self.path.display()))
    }
}
