//! The ordered search environment of already-installed distributions.

use anyhow::{Context, Result};
use log::debug;
use std::env;
use std::path::PathBuf;

use crate::dist::Dist;
use crate::runtime::Runtime;

/// Ordered locations of distributions visible to the build: entries from the
/// development prefixes come before the deployment ones, exactly as the
/// prefix list is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    pub entries: Vec<PathBuf>,
}

impl WorkingSet {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Self { entries }
    }

    /// Build the working set by scanning each prefix directory for
    /// distribution entries. Missing prefixes are skipped.
    #[tracing::instrument(skip(runtime))]
    pub fn from_prefixes<R: Runtime>(runtime: &R, prefixes: &[PathBuf]) -> Result<Self> {
        let mut entries = Vec::new();
        for prefix in prefixes {
            if !runtime.exists(prefix) {
                debug!("Skipping missing prefix {:?}", prefix);
                continue;
            }
            for entry in runtime.read_dir(prefix)? {
                if Dist::from_location(&entry).is_some() {
                    entries.push(entry);
                }
            }
        }
        Ok(Self { entries })
    }

    /// The entries joined with the platform path separator, suitable for a
    /// `PYTHONPATH`-style variable.
    pub fn search_path(&self) -> Result<String> {
        let joined =
            env::join_paths(&self.entries).context("Working set entry contains a path separator")?;
        Ok(joined.to_string_lossy().into_owned())
    }
}

/// The host's requirement-satisfaction primitive: ensure everything `target`
/// depends on is already resolvable from the working set before the target
/// itself is installed. `target` is a requirement spec or a source directory.
#[cfg_attr(test, mockall::automock)]
pub trait RequirementSatisfier {
    fn satisfy(&self, target: &str, ws: &WorkingSet) -> Result<()>;
}

/// Accepts any requirement set unchecked. Standalone runs resolve
/// dependencies out of band; the installer is invoked with dependency
/// following disabled either way.
pub struct UncheckedRequirements;

impl RequirementSatisfier for UncheckedRequirements {
    fn satisfy(&self, target: &str, ws: &WorkingSet) -> Result<()> {
        debug!(
            "Assuming requirements of {} are satisfied by the {} working set entries",
            target,
            ws.entries.len()
        );
        Ok(())
    }
}
