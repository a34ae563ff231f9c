//! Requirements and installed distributions.

use anyhow::{Result, anyhow};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::runtime::Runtime;

/// A requested package, as handed to the external installer.
///
/// Format: `name` or `name==version`. Other comparator forms are carried
/// opaquely: the name is still extracted but there is no pin to compare
/// installed artifacts against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub project_name: String,
    pub version: Option<String>,
    spec: String,
}

impl Requirement {
    /// The exact spec string to pass through to the installer.
    pub fn spec(&self) -> &str {
        &self.spec
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec)
    }
}

impl FromStr for Requirement {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim().to_string();
        if spec.is_empty() {
            return Err(anyhow!("Invalid requirement: empty spec"));
        }

        if let Some((name, version)) = spec.split_once("==") {
            let (name, version) = (name.trim(), version.trim());
            if name.is_empty() || version.is_empty() {
                return Err(anyhow!(
                    "Invalid requirement {:?}: expected 'name==version'",
                    spec
                ));
            }
            return Ok(Self {
                project_name: name.to_string(),
                version: Some(version.to_string()),
                spec,
            });
        }

        // "name>=1.0" and friends: keep the spec opaque, no pin.
        let name_end = spec
            .find(|c| ['<', '>', '!', '='].contains(&c))
            .unwrap_or(spec.len());
        let name = spec[..name_end].trim();
        if name.is_empty() {
            return Err(anyhow!("Invalid requirement {:?}: missing name", spec));
        }
        Ok(Self {
            project_name: name.to_string(),
            version: None,
            spec,
        })
    }
}

/// One installed distribution discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dist {
    pub project_name: String,
    pub version: String,
    pub location: PathBuf,
}

impl Dist {
    /// Parse a distribution from its on-disk name.
    ///
    /// Recognized: `<name>-<version>[-pyX.Y][.egg]` as a file or directory.
    /// The version starts at the first dash-separated component beginning
    /// with a digit; trailing interpreter tags are not part of it. Entries
    /// that do not follow the layout (hidden files, bare names) yield `None`.
    pub fn from_location(location: &Path) -> Option<Self> {
        let file_name = location.file_name()?.to_str()?;
        if file_name.starts_with('.') {
            return None;
        }

        let base = file_name.strip_suffix(".egg").unwrap_or(file_name);
        let parts: Vec<&str> = base.split('-').collect();
        let split = parts
            .iter()
            .position(|p| p.chars().next().is_some_and(|c| c.is_ascii_digit()))?;
        if split == 0 {
            return None;
        }

        let version: Vec<&str> = parts[split..]
            .iter()
            .take_while(|p| p.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .copied()
            .collect();

        Some(Self {
            project_name: parts[..split].join("-"),
            version: version.join("-"),
            location: location.to_path_buf(),
        })
    }
}

impl fmt::Display for Dist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.project_name, self.version)
    }
}

/// Normalized form used for project-name comparison.
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

/// Scan a directory as an installation environment, collecting every entry
/// that parses as a distribution, in directory order.
#[tracing::instrument(skip(runtime))]
pub fn scan_dists<R: Runtime>(runtime: &R, dir: &Path) -> Result<Vec<Dist>> {
    let mut dists = Vec::new();
    for entry in runtime.read_dir(dir)? {
        if let Some(dist) = Dist::from_location(&entry) {
            dists.push(dist);
        }
    }
    Ok(dists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    #[test]
    fn test_requirement_bare_name() {
        let req: Requirement = "demo".parse().unwrap();
        assert_eq!(req.project_name, "demo");
        assert_eq!(req.version, None);
        assert_eq!(req.to_string(), "demo");
    }

    #[test]
    fn test_requirement_pinned() {
        let req: Requirement = "demo==1.0.2".parse().unwrap();
        assert_eq!(req.project_name, "demo");
        assert_eq!(req.version.as_deref(), Some("1.0.2"));
        assert_eq!(req.to_string(), "demo==1.0.2");
    }

    #[test]
    fn test_requirement_other_comparators_stay_opaque() {
        let req: Requirement = "demo>=1.0".parse().unwrap();
        assert_eq!(req.project_name, "demo");
        assert_eq!(req.version, None);
        // The spec string survives verbatim for the installer.
        assert_eq!(req.spec(), "demo>=1.0");
    }

    #[test]
    fn test_requirement_invalid() {
        assert!("".parse::<Requirement>().is_err());
        assert!("   ".parse::<Requirement>().is_err());
        assert!("==1.0".parse::<Requirement>().is_err());
        assert!("demo==".parse::<Requirement>().is_err());
    }

    #[test]
    fn test_dist_from_location_egg_dir() {
        let dist = Dist::from_location(Path::new("/tmp/x/demo-1.0-py3.10.egg")).unwrap();
        assert_eq!(dist.project_name, "demo");
        assert_eq!(dist.version, "1.0");
        assert_eq!(dist.location, PathBuf::from("/tmp/x/demo-1.0-py3.10.egg"));
    }

    #[test]
    fn test_dist_from_location_dashed_name() {
        let dist = Dist::from_location(Path::new("/eggs/my-toolkit-2.3.1.egg")).unwrap();
        assert_eq!(dist.project_name, "my-toolkit");
        assert_eq!(dist.version, "2.3.1");
    }

    #[test]
    fn test_dist_from_location_plain_dir() {
        let dist = Dist::from_location(Path::new("/eggs/demo-0.9")).unwrap();
        assert_eq!(dist.project_name, "demo");
        assert_eq!(dist.version, "0.9");
    }

    #[test]
    fn test_dist_from_location_rejects_non_dists() {
        assert!(Dist::from_location(Path::new("/eggs/.hidden")).is_none());
        assert!(Dist::from_location(Path::new("/eggs/README")).is_none());
        assert!(Dist::from_location(Path::new("/eggs/1.0-demo")).is_none());
    }

    #[test]
    fn test_normalize_name_folds_case_and_underscores() {
        assert_eq!(normalize_name("My_Demo"), "my-demo");
        assert_eq!(normalize_name("my-demo"), "my-demo");
        assert_ne!(normalize_name("other"), normalize_name("my-demo"));
    }

    #[test]
    fn test_scan_dists_skips_unparseable_entries() {
        let mut runtime = MockRuntime::new();
        let dir = PathBuf::from("/tmp/scratch");
        runtime
            .expect_read_dir()
            .with(eq(dir.clone()))
            .returning(|p| {
                Ok(vec![
                    p.join("demo-1.0-py3.10.egg"),
                    p.join(".eggshell-lock"),
                    p.join("notes.txt"),
                    p.join("extra-2.0.egg"),
                ])
            });

        let dists = scan_dists(&runtime, &dir).unwrap();
        assert_eq!(dists.len(), 2);
        assert_eq!(dists[0].project_name, "demo");
        assert_eq!(dists[1].project_name, "extra");
    }
}
