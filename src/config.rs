//! Host configuration sections.
//!
//! The orchestration engine hands this crate a set of named sections, each a
//! flat string-to-string mapping. [`Config`] extracts the handful of keys the
//! installer cares about from the `buildout` section plus the environment
//! section it points at.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// One configuration section: flat key/value pairs.
pub type Section = BTreeMap<String, String>;

/// A whole configuration profile: named sections.
pub type Profile = BTreeMap<String, Section>;

/// Split a whitespace/newline separated option value into items.
pub fn parse_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Interpret a configuration value as a boolean flag.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// The settings read at construction time from the host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub verbose: bool,
    pub debug: bool,
    /// Ordered prefix directories searched for already-installed eggs
    /// (development areas first, deployment area last, as configured).
    pub prefixes: Vec<PathBuf>,
    /// Alternate package-source links, passed through to the installer.
    pub find_links: Option<String>,
    /// Extra environment variables from the configured environ section.
    pub environ: Vec<(String, String)>,
}

impl Config {
    /// Read the `buildout` section of a profile, following its `environ` key
    /// to the section holding extra environment variables (by default a
    /// section literally named `environ`).
    pub fn from_profile(profile: &Profile) -> Self {
        static EMPTY: Section = Section::new();
        let buildout = profile.get("buildout").unwrap_or(&EMPTY);
        let environ_name = buildout.get("environ").map(String::as_str).unwrap_or("environ");
        let environ = profile.get(environ_name).unwrap_or(&EMPTY);
        Self::from_sections(buildout, environ)
    }

    pub fn from_sections(buildout: &Section, environ: &Section) -> Self {
        Self {
            verbose: buildout.get("verbose").is_some_and(|v| parse_flag(v)),
            debug: buildout.get("debug").is_some_and(|v| parse_flag(v)),
            prefixes: buildout
                .get("prefixes")
                .map(|v| parse_list(v).into_iter().map(PathBuf::from).collect())
                .unwrap_or_default(),
            find_links: buildout
                .get("find-links")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            environ: environ
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Load a JSON profile file and read its `buildout` section.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let raw = runtime.read_to_string(path)?;
        let profile: Profile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse configuration profile {:?}", path))?;
        Ok(Self::from_profile(&profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn section(pairs: &[(&str, &str)]) -> Section {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_list_splits_on_any_whitespace() {
        assert_eq!(
            parse_list("/opt/dev\n  /opt/deploy\t/usr"),
            vec!["/opt/dev", "/opt/deploy", "/usr"]
        );
        assert!(parse_list("   ").is_empty());
    }

    #[test]
    fn test_parse_flag_truthy_values() {
        for value in ["1", "true", "True", "YES", " on "] {
            assert!(parse_flag(value), "{value:?} should be truthy");
        }
        for value in ["0", "false", "off", "", "maybe"] {
            assert!(!parse_flag(value), "{value:?} should be falsy");
        }
    }

    #[test]
    fn test_from_sections() {
        let buildout = section(&[
            ("verbose", "true"),
            ("prefixes", "/opt/dev /opt/deploy"),
            ("find-links", "https://example.org/simple"),
        ]);
        let environ = section(&[("CC", "gcc"), ("LD_LIBRARY_PATH", "/opt/dev/lib")]);

        let config = Config::from_sections(&buildout, &environ);
        assert!(config.verbose);
        assert!(!config.debug);
        assert_eq!(
            config.prefixes,
            vec![PathBuf::from("/opt/dev"), PathBuf::from("/opt/deploy")]
        );
        assert_eq!(
            config.find_links.as_deref(),
            Some("https://example.org/simple")
        );
        assert_eq!(config.environ.len(), 2);
    }

    #[test]
    fn test_from_profile_follows_environ_pointer() {
        let mut profile = Profile::new();
        profile.insert(
            "buildout".into(),
            section(&[("environ", "build-env"), ("debug", "1")]),
        );
        profile.insert("build-env".into(), section(&[("CC", "clang")]));
        profile.insert("environ".into(), section(&[("CC", "ignored")]));

        let config = Config::from_profile(&profile);
        assert!(config.debug);
        assert_eq!(config.environ, vec![("CC".to_string(), "clang".to_string())]);
    }

    #[test]
    fn test_from_profile_defaults() {
        let config = Config::from_profile(&Profile::new());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_profile_json() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/etc/eggshell.json");
        runtime
            .expect_read_to_string()
            .with(eq(path.clone()))
            .returning(|_| {
                Ok(r#"{
                    "buildout": {"verbose": "yes", "prefixes": "/opt/deploy"},
                    "environ": {"PKG_DB": "/opt/deploy/db"}
                }"#
                .to_string())
            });

        let config = Config::load(&runtime, &path).unwrap();
        assert!(config.verbose);
        assert_eq!(config.prefixes, vec![PathBuf::from("/opt/deploy")]);
        assert_eq!(
            config.environ,
            vec![("PKG_DB".to_string(), "/opt/deploy/db".to_string())]
        );
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("not json".to_string()));

        let result = Config::load(&runtime, Path::new("/etc/bad.json"));
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse configuration profile")
        );
    }
}
