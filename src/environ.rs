//! Environment overlay for subprocess launches.
//!
//! The overlay is computed once from [`Config`] and threaded into every
//! subprocess invocation. It never touches the real process environment;
//! variables are layered onto each child via [`CommandSpec::envs`].
//!
//! [`CommandSpec::envs`]: crate::runtime::CommandSpec::envs

use crate::config::Config;

const DEBUG_FLAGS: &str = "-g -O0";

/// Extra environment variables for child processes, derived from the
/// configured environ section, the prefix list, and the debug flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: Vec<(String, String)>,
}

impl EnvOverlay {
    pub fn from_config(config: &Config) -> Self {
        let mut vars = config.environ.clone();

        // Make pkg-config discover libraries staged under the prefixes.
        if !config.prefixes.is_empty() {
            let pkgconfig = config
                .prefixes
                .iter()
                .map(|p| p.join("lib").join("pkgconfig").display().to_string())
                .collect::<Vec<_>>()
                .join(pathsep());
            upsert(&mut vars, "PKG_CONFIG_PATH", &pkgconfig);
        }

        if config.debug {
            for key in ["CFLAGS", "CXXFLAGS"] {
                match vars.iter_mut().find(|(k, _)| k == key) {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(DEBUG_FLAGS);
                    }
                    None => vars.push((key.to_string(), DEBUG_FLAGS.to_string())),
                }
            }
        }

        Self { vars }
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    /// The overlay plus one call-specific variable, replacing any configured
    /// value for the same key.
    pub fn extended(&self, key: &str, value: &str) -> Vec<(String, String)> {
        let mut vars = self.vars.clone();
        upsert(&mut vars, key, value);
        vars
    }
}

fn upsert(vars: &mut Vec<(String, String)>, key: &str, value: &str) {
    match vars.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) => *existing = value.to_string(),
        None => vars.push((key.to_string(), value.to_string())),
    }
}

fn pathsep() -> &'static str {
    if cfg!(windows) { ";" } else { ":" }
}
