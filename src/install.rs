//! The package-installation override.
//!
//! Replaces the host engine's stock installation step: resolution still
//! happens inside the external installer, but it runs against a working set
//! that covers both the development and the deployment prefixes, and its
//! output is relocated from a scratch directory into the destination.

use anyhow::{Context, Result, bail};
use log::{debug, error, warn};
use std::path::Path;

use crate::config::Config;
use crate::dist::{Dist, Requirement, normalize_name, scan_dists};
use crate::environ::EnvOverlay;
use crate::runtime::{CommandSpec, Runtime};
use crate::workset::{RequirementSatisfier, WorkingSet};

/// Installs one requirement into a destination directory by shelling out to
/// `easy_install` and relocating whatever it produced.
pub struct Installer {
    python: String,
    verbose: bool,
    find_links: Option<String>,
    overlay: EnvOverlay,
}

impl Installer {
    pub fn new(python: impl Into<String>, config: &Config) -> Self {
        Self {
            python: python.into(),
            verbose: config.verbose,
            find_links: config.find_links.clone(),
            overlay: EnvOverlay::from_config(config),
        }
    }

    /// Install `req` into `dest`, returning the distributions that ended up
    /// there.
    ///
    /// The requirement's own dependencies are satisfied first; the installer
    /// subprocess then runs with dependency following disabled, targeting a
    /// scratch directory nested inside `dest`. The scratch directory is
    /// removed on every exit path.
    ///
    /// Zero produced distributions is fatal. Multiple distributions, or a
    /// single one under a different name or version, are warned about and
    /// returned as-is: the installer is known to sometimes resolve a
    /// distinct-but-compatible distribution.
    #[tracing::instrument(skip(self, runtime, satisfier, ws))]
    pub fn install<R: Runtime, S: RequirementSatisfier>(
        &self,
        runtime: &R,
        satisfier: &S,
        req: &Requirement,
        ws: &WorkingSet,
        dest: &Path,
    ) -> Result<Vec<Dist>> {
        satisfier.satisfy(req.spec(), ws)?;

        let tmp = runtime.make_temp_dir_in(dest, "eggs-")?;
        let result = self.install_into(runtime, req, ws, dest, &tmp);

        // Scratch removal happens before the result is inspected, so failed
        // installs clean up too. An install error outranks a cleanup error.
        let cleanup = runtime.remove_dir_all(&tmp);
        let dists = result?;
        cleanup.with_context(|| format!("Failed to remove scratch directory {:?}", tmp))?;

        Ok(dists)
    }

    fn install_into<R: Runtime>(
        &self,
        runtime: &R,
        req: &Requirement,
        ws: &WorkingSet,
        dest: &Path,
        tmp: &Path,
    ) -> Result<Vec<Dist>> {
        let command = self.easy_install_command(req, ws, tmp)?;
        debug!("Running easy_install: {}", command.command_line());

        let exit_code = runtime.run_command(&command)?;
        if exit_code != 0 {
            // Not independently fatal: the artifact scan below is the gate.
            error!(
                "An error occurred when trying to install {} (exit status {}). \
                 Look above this message for any errors easy_install reported.",
                req, exit_code
            );
        }

        let dists = scan_dists(runtime, tmp)?;
        if dists.is_empty() {
            bail!("Couldn't install: {}", req);
        }

        if dists.len() > 1 {
            warn!(
                "Installing {} caused multiple distributions to be installed: {}",
                req,
                dists
                    .iter()
                    .map(Dist::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        } else {
            let dist = &dists[0];
            if normalize_name(&dist.project_name) != normalize_name(&req.project_name) {
                warn!(
                    "Installing {} caused installation of a distribution with a \
                     different project name: {}",
                    req, dist
                );
            }
            if let Some(version) = &req.version
                && version != &dist.version
            {
                warn!(
                    "Installing {} caused installation of a distribution with a \
                     different version: {}",
                    req, dist
                );
            }
        }

        let mut result = Vec::with_capacity(dists.len());
        for dist in dists {
            result.push(self.relocate(runtime, dist, dest)?);
        }
        Ok(result)
    }

    /// Move one produced distribution out of the scratch directory, replacing
    /// any previous entry at the destination, and re-resolve it in place so
    /// the returned descriptor points at the final path.
    fn relocate<R: Runtime>(&self, runtime: &R, dist: Dist, dest: &Path) -> Result<Dist> {
        let name = dist
            .location
            .file_name()
            .with_context(|| format!("Distribution at {:?} has no file name", dist.location))?;
        let newloc = dest.join(name);

        if runtime.exists(&newloc) {
            if runtime.is_dir(&newloc) {
                runtime.remove_dir_all(&newloc)?;
            } else {
                runtime.remove_file(&newloc)?;
            }
        }
        runtime.rename(&dist.location, &newloc)?;

        Dist::from_location(&newloc)
            .with_context(|| format!("Moved distribution at {:?} no longer parses", newloc))
    }

    fn easy_install_command(
        &self,
        req: &Requirement,
        ws: &WorkingSet,
        tmp: &Path,
    ) -> Result<CommandSpec> {
        let mut command = CommandSpec::new(&self.python)
            .arg("-m")
            .arg("easy_install")
            .arg("-mZUNxd")
            .arg(tmp.display().to_string())
            .arg(if self.verbose { "-v" } else { "-q" });
        if let Some(links) = &self.find_links {
            command = command.arg("-f").arg(links);
        }
        command = command.arg(req.spec());

        Ok(command.envs(self.overlay.extended("PYTHONPATH", &ws.search_path()?)))
    }
}
