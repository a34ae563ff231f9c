//! Editable ("develop") installation of a source tree.
//!
//! The source's own build descriptor does the work; this module only arranges
//! the stage: an optional `[build_ext]` override in `setup.cfg`, a synthetic
//! bootstrap script that fixes up the interpreter search path and working
//! directory, and a scratch output directory whose link-files are copied to
//! the destination. Every transient registers an undo action the moment it
//! is created.

use anyhow::{Context, Result, bail};
use log::debug;
use std::path::{Path, PathBuf};

use crate::cleanup::{UndoAction, UndoStack};
use crate::config::Config;
use crate::environ::EnvOverlay;
use crate::runtime::{CommandSpec, Runtime};
use crate::workset::{RequirementSatisfier, WorkingSet};

const ASIDE_SUFFIX: &str = "-develop-aside";

/// Runs a source tree's `setup.py develop` under a curated search path and
/// copies the produced egg-links into a destination directory.
pub struct DevelopInstaller {
    python: String,
    verbose: bool,
    overlay: EnvOverlay,
}

impl DevelopInstaller {
    pub fn new(python: impl Into<String>, config: &Config) -> Self {
        Self {
            python: python.into(),
            verbose: config.verbose,
            overlay: EnvOverlay::from_config(config),
        }
    }

    /// Perform an editable install of `setup` (a source directory or a direct
    /// path to its `setup.py`) into `dest`, returning the final egg-link
    /// paths.
    ///
    /// With `build_ext` options, `setup.cfg` is set aside and replaced by a
    /// file containing only the `[build_ext]` section for the duration of the
    /// build; it is restored byte-for-byte afterwards. All transient state is
    /// reversed on success and on failure alike.
    #[tracing::instrument(skip(self, runtime, satisfier, ws))]
    pub fn develop<R: Runtime, S: RequirementSatisfier>(
        &self,
        runtime: &R,
        satisfier: &S,
        setup: &Path,
        dest: &Path,
        build_ext: &[(String, String)],
        ws: &WorkingSet,
    ) -> Result<Vec<PathBuf>> {
        let (directory, setup) = if runtime.is_dir(setup) {
            (setup.to_path_buf(), setup.join("setup.py"))
        } else {
            let directory = setup
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            (directory, setup.to_path_buf())
        };

        satisfier.satisfy(&directory.display().to_string(), ws)?;

        let mut undo = UndoStack::new();
        let result =
            self.run_develop(runtime, &directory, &setup, dest, build_ext, ws, &mut undo);
        undo.unwind(runtime);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_develop<R: Runtime>(
        &self,
        runtime: &R,
        directory: &Path,
        setup: &Path,
        dest: &Path,
        build_ext: &[(String, String)],
        ws: &WorkingSet,
        undo: &mut UndoStack,
    ) -> Result<Vec<PathBuf>> {
        if !build_ext.is_empty() {
            self.inject_build_ext(runtime, directory, build_ext, undo)?;
        }

        let scratch = runtime.make_temp_dir_in(&runtime.temp_dir(), "develop-")?;
        undo.push(UndoAction::RemoveDirAll(scratch.clone()));

        let bootstrap = scratch.join("runsetup.py");
        let script = render_bootstrap(&ws.search_path()?, setup, directory);
        runtime.write(&bootstrap, script.as_bytes())?;

        let build_dir = runtime.make_temp_dir_in(dest, "build-")?;
        undo.push(UndoAction::RemoveDirAll(build_dir.clone()));

        let command = CommandSpec::new(&self.python)
            .arg(bootstrap.display().to_string())
            .arg(if self.verbose { "-v" } else { "-q" })
            .arg("develop")
            .arg("-mxN")
            .arg("-d")
            .arg(build_dir.display().to_string())
            .envs(self.overlay.vars().to_vec());
        debug!("In {:?}: {}", directory, command.command_line());

        let exit_code = runtime.run_command(&command)?;
        if exit_code != 0 {
            bail!(
                "setup.py develop exited with status {} in {:?}",
                exit_code,
                directory
            );
        }

        copy_link_files(runtime, &build_dir, dest)
    }

    /// Set `setup.cfg` aside (or note its absence) and write a fresh one
    /// holding only the `[build_ext]` options.
    fn inject_build_ext<R: Runtime>(
        &self,
        runtime: &R,
        directory: &Path,
        build_ext: &[(String, String)],
        undo: &mut UndoStack,
    ) -> Result<()> {
        let setup_cfg = directory.join("setup.cfg");
        if runtime.exists(&setup_cfg) {
            let mut aside = setup_cfg.clone().into_os_string();
            aside.push(ASIDE_SUFFIX);
            let aside = PathBuf::from(aside);
            runtime.rename(&setup_cfg, &aside)?;
            undo.push(UndoAction::RestoreAside {
                aside,
                original: setup_cfg.clone(),
            });
        } else {
            undo.push(UndoAction::RemoveFile(setup_cfg.clone()));
        }
        runtime.write(&setup_cfg, render_build_ext(build_ext).as_bytes())
    }
}

fn render_build_ext(options: &[(String, String)]) -> String {
    let mut out = String::from("[build_ext]\n");
    for (key, value) in options {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// The single-use bootstrap script: prepends the working set's paths,
/// chdirs into the source directory, then executes the descriptor as if it
/// had been invoked directly, so its relative-path assumptions hold.
fn render_bootstrap(search_path: &str, setup: &Path, directory: &Path) -> String {
    let search_path = python_str(search_path);
    let setup = python_str(&setup.display().to_string());
    let directory = python_str(&directory.display().to_string());
    format!(
        r#"import os
import sys

for k in {search_path}.split(os.pathsep):
    sys.path.insert(0, k)
sys.path.insert(0, {directory})

__file__ = {setup}

os.chdir({directory})
sys.argv[0] = {setup}

exec(compile(open({setup}).read(), {setup}, 'exec'))
"#
    )
}

/// Quote a value as a Python string literal.
fn python_str(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Copy every link-file (`*.egg-link`) out of `from` into `dest`, returning
/// the destination paths.
fn copy_link_files<R: Runtime>(runtime: &R, from: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    for entry in runtime.read_dir(from)? {
        let is_link = entry.extension().is_some_and(|ext| ext == "egg-link");
        if !is_link {
            continue;
        }
        let name = entry
            .file_name()
            .with_context(|| format!("Link file at {:?} has no file name", entry))?;
        let target = dest.join(name);
        runtime.copy(&entry, &target)?;
        copied.push(target);
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use crate::workset::MockRequirementSatisfier;
    use mockall::predicate::{always, eq};

    fn dev_installer() -> DevelopInstaller {
        DevelopInstaller::new("python", &Config::default())
    }

    fn accepting_satisfier() -> MockRequirementSatisfier {
        let mut satisfier = MockRequirementSatisfier::new();
        satisfier.expect_satisfy().returning(|_, _| Ok(()));
        satisfier
    }

    /// Mock the scratch dirs, bootstrap write and subprocess run shared by
    /// most develop tests. The subprocess reports `exit_code`.
    fn expect_develop_run(runtime: &mut MockRuntime, dest: &Path, exit_code: i32) {
        let scratch = PathBuf::from("/tmp/develop-x");
        let build_dir = dest.join("build-x");

        runtime
            .expect_temp_dir()
            .returning(|| PathBuf::from("/tmp"));
        runtime
            .expect_make_temp_dir_in()
            .with(eq(PathBuf::from("/tmp")), eq("develop-"))
            .returning(move |_, _| Ok(scratch.clone()));
        runtime
            .expect_write()
            .with(eq(PathBuf::from("/tmp/develop-x/runsetup.py")), always())
            .times(1)
            .returning(|_, _| Ok(()));
        runtime
            .expect_make_temp_dir_in()
            .with(eq(dest.to_path_buf()), eq("build-"))
            .returning(move |_, _| Ok(build_dir.clone()));
        runtime
            .expect_run_command()
            .times(1)
            .returning(move |_| Ok(exit_code));
    }

    #[test]
    fn test_develop_happy_path_copies_egg_links() {
        let src = PathBuf::from("/work/demo");
        let dest = PathBuf::from("/opt/deploy/eggs");
        let mut runtime = MockRuntime::new();

        runtime
            .expect_is_dir()
            .with(eq(src.clone()))
            .returning(|_| true);
        expect_develop_run(&mut runtime, &dest, 0);

        runtime
            .expect_read_dir()
            .with(eq(dest.join("build-x")))
            .returning(|p| Ok(vec![p.join("demo.egg-link"), p.join("junk.txt")]));
        runtime
            .expect_copy()
            .with(
                eq(dest.join("build-x/demo.egg-link")),
                eq(dest.join("demo.egg-link")),
            )
            .times(1)
            .returning(|_, _| Ok(12));

        // Both scratch dirs are unwound.
        runtime
            .expect_remove_dir_all()
            .with(eq(dest.join("build-x")))
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_remove_dir_all()
            .with(eq(PathBuf::from("/tmp/develop-x")))
            .times(1)
            .returning(|_| Ok(()));

        let links = dev_installer()
            .develop(
                &runtime,
                &accepting_satisfier(),
                &src,
                &dest,
                &[],
                &WorkingSet::default(),
            )
            .unwrap();

        assert_eq!(links, vec![dest.join("demo.egg-link")]);
    }

    #[test]
    fn test_develop_nonzero_exit_is_fatal_but_still_unwinds() {
        let src = PathBuf::from("/work/demo");
        let dest = PathBuf::from("/opt/deploy/eggs");
        let mut runtime = MockRuntime::new();

        runtime
            .expect_is_dir()
            .with(eq(src.clone()))
            .returning(|_| true);
        expect_develop_run(&mut runtime, &dest, 2);

        // Unwind still runs for both scratch dirs, in reverse order.
        let mut seq = mockall::Sequence::new();
        runtime
            .expect_remove_dir_all()
            .with(eq(dest.join("build-x")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runtime
            .expect_remove_dir_all()
            .with(eq(PathBuf::from("/tmp/develop-x")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let result = dev_installer().develop(
            &runtime,
            &accepting_satisfier(),
            &src,
            &dest,
            &[],
            &WorkingSet::default(),
        );

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("exited with status 2")
        );
    }

    #[test]
    fn test_develop_sets_aside_and_restores_setup_cfg() {
        let src = PathBuf::from("/work/demo");
        let dest = PathBuf::from("/opt/deploy/eggs");
        let setup_cfg = src.join("setup.cfg");
        let aside = src.join("setup.cfg-develop-aside");
        let mut runtime = MockRuntime::new();

        runtime
            .expect_is_dir()
            .with(eq(src.clone()))
            .returning(|_| true);

        let mut seq = mockall::Sequence::new();
        runtime
            .expect_exists()
            .with(eq(setup_cfg.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| true);
        runtime
            .expect_rename()
            .with(eq(setup_cfg.clone()), eq(aside.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        runtime
            .expect_write()
            .withf(|path, contents| {
                path.ends_with("setup.cfg")
                    && contents == b"[build_ext]\ninclude-dirs = /opt/dev/include\n"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        expect_develop_run(&mut runtime, &dest, 0);
        runtime
            .expect_read_dir()
            .with(eq(dest.join("build-x")))
            .returning(|_| Ok(vec![]));
        runtime
            .expect_remove_dir_all()
            .times(2)
            .returning(|_| Ok(()));

        // The restore happens last: remove the injected file, put the
        // original back.
        runtime
            .expect_exists()
            .with(eq(setup_cfg.clone()))
            .times(1)
            .returning(|_| true);
        runtime
            .expect_remove_file()
            .with(eq(setup_cfg.clone()))
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_rename()
            .with(eq(aside.clone()), eq(setup_cfg.clone()))
            .times(1)
            .returning(|_, _| Ok(()));

        let build_ext = vec![("include-dirs".to_string(), "/opt/dev/include".to_string())];
        dev_installer()
            .develop(
                &runtime,
                &accepting_satisfier(),
                &src,
                &dest,
                &build_ext,
                &WorkingSet::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_develop_removes_injected_setup_cfg_when_none_existed() {
        let src = PathBuf::from("/work/demo");
        let dest = PathBuf::from("/opt/deploy/eggs");
        let setup_cfg = src.join("setup.cfg");
        let mut runtime = MockRuntime::new();

        runtime
            .expect_is_dir()
            .with(eq(src.clone()))
            .returning(|_| true);
        runtime
            .expect_exists()
            .with(eq(setup_cfg.clone()))
            .returning(|_| false);
        runtime
            .expect_write()
            .withf(|path, _| path.ends_with("setup.cfg"))
            .times(1)
            .returning(|_, _| Ok(()));

        expect_develop_run(&mut runtime, &dest, 0);
        runtime
            .expect_read_dir()
            .with(eq(dest.join("build-x")))
            .returning(|_| Ok(vec![]));
        runtime
            .expect_remove_dir_all()
            .times(2)
            .returning(|_| Ok(()));

        // No aside: the injected file is simply removed on unwind.
        runtime
            .expect_remove_file()
            .with(eq(setup_cfg.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let build_ext = vec![("debug".to_string(), "1".to_string())];
        dev_installer()
            .develop(
                &runtime,
                &accepting_satisfier(),
                &src,
                &dest,
                &build_ext,
                &WorkingSet::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_develop_accepts_direct_setup_py_path() {
        let setup = PathBuf::from("/work/demo/setup.py");
        let dest = PathBuf::from("/opt/deploy/eggs");
        let mut runtime = MockRuntime::new();

        runtime
            .expect_is_dir()
            .with(eq(setup.clone()))
            .returning(|_| false);

        let mut satisfier = MockRequirementSatisfier::new();
        satisfier
            .expect_satisfy()
            .with(eq("/work/demo"), always())
            .times(1)
            .returning(|_, _| Ok(()));

        expect_develop_run(&mut runtime, &dest, 0);
        runtime
            .expect_read_dir()
            .with(eq(dest.join("build-x")))
            .returning(|_| Ok(vec![]));
        runtime
            .expect_remove_dir_all()
            .times(2)
            .returning(|_| Ok(()));

        dev_installer()
            .develop(
                &runtime,
                &satisfier,
                &setup,
                &dest,
                &[],
                &WorkingSet::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_render_bootstrap_quotes_and_chdirs() {
        let script = render_bootstrap(
            "/a/x.egg:/b/y.egg",
            Path::new("/work/demo/setup.py"),
            Path::new("/work/demo"),
        );
        assert!(script.contains(r#""/a/x.egg:/b/y.egg".split(os.pathsep)"#));
        assert!(script.contains(r#"os.chdir("/work/demo")"#));
        assert!(script.contains(r#"sys.argv[0] = "/work/demo/setup.py""#));
        assert!(script.contains(r#"exec(compile(open("/work/demo/setup.py").read()"#));
    }

    #[test]
    fn test_python_str_escapes() {
        assert_eq!(python_str(r"C:\eggs"), r#""C:\\eggs""#);
        assert_eq!(python_str(r#"a"b"#), r#""a\"b""#);
    }

    #[test]
    fn test_render_build_ext() {
        let options = vec![
            ("include-dirs".to_string(), "/usr/include".to_string()),
            ("debug".to_string(), "1".to_string()),
        ];
        assert_eq!(
            render_build_ext(&options),
            "[build_ext]\ninclude-dirs = /usr/include\ndebug = 1\n"
        );
    }
}
