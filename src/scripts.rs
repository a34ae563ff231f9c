//! Wrapper-script generation requests.
//!
//! Script generation itself belongs to the host engine; this crate only
//! composes the parameter blocks. Each generator builds one [`ScriptRequest`]
//! and hands it to the host's [`ScriptInstaller`] capability. [`ScriptSet`]
//! bundles the whole standard family.

use anyhow::Result;
use std::path::PathBuf;

/// Everything the host needs to generate one group of wrapper scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptRequest {
    /// Packages whose console entry points are candidates for wrapping.
    pub eggs: Vec<String>,
    /// Restrict generation to these script names. Empty means no filter:
    /// every console entry point of the egg set gets a wrapper.
    pub scripts: Vec<String>,
    /// Extra entry points, as `name=module:callable` strings.
    pub entry_points: Vec<String>,
    /// Generate an interpreter wrapper under this name.
    pub interpreter: Option<String>,
    /// Also wrap the scripts of the eggs' dependencies.
    pub dependent_scripts: bool,
    /// Verbatim code prepended to every generated wrapper.
    pub initialization: String,
}

/// The host's script-installation primitive. Returns the paths of the
/// scripts it wrote.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptInstaller {
    fn install_scripts(&self, request: &ScriptRequest) -> Result<Vec<PathBuf>>;
}

/// Options shared by the recipe family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    /// The packages this deployment wires up.
    pub eggs: Vec<String>,
    /// Name for the interpreter wrapper and derived script names.
    pub interpreter: String,
    /// Flags pre-seeded into the test runner's argument list.
    pub nose_flags: Vec<String>,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            eggs: Vec::new(),
            interpreter: "python".to_string(),
            nose_flags: Vec::new(),
        }
    }
}

/// One generator in the family: build a request, hand it to the host.
pub trait ScriptRecipe {
    fn request(&self) -> ScriptRequest;

    fn install<I: ScriptInstaller>(&self, installer: &I) -> Result<Vec<PathBuf>> {
        installer.install_scripts(&self.request())
    }

    fn update<I: ScriptInstaller>(&self, installer: &I) -> Result<Vec<PathBuf>> {
        self.install(installer)
    }
}

/// Append a package to an egg list unless it is already there.
pub fn add_eggs(eggs: &[String], package: &str) -> Vec<String> {
    let mut eggs = eggs.to_vec();
    if !eggs.iter().any(|e| e == package) {
        eggs.push(package.to_string());
    }
    eggs
}

/// An interpreter wrapper that sees the configured egg set.
pub struct InterpreterScripts {
    options: ScriptOptions,
}

impl InterpreterScripts {
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }
}

impl ScriptRecipe for InterpreterScripts {
    fn request(&self) -> ScriptRequest {
        ScriptRequest {
            eggs: self.options.eggs.clone(),
            scripts: vec![self.options.interpreter.clone()],
            interpreter: Some(self.options.interpreter.clone()),
            dependent_scripts: false,
            ..ScriptRequest::default()
        }
    }
}

/// Wrappers for every console entry point the configured eggs declare.
pub struct UserScripts {
    options: ScriptOptions,
}

impl UserScripts {
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }
}

impl ScriptRecipe for UserScripts {
    fn request(&self) -> ScriptRequest {
        ScriptRequest {
            eggs: self.options.eggs.clone(),
            ..ScriptRequest::default()
        }
    }
}

/// A secondary interactive interpreter (`i<name>`) backed by IPython.
pub struct IPythonScripts {
    options: ScriptOptions,
}

impl IPythonScripts {
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }
}

impl ScriptRecipe for IPythonScripts {
    fn request(&self) -> ScriptRequest {
        let name = format!("i{}", self.options.interpreter);
        ScriptRequest {
            eggs: add_eggs(&self.options.eggs, "ipython"),
            scripts: vec![name.clone()],
            entry_points: vec![format!(
                "{}=IPython.frontend.terminal.ipapp:launch_new_instance",
                name
            )],
            dependent_scripts: false,
            ..ScriptRequest::default()
        }
    }
}

/// The `nosetests` wrapper, with any configured flags baked into its
/// argument list before the runner starts.
pub struct TestRunnerScripts {
    options: ScriptOptions,
}

impl TestRunnerScripts {
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }
}

impl ScriptRecipe for TestRunnerScripts {
    fn request(&self) -> ScriptRequest {
        let initialization = self
            .options
            .nose_flags
            .iter()
            .map(|flag| format!("sys.argv.append('{}')\n", flag))
            .collect();
        ScriptRequest {
            eggs: add_eggs(&self.options.eggs, "nose"),
            scripts: vec!["nosetests".to_string()],
            entry_points: vec!["nosetests=nose:run_exit".to_string()],
            dependent_scripts: false,
            initialization,
            ..ScriptRequest::default()
        }
    }
}

/// The documentation toolchain wrappers.
pub struct SphinxScripts {
    options: ScriptOptions,
}

impl SphinxScripts {
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }
}

const SPHINX_SCRIPTS: [&str; 4] = [
    "sphinx-build",
    "sphinx-apidoc",
    "sphinx-autogen",
    "sphinx-quickstart",
];

impl ScriptRecipe for SphinxScripts {
    fn request(&self) -> ScriptRequest {
        ScriptRequest {
            eggs: add_eggs(&self.options.eggs, "sphinx"),
            scripts: SPHINX_SCRIPTS.iter().map(|s| s.to_string()).collect(),
            dependent_scripts: false,
            ..ScriptRequest::default()
        }
    }
}

/// The whole standard wrapper family as one unit: interpreter, user
/// scripts, secondary interpreter, test runner, documentation tools.
pub struct ScriptSet {
    interpreter: InterpreterScripts,
    user: UserScripts,
    ipython: IPythonScripts,
    test_runner: TestRunnerScripts,
    sphinx: SphinxScripts,
}

impl ScriptSet {
    pub fn new(options: ScriptOptions) -> Self {
        Self {
            interpreter: InterpreterScripts::new(options.clone()),
            user: UserScripts::new(options.clone()),
            ipython: IPythonScripts::new(options.clone()),
            test_runner: TestRunnerScripts::new(options.clone()),
            sphinx: SphinxScripts::new(options),
        }
    }

    /// Install all five groups, returning their script paths concatenated in
    /// the order the groups are listed above.
    pub fn install<I: ScriptInstaller>(&self, installer: &I) -> Result<Vec<PathBuf>> {
        let mut paths = self.interpreter.install(installer)?;
        paths.extend(self.user.install(installer)?);
        paths.extend(self.ipython.install(installer)?);
        paths.extend(self.test_runner.install(installer)?);
        paths.extend(self.sphinx.install(installer)?);
        Ok(paths)
    }

    pub fn update<I: ScriptInstaller>(&self, installer: &I) -> Result<Vec<PathBuf>> {
        self.install(installer)
    }
}
