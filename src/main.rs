use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use eggshell::config::Config;
use eggshell::develop::DevelopInstaller;
use eggshell::install::Installer;
use eggshell::runtime::{RealRuntime, Runtime};
use eggshell::workset::{UncheckedRequirements, WorkingSet};

/// eggshell - local egg installer
///
/// Install packages with easy_install into a deployment directory, or wire up
/// a source tree in editable (develop) mode, against a working set spanning
/// both development and deployment prefixes.
///
/// Examples:
///   eggshell install demo==1.0 --dest ./eggs
///   eggshell develop ./src/demo --dest ./eggs
#[derive(Parser, Debug)]
#[command(author, version = env!("EGGSHELL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration profile (also via EGGSHELL_CONFIG)
    #[arg(
        long = "config",
        short = 'c',
        env = "EGGSHELL_CONFIG",
        value_name = "FILE",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Python interpreter to run the installer with
    #[arg(long = "python", value_name = "EXE", default_value = "python", global = true)]
    pub python: String,

    /// Prefix directory to search for installed eggs (repeatable; overrides
    /// the profile's prefixes)
    #[arg(long = "prefix", value_name = "DIR", global = true)]
    pub prefixes: Vec<PathBuf>,

    /// Verbose installer output
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a requirement into a destination directory
    Install(InstallArgs),

    /// Install a source tree in editable (develop) mode
    Develop(DevelopArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// The requirement, as "name" or "name==version"
    #[arg(value_name = "SPEC")]
    pub spec: String,

    /// Directory to install into
    #[arg(long = "dest", short = 'd', value_name = "DIR")]
    pub dest: PathBuf,

    /// Alternate package-source links for the installer
    #[arg(long = "find-links", short = 'f', value_name = "URLS")]
    pub find_links: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DevelopArgs {
    /// Source directory, or a direct path to its setup.py
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Directory to place the egg-link files into
    #[arg(long = "dest", short = 'd', value_name = "DIR")]
    pub dest: PathBuf,

    /// build_ext option, as KEY=VALUE (repeatable)
    #[arg(long = "build-ext", value_name = "KEY=VALUE")]
    pub build_ext: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    let mut config = match &cli.config {
        Some(path) => Config::load(&runtime, path)?,
        None => Config::default(),
    };
    if cli.verbose {
        config.verbose = true;
    }
    if !cli.prefixes.is_empty() {
        config.prefixes = cli.prefixes.clone();
    }

    match cli.command {
        Commands::Install(args) => {
            if let Some(links) = &args.find_links {
                config.find_links = Some(links.clone());
            }
            let ws = WorkingSet::from_prefixes(&runtime, &config.prefixes)?;
            runtime.create_dir_all(&args.dest)?;

            let installer = Installer::new(&cli.python, &config);
            let req = args.spec.parse()?;
            let dists =
                installer.install(&runtime, &UncheckedRequirements, &req, &ws, &args.dest)?;
            for dist in dists {
                println!(
                    "  installed {} {} {}",
                    dist.project_name,
                    dist.version,
                    dist.location.display()
                );
            }
        }
        Commands::Develop(args) => {
            let build_ext = parse_key_values(&args.build_ext)?;
            let ws = WorkingSet::from_prefixes(&runtime, &config.prefixes)?;
            runtime.create_dir_all(&args.dest)?;

            let installer = DevelopInstaller::new(&cli.python, &config);
            let links = installer.develop(
                &runtime,
                &UncheckedRequirements,
                &args.path,
                &args.dest,
                &build_ext,
                &ws,
            )?;
            for link in links {
                println!("  developed {}", link.display());
            }
        }
    }
    Ok(())
}

fn parse_key_values(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Invalid option {:?}: expected KEY=VALUE", pair))?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}
