use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plugforge::pipeline;
use plugforge::{BuildConfig, BuildContext, BuildError, GccToolchain};

#[derive(Debug, Parser)]
#[command(
    name = "plugforge",
    about = "Generates plugin ABI headers and runs the staged compile/link pipeline.",
    version
)]
struct Args {
    /// Project root containing `plugins_src/` and `src/`.
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Proceed even if the NOBUILD marker is present in a watched tree
    /// (equivalent to setting PLUGFORGE_ALLOW_NOBUILD=1).
    #[arg(long)]
    allow_nobuild: bool,

    /// Compiler/linker driver to invoke.
    #[arg(long, default_value = "g++")]
    driver: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the whole pipeline: headers, both compile pools, plugin links,
    /// and the main program.
    Build,
    /// Regenerate plugin headers and the registry only.
    Generate,
    /// Compile plugin sources. With no names, compiles both pools for all
    /// plugins; with names, recompiles just those plugins' own sources.
    Compile {
        /// Plugins to recompile (default: all).
        plugins: Vec<String>,
    },
    /// Link plugins into versioned loadable modules.
    Link {
        /// Plugins to relink (default: all, at version 0).
        plugins: Vec<String>,
        /// Artifact version per named plugin, parallel to the name list.
        #[arg(long = "version", value_name = "N")]
        versions: Vec<u32>,
    },
}

fn run(args: Args) -> Result<(), BuildError> {
    let mut config = BuildConfig::from_env();
    config.allow_nobuild |= args.allow_nobuild;
    let ctx = BuildContext::new(args.project_root, config);
    let toolchain = GccToolchain::new(args.driver);

    match args.command {
        Command::Build => {
            pipeline::run_full_build(&ctx, &toolchain)?;
        }
        Command::Generate => {
            pipeline::run_generate(&ctx)?;
        }
        Command::Compile { plugins } => {
            pipeline::run_compile(&ctx, &toolchain, &plugins)?;
        }
        Command::Link { plugins, versions } => {
            let versions = if versions.is_empty() {
                None
            } else {
                Some(versions.as_slice())
            };
            pipeline::run_link(&ctx, &toolchain, &plugins, versions)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // The complete enumeration of failing files, artifacts, or
            // marker occurrences precedes the nonzero exit.
            for line in err.enumerate_failures() {
                eprintln!("error: {line}");
            }
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
