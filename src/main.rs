use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use vk_bundle::{Config, NoDocs, Options, ResolveMode};

/// Generates definition bundles from the Vulkan registry.
#[derive(Parser, Debug)]
#[command(name = "vk-bundle", version)]
struct Args {
    /// Root of the registry checkout, containing xml/vk.xml
    #[arg(value_name = "SOURCE")]
    source_root: PathBuf,

    /// Existing directory receiving the generated files
    #[arg(value_name = "DEST")]
    destination_root: PathBuf,

    /// Fail on references to undefined names instead of skipping them
    #[arg(long)]
    strict: bool,

    /// API whose elements are kept
    #[arg(long, value_name = "NAME", default_value = vk_bundle::config::DEFAULT_API)]
    api: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let options = Options {
        api: args.api,
        mode: if args.strict {
            ResolveMode::Strict
        } else {
            ResolveMode::Lenient
        },
    };
    let config = Config::new(args.source_root, args.destination_root, options);
    config.validate()?;

    let registry_path = config.registry_path();
    info!(path = %registry_path.display(), "loading registry");
    let registry = vk_bundle::load_file(&registry_path, &config.options)?;

    let output = vk_bundle::generate(&registry, &config.options, &NoDocs)?;
    let written = vk_bundle::write_output(&config.destination_root, &output)?;

    let unresolved = output.diagnostics.unresolved_references();
    if !unresolved.is_empty() {
        warn!(count = unresolved.len(), "references to undefined names were skipped");
    }
    for entry in vk_bundle::subst::unused(&output.diagnostics) {
        info!(entry, "substitution table entry never used");
    }
    info!(
        files = written.len(),
        dest = %config.destination_root.display(),
        "done"
    );
    Ok(())
}
