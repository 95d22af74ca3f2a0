use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use eyre::Context;
use sysgen::{
    config::Variant,
    pipeline::{ACCELERATED_HEADER, OUTPUT, REFERENCE_HEADER},
    translate::Bindgen,
    Pipeline,
};

mod configuration;

/// Regenerate the checked-in BLAKE2 FFI bindings
#[derive(Parser)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[clap(flatten)]
    generate: PipelineArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the headers and rewrite the bindings file (default)
    Generate(PipelineArgs),
    /// Fail if the committed bindings differ from a fresh translation
    Check(PipelineArgs),
    /// Only check that the reference and SSE headers are identical
    VerifyHeaders(PipelineArgs),
}

#[derive(Args)]
struct PipelineArgs {
    /// Project root; relative paths are resolved against it [default: the
    /// config's `root`, else `.`]
    #[arg(long, env("REGEN_ROOT"))]
    root: Option<PathBuf>,

    /// Configuration file [default: `regen.toml` under `--root` or `.`, if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generation variant: `cty` or `std`
    #[arg(long)]
    variant: Option<Variant>,

    /// Reference implementation header
    #[arg(long)]
    reference: Option<PathBuf>,

    /// SIMD implementation header
    #[arg(long)]
    accelerated: Option<PathBuf>,

    /// Bindings file to write
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl PipelineArgs {
    fn pipeline(self) -> eyre::Result<Pipeline> {
        let search_dir = self.root.clone().unwrap_or_else(|| PathBuf::from("."));
        let config = configuration::get_configuration(&search_dir, self.config.as_deref())
            .wrap_err("loading configuration")?;

        let generation = config.generation_config(self.variant);
        log::debug!("generation config: {generation:?}");

        Ok(Pipeline {
            reference: self
                .reference
                .or(config.reference)
                .unwrap_or_else(|| REFERENCE_HEADER.into()),
            accelerated: self
                .accelerated
                .or(config.accelerated)
                .unwrap_or_else(|| ACCELERATED_HEADER.into()),
            output: self
                .output
                .or(config.output)
                .unwrap_or_else(|| OUTPUT.into()),
            root: self
                .root
                .or(config.root)
                .unwrap_or_else(|| PathBuf::from(".")),
            config: generation,
        })
    }
}

fn generate(args: PipelineArgs) -> eyre::Result<()> {
    let pipeline = args.pipeline()?;
    let emitted = pipeline.generate(&Bindgen)?;
    println!(
        "Wrote {} ({} bytes, {} functions, {} structs)",
        emitted.path.display(),
        emitted.bytes,
        emitted.summary.functions.len(),
        emitted.summary.structs.len(),
    );
    Ok(())
}

fn check(args: PipelineArgs) -> eyre::Result<()> {
    let pipeline = args.pipeline()?;
    pipeline.check(&Bindgen)?;
    println!("{} is up to date", pipeline.output.display());
    Ok(())
}

fn verify_headers(args: PipelineArgs) -> eyre::Result<()> {
    let pipeline = args.pipeline()?;
    let header = pipeline.verify()?;
    println!(
        "{} and {} are identical ({} bytes)",
        pipeline.reference.display(),
        pipeline.accelerated.display(),
        header.content.len()
    );
    Ok(())
}

fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Cli::parse();

    match args.command.unwrap_or(Commands::Generate(args.generate)) {
        Commands::Generate(args) => generate(args)?,
        Commands::Check(args) => check(args)?,
        Commands::VerifyHeaders(args) => verify_headers(args)?,
    }

    Ok(())
}
