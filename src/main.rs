use anyhow::{Context, Result};
use clap::Parser;
use kdescgen::{cli::Cli, config::Config, extract::ToolExtractor, pipeline, subsystem::PathRules};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` forces TRACE level
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    let classifier = match &config.subsystems {
        Some(path) => PathRules::from_file(path)?,
        None => PathRules::builtin(&config.target.os)?,
    };
    let extractor = ToolExtractor::from_config(&config, &args.binary, args.cache_extract);

    let summary = pipeline::run(&config, &extractor, &classifier)?;

    println!(
        "{}: {} interfaces, {} unused declarations pruned",
        summary.auto_file.display(),
        summary.interfaces.len(),
        summary.pruned
    );
    println!("{}: catalog", summary.catalog_file.display());
    Ok(())
}
