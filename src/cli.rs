//! CLI argument parsing for Kdescgen

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kdescgen")]
#[command(version)]
#[command(about = "Synthesize syscall descriptions from kernel source facts", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Path to the source analysis tool
    #[arg(long, value_name = "PATH", default_value = "kdescgen-extract")]
    pub binary: PathBuf,

    /// Reuse cached extraction results if present (cached in <workdir>/kdescgen.cache)
    #[arg(long = "cache-extract")]
    pub cache_extract: bool,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,
}
