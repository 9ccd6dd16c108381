//! Running the source analysis tool, with an optional result cache

use super::facts::Facts;
use crate::config::Config;
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Source of raw extraction facts
pub trait Extractor {
    fn extract(&self) -> Result<Facts>;
}

/// Runs `<binary> --kernel-src <src> --kernel-obj <obj>` and reads JSON facts from stdout
#[derive(Debug, Clone)]
pub struct ToolExtractor {
    pub binary: PathBuf,
    pub kernel_src: PathBuf,
    pub kernel_obj: PathBuf,
    pub cache_dir: PathBuf,
    pub reuse_cache: bool,
}

impl ToolExtractor {
    pub fn from_config(config: &Config, binary: impl Into<PathBuf>, reuse_cache: bool) -> Self {
        Self {
            binary: binary.into(),
            kernel_src: config.kernel_src.clone(),
            kernel_obj: config.kernel_obj().to_path_buf(),
            cache_dir: config.cache_dir(),
            reuse_cache,
        }
    }

    /// Cache file for this tool/kernel combination
    pub fn cache_file(&self) -> PathBuf {
        let mut hasher = Sha256::new();
        for part in [&self.binary, &self.kernel_src, &self.kernel_obj] {
            hasher.update(part.to_string_lossy().as_bytes());
            hasher.update([0u8]);
        }
        self.cache_dir
            .join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    fn run_tool(&self) -> Result<String> {
        info!("Running {}", self.binary.display());
        let output = Command::new(&self.binary)
            .arg("--kernel-src")
            .arg(&self.kernel_src)
            .arg("--kernel-obj")
            .arg(&self.kernel_obj)
            .output()
            .map_err(|e| {
                Error::ExtractionTool(format!("failed to run {}: {}", self.binary.display(), e))
            })?;
        if !output.status.success() {
            return Err(Error::ExtractionTool(format!(
                "{} failed ({}):\n{}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        String::from_utf8(output.stdout).map_err(|e| {
            Error::ExtractionTool(format!("{} printed invalid UTF-8: {}", self.binary.display(), e))
        })
    }

    fn store(&self, path: &Path, data: &str) {
        let stored = fs::create_dir_all(&self.cache_dir).and_then(|_| fs::write(path, data));
        if let Err(e) = stored {
            warn!("Failed to cache extraction output in {}: {}", path.display(), e);
        }
    }
}

fn decode(data: &str, origin: &Path) -> Result<Facts> {
    Facts::from_json(data)
        .map_err(|e| Error::ExtractionTool(format!("{}: {:#}", origin.display(), e)))
}

impl Extractor for ToolExtractor {
    fn extract(&self) -> Result<Facts> {
        let cache = self.cache_file();
        if self.reuse_cache {
            if let Ok(data) = fs::read_to_string(&cache) {
                info!("Reusing cached extraction output {}", cache.display());
                return decode(&data, &cache);
            }
        }
        let data = self.run_tool()?;
        let facts = decode(&data, &self.binary)?;
        self.store(&cache, &data);
        Ok(facts)
    }
}
