//! Run configuration loaded from a TOML file
//!
//! # Example kdescgen.toml
//!
//! ```toml
//! kernel_src = "/src/linux"
//! kernel_obj = "/build/linux"
//! workdir = "/var/kdescgen"
//! descriptions = "sys/linux"
//!
//! [target]
//! os = "linux"
//! arch = "amd64"
//! ```

use crate::description::DESCRIPTION_EXT;
use crate::error::{Error, Result};
use crate::targets::Target;
use serde::Deserialize;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the cache directory created under the workdir
pub const CACHE_DIR_NAME: &str = "kdescgen.cache";

fn default_descriptions() -> PathBuf {
    PathBuf::from("sys/linux")
}

fn default_auto_file() -> String {
    "auto.txt".to_string()
}

/// Configuration file contents
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Kernel source tree root
    pub kernel_src: PathBuf,

    /// Kernel build output (defaults to `kernel_src`)
    #[serde(default)]
    pub kernel_obj: Option<PathBuf>,

    /// Working directory; the extraction cache lives under it
    pub workdir: PathBuf,

    /// Directory holding every `*.txt` description file
    #[serde(default = "default_descriptions")]
    pub descriptions: PathBuf,

    /// File name of the synthesized descriptions inside `descriptions`
    #[serde(default = "default_auto_file")]
    pub auto_file: String,

    /// Optional subsystem ownership rules (builtin list when absent)
    #[serde(default)]
    pub subsystems: Option<PathBuf>,

    #[serde(default)]
    pub target: Target,
}

impl Config {
    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.kernel_src.as_os_str().is_empty() {
            return Err(Error::Configuration("kernel_src must be set".to_string()));
        }
        if self.workdir.as_os_str().is_empty() {
            return Err(Error::Configuration("workdir must be set".to_string()));
        }
        if self.auto_file.is_empty() || self.auto_file.contains('/') {
            return Err(Error::Configuration(format!(
                "auto_file must be a plain file name, got {:?}",
                self.auto_file
            )));
        }
        if Path::new(&self.auto_file).extension() != Some(OsStr::new(DESCRIPTION_EXT)) {
            return Err(Error::Configuration(format!(
                "auto_file must have the .{} extension of description files, got {:?}",
                DESCRIPTION_EXT, self.auto_file
            )));
        }
        if !self.target.is_supported() {
            return Err(Error::Configuration(format!(
                "unsupported target {}",
                self.target
            )));
        }
        Ok(())
    }

    pub fn kernel_obj(&self) -> &Path {
        self.kernel_obj.as_deref().unwrap_or(&self.kernel_src)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.workdir.join(CACHE_DIR_NAME)
    }

    /// Full path of the synthesized description file
    pub fn auto_path(&self) -> PathBuf {
        self.descriptions.join(&self.auto_file)
    }
}
