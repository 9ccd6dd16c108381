//! Subsystem ownership classification by source path
//!
//! Rules are `[[subsystem]]` tables mapping a name to path regexes:
//!
//! ```toml
//! [[subsystem]]
//! name = "net"
//! paths = ["^net/", "^include/net/"]
//! ```

use crate::error::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Minimal crash-like locator: only the guilty path is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLocator {
    pub guilty_path: String,
}

impl PathLocator {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            guilty_path: path.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Subsystem {
    pub name: String,
    paths: Vec<Regex>,
}

impl Subsystem {
    pub fn new(name: impl Into<String>, paths: &[&str]) -> Result<Self> {
        let name = name.into();
        let paths = paths
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    Error::Configuration(format!("subsystem {}: bad path rule {:?}: {}", name, p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { name, paths })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.paths.iter().any(|re| re.is_match(path))
    }
}

/// Maps source locations to owning subsystems
pub trait SubsystemClassifier {
    /// Subsystems owning any of the locators, without duplicates
    fn extract(&self, locators: &[PathLocator]) -> Vec<&Subsystem>;
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    subsystem: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    name: String,
    paths: Vec<String>,
}

/// Classifier driven by path regex rules
#[derive(Debug, Clone, Default)]
pub struct PathRules {
    subsystems: Vec<Subsystem>,
}

const LINUX_RULES: &[(&str, &[&str])] = &[
    ("block", &["^block/", "^include/linux/blk"]),
    ("bpf", &["^kernel/bpf/", "^include/linux/bpf"]),
    ("crypto", &["^crypto/", "^include/crypto/"]),
    ("ext4", &["^fs/ext4/"]),
    ("fs", &["^fs/", "^include/linux/fs\\.h$"]),
    ("io-uring", &["^io_uring/", "^include/linux/io_uring"]),
    ("kernel", &["^kernel/"]),
    ("mm", &["^mm/", "^include/linux/mm"]),
    ("net", &["^net/", "^include/net/", "^include/linux/net"]),
    ("netfilter", &["^net/netfilter/", "^net/ipv[46]/netfilter/"]),
    ("sound", &["^sound/"]),
];

impl PathRules {
    pub fn new(subsystems: Vec<Subsystem>) -> Self {
        Self { subsystems }
    }

    /// Builtin rules for an OS (empty for unknown OSes)
    pub fn builtin(os: &str) -> Result<Self> {
        if os != crate::targets::LINUX {
            return Ok(Self::default());
        }
        let subsystems = LINUX_RULES
            .iter()
            .map(|(name, paths)| Subsystem::new(*name, paths))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(subsystems))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RuleFile = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("invalid subsystem rules: {}", e)))?;
        let subsystems = file
            .subsystem
            .iter()
            .map(|entry| {
                let paths: Vec<&str> = entry.paths.iter().map(String::as_str).collect();
                Subsystem::new(entry.name.clone(), &paths)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(subsystems))
    }

    pub fn len(&self) -> usize {
        self.subsystems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subsystems.is_empty()
    }
}

impl SubsystemClassifier for PathRules {
    fn extract(&self, locators: &[PathLocator]) -> Vec<&Subsystem> {
        self.subsystems
            .iter()
            .filter(|s| locators.iter().any(|l| s.matches(&l.guilty_path)))
            .collect()
    }
}
