//! Target platforms and their kernel architecture directories

use serde::{Deserialize, Serialize};
use std::fmt;

pub const LINUX: &str = "linux";
pub const AMD64: &str = "amd64";

/// Operating system + architecture the descriptions are generated for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub os: String,
    pub arch: String,
}

impl Target {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Architectures supported for this target's OS
    pub fn arches(&self) -> &'static [ArchInfo] {
        arches_for(&self.os)
    }

    pub fn is_supported(&self) -> bool {
        self.arch_info().is_some()
    }

    pub fn arch_info(&self) -> Option<&'static ArchInfo> {
        self.arches().iter().find(|a| a.vm_arch == self.arch)
    }

    /// Pointer size in bytes (8 when the arch is unknown)
    pub fn ptr_size(&self) -> usize {
        self.arch_info().map_or(8, |a| a.ptr_size)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new(LINUX, AMD64)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// One architecture: its machine identifier and its `arch/<dir>` in the kernel tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchInfo {
    pub vm_arch: &'static str,
    pub kernel_header_arch: &'static str,
    pub ptr_size: usize,
}

const LINUX_ARCHES: &[ArchInfo] = &[
    ArchInfo { vm_arch: "amd64", kernel_header_arch: "x86", ptr_size: 8 },
    ArchInfo { vm_arch: "386", kernel_header_arch: "x86", ptr_size: 4 },
    ArchInfo { vm_arch: "arm64", kernel_header_arch: "arm64", ptr_size: 8 },
    ArchInfo { vm_arch: "arm", kernel_header_arch: "arm", ptr_size: 4 },
    ArchInfo { vm_arch: "mips64le", kernel_header_arch: "mips", ptr_size: 8 },
    ArchInfo { vm_arch: "ppc64le", kernel_header_arch: "powerpc", ptr_size: 8 },
    ArchInfo { vm_arch: "riscv64", kernel_header_arch: "riscv", ptr_size: 8 },
    ArchInfo { vm_arch: "s390x", kernel_header_arch: "s390", ptr_size: 8 },
];

/// Supported architectures for an OS (empty for unknown OSes)
pub fn arches_for(os: &str) -> &'static [ArchInfo] {
    match os {
        LINUX => LINUX_ARCHES,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_is_linux_amd64() {
        let target = Target::default();
        assert_eq!(target.to_string(), "linux/amd64");
        assert!(target.is_supported());
        assert_eq!(target.ptr_size(), 8);
    }

    #[test]
    fn test_32bit_arch_ptr_size() {
        assert_eq!(Target::new(LINUX, "386").ptr_size(), 4);
        assert_eq!(Target::new(LINUX, "arm").ptr_size(), 4);
    }

    #[test]
    fn test_x86_dir_serves_two_arches() {
        let x86: Vec<_> = arches_for(LINUX)
            .iter()
            .filter(|a| a.kernel_header_arch == "x86")
            .map(|a| a.vm_arch)
            .collect();
        assert_eq!(x86, vec!["amd64", "386"]);
    }

    #[test]
    fn test_unknown_os_has_no_arches() {
        let target = Target::new("plan9", "amd64");
        assert!(target.arches().is_empty());
        assert!(!target.is_supported());
    }
}
