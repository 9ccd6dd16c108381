// Shared fixtures for integration tests: scratch kernel trees, description
// directories and canned extraction facts.

#![allow(dead_code)]

use kdescgen::config::Config;
use kdescgen::extract::{Extractor, Facts};
use kdescgen::targets::Target;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const X86_64_TABLE: &str = "arch/x86/entry/syscalls/syscall_64.tbl";

pub const BASIC_TABLE: &str = "\
#
# 64-bit system call numbers and entry vectors
#
0\tcommon\tread\t\t\tsys_read
43\tcommon\taccept\t\t\tsys_accept
169\tcommon\treboot\t\t\tsys_reboot
288\tcommon\taccept4\t\t\tsys_accept4
";

pub const MANUAL_DESCRIPTIONS: &str = "\
resource sock[fd]

read(fd fd, buf ptr[out, array[int8]], count len[buf, intptr])

manual_spare {
\tx\tint8
}
";

pub const BASIC_FACTS: &str = r#"{
  "includes": ["linux/socket.h"],
  "syscalls": [
    {"func": "accept4", "source_file": "net/socket.c", "access": "user",
     "args": [{"name": "fd", "type": "sock"},
              {"name": "peer", "type": "ptr[out, sockaddr_auto, opt]"}]},
    {"func": "read", "source_file": "fs/read_write.c", "access": "user",
     "args": [{"name": "fd", "type": "fd"}]}
  ],
  "structs": [
    {"name": "sockaddr_auto", "fields": [{"name": "family", "type": "int16"}]},
    {"name": "unused_auto", "fields": [{"name": "y", "type": "int32"}]}
  ]
}"#;

/// Scratch workspace: kernel tree, description dir and workdir
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn kernel(&self) -> PathBuf {
        self.dir.path().join("linux")
    }

    pub fn descriptions(&self) -> PathBuf {
        self.dir.path().join("sys/linux")
    }

    pub fn auto_file(&self) -> PathBuf {
        self.descriptions().join("auto.txt")
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.descriptions().join("auto.txt.info")
    }

    pub fn write_table(&self, rel: &str, content: &str) -> &Self {
        write(&self.kernel().join(rel), content);
        self
    }

    pub fn write_description(&self, name: &str, content: &str) -> &Self {
        write(&self.descriptions().join(name), content);
        self
    }

    pub fn config(&self) -> Config {
        Config {
            kernel_src: self.kernel(),
            kernel_obj: None,
            workdir: self.dir.path().join("workdir"),
            descriptions: self.descriptions(),
            auto_file: "auto.txt".to_string(),
            subsystems: None,
            target: Target::default(),
        }
    }

    /// TOML config equivalent to [`Workspace::config`]
    pub fn write_config(&self) -> PathBuf {
        let path = self.dir.path().join("kdescgen.toml");
        let text = format!(
            "kernel_src = {:?}\nworkdir = {:?}\ndescriptions = {:?}\n",
            self.kernel(),
            self.dir.path().join("workdir"),
            self.descriptions()
        );
        fs::write(&path, text).unwrap();
        path
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }
}

pub fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Extractor returning canned facts
pub struct CannedFacts(pub String);

impl Extractor for CannedFacts {
    fn extract(&self) -> kdescgen::Result<Facts> {
        Facts::from_json(&self.0).map_err(|e| kdescgen::Error::ExtractionTool(e.to_string()))
    }
}

/// Extractor that always fails
pub struct BrokenTool;

impl Extractor for BrokenTool {
    fn extract(&self) -> kdescgen::Result<Facts> {
        Err(kdescgen::Error::ExtractionTool(
            "clang: error: no such file".to_string(),
        ))
    }
}
