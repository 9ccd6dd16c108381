//! Syscall identity resolution from per-architecture `*.tbl` files
//!
//! Kernel functions defined with `SYSCALL_DEFINE` are not always named like the
//! syscall they implement (e.g. `setuid16` is referred to as `setuid`). The
//! `*.tbl` files record the mapping per architecture:
//!
//! ```text
//! 288      common  accept4                 sys_accept4
//! ```
//!
//! The mapping is many-to-many, so every syscall name gets exactly one
//! authoritative record picked by a total order: target architecture first,
//! then 64-bit records, then architecture name, then entry symbol.

use crate::error::{Error, Result};
use crate::targets::Target;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name suffix of syscall table files
pub const TABLE_SUFFIX: &str = ".tbl";

/// Kernel-internal prefix stripped from entry symbols
pub const ENTRY_PREFIX: &str = "sys_";

/// One parsed table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub entry_symbol: String,
    pub arch: String,
    pub is_64bit: bool,
}

/// Sort key for choosing the authoritative record of a syscall name.
///
/// Field order is the priority order; `false` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority<'a> {
    pub not_target_arch: bool,
    pub not_64bit: bool,
    pub arch: &'a str,
    pub entry_symbol: &'a str,
}

impl TableRecord {
    pub fn priority(&self, target_arch: &str) -> Priority<'_> {
        Priority {
            not_target_arch: self.arch != target_arch,
            not_64bit: !self.is_64bit,
            arch: &self.arch,
            entry_symbol: &self.entry_symbol,
        }
    }
}

/// Entry symbol -> syscall names it implements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry_symbol: impl Into<String>, syscall: impl Into<String>) {
        self.entries
            .entry(entry_symbol.into())
            .or_default()
            .insert(syscall.into());
    }

    pub fn get(&self, entry_symbol: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(entry_symbol)
    }

    /// Number of distinct entry symbols
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.entries.iter()
    }

    /// Total number of syscall names across all symbols
    pub fn syscall_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }
}

/// Candidate records aggregated by syscall name
pub type Candidates = BTreeMap<String, Vec<TableRecord>>;

/// Build the identity map for a kernel source tree
pub fn build_identity_map(kernel_src: &Path, target: &Target) -> Result<IdentityMap> {
    let files = find_table_files(kernel_src, target)?;
    if files.is_empty() {
        return Err(Error::NoTableFilesFound(kernel_src.to_path_buf()));
    }
    info!("Parsing {} syscall table files", files.len());

    let mut candidates = Candidates::new();
    for parsed in parse_table_files(&files)? {
        for (syscall, record) in parsed {
            candidates.entry(syscall).or_default().push(record);
        }
    }

    let map = resolve(candidates, &target.arch);
    info!(
        "Resolved {} syscalls to {} entry symbols",
        map.syscall_count(),
        map.len()
    );
    Ok(map)
}

/// Discover table files under `arch/<dir>` for every supported architecture.
///
/// A file shared by several architectures (e.g. `arch/x86` for amd64 and 386)
/// lists all of them. Missing architecture directories are skipped.
pub fn find_table_files(
    kernel_src: &Path,
    target: &Target,
) -> Result<BTreeMap<PathBuf, Vec<String>>> {
    let mut files: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    for arch in target.arches() {
        let dir = kernel_src.join("arch").join(arch.kernel_header_arch);
        if !dir.is_dir() {
            debug!("No {} for arch {}", dir.display(), arch.vm_arch);
            continue;
        }
        let mut found = Vec::new();
        walk_tables(&dir, &mut found)?;
        for file in found {
            files.entry(file).or_default().push(arch.vm_arch.to_string());
        }
    }
    Ok(files)
}

fn walk_tables(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let read_err = |source: io::Error| Error::TableRead {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_dir() {
            walk_tables(&path, found)?;
        } else if path.to_string_lossy().ends_with(TABLE_SUFFIX) {
            found.push(path);
        }
    }
    Ok(())
}

/// Read and parse every table file concurrently, one job per file.
///
/// Results come back in `files` order so aggregation is independent of
/// thread scheduling.
fn parse_table_files(
    files: &BTreeMap<PathBuf, Vec<String>>,
) -> Result<Vec<Vec<(String, TableRecord)>>> {
    let joined = crossbeam::scope(|s| {
        let handles: Vec<_> = files
            .iter()
            .map(|(path, arches)| {
                s.spawn(move |_| -> Result<Vec<(String, TableRecord)>> {
                    let raw = fs::read(path).map_err(|source| Error::TableRead {
                        path: path.clone(),
                        source,
                    })?;
                    let data = String::from_utf8_lossy(&raw);
                    let mut records = Vec::new();
                    for arch in arches {
                        let parsed = parse_table(&data, arch);
                        debug!("{} ({}): {} records", path.display(), arch, parsed.len());
                        records.extend(parsed);
                    }
                    Ok(records)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)))
            .collect::<Result<Vec<_>>>()
    });
    joined.unwrap_or_else(|p| std::panic::resume_unwind(p))
}

/// Parse one table file as seen by `arch`, dropping excluded rows
pub fn parse_table(data: &str, arch: &str) -> Vec<(String, TableRecord)> {
    data.lines().filter_map(|line| parse_line(line, arch)).collect()
}

fn parse_line(line: &str, arch: &str) -> Option<(String, TableRecord)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 || fields[0].starts_with('#') {
        return None;
    }
    let group = fields[1];
    let syscall = fields[2];
    let entry = fields[3].strip_prefix(ENTRY_PREFIX).unwrap_or(fields[3]);
    if is_excluded(group, syscall, entry) {
        return None;
    }
    Some((
        syscall.to_string(),
        TableRecord {
            entry_symbol: entry.to_string(),
            arch: arch.to_string(),
            is_64bit: group == "common" || group.contains("64"),
        },
    ))
}

fn is_excluded(group: &str, syscall: &str, entry: &str) -> bool {
    syscall.starts_with("unused")
        || entry == "-"
        // powerpc spu entries (e.g. utimesat) exist on no other arch
        || group == "spu"
        // scripts/syscall.tbl lists llseek as 32-bit only, but arm64 pulls it in
        || syscall == "llseek"
        || syscall == "reboot"
}

/// Pick the authoritative record for each syscall and invert into an identity map
pub fn resolve(candidates: Candidates, target_arch: &str) -> IdentityMap {
    let mut map = IdentityMap::new();
    for (syscall, mut records) in candidates {
        records.sort_by(|a, b| a.priority(target_arch).cmp(&b.priority(target_arch)));
        if let Some(chosen) = records.first() {
            map.insert(chosen.entry_symbol.clone(), syscall);
        }
    }
    map
}
