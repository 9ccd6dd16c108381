//! Description synthesis pipeline
//!
//! Strictly sequential; every step consumes the complete output of the
//! previous one:
//!
//! 1. resolve syscall identities from `*.tbl` files
//! 2. extract facts, synthesize drafts, checkpoint them on disk
//! 3. parse every description file as one document set
//! 4. collect unused declarations (on a clone)
//! 5. extract per-file constants (on another clone), enrich and persist the catalog
//! 6. prune unused synthesized declarations
//! 7. format -> parse -> format and persist the synthesized file
//!
//! Synthesized declarations must be written out and parsed back together
//! with the manual ones because they reference manually declared types.

use crate::config::Config;
use crate::description::{self, Description, NodeId};
use crate::diagnostics::{Diagnostics, Pos};
use crate::error::{Error, Result};
use crate::extract::{synthesize, Extractor};
use crate::interface::{self, Interface, CATALOG_SUFFIX};
use crate::subsystem::SubsystemClassifier;
use crate::syscall_table;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub auto_file: PathBuf,
    pub catalog_file: PathBuf,
    pub interfaces: Vec<Interface>,
    pub unused: BTreeSet<NodeId>,
    pub pruned: usize,
}

/// Path of the interface catalog next to the synthesized file
pub fn catalog_path(auto_file: &Path) -> PathBuf {
    let mut name = auto_file.as_os_str().to_owned();
    name.push(CATALOG_SUFFIX);
    PathBuf::from(name)
}

fn persist(path: &Path, data: &str) -> Result<()> {
    let written = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
    .and_then(|_| fs::write(path, data));
    written.map_err(|source| Error::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Remove unused declarations that came from `auto_file`.
///
/// Declarations from any other file are never removed, whatever the
/// unused set says. Returns the number of removed nodes.
pub fn prune(desc: &mut Description, unused: &BTreeSet<NodeId>, auto_file: &str) -> usize {
    let before = desc.nodes.len();
    desc.nodes.retain(|node| {
        node.pos().file != auto_file || node.id().map_or(true, |id| !unused.contains(&id))
    });
    before - desc.nodes.len()
}

/// Run the whole pipeline for `config`
pub fn run(
    config: &Config,
    extractor: &dyn Extractor,
    classifier: &dyn SubsystemClassifier,
) -> Result<RunSummary> {
    let auto_path = config.auto_path();
    let auto_file = auto_path.to_string_lossy().into_owned();
    let catalog_file = catalog_path(&auto_path);

    let identity = syscall_table::build_identity_map(&config.kernel_src, &config.target)?;

    let facts = extractor.extract()?;
    let draft = synthesize(&facts, &identity);
    let mut interfaces = draft.interfaces;
    info!(
        "Synthesized {} interfaces from {} syscall facts",
        interfaces.len(),
        facts.syscalls.len()
    );
    persist(&auto_path, &draft.descriptions)?;
    persist(&catalog_file, &interface::serialize(&interfaces))?;

    let mut diags = Diagnostics::new();
    let Some(mut desc) = description::parse_glob(&config.descriptions, &mut diags) else {
        return Err(Error::ParseFailure(diags.render()));
    };
    info!("Parsed {} description nodes", desc.nodes.len());

    let Some(unused) = description::collect_unused(desc.clone(), &config.target, &mut diags)
    else {
        return Err(Error::TypeCheckFailure(diags.render()));
    };
    let Some(consts) = description::extract_consts(desc.clone(), &config.target, &mut diags)
    else {
        return Err(Error::TypeCheckFailure(diags.render()));
    };

    interface::finish_interfaces(&mut interfaces, &consts, &auto_file, classifier);
    persist(&catalog_file, &interface::serialize(&interfaces))?;

    let pruned = prune(&mut desc, &unused, &auto_file);
    info!("Pruned {} unused synthesized declarations", pruned);

    let synthesized = desc.file_nodes(&auto_file);
    if synthesized.nodes.is_empty() {
        diags.report(
            Pos::new(auto_file.as_str(), 0, 0),
            "synthesized file was not parsed back with the descriptions",
        );
        return Err(Error::ParseFailure(diags.render()));
    }
    let Some(formatted) = description::format_stable(&synthesized, &auto_file, &mut diags) else {
        return Err(Error::ParseFailure(diags.render()));
    };
    persist(&auto_path, &formatted)?;

    Ok(RunSummary {
        auto_file: auto_path,
        catalog_file,
        interfaces,
        unused,
        pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{Node, NodeKind};

    fn decl(file: &str, name: &str) -> Node {
        Node::Flags {
            pos: Pos::new(file, 1, 1),
            name: name.to_string(),
            values: Vec::new(),
        }
    }

    #[test]
    fn test_catalog_path_appends_suffix() {
        assert_eq!(
            catalog_path(Path::new("sys/linux/auto.txt")),
            PathBuf::from("sys/linux/auto.txt.info")
        );
    }

    #[test]
    fn test_prune_keeps_manual_even_if_unused() {
        let mut desc = Description::new(vec![
            decl("sys/linux/manual.txt", "spare_flags"),
            decl("sys/linux/auto.txt", "spare_flags_auto"),
            decl("sys/linux/auto.txt", "used_flags"),
            Node::NewLine {
                pos: Pos::new("sys/linux/auto.txt", 2, 1),
            },
        ]);
        let unused: BTreeSet<NodeId> = [
            NodeId::new(NodeKind::Flags, "spare_flags"),
            NodeId::new(NodeKind::Flags, "spare_flags_auto"),
        ]
        .into_iter()
        .collect();
        let removed = prune(&mut desc, &unused, "sys/linux/auto.txt");
        assert_eq!(removed, 1);
        let names: Vec<_> = desc.nodes.iter().filter_map(|n| n.name()).collect();
        assert_eq!(names, vec!["spare_flags", "used_flags"]);
        assert_eq!(desc.nodes.len(), 3);
    }

    #[test]
    fn test_prune_matches_kind_and_name() {
        let mut desc = Description::new(vec![decl("auto.txt", "x")]);
        let unused: BTreeSet<NodeId> =
            [NodeId::new(NodeKind::Struct, "x")].into_iter().collect();
        assert_eq!(prune(&mut desc, &unused, "auto.txt"), 0);
    }

    #[test]
    fn test_persist_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a/b/auto.txt");
        persist(&path, "x\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "x\n");
    }

    #[test]
    fn test_persist_failure_is_persistence_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let err = persist(&blocker.join("auto.txt"), "x").unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }
}
