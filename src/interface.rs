//! Interface catalog: per-interface provenance and ownership metadata
//!
//! Serialized one record per line, tab separated:
//!
//! ```text
//! SYSCALL	accept4	func:accept4	access:user	manual_desc:false	auto_desc:true	file:net/socket.c	subsystem:net
//! ```

use crate::description::ConstMap;
use crate::subsystem::{PathLocator, SubsystemClassifier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;
use tracing::debug;

/// Suffix appended to the synthesized file name for the catalog
pub const CATALOG_SUFFIX: &str = ".info";

/// One interface exposed by the kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub func: String,
    pub access: String,
    pub manual_desc: bool,
    pub auto_desc: bool,
    pub identifying_const: String,
    pub files: Vec<String>,
    pub subsystems: Vec<String>,
}

/// Render the catalog, one line per interface
pub fn serialize(interfaces: &[Interface]) -> String {
    let mut out = String::new();
    for iface in interfaces {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "{}\t{}\tfunc:{}\taccess:{}\tmanual_desc:{}\tauto_desc:{}",
            iface.kind, iface.name, iface.func, iface.access, iface.manual_desc, iface.auto_desc
        );
        for file in &iface.files {
            let _ = write!(out, "\tfile:{}", file);
        }
        for subsystem in &iface.subsystems {
            let _ = write!(out, "\tsubsystem:{}", subsystem);
        }
        out.push('\n');
    }
    out
}

/// Fill in manual-description flags and owning subsystems.
///
/// An interface has a manual description when its identifying constant is
/// used by any description file other than `auto_file`.
pub fn finish_interfaces(
    interfaces: &mut [Interface],
    consts: &ConstMap,
    auto_file: &str,
    classifier: &dyn SubsystemClassifier,
) {
    let manual: HashSet<&str> = consts
        .iter()
        .filter(|(file, _)| file.as_str() != auto_file)
        .flat_map(|(_, names)| names.iter().map(String::as_str))
        .collect();

    for iface in interfaces.iter_mut() {
        iface.manual_desc = manual.contains(iface.identifying_const.as_str());
        let locators: Vec<PathLocator> = iface.files.iter().map(PathLocator::new).collect();
        iface.subsystems = classifier
            .extract(&locators)
            .into_iter()
            .map(|s| s.name.clone())
            .collect();
        iface.subsystems.sort();
        iface.subsystems.dedup();
    }
    debug!(
        "{} of {} interfaces have manual descriptions",
        interfaces.iter().filter(|i| i.manual_desc).count(),
        interfaces.len()
    );
}
