//! Synthesis of descriptions and interface records from extraction facts

use super::facts::{Facts, FieldFact};
use crate::description::check::SYSCALL_NR_PREFIX;
use crate::interface::Interface;
use crate::syscall_table::IdentityMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use tracing::{debug, warn};

/// Header placed at the top of the synthesized file
pub const GENERATED_HEADER: &str = "# Code generated by kdescgen. DO NOT EDIT.";

/// Variant suffix of synthesized syscalls, keeps them apart from manual ones
pub const AUTO_VARIANT: &str = "$auto";

pub const SYSCALL_INTERFACE: &str = "SYSCALL";

/// Draft descriptions plus the interface records they cover
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    pub descriptions: String,
    pub interfaces: Vec<Interface>,
}

fn join_fields(fields: &[FieldFact], sep: &str) -> String {
    fields
        .iter()
        .map(|f| format!("{}{}{}", f.name, sep, f.ty))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render facts as description text, renaming entry symbols through `identity`.
///
/// Output order depends only on names, never on fact order.
pub fn synthesize(facts: &Facts, identity: &IdentityMap) -> Synthesis {
    // syscall name -> (description line, interface)
    let mut calls: BTreeMap<String, (String, Interface)> = BTreeMap::new();
    let mut syscalls: Vec<_> = facts.syscalls.iter().collect();
    syscalls.sort_by(|a, b| a.func.cmp(&b.func));
    for fact in syscalls {
        let names: Vec<String> = match identity.get(&fact.func) {
            Some(names) => names.iter().cloned().collect(),
            None => {
                debug!("{} has no syscall table entry, using its own name", fact.func);
                vec![fact.func.clone()]
            }
        };
        for name in names {
            if calls.contains_key(&name) {
                warn!("Syscall {} is implemented by several functions, keeping the first", name);
                continue;
            }
            let mut line = format!("{}{}({})", name, AUTO_VARIANT, join_fields(&fact.args, " "));
            if let Some(ret) = &fact.ret {
                let _ = write!(line, " {}", ret);
            }
            let iface = Interface {
                kind: SYSCALL_INTERFACE.to_string(),
                name: name.clone(),
                func: fact.func.clone(),
                access: fact.access.clone(),
                manual_desc: false,
                auto_desc: true,
                identifying_const: format!("{}{}", SYSCALL_NR_PREFIX, name),
                files: vec![fact.source_file.clone()],
                subsystems: Vec::new(),
            };
            calls.insert(name, (line, iface));
        }
    }

    let mut structs = BTreeMap::new();
    for st in &facts.structs {
        structs.entry(st.name.as_str()).or_insert(st);
    }
    let includes: BTreeSet<&str> = facts.includes.iter().map(String::as_str).collect();

    let mut out = String::new();
    out.push_str(GENERATED_HEADER);
    out.push('\n');
    let section = |out: &mut String, lines: Vec<String>| {
        if !lines.is_empty() {
            out.push('\n');
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
        }
    };
    section(
        &mut out,
        includes.iter().map(|i| format!("include <{}>", i)).collect(),
    );
    section(&mut out, calls.values().map(|(line, _)| line.clone()).collect());
    section(
        &mut out,
        structs
            .values()
            .map(|st| {
                let (open, close) = if st.is_union { ('[', ']') } else { ('{', '}') };
                let mut text = format!("{} {}\n", st.name, open);
                for field in &st.fields {
                    let _ = writeln!(text, "\t{}\t{}", field.name, field.ty);
                }
                text.push(close);
                text
            })
            .collect(),
    );

    Synthesis {
        descriptions: out,
        interfaces: calls.into_values().map(|(_, iface)| iface).collect(),
    }
}
