//! Canonical text rendering of descriptions
//!
//! Formatting is faithful to the node list: blank-line nodes are printed as
//! they are, even when pruning left several of them next to each other.
//! Parsing collapses such runs, so a stable document needs
//! format -> parse -> format.

use super::ast::{Description, Field, Node, TypeArg, TypeExpr};
use super::parser;
use crate::diagnostics::Diagnostics;
use std::fmt::{self, Write};

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ident)?;
        if !self.args.is_empty() {
            f.write_char('[')?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", arg)?;
            }
            f.write_char(']')?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArg::Type(ty) => write!(f, "{}", ty),
            TypeArg::Int(v) => f.write_str(v),
            TypeArg::Str(v) => write!(f, "\"{}\"", v),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.ty)
    }
}

fn format_node(out: &mut String, node: &Node) -> fmt::Result {
    match node {
        Node::NewLine { .. } => out.push('\n'),
        Node::Comment { text, .. } => writeln!(out, "#{}", text)?,
        Node::Include { path, .. } => writeln!(out, "include <{}>", path)?,
        Node::Define { name, value, .. } => writeln!(out, "define {} {}", name, value)?,
        Node::Resource { name, base, .. } => writeln!(out, "resource {}[{}]", name, base)?,
        Node::TypeDef { name, ty, .. } => writeln!(out, "type {} {}", name, ty)?,
        Node::Flags { name, values, .. } => {
            write!(out, "{} = ", name)?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write!(out, "{}", v)?;
            }
            out.push('\n');
        }
        Node::Struct {
            name,
            fields,
            is_union,
            ..
        } => {
            let (open, close) = if *is_union { ('[', ']') } else { ('{', '}') };
            writeln!(out, "{} {}", name, open)?;
            for field in fields {
                writeln!(out, "\t{}\t{}", field.name, field.ty)?;
            }
            writeln!(out, "{}", close)?;
        }
        Node::Syscall { name, args, ret, .. } => {
            write!(out, "{}(", name)?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write!(out, "{}", arg)?;
            }
            out.push(')');
            if let Some(ret) = ret {
                write!(out, " {}", ret)?;
            }
            out.push('\n');
        }
    }
    Ok(())
}

/// Render a description as text, one declaration per line
pub fn format(desc: &Description) -> String {
    let mut out = String::new();
    for node in &desc.nodes {
        // Writing into a String cannot fail.
        let _ = format_node(&mut out, node);
    }
    out
}

/// format -> parse -> format.
///
/// `file` is the position recorded for the re-parsed nodes. Returns `None`
/// (with diagnostics) if the first rendering does not parse back.
pub fn format_stable(desc: &Description, file: &str, diags: &mut Diagnostics) -> Option<String> {
    let reparsed = parser::parse(&format(desc), file, diags)?;
    Some(format(&reparsed))
}
