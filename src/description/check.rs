//! Type checking, unused declaration detection and constant extraction
//!
//! Both analyses take the document by value: checking lowers
//! target-dependent types in place (`intptr` becomes `int32`/`int64`), so a
//! caller that still needs the parsed tree must hand over a clone.

use super::ast::{Description, Node, NodeId, NodeKind, TypeArg, TypeExpr};
use crate::diagnostics::{Diagnostics, Pos};
use crate::targets::Target;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Types understood without a declaration
pub const BUILTINS: &[&str] = &[
    "int8", "int16", "int32", "int64", "intptr", "bool8", "bool16", "bool32", "bool64", "ptr",
    "ptr64", "array", "const", "flags", "len", "bytesize", "string", "stringnoz", "void", "fd",
    "buffer", "in", "out", "inout", "opt",
];

/// Prefix of the constant naming a syscall number
pub const SYSCALL_NR_PREFIX: &str = "__NR_";

/// Constants referenced or defined, per source file
pub type ConstMap = BTreeMap<String, BTreeSet<String>>;

/// Names that look like constants: upper case, digits and underscores
pub fn is_const_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| !c.is_ascii_digit())
        && name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Base syscall name, without the `$variant` suffix
pub fn call_name(syscall: &str) -> &str {
    syscall.split('$').next().unwrap_or(syscall)
}

/// Referenceable declarations by name
struct Symbols {
    decls: HashMap<String, (NodeKind, usize)>,
}

impl Symbols {
    fn kind(&self, name: &str) -> Option<NodeKind> {
        self.decls.get(name).map(|(kind, _)| *kind)
    }
}

struct Checker<'d> {
    diags: &'d mut Diagnostics,
    failed: bool,
}

impl<'d> Checker<'d> {
    fn error(&mut self, pos: &Pos, message: String) {
        self.failed = true;
        self.diags.report(pos.clone(), message);
    }

    fn collect_symbols(&mut self, desc: &Description) -> Symbols {
        let mut decls: HashMap<String, (NodeKind, usize)> = HashMap::new();
        let mut others: HashMap<(NodeKind, &str), &Pos> = HashMap::new();
        for (idx, node) in desc.nodes.iter().enumerate() {
            let (Some(kind), Some(name)) = (node.kind(), node.name()) else {
                continue;
            };
            if kind.is_referenceable() {
                if let Some((prev_kind, prev)) = decls.get(name) {
                    let prev_pos = desc.nodes[*prev].pos().clone();
                    self.error(
                        node.pos(),
                        format!(
                            "{} {} redeclared, previously declared as {} at {}",
                            kind, name, prev_kind, prev_pos
                        ),
                    );
                    continue;
                }
                decls.insert(name.to_string(), (kind, idx));
            } else if matches!(kind, NodeKind::Syscall | NodeKind::Define) {
                if let Some(prev) = others.get(&(kind, name)) {
                    let prev = (*prev).clone();
                    self.error(
                        node.pos(),
                        format!("{} {} redeclared, previously declared at {}", kind, name, prev),
                    );
                    continue;
                }
                others.insert((kind, name), node.pos());
            }
        }
        Symbols { decls }
    }

    fn check_node(&mut self, syms: &Symbols, node: &Node) {
        match node {
            Node::Resource { base, .. } => self.check_type(syms, base),
            Node::TypeDef { ty, .. } => self.check_type(syms, ty),
            Node::Struct { fields, .. } => {
                let mut seen: HashMap<&str, &Pos> = HashMap::new();
                for field in fields {
                    if let Some(prev) = seen.insert(&field.name, &field.pos) {
                        let prev = prev.clone();
                        self.error(
                            &field.pos,
                            format!("duplicate field {}, previously at {}", field.name, prev),
                        );
                    }
                    self.check_type(syms, &field.ty);
                }
            }
            Node::Syscall { args, ret, .. } => {
                for arg in args {
                    self.check_type(syms, &arg.ty);
                }
                if let Some(ret) = ret {
                    self.check_type(syms, ret);
                }
            }
            _ => {}
        }
    }

    fn check_type(&mut self, syms: &Symbols, ty: &TypeExpr) {
        if is_builtin(&ty.ident) {
            let mut args = ty.args.iter();
            match ty.ident.as_str() {
                // First argument names a sibling field, not a type.
                "len" | "bytesize" => {
                    args.next();
                }
                "flags" => match args.next() {
                    Some(TypeArg::Type(f)) if syms.kind(&f.ident) == Some(NodeKind::Flags) => {}
                    Some(TypeArg::Type(f)) => {
                        self.error(&f.pos, format!("{} is not a flags declaration", f.ident))
                    }
                    _ => self.error(&ty.pos, "flags needs a flags declaration".to_string()),
                },
                _ => {}
            }
            for arg in args {
                if let TypeArg::Type(inner) = arg {
                    self.check_type(syms, inner);
                }
            }
            return;
        }
        match syms.kind(&ty.ident) {
            Some(NodeKind::Flags) => self.error(
                &ty.pos,
                format!("flags {} can only be used inside flags[...]", ty.ident),
            ),
            Some(_) if !ty.args.is_empty() => {
                self.error(&ty.pos, format!("{} does not take arguments", ty.ident))
            }
            Some(_) => {}
            None if is_const_name(&ty.ident) && ty.args.is_empty() => {}
            None => self.error(&ty.pos, format!("unknown type {}", ty.ident)),
        }
    }
}

/// Verify the whole document and lower it for `target`.
fn typecheck(desc: &mut Description, target: &Target, diags: &mut Diagnostics) -> Option<Symbols> {
    let mut checker = Checker {
        diags,
        failed: false,
    };
    let syms = checker.collect_symbols(desc);
    for node in &desc.nodes {
        checker.check_node(&syms, node);
    }
    if checker.failed {
        return None;
    }
    let lowered = match target.ptr_size() {
        4 => "int32",
        _ => "int64",
    };
    for node in &mut desc.nodes {
        for_each_type_mut(node, &mut |ty| {
            if ty.ident == "intptr" {
                ty.ident = lowered.to_string();
            }
        });
    }
    Some(syms)
}

fn walk_type_mut(ty: &mut TypeExpr, f: &mut impl FnMut(&mut TypeExpr)) {
    f(ty);
    for arg in &mut ty.args {
        if let TypeArg::Type(inner) = arg {
            walk_type_mut(inner, f);
        }
    }
}

fn for_each_type_mut(node: &mut Node, f: &mut impl FnMut(&mut TypeExpr)) {
    match node {
        Node::Resource { base, .. } => walk_type_mut(base, f),
        Node::TypeDef { ty, .. } => walk_type_mut(ty, f),
        Node::Struct { fields, .. } => {
            for field in fields {
                walk_type_mut(&mut field.ty, f);
            }
        }
        Node::Syscall { args, ret, .. } => {
            for arg in args {
                walk_type_mut(&mut arg.ty, f);
            }
            if let Some(ret) = ret {
                walk_type_mut(ret, f);
            }
        }
        _ => {}
    }
}

fn walk_type<'a>(ty: &'a TypeExpr, f: &mut impl FnMut(&'a TypeExpr)) {
    f(ty);
    for arg in &ty.args {
        if let TypeArg::Type(inner) = arg {
            walk_type(inner, f);
        }
    }
}

fn for_each_type<'a>(node: &'a Node, f: &mut impl FnMut(&'a TypeExpr)) {
    match node {
        Node::Resource { base, .. } => walk_type(base, f),
        Node::TypeDef { ty, .. } => walk_type(ty, f),
        Node::Struct { fields, .. } => {
            for field in fields {
                walk_type(&field.ty, f);
            }
        }
        Node::Syscall { args, ret, .. } => {
            for arg in args {
                walk_type(&arg.ty, f);
            }
            if let Some(ret) = ret {
                walk_type(ret, f);
            }
        }
        _ => {}
    }
}

/// Declarations not reachable from any syscall.
///
/// Returns `None` if the document does not type check.
pub fn collect_unused(
    mut desc: Description,
    target: &Target,
    diags: &mut Diagnostics,
) -> Option<BTreeSet<NodeId>> {
    let syms = typecheck(&mut desc, target, diags)?;

    let mut reached = vec![false; desc.nodes.len()];
    let mut queue: Vec<usize> = desc
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.kind() == Some(NodeKind::Syscall))
        .map(|(idx, _)| idx)
        .collect();
    while let Some(idx) = queue.pop() {
        for_each_type(&desc.nodes[idx], &mut |ty| {
            if let Some((_, target_idx)) = syms.decls.get(&ty.ident) {
                if !reached[*target_idx] {
                    reached[*target_idx] = true;
                    queue.push(*target_idx);
                }
            }
        });
    }

    let unused: BTreeSet<NodeId> = desc
        .nodes
        .iter()
        .enumerate()
        .filter(|(idx, n)| !reached[*idx] && n.kind().is_some_and(NodeKind::is_referenceable))
        .filter_map(|(_, n)| n.id())
        .collect();
    debug!("{} unused declarations", unused.len());
    Some(unused)
}

/// Constants each file references or defines.
///
/// Every syscall contributes its `__NR_<name>` constant. Returns `None` if
/// the document does not type check.
pub fn extract_consts(
    mut desc: Description,
    target: &Target,
    diags: &mut Diagnostics,
) -> Option<ConstMap> {
    let syms = typecheck(&mut desc, target, diags)?;

    let mut consts = ConstMap::new();
    for node in &desc.nodes {
        let file = consts.entry(node.pos().file.clone()).or_default();
        match node {
            Node::Define { name, .. } => {
                file.insert(name.clone());
            }
            Node::Syscall { name, .. } => {
                file.insert(format!("{}{}", SYSCALL_NR_PREFIX, call_name(name)));
            }
            Node::Flags { values, .. } => {
                for v in values {
                    if let TypeArg::Type(ty) = v {
                        file.insert(ty.ident.clone());
                    }
                }
            }
            _ => {}
        }
        for_each_type(node, &mut |ty| {
            if syms.kind(&ty.ident).is_none() && !is_builtin(&ty.ident) && is_const_name(&ty.ident)
            {
                file.insert(ty.ident.clone());
            }
        });
    }
    consts.retain(|_, c| !c.is_empty());
    Some(consts)
}

#[cfg(test)]
mod tests {
    use super::super::parser;
    use super::*;

    fn parse_files(files: &[(&str, &str)]) -> Description {
        let mut diags = Diagnostics::new();
        let mut nodes = Vec::new();
        for (name, text) in files {
            nodes.extend(parser::parse(text, name, &mut diags).unwrap().nodes);
        }
        Description::new(nodes)
    }

    fn unused(files: &[(&str, &str)]) -> Vec<String> {
        let mut diags = Diagnostics::new();
        collect_unused(parse_files(files), &Target::default(), &mut diags)
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect()
    }

    fn check_errors(text: &str) -> String {
        let mut diags = Diagnostics::new();
        let desc = parse_files(&[("a.txt", text)]);
        assert!(collect_unused(desc, &Target::default(), &mut diags).is_none());
        diags.render()
    }

    #[test]
    fn test_const_names() {
        assert!(is_const_name("SOCK_NONBLOCK"));
        assert!(is_const_name("AF_INET6"));
        assert!(!is_const_name("sockaddr"));
        assert!(!is_const_name("_"));
        assert!(!is_const_name("9P"));
    }

    #[test]
    fn test_unreachable_declarations_reported() {
        let got = unused(&[(
            "a.txt",
            "\
resource sock[fd]
resource orphan_res[fd]
used_flags = A, B
orphan_flags = C
inner {
\tx\tint8
}
outer {
\ti\tinner
}
orphan {
\ty\tint8
}
type used_alias ptr[in, outer]
call(s sock, f flags[used_flags, int32], p used_alias)
",
        )]);
        assert_eq!(
            got,
            vec![
                "resource orphan_res",
                "flags orphan_flags",
                "struct orphan",
            ]
        );
    }

    #[test]
    fn test_resource_chain_reachable() {
        let got = unused(&[(
            "a.txt",
            "resource base_res[fd]\nresource sub_res[base_res]\nopen() sub_res\n",
        )]);
        assert!(got.is_empty(), "{:?}", got);
    }

    #[test]
    fn test_reachability_crosses_files() {
        let got = unused(&[
            ("manual.txt", "shared {\n\tx\tint32\n}\nspare {\n\tz\tint8\n}\n"),
            ("auto.txt", "foo$auto(p ptr[in, shared])\n"),
        ]);
        assert_eq!(got, vec!["struct spare"]);
    }

    #[test]
    fn test_unknown_type_and_redeclaration() {
        let out = check_errors("s {\n\tx\tmystery\n}\ns = A\nf(a s)\n");
        assert!(out.contains("a.txt:2:4: unknown type mystery"), "{}", out);
        assert!(
            out.contains("a.txt:4:1: flags s redeclared, previously declared as struct at a.txt:1:1"),
            "{}",
            out
        );
    }

    #[test]
    fn test_flags_misuse() {
        let out = check_errors("fl = A\ns {\n\tx\tfl\n}\nf(a flags[s, int32])\n");
        assert!(out.contains("flags fl can only be used inside flags[...]"), "{}", out);
        assert!(out.contains("s is not a flags declaration"), "{}", out);
    }

    #[test]
    fn test_duplicate_syscalls_and_fields() {
        let out = check_errors("s {\n\tx\tint8\n\tx\tint16\n}\nf(a s)\nf()\n");
        assert!(out.contains("duplicate field x"), "{}", out);
        assert!(out.contains("syscall f redeclared"), "{}", out);
    }

    #[test]
    fn test_len_first_arg_is_field_reference() {
        let got = unused(&[(
            "a.txt",
            "write(fd fd, buf ptr[in, array[int8]], count len[buf, intptr])\n",
        )]);
        assert!(got.is_empty());
    }

    #[test]
    fn test_typecheck_lowers_intptr_in_place() {
        let mut desc = parse_files(&[("a.txt", "f(a intptr)\n")]);
        let mut diags = Diagnostics::new();
        typecheck(&mut desc, &Target::new("linux", "386"), &mut diags).unwrap();
        let Node::Syscall { args, .. } = &desc.nodes[0] else {
            panic!("not a syscall");
        };
        assert_eq!(args[0].ty.ident, "int32");
    }

    #[test]
    fn test_analyses_leave_caller_copy_untouched() {
        let desc = parse_files(&[("a.txt", "f(a intptr)\n")]);
        let before = desc.clone();
        let mut diags = Diagnostics::new();
        collect_unused(desc.clone(), &Target::default(), &mut diags).unwrap();
        extract_consts(desc.clone(), &Target::default(), &mut diags).unwrap();
        assert_eq!(desc, before);
    }

    #[test]
    fn test_extract_consts_per_file() {
        let desc = parse_files(&[
            (
                "manual.txt",
                "define MAGIC 42\nmode = O_RDONLY, O_WRONLY\nopen(m flags[mode, int32], c const[AT_FDCWD, int32])\n",
            ),
            ("auto.txt", "accept4$auto(fd fd)\n"),
        ]);
        let mut diags = Diagnostics::new();
        let consts = extract_consts(desc, &Target::default(), &mut diags).unwrap();
        let manual: Vec<_> = consts["manual.txt"].iter().map(String::as_str).collect();
        assert_eq!(
            manual,
            vec!["AT_FDCWD", "MAGIC", "O_RDONLY", "O_WRONLY", "__NR_open"]
        );
        let auto: Vec<_> = consts["auto.txt"].iter().map(String::as_str).collect();
        assert_eq!(auto, vec!["__NR_accept4"]);
    }
}
