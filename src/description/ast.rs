//! Description document tree

use crate::diagnostics::Pos;
use std::fmt;

/// Declaration kinds that carry an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Include,
    Define,
    Resource,
    TypeDef,
    Flags,
    Struct,
    Union,
    Syscall,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Include => "include",
            NodeKind::Define => "define",
            NodeKind::Resource => "resource",
            NodeKind::TypeDef => "type",
            NodeKind::Flags => "flags",
            NodeKind::Struct => "struct",
            NodeKind::Union => "union",
            NodeKind::Syscall => "syscall",
        }
    }

    /// Kinds that exist only to be referenced and can therefore be unused
    pub fn is_referenceable(self) -> bool {
        matches!(
            self,
            NodeKind::Resource
                | NodeKind::TypeDef
                | NodeKind::Flags
                | NodeKind::Struct
                | NodeKind::Union
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a declaration: `(kind, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub kind: NodeKind,
    pub name: String,
}

impl NodeId {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// `ident` or `ident[arg, ...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub pos: Pos,
    pub ident: String,
    pub args: Vec<TypeArg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArg {
    Type(TypeExpr),
    /// Integer literal kept as written (decimal or hex)
    Int(String),
    Str(String),
}

/// Struct/union field or syscall argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub pos: Pos,
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Empty line
    NewLine { pos: Pos },
    /// `#` comment, text excludes the `#`
    Comment { pos: Pos, text: String },
    Include { pos: Pos, path: String },
    Define { pos: Pos, name: String, value: String },
    Resource { pos: Pos, name: String, base: TypeExpr },
    TypeDef { pos: Pos, name: String, ty: TypeExpr },
    Flags { pos: Pos, name: String, values: Vec<TypeArg> },
    Struct {
        pos: Pos,
        name: String,
        fields: Vec<Field>,
        is_union: bool,
    },
    Syscall {
        pos: Pos,
        name: String,
        args: Vec<Field>,
        ret: Option<TypeExpr>,
    },
}

impl Node {
    pub fn pos(&self) -> &Pos {
        match self {
            Node::NewLine { pos }
            | Node::Comment { pos, .. }
            | Node::Include { pos, .. }
            | Node::Define { pos, .. }
            | Node::Resource { pos, .. }
            | Node::TypeDef { pos, .. }
            | Node::Flags { pos, .. }
            | Node::Struct { pos, .. }
            | Node::Syscall { pos, .. } => pos,
        }
    }

    pub fn kind(&self) -> Option<NodeKind> {
        Some(match self {
            Node::NewLine { .. } | Node::Comment { .. } => return None,
            Node::Include { .. } => NodeKind::Include,
            Node::Define { .. } => NodeKind::Define,
            Node::Resource { .. } => NodeKind::Resource,
            Node::TypeDef { .. } => NodeKind::TypeDef,
            Node::Flags { .. } => NodeKind::Flags,
            Node::Struct { is_union: false, .. } => NodeKind::Struct,
            Node::Struct { is_union: true, .. } => NodeKind::Union,
            Node::Syscall { .. } => NodeKind::Syscall,
        })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::NewLine { .. } | Node::Comment { .. } => None,
            Node::Include { path, .. } => Some(path),
            Node::Define { name, .. }
            | Node::Resource { name, .. }
            | Node::TypeDef { name, .. }
            | Node::Flags { name, .. }
            | Node::Struct { name, .. }
            | Node::Syscall { name, .. } => Some(name),
        }
    }

    /// `(kind, name)` identity; blank lines and comments have none
    pub fn id(&self) -> Option<NodeId> {
        Some(NodeId::new(self.kind()?, self.name()?))
    }
}

/// A set of parsed description files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    pub nodes: Vec<Node>,
}

impl Description {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Nodes whose source position is `file`, in document order
    pub fn file_nodes(&self, file: &str) -> Description {
        Description::new(
            self.nodes
                .iter()
                .filter(|n| n.pos().file == file)
                .cloned()
                .collect(),
        )
    }

    pub fn find(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id().as_ref() == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_of_union_and_struct_differ() {
        let st = Node::Struct {
            pos: Pos::default(),
            name: "foo".to_string(),
            fields: vec![],
            is_union: false,
        };
        let un = Node::Struct {
            pos: Pos::default(),
            name: "foo".to_string(),
            fields: vec![],
            is_union: true,
        };
        assert_eq!(st.id(), Some(NodeId::new(NodeKind::Struct, "foo")));
        assert_eq!(un.id(), Some(NodeId::new(NodeKind::Union, "foo")));
    }

    #[test]
    fn test_comments_have_no_identity() {
        let node = Node::Comment {
            pos: Pos::default(),
            text: " hello".to_string(),
        };
        assert!(node.id().is_none());
        assert!(Node::NewLine { pos: Pos::default() }.id().is_none());
    }

    #[test]
    fn test_file_nodes_filters_by_position() {
        let desc = Description::new(vec![
            Node::Include {
                pos: Pos::new("a.txt", 1, 1),
                path: "linux/fs.h".to_string(),
            },
            Node::Include {
                pos: Pos::new("b.txt", 1, 1),
                path: "linux/net.h".to_string(),
            },
        ]);
        let a = desc.file_nodes("a.txt");
        assert_eq!(a.nodes.len(), 1);
        assert!(a
            .find(&NodeId::new(NodeKind::Include, "linux/fs.h"))
            .is_some());
    }
}
