// Description language: parse, check, format
//
// Declarations are identified by (kind, name) and remember the file they
// came from, which is what lets the pipeline tell synthesized content from
// hand-written content.

pub mod ast;
pub mod check;
pub mod format;
pub mod parser;

pub use ast::{Description, Field, Node, NodeId, NodeKind, TypeArg, TypeExpr};
pub use check::{collect_unused, extract_consts, ConstMap};
pub use format::{format, format_stable};
pub use parser::{parse, parse_glob, DESCRIPTION_EXT};
