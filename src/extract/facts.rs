//! Facts emitted by the kernel source analysis tool
//!
//! The tool prints one JSON document:
//!
//! ```json
//! {
//!   "includes": ["linux/socket.h"],
//!   "syscalls": [{"func": "accept4", "source_file": "net/socket.c",
//!                 "args": [{"name": "fd", "type": "fd"}]}],
//!   "structs": []
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_access() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub syscalls: Vec<SyscallFact>,
    #[serde(default)]
    pub structs: Vec<StructFact>,
}

/// A function defined with `SYSCALL_DEFINE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallFact {
    /// Entry symbol, without the `sys_` prefix
    pub func: String,
    pub source_file: String,
    #[serde(default = "default_access")]
    pub access: String,
    #[serde(default)]
    pub args: Vec<FieldFact>,
    #[serde(default)]
    pub ret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructFact {
    pub name: String,
    #[serde(default)]
    pub is_union: bool,
    #[serde(default)]
    pub source_file: Option<String>,
    pub fields: Vec<FieldFact>,
}

/// Field or argument; `type` is already written in the description language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFact {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl Facts {
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).context("Invalid extraction facts JSON")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize extraction facts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_defaults() {
        let facts = Facts::from_json(
            r#"{"syscalls": [{"func": "getpid", "source_file": "kernel/sys.c"}]}"#,
        )
        .unwrap();
        assert!(facts.includes.is_empty());
        assert_eq!(facts.syscalls[0].access, "unknown");
        assert!(facts.syscalls[0].args.is_empty());
        assert!(facts.syscalls[0].ret.is_none());
    }

    #[test]
    fn test_field_type_key() {
        let facts = Facts::from_json(
            r#"{"structs": [{"name": "s", "fields": [{"name": "a", "type": "int32"}]}]}"#,
        )
        .unwrap();
        assert_eq!(facts.structs[0].fields[0].ty, "int32");
        assert!(!facts.structs[0].is_union);
    }

    #[test]
    fn test_json_survives_cache_round_trip() {
        let facts = Facts::from_json(
            r#"{"includes": ["linux/fs.h"], "syscalls": [{"func": "read", "source_file": "fs/read_write.c", "access": "user"}]}"#,
        )
        .unwrap();
        assert_eq!(Facts::from_json(&facts.to_json().unwrap()).unwrap(), facts);
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(Facts::from_json("{\"syscalls\": [").is_err());
    }
}
