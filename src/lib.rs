//! Kdescgen - syscall interface description synthesis from kernel source facts
//!
//! This library resolves kernel entry points to syscall names using the
//! per-architecture `*.tbl` files, synthesizes descriptions from source
//! analysis facts, prunes what the hand-written descriptions make
//! redundant, and enriches the interface catalog with provenance and
//! subsystem ownership.

pub mod cli;
pub mod config;
pub mod description;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod interface;
pub mod pipeline;
pub mod subsystem;
pub mod syscall_table;
pub mod targets;

pub use error::{Error, Result};
