//! # confdiff
//!
//! Diffs of non-declarative YAML configuration menus.
//!
//! A menu is a directory of YAML files whose top-level keys are object types
//! (`configlets`, `asn_pools`, ...). Objects are identified by `name`. The
//! diff classifies every object as added, changed or removed, and compares
//! template files referenced by configlets.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! let result = confdiff::diff_tree(
//!     Path::new("projects/acme/dc1/fabric/design"),
//!     Path::new("executions/acme/dc1/fabric/wip/execution_0/data/previous_input/design"),
//! )
//! .unwrap();
//!
//! for (kind, added, changed, removed, contents) in result.counts() {
//!     println!("{kind}: +{added} ~{changed} -{removed} templates:{contents}");
//! }
//! ```

#![warn(clippy::all)]

pub mod diff;
pub mod error;
pub mod snapshot;

pub use diff::{
    ChangedObject, ContentsChanged, DiffResult, ObjectChanges, Rename, TEMPLATED_TYPE, diff_snapshots,
    diff_tree,
};
pub use error::{Error, Result};
pub use snapshot::MenuSnapshot;
