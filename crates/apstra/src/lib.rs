//! # apstra
//!
//! Blocking client for the Apstra fabric controller REST API.
//!
//! This crate provides:
//! - Token authentication with transparent re-login on `401`
//! - Blueprint listing, deploy, revert, delete and commit-check
//! - Time Voyager revisions with a permanent-revision quota
//! - Design/resource object lookup and deletion
//! - A single retry/poll protocol for every asynchronous operation
//!
//! ## Example
//!
//! ```no_run
//! use apstra::{Client, Credentials, UreqTransport};
//! use std::time::Duration;
//!
//! let transport = UreqTransport::new("https://apstra.lab", true, Duration::from_secs(30));
//! let client = Client::new(Box::new(transport), Credentials::new("admin", "admin"));
//!
//! let id = client.blueprint_id("dc1").expect("blueprint");
//! if client.diff_status(&id).unwrap().has_uncommitted_changes() {
//!     client.deploy_and_keep(&id, "nightly").unwrap();
//! }
//! ```
//!
//! ## Asynchronous operations
//!
//! | Operation    | Initial request           | Completion while polling |
//! |--------------|---------------------------|--------------------------|
//! | deploy       | `PUT …/deploy`            | `202` / `2xx`            |
//! | revert       | `POST …/revert`           | `202` / `2xx`            |
//! | delete       | `DELETE /api/blueprints/…`| `404`                    |
//! | commit-check | `POST …/commit-check`     | `202` / `2xx`            |

#![warn(missing_docs)]
#![warn(clippy::all)]

mod blueprint;
pub mod client;
mod design;
mod device;
pub mod error;
pub mod poll;
pub mod transport;
pub mod types;

pub use client::{Client, DEFAULT_MAX_PERMANENT_REVISIONS};
pub use error::{Error, ErrorCategory, Result};
pub use poll::{Completion, PollOutcome, PollPolicy, StatusClass};
pub use transport::{Method, MockTransport, Request, Response, Transport, UreqTransport};
pub use types::{
    BlueprintSummary, BuildErrors, CommitCheckReport, Credentials, DiffStatus, ObjectKind,
    RemoteObject, Revision, System, SystemCheck,
};
