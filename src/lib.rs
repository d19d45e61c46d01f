// src/lib.rs

//! rhel2centos: in-place RHEL 7 → CentOS 7 conversion
//!
//! Converts a running host by replacing its branding packages, updating and
//! syncing against the target repositories, and repairing the boot chain.
//! The conversion is destructive and long-running, so it is built as a
//! resumable pipeline of stages.
//!
//! # Architecture
//!
//! - **Status store**: a JSON document recording completed stages; reruns
//!   skip them
//! - **Executor**: external tools run from argument vectors, with outcomes
//!   classified as success, expected absence, or hard failure
//! - **Probe**: facts about the host (OS identity, firmware, packages)
//! - **Migration**: fixed stage order with an EFI/legacy branch and an
//!   optional management agent removal
//!
//! A hard failure aborts the run with the current stage unmarked; the
//! operator fixes the cause and runs the tool again.

pub mod actions;
pub mod config;
mod error;
pub mod exec;
pub mod lock;
pub mod logging;
pub mod migration;
pub mod probe;
pub mod stage;
pub mod status;

pub use config::MigrationConfig;
pub use error::{Error, Result};
pub use exec::{CommandKind, CommandOutput, CommandRunner, CommandSpec, Executor, Outcome, SystemRunner};
pub use migration::{Migration, MigrationState, RunOutcome};
pub use probe::{HostProbe, OsIdentity, PackageRecord};
pub use stage::{Stage, StageRun, COMPLETION_KEY};
pub use status::StatusStore;
