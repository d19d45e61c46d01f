// src/migration.rs

//! Migration orchestrator
//!
//! Drives the stages in their fixed order:
//!
//! ```text
//! completed? ── yes ──▶ AlreadyMigrated
//!     │ no
//! root? ─────── no ───▶ InsufficientPrivilege
//!     │ yes
//! check_supported_os ── mismatch ──▶ UnsupportedOs
//!     │
//! remove legacy branding → remove stale dirs
//!     │
//! [agent fully installed] → remove conflicting agent
//!     │
//! install target packages → update → distro-sync
//!     │
//!     ├── EFI:    grub config (EFI path) → reconcile secure boot → EFI boot entry
//!     └── legacy: grub config (legacy path)
//!     │
//! ensure default boot record → mark completed
//! ```
//!
//! Every stage is guarded by its status key, so an interrupted run resumes at
//! the first incomplete stage. Any error aborts the run with the current
//! stage unmarked.

use crate::actions::StageActions;
use crate::config::MigrationConfig;
use crate::error::Result;
use crate::exec::{CommandRunner, Executor};
use crate::probe::{HostProbe, OsIdentity};
use crate::stage::{run_guarded, Stage, COMPLETION_KEY};
use crate::status::StatusStore;
use std::fmt;
use tracing::info;

/// How a migration run ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The status document already records completion
    AlreadyMigrated,
    /// Not running with effective UID 0
    InsufficientPrivilege,
    /// The host is not the supported source distribution
    UnsupportedOs { found: OsIdentity },
    /// Every stage completed during this or earlier runs
    Completed,
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    NotStarted,
    Running,
    CompletedSuccessfully,
    AbortedUnsupported,
    AbortedFailure,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::CompletedSuccessfully => "completed",
            Self::AbortedUnsupported => "aborted (unsupported)",
            Self::AbortedFailure => "aborted (failure)",
        };
        write!(f, "{}", s)
    }
}

/// One migration run over a host
pub struct Migration<'a, R> {
    config: &'a MigrationConfig,
    store: &'a StatusStore,
    executor: Executor<R>,
    euid: u32,
    state: MigrationState,
}

impl<'a, R: CommandRunner> Migration<'a, R> {
    /// Prepare a run as effective user `euid`
    pub fn new(config: &'a MigrationConfig, store: &'a StatusStore, runner: R, euid: u32) -> Self {
        Self {
            config,
            store,
            executor: Executor::new(runner),
            euid,
            state: MigrationState::NotStarted,
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Execute the migration, resuming after any completed stages
    pub fn run(&mut self) -> Result<RunOutcome> {
        self.state = MigrationState::Running;
        match self.run_pipeline() {
            Ok(outcome) => {
                self.state = match outcome {
                    RunOutcome::AlreadyMigrated | RunOutcome::Completed => {
                        MigrationState::CompletedSuccessfully
                    }
                    RunOutcome::InsufficientPrivilege | RunOutcome::UnsupportedOs { .. } => {
                        MigrationState::AbortedUnsupported
                    }
                };
                Ok(outcome)
            }
            Err(e) => {
                self.state = MigrationState::AbortedFailure;
                Err(e)
            }
        }
    }

    fn run_pipeline(&self) -> Result<RunOutcome> {
        let target = &self.config.os.target_name;

        if self.store.get_stage_status(COMPLETION_KEY) {
            info!("The system is already migrated to {}", target);
            return Ok(RunOutcome::AlreadyMigrated);
        }

        if self.euid != 0 {
            info!("This tool must be run as root (effective UID is {})", self.euid);
            return Ok(RunOutcome::InsufficientPrivilege);
        }

        if let Some(found) = self.check_supported_os()? {
            return Ok(RunOutcome::UnsupportedOs { found });
        }

        let probe = HostProbe::new(self.config, &self.executor);
        let actions = StageActions::new(self.config, &self.executor);
        let packages = &self.config.packages;

        run_guarded(self.store, Stage::RemoveLegacyBranding, || {
            actions.erase_packages(&packages.legacy_branding)
        })?;
        run_guarded(self.store, Stage::RemoveStaleDirectories, || {
            actions.remove_stale_directories()
        })?;

        if probe.has_conflicting_management_agent()? {
            run_guarded(self.store, Stage::RemoveConflictingAgent, || {
                actions.erase_packages(&packages.conflicting_agent_removal)
            })?;
        }

        run_guarded(self.store, Stage::InstallTargetPackages, || {
            actions.install_target_packages()
        })?;
        run_guarded(self.store, Stage::SystemUpdate, || actions.system_update())?;
        run_guarded(self.store, Stage::DistroSync, || actions.distro_sync())?;

        let boot = &self.config.boot;
        if probe.is_efi_system() {
            info!("EFI firmware detected");
            run_guarded(self.store, Stage::RegenerateBootConfig, || {
                actions.regenerate_boot_config(&boot.efi_grub_config)
            })?;
            run_guarded(self.store, Stage::ReconcileSecureBoot, || {
                actions.reconcile_secure_boot_packages().map(|_| ())
            })?;
            run_guarded(self.store, Stage::RegisterEfiBootEntry, || {
                actions.register_efi_boot_entry()
            })?;
        } else {
            info!("Legacy BIOS firmware detected");
            run_guarded(self.store, Stage::RegenerateBootConfig, || {
                actions.regenerate_boot_config(&boot.legacy_grub_config)
            })?;
        }

        run_guarded(self.store, Stage::EnsureDefaultBootRecord, || {
            actions.ensure_default_boot_record().map(|_| ())
        })?;

        self.store.set_stage_completed(COMPLETION_KEY)?;
        info!("The system is migrated to {}", target);
        Ok(RunOutcome::Completed)
    }

    /// Returns the found identity when the host is unsupported
    ///
    /// Guarded like any stage: once the check passed, later runs must not
    /// repeat it, because installing the target release package changes the
    /// identity the check reads.
    fn check_supported_os(&self) -> Result<Option<OsIdentity>> {
        let key = Stage::CheckSupportedOs.key();
        if self.store.get_stage_status(key) {
            return Ok(None);
        }

        let os = &self.config.os;
        let identity = HostProbe::new(self.config, &self.executor).os_identity();
        if identity.major != os.supported_major {
            info!(
                "Major version \"{}\" of the current OS is not supported; only major version \"{}\" is",
                identity.major, os.supported_major
            );
            return Ok(Some(identity));
        }
        if identity.name != os.supported_id {
            info!(
                "Current OS \"{}\" is not supported; only \"{}\" is",
                identity.name, os.supported_id
            );
            return Ok(Some(identity));
        }

        info!("Detected supported OS: {}", identity);
        self.store.set_stage_completed(key)?;
        Ok(None)
    }
}
