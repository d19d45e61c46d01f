// src/stage.rs

//! Migration stages and guarded stage execution
//!
//! A stage runs its body only when its key is absent from the status
//! document, and its key is written only after the body returned `Ok`. An
//! interrupted or failed stage therefore restarts from its beginning on the
//! next invocation.

use crate::error::{Error, Result};
use crate::status::StatusStore;
use tracing::{debug, info};

/// Status key recording that the whole migration finished
pub const COMPLETION_KEY: &str = "completed";

/// Migration stages in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Source OS name and major version are supported
    CheckSupportedOs,
    /// Source distribution branding packages erased
    RemoveLegacyBranding,
    /// Directories blocking the target release package removed
    RemoveStaleDirectories,
    /// Conflicting management agent erased (only when detected)
    RemoveConflictingAgent,
    /// Target distribution release and logo packages installed
    InstallTargetPackages,
    /// `yum update`
    SystemUpdate,
    /// `yum distro-sync`
    DistroSync,
    /// GRUB config regenerated (EFI or legacy path)
    RegenerateBootConfig,
    /// Boot chain packages from foreign vendors reinstalled (EFI only)
    ReconcileSecureBoot,
    /// Firmware boot entry for the target loader created (EFI only)
    RegisterEfiBootEntry,
    /// A default GRUB entry exists
    EnsureDefaultBootRecord,
}

impl Stage {
    /// All stages in pipeline order
    pub fn all() -> &'static [Stage] {
        &[
            Self::CheckSupportedOs,
            Self::RemoveLegacyBranding,
            Self::RemoveStaleDirectories,
            Self::RemoveConflictingAgent,
            Self::InstallTargetPackages,
            Self::SystemUpdate,
            Self::DistroSync,
            Self::RegenerateBootConfig,
            Self::ReconcileSecureBoot,
            Self::RegisterEfiBootEntry,
            Self::EnsureDefaultBootRecord,
        ]
    }

    /// Key persisted in the status document
    ///
    /// These match the keys written by earlier releases of the migration
    /// script so an interrupted migration can be resumed by this tool.
    pub fn key(&self) -> &'static str {
        match self {
            Self::CheckSupportedOs => "check_supported_os",
            Self::RemoveLegacyBranding => "remove_redhat_packages",
            Self::RemoveStaleDirectories => "remove_not_needed_dirs",
            Self::RemoveConflictingAgent => "remove_katello_satellite_packages",
            Self::InstallTargetPackages => "install_centos_packages",
            Self::SystemUpdate => "update_the_system",
            Self::DistroSync => "synchronization_of_distribution",
            Self::RegenerateBootConfig => "recreate_grub_config",
            Self::ReconcileSecureBoot => "reinstall_secure_boot_related_packages",
            Self::RegisterEfiBootEntry => "add_boot_record_by_efibootmgr",
            Self::EnsureDefaultBootRecord => "check_and_set_default_grub_record",
        }
    }

    /// Look a stage up by its status key
    pub fn from_key(key: &str) -> Option<Stage> {
        Self::all().iter().copied().find(|s| s.key() == key)
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckSupportedOs => "Check supported OS",
            Self::RemoveLegacyBranding => "Remove legacy branding packages",
            Self::RemoveStaleDirectories => "Remove stale branding directories",
            Self::RemoveConflictingAgent => "Remove conflicting management agent",
            Self::InstallTargetPackages => "Install target distribution packages",
            Self::SystemUpdate => "System update",
            Self::DistroSync => "Distribution synchronization",
            Self::RegenerateBootConfig => "Regenerate boot configuration",
            Self::ReconcileSecureBoot => "Reconcile secure boot packages",
            Self::RegisterEfiBootEntry => "Register EFI boot entry",
            Self::EnsureDefaultBootRecord => "Ensure default boot record",
        }
    }

    /// Whether the stage runs on every host (vs. only on some branch)
    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            Self::RemoveConflictingAgent | Self::ReconcileSecureBoot | Self::RegisterEfiBootEntry
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a guarded stage invocation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRun {
    /// Already complete; body not entered
    Skipped,
    /// Body ran and the stage was marked complete
    Completed,
}

/// Run `body` unless `stage` is already complete, then mark it complete
///
/// A body error is wrapped in [`Error::StageFailed`] and the stage is left
/// unmarked.
pub fn run_guarded<F>(store: &StatusStore, stage: Stage, body: F) -> Result<StageRun>
where
    F: FnOnce() -> Result<()>,
{
    if store.get_stage_status(stage.key()) {
        debug!("Stage '{}' already complete, skipping", stage.key());
        return Ok(StageRun::Skipped);
    }

    info!("Stage: {}", stage);
    body().map_err(|e| Error::StageFailed {
        stage: stage.key(),
        source: Box::new(e),
    })?;
    store.set_stage_completed(stage.key())?;
    Ok(StageRun::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::CheckSupportedOs < Stage::RemoveLegacyBranding);
        assert!(Stage::DistroSync < Stage::RegenerateBootConfig);
        assert!(Stage::RegisterEfiBootEntry < Stage::EnsureDefaultBootRecord);
        assert_eq!(Stage::all().len(), 11);
    }

    #[test]
    fn test_keys_are_unique_and_round_trip() {
        for stage in Stage::all() {
            assert_eq!(Stage::from_key(stage.key()), Some(*stage));
            assert_ne!(stage.key(), COMPLETION_KEY);
        }
        assert_eq!(Stage::from_key("nope"), None);
    }

    #[test]
    fn test_optional_stages() {
        assert!(!Stage::RemoveConflictingAgent.is_required());
        assert!(!Stage::ReconcileSecureBoot.is_required());
        assert!(Stage::RegenerateBootConfig.is_required());
    }

    #[test]
    fn test_run_guarded_marks_on_success() {
        let temp = TempDir::new().unwrap();
        let store = StatusStore::open(temp.path().join("status.json"));

        let run = run_guarded(&store, Stage::SystemUpdate, || Ok(())).unwrap();
        assert_eq!(run, StageRun::Completed);
        assert!(store.get_stage_status("update_the_system"));
    }

    #[test]
    fn test_run_guarded_skips_completed() {
        let temp = TempDir::new().unwrap();
        let store = StatusStore::open(temp.path().join("status.json"));
        store.set_stage_completed("update_the_system").unwrap();

        let entered = Cell::new(false);
        let run = run_guarded(&store, Stage::SystemUpdate, || {
            entered.set(true);
            Ok(())
        })
        .unwrap();

        assert_eq!(run, StageRun::Skipped);
        assert!(!entered.get());
    }

    #[test]
    fn test_run_guarded_failure_leaves_unmarked() {
        let temp = TempDir::new().unwrap();
        let store = StatusStore::open(temp.path().join("status.json"));

        let err = run_guarded(&store, Stage::DistroSync, || {
            Err(Error::ParseError("boom".to_string()))
        })
        .unwrap_err();

        assert!(matches!(err, Error::StageFailed { stage: "synchronization_of_distribution", .. }));
        assert!(!store.get_stage_status("synchronization_of_distribution"));
    }
}
