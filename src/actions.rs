// src/actions.rs

//! Stage bodies
//!
//! Each function here performs the host mutation of one stage. They are
//! safe to repeat: package erasure probes first, directory removal checks
//! existence, and the remaining tools (`yum`, `grub2-mkconfig`) converge on
//! their own. Any failed action returns an error immediately so the caller
//! leaves the stage unmarked.

use crate::config::MigrationConfig;
use crate::error::Result;
use crate::exec::{CommandRunner, CommandSpec, Executor};
use crate::probe::{HostProbe, PackageRecord};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Mutating operations driven by the migration stages
pub struct StageActions<'a, R> {
    config: &'a MigrationConfig,
    executor: &'a Executor<R>,
}

impl<'a, R: CommandRunner> StageActions<'a, R> {
    pub fn new(config: &'a MigrationConfig, executor: &'a Executor<R>) -> Self {
        Self { config, executor }
    }

    fn probe(&self) -> HostProbe<'a, R> {
        HostProbe::new(self.config, self.executor)
    }

    /// Erase each installed package without dependency checks
    ///
    /// Packages that are not installed are logged and skipped.
    pub fn erase_packages(&self, packages: &[String]) -> Result<()> {
        info!("Removing packages: {}", packages.join(", "));
        let probe = self.probe();
        for package in packages {
            if !probe.is_installed(package)? {
                warn!("Package \"{}\" is absent in system", package);
                continue;
            }
            self.executor
                .action(&CommandSpec::new("rpm").args(["-e", "--nodeps", package.as_str()]))?;
            info!("Package \"{}\" is removed from system", package);
        }
        Ok(())
    }

    /// Remove leftover branding directories
    ///
    /// Only real directories are removed; symlinks and other files are left
    /// alone.
    pub fn remove_stale_directories(&self) -> Result<()> {
        for dir in &self.config.packages.stale_directories {
            let path = self.config.host_path(dir);
            if is_real_dir(&path) {
                fs::remove_dir_all(&path)?;
                info!("Directory \"{}\" is removed", dir.display());
            } else {
                info!("Directory \"{}\" is absent in system", dir.display());
            }
        }
        Ok(())
    }

    /// Install the target distribution packages from their URLs, in order
    pub fn install_target_packages(&self) -> Result<()> {
        for package in &self.config.packages.target {
            info!("Installing {} package \"{}\"", self.config.os.target_name, package.name);
            self.executor.action(
                &CommandSpec::new("yum").args(["localinstall", "-y", package.url.as_str()]),
            )?;
            info!("Package \"{}\" is installed", package.name);
        }
        Ok(())
    }

    /// Update every installed package
    pub fn system_update(&self) -> Result<()> {
        info!("Running system update");
        self.executor
            .action(&CommandSpec::new("yum").args(["update", "-y"]))?;
        info!("System update completed");
        Ok(())
    }

    /// Align installed package versions with the enabled repositories
    pub fn distro_sync(&self) -> Result<()> {
        info!("Running distribution synchronization");
        self.executor
            .action(&CommandSpec::new("yum").args(["distro-sync", "-y"]))?;
        info!("Distribution synchronization completed");
        Ok(())
    }

    /// Regenerate the GRUB configuration at `grub_config`
    pub fn regenerate_boot_config(&self, grub_config: &Path) -> Result<()> {
        let path = grub_config.to_string_lossy();
        self.executor
            .action(&CommandSpec::new("grub2-mkconfig").args(["-o", path.as_ref()]))?;
        info!("GRUB config regenerated at \"{}\"", path);
        Ok(())
    }

    /// Reinstall boot chain packages not built by the target vendor
    ///
    /// Returns the packages that were reinstalled.
    pub fn reconcile_secure_boot_packages(&self) -> Result<Vec<PackageRecord>> {
        let probe = self.probe();
        let mut candidates = probe.list_secure_boot_packages()?;
        candidates.push(probe.default_boot_kernel_package()?);

        let mut seen = HashSet::new();
        let mut reinstalled = Vec::new();
        for record in candidates {
            if !seen.insert(record.nevra.clone()) {
                continue;
            }
            if record.vendor == self.config.os.target_vendor {
                continue;
            }
            info!(
                "Package \"{}\" is not released by {} and will be reinstalled",
                record.nevra, self.config.os.target_vendor
            );
            self.executor.action(
                &CommandSpec::new("yum").args(["reinstall", "-y", record.nevra.as_str()]),
            )?;
            reinstalled.push(record);
        }
        Ok(reinstalled)
    }

    /// Create a firmware boot entry for the target boot loader
    pub fn register_efi_boot_entry(&self) -> Result<()> {
        let boot = &self.config.boot;
        self.executor.action(&CommandSpec::new("efibootmgr").args([
            "-c",
            "-L",
            boot.efi_label.as_str(),
            "-l",
            boot.efi_loader.as_str(),
        ]))?;
        info!("EFI boot entry added for loader \"{}\"", boot.efi_loader);
        Ok(())
    }

    /// Point the default GRUB entry at the default kernel if none is set
    ///
    /// Returns whether a new default was set.
    pub fn ensure_default_boot_record(&self) -> Result<bool> {
        if self
            .executor
            .probe(&CommandSpec::new("grubby").arg("--info=DEFAULT"))?
        {
            return Ok(false);
        }
        let kernel = self.probe().default_kernel_path()?;
        self.executor
            .action(&CommandSpec::new("grubby").arg(format!("--set-default={}", kernel)))?;
        info!("Default GRUB boot record set to \"{}\"", kernel);
        Ok(true)
    }
}

fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}
