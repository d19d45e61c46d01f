// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use rhel2centos::exec::mock::ScriptedRunner;
use rhel2centos::{CommandOutput, MigrationConfig, StatusStore};
use std::fs;
use tempfile::TempDir;

pub const RHEL_7_9: &str = "NAME=\"Red Hat Enterprise Linux Server\"\n\
                            VERSION=\"7.9 (Maipo)\"\n\
                            ID=\"rhel\"\n\
                            VERSION_ID=\"7.9\"\n";

/// A fake host root with a status document next to it.
///
/// Keep the fixture alive to prevent cleanup of the TempDir.
pub struct HostFixture {
    pub temp: TempDir,
    pub config: MigrationConfig,
}

impl HostFixture {
    /// RHEL 7.9 host booted in legacy BIOS mode
    pub fn legacy() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("etc")).unwrap();
        fs::write(root.join("etc/os-release"), RHEL_7_9).unwrap();

        let config = MigrationConfig {
            root,
            status_file: temp.path().join("run/rhel2centos.status.json"),
            log_file: temp.path().join("log/rhel2centos.log"),
            lock_file: temp.path().join("run/rhel2centos.lock"),
            ..Default::default()
        };
        Self { temp, config }
    }

    /// RHEL 7.9 host booted through EFI firmware
    pub fn efi() -> Self {
        let fixture = Self::legacy();
        fs::create_dir_all(fixture.config.root.join("sys/firmware/efi")).unwrap();
        fixture
    }

    pub fn store(&self) -> StatusStore {
        StatusStore::open(&self.config.status_file)
    }

    pub fn write_os_release(&self, content: &str) {
        fs::write(self.config.root.join("etc/os-release"), content).unwrap();
    }
}

/// A runner answering the boot chain queries of an EFI RHEL host
pub fn efi_runner() -> ScriptedRunner {
    let runner = ScriptedRunner::new();
    runner
        .on(
            &["rpm", "-qa"],
            CommandOutput::ok(
                "shim-x64\tshim-x64-15-8.el7.x86_64\tRed Hat, Inc.\n\
                 grub2-efi-x64\tgrub2-efi-x64-2.02-0.87.el7.centos.x86_64\tCentOS\n\
                 bash\tbash-4.2.46-34.el7.x86_64\tRed Hat, Inc.\n",
            ),
        )
        .on(
            &["grubby", "--default-kernel"],
            CommandOutput::ok("/boot/vmlinuz-3.10.0-1160.el7.x86_64\n"),
        )
        .on(
            &["rpm", "-qf"],
            CommandOutput::ok("kernel\tkernel-3.10.0-1160.el7.x86_64\tRed Hat, Inc.\n"),
        );
    runner
}

/// Mark the given stage keys complete
pub fn mark(store: &StatusStore, keys: &[&str]) {
    for key in keys {
        store.set_stage_completed(key).unwrap();
    }
}
