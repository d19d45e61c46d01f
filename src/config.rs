// src/config.rs

//! Migration configuration
//!
//! Every field defaults to the values for a RHEL 7 → CentOS 7 conversion, so
//! the tool runs without any configuration file. A TOML file can override
//! individual fields:
//!
//! ```toml
//! status_file = "/var/lib/rhel2centos/status.json"
//!
//! [boot]
//! efi_label = "CentOS Linux"
//! ```

use crate::error::{Error, Result};
use crate::status::StatusStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file consulted when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rhel2centos.toml";

/// A package installed from a direct URL during migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPackage {
    pub name: String,
    pub url: String,
}

impl TargetPackage {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Which source system is accepted and what it becomes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OsConfig {
    /// `ID` from os-release of the only supported source distribution
    pub supported_id: String,
    /// Only supported major version
    pub supported_major: u32,
    /// Lower-cased vendor string of packages built by the target distribution
    pub target_vendor: String,
    /// Human-readable target name for log messages
    pub target_name: String,
}

impl Default for OsConfig {
    fn default() -> Self {
        Self {
            supported_id: "rhel".to_string(),
            supported_major: 7,
            target_vendor: "centos".to_string(),
            target_name: "CentOS 7".to_string(),
        }
    }
}

/// Package sets driving the removal and installation stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    /// Source-distribution branding packages erased first
    pub legacy_branding: Vec<String>,
    /// Directories left behind by the branding packages
    pub stale_directories: Vec<PathBuf>,
    /// Packages that must all be installed for the management agent to count as present
    pub conflicting_agent_probe: Vec<String>,
    /// Packages erased when the management agent is present
    pub conflicting_agent_removal: Vec<String>,
    /// Target distribution packages, installed in order
    pub target: Vec<TargetPackage>,
    /// Name prefixes of packages that take part in the secure boot chain
    pub secure_boot_prefixes: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            legacy_branding: vec![
                "redhat-release-eula".to_string(),
                "redhat-release-server".to_string(),
                "redhat-logos".to_string(),
            ],
            stale_directories: vec![
                PathBuf::from("/usr/share/redhat-release"),
                PathBuf::from("/usr/share/doc/redhat-release"),
            ],
            conflicting_agent_probe: vec![
                "python-qpid-proton".to_string(),
                "python2-qpid-proton".to_string(),
            ],
            conflicting_agent_removal: vec![
                "python-qpid-proton".to_string(),
                "katello-agent".to_string(),
            ],
            target: vec![
                TargetPackage::new(
                    "centos-release",
                    "http://mirror.centos.org/centos/7/os/x86_64/Packages/centos-release-7-9.2009.0.el7.centos.x86_64.rpm",
                ),
                TargetPackage::new(
                    "centos-logos",
                    "http://mirror.centos.org/centos/7/os/x86_64/Packages/centos-logos-70.0.6-3.el7.centos.noarch.rpm",
                ),
            ],
            secure_boot_prefixes: vec![
                "shim".to_string(),
                "fwupd".to_string(),
                "grub2".to_string(),
                "kernel-".to_string(),
            ],
        }
    }
}

/// Boot loader locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// GRUB config written on EFI hosts
    pub efi_grub_config: PathBuf,
    /// GRUB config written on legacy BIOS hosts
    pub legacy_grub_config: PathBuf,
    /// Loader path registered with the firmware (relative to the ESP)
    pub efi_loader: String,
    /// Label of the new firmware boot entry
    pub efi_label: String,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            efi_grub_config: PathBuf::from("/boot/efi/EFI/centos/grub.cfg"),
            legacy_grub_config: PathBuf::from("/boot/grub2/grub.cfg"),
            efi_loader: "/EFI/centos/shimx64.efi".to_string(),
            efi_label: "CentOS Linux".to_string(),
        }
    }
}

/// Top-level migration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Filesystem root probed for os-release, firmware and stale directories
    pub root: PathBuf,
    /// Stage status document; must survive reboots
    pub status_file: PathBuf,
    /// Status document written by earlier releases, imported when
    /// `status_file` does not exist yet
    pub legacy_status_file: Option<PathBuf>,
    /// Persistent log file
    pub log_file: PathBuf,
    /// Run lock held for the duration of a migration
    pub lock_file: PathBuf,
    pub os: OsConfig,
    pub packages: PackagesConfig,
    pub boot: BootConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            status_file: PathBuf::from("/var/lib/rhel2centos/status.json"),
            legacy_status_file: Some(PathBuf::from("/var/run/rhel2centos.status.json")),
            log_file: PathBuf::from("/var/log/rhel2centos.log"),
            lock_file: PathBuf::from("/var/run/rhel2centos.lock"),
            os: OsConfig::default(),
            packages: PackagesConfig::default(),
            boot: BootConfig::default(),
        }
    }
}

impl MigrationConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: MigrationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load an explicit configuration file, or the default one when it exists
    ///
    /// An explicit path must exist. Without one, a missing default file means
    /// built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.packages.target.is_empty() {
            return Err(Error::ConfigError(
                "packages.target must name at least one package".to_string(),
            ));
        }
        // An empty probe set would make the AND check vacuously true
        if self.packages.conflicting_agent_probe.is_empty() {
            return Err(Error::ConfigError(
                "packages.conflicting_agent_probe must not be empty".to_string(),
            ));
        }
        if self.packages.secure_boot_prefixes.is_empty() {
            return Err(Error::ConfigError(
                "packages.secure_boot_prefixes must not be empty".to_string(),
            ));
        }
        for path in [&self.boot.efi_grub_config, &self.boot.legacy_grub_config] {
            if !path.is_absolute() {
                return Err(Error::ConfigError(format!(
                    "grub config path must be absolute: {}",
                    path.display()
                )));
            }
        }
        // Sharing one file would make a status update wait on the run lock
        let status_lock = StatusStore::open(&self.status_file).lock_path();
        if status_lock == self.lock_file || self.status_file == self.lock_file {
            return Err(Error::ConfigError(format!(
                "lock_file {} collides with the status document lock",
                self.lock_file.display()
            )));
        }
        if self.os.target_vendor != self.os.target_vendor.to_lowercase() {
            return Err(Error::ConfigError(
                "os.target_vendor must be lower-case".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a host path against the configured root
    pub fn host_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MigrationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.os.supported_major, 7);
        assert_eq!(config.packages.target.len(), 2);
        assert_eq!(config.packages.target[0].name, "centos-release");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MigrationConfig::from_toml(
            r#"
status_file = "/tmp/status.json"

[boot]
efi_label = "CentOS Test"
"#,
        )
        .unwrap();

        assert_eq!(config.status_file, PathBuf::from("/tmp/status.json"));
        assert_eq!(config.boot.efi_label, "CentOS Test");
        assert_eq!(config.boot.efi_loader, "/EFI/centos/shimx64.efi");
        assert_eq!(config.os.supported_id, "rhel");
    }

    #[test]
    fn test_empty_probe_set_rejected() {
        let err = MigrationConfig::from_toml(
            r#"
[packages]
conflicting_agent_probe = []
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_relative_grub_path_rejected() {
        let err = MigrationConfig::from_toml(
            r#"
[boot]
legacy_grub_config = "boot/grub2/grub.cfg"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[test]
    fn test_status_lock_colliding_with_run_lock_rejected() {
        let err = MigrationConfig::from_toml(
            r#"
status_file = "/var/lib/rhel2centos/status"
lock_file = "/var/lib/rhel2centos/status.lock"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn test_status_file_sharing_run_lock_stem_accepted() {
        let config = MigrationConfig::from_toml(
            r#"
status_file = "/var/run/rhel2centos.status"
lock_file = "/var/run/rhel2centos.lock"
"#,
        )
        .unwrap();
        assert_eq!(config.lock_file, PathBuf::from("/var/run/rhel2centos.lock"));
    }

    #[test]
    fn test_default_status_file_is_persistent() {
        let config = MigrationConfig::default();
        assert!(config.status_file.starts_with("/var/lib"));
        assert_eq!(
            config.legacy_status_file,
            Some(PathBuf::from("/var/run/rhel2centos.status.json"))
        );
    }

    #[test]
    fn test_unknown_toml_is_error() {
        assert!(MigrationConfig::from_toml("root = [").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = MigrationConfig::load(Some(temp.path().join("nope.toml").as_path())).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_host_path_joins_root() {
        let config = MigrationConfig {
            root: PathBuf::from("/mnt/sysimage"),
            ..Default::default()
        };
        assert_eq!(
            config.host_path("/usr/share/redhat-release"),
            PathBuf::from("/mnt/sysimage/usr/share/redhat-release")
        );
    }
}
