// src/probe.rs

//! Host environment facts
//!
//! Facts are computed fresh on every call. Earlier stages change the host
//! (installed packages, os-release), so nothing here is cached.

use crate::config::MigrationConfig;
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, CommandSpec, Executor};
use std::fmt;
use tracing::{debug, info, warn};

/// `rpm --queryformat` producing `name<TAB>nevra<TAB>vendor`
const PACKAGE_QUERY_FORMAT: &str = "%{name}\t%{name}-%{version}-%{release}.%{arch}\t%{vendor}\n";

/// Distribution name and version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsIdentity {
    pub major: u32,
    pub minor: u32,
    pub name: String,
}

impl OsIdentity {
    /// Identity reported when the distribution cannot be determined
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.name.is_empty()
    }

    /// Build from os-release `ID` and `VERSION_ID` values
    pub fn from_release(id: &str, version_id: &str) -> Self {
        if id.is_empty() {
            return Self::unknown();
        }
        let mut parts = version_id.split('.');
        let major = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let minor = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Self {
            major,
            minor,
            name: id.to_string(),
        }
    }
}

impl fmt::Display for OsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "unknown")
        } else {
            write!(f, "{} {}.{}", self.name, self.major, self.minor)
        }
    }
}

/// An installed package and who built it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    /// Package name, e.g. `kernel`
    pub name: String,
    /// Fully qualified `name-version-release.arch`
    pub nevra: String,
    /// Vendor string, lower-cased
    pub vendor: String,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, nevra: impl Into<String>, vendor: &str) -> Self {
        Self {
            name: name.into(),
            nevra: nevra.into(),
            vendor: vendor.trim().to_lowercase(),
        }
    }
}

/// Parse one `name<TAB>nevra<TAB>vendor` line
///
/// The vendor may contain spaces (`Red Hat, Inc.`), so only tabs separate
/// fields.
pub fn parse_package_line(line: &str) -> Option<PackageRecord> {
    let mut fields = line.trim_end_matches(['\r', '\n']).splitn(3, '\t');
    let name = fields.next()?.trim();
    let nevra = fields.next()?.trim();
    let vendor = fields.next()?;
    if name.is_empty() || nevra.is_empty() {
        return None;
    }
    Some(PackageRecord::new(name, nevra, vendor))
}

/// Parse os-release content into an identity
pub fn parse_os_release(content: &str) -> OsIdentity {
    let mut id = "";
    let mut version_id = "";
    for line in content.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
        match key.trim() {
            "ID" => id = value,
            "VERSION_ID" => version_id = value,
            _ => {}
        }
    }
    OsIdentity::from_release(id, version_id)
}

/// Answers questions about the host being migrated
pub struct HostProbe<'a, R> {
    config: &'a MigrationConfig,
    executor: &'a Executor<R>,
}

impl<'a, R: CommandRunner> HostProbe<'a, R> {
    pub fn new(config: &'a MigrationConfig, executor: &'a Executor<R>) -> Self {
        Self { config, executor }
    }

    /// Distribution identity from os-release, or unknown
    pub fn os_identity(&self) -> OsIdentity {
        let path = self.config.host_path("/etc/os-release");
        match std::fs::read_to_string(&path) {
            Ok(content) => parse_os_release(&content),
            Err(e) => {
                debug!("Cannot read {}: {}", path.display(), e);
                OsIdentity::unknown()
            }
        }
    }

    /// Whether the host booted through EFI firmware
    pub fn is_efi_system(&self) -> bool {
        self.config.host_path("/sys/firmware/efi").exists()
    }

    /// Whether a package is installed
    pub fn is_installed(&self, package: &str) -> Result<bool> {
        self.executor
            .probe(&CommandSpec::new("rpm").args(["-q", package]))
    }

    /// Whether the conflicting management agent is installed
    ///
    /// True only when *every* package of the probe set is installed; the
    /// first absent package answers false. A partially installed agent is
    /// therefore not flagged.
    pub fn has_conflicting_management_agent(&self) -> Result<bool> {
        for package in &self.config.packages.conflicting_agent_probe {
            if !self.is_installed(package)? {
                debug!("Management agent package '{}' is not installed", package);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Installed packages that take part in the secure boot chain
    pub fn list_secure_boot_packages(&self) -> Result<Vec<PackageRecord>> {
        let output = self.executor.action(
            &CommandSpec::new("rpm").args(["-qa", "--queryformat", PACKAGE_QUERY_FORMAT]),
        )?;

        let prefixes = &self.config.packages.secure_boot_prefixes;
        let mut records = Vec::new();
        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            let Some(record) = parse_package_line(line) else {
                warn!("Skipping malformed rpm output line: {}", line);
                continue;
            };
            if prefixes.iter().any(|p| record.name.starts_with(p.as_str())) {
                info!(
                    "The package \"{}\" relates to Secure Boot and is released by \"{}\"",
                    record.nevra, record.vendor
                );
                records.push(record);
            }
        }
        Ok(records)
    }

    /// The kernel path of the default boot entry
    pub fn default_kernel_path(&self) -> Result<String> {
        let output = self
            .executor
            .action(&CommandSpec::new("grubby").arg("--default-kernel"))?;
        let path = output.stdout.trim();
        if path.is_empty() {
            return Err(Error::ParseError(
                "grubby reported no default kernel".to_string(),
            ));
        }
        Ok(path.to_string())
    }

    /// The package owning the kernel of the default boot entry
    pub fn default_boot_kernel_package(&self) -> Result<PackageRecord> {
        let kernel = self.default_kernel_path()?;
        let output = self.executor.action(
            &CommandSpec::new("rpm").args(["-qf", &kernel, "--queryformat", PACKAGE_QUERY_FORMAT]),
        )?;
        let line = output.stdout.lines().next().unwrap_or("");
        let record = parse_package_line(line).ok_or_else(|| {
            Error::ParseError(format!(
                "Unexpected rpm output for kernel {}: {:?}",
                kernel, output.stdout
            ))
        })?;
        info!(
            "Kernel package \"{}\" backs the default boot record and is released by \"{}\"",
            record.nevra, record.vendor
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::ScriptedRunner;
    use crate::exec::CommandOutput;
    use std::fs;
    use tempfile::TempDir;

    fn config_at(root: &TempDir) -> MigrationConfig {
        MigrationConfig {
            root: root.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_os_release_rhel() {
        let content = "NAME=\"Red Hat Enterprise Linux Server\"\nVERSION=\"7.9 (Maipo)\"\nID=\"rhel\"\nID_LIKE=\"fedora\"\nVERSION_ID=\"7.9\"\n";
        assert_eq!(
            parse_os_release(content),
            OsIdentity {
                major: 7,
                minor: 9,
                name: "rhel".to_string()
            }
        );
    }

    #[test]
    fn test_parse_os_release_without_minor() {
        let identity = parse_os_release("ID=centos\nVERSION_ID=\"7\"\n");
        assert_eq!(identity.major, 7);
        assert_eq!(identity.minor, 0);
        assert_eq!(identity.name, "centos");
    }

    #[test]
    fn test_parse_os_release_without_id_is_unknown() {
        let identity = parse_os_release("VERSION_ID=\"7.9\"\n");
        assert_eq!(identity, OsIdentity::unknown());
        assert_eq!(identity.to_string(), "unknown");
    }

    #[test]
    fn test_missing_os_release_is_unknown() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);
        let runner = ScriptedRunner::new();
        let exec = Executor::new(&runner);

        assert!(HostProbe::new(&config, &exec).os_identity().is_unknown());
    }

    #[test]
    fn test_is_efi_system() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);
        let runner = ScriptedRunner::new();
        let exec = Executor::new(&runner);
        let probe = HostProbe::new(&config, &exec);

        assert!(!probe.is_efi_system());
        fs::create_dir_all(root.path().join("sys/firmware/efi")).unwrap();
        assert!(probe.is_efi_system());
    }

    #[test]
    fn test_conflicting_agent_requires_all_packages() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);
        let runner = ScriptedRunner::new();
        let exec = Executor::new(&runner);
        let probe = HostProbe::new(&config, &exec);

        assert!(probe.has_conflicting_management_agent().unwrap());

        runner.on(&["rpm", "-q", "python2-qpid-proton"], CommandOutput::failed(1, ""));
        assert!(!probe.has_conflicting_management_agent().unwrap());
    }

    #[test]
    fn test_conflicting_agent_short_circuits_on_first_absence() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);
        let runner = ScriptedRunner::new();
        runner.on(&["rpm", "-q", "python-qpid-proton"], CommandOutput::failed(1, ""));
        let exec = Executor::new(&runner);

        assert!(!HostProbe::new(&config, &exec)
            .has_conflicting_management_agent()
            .unwrap());
        assert_eq!(runner.call_lines(), vec!["rpm -q python-qpid-proton"]);
    }

    #[test]
    fn test_parse_package_line_vendor_with_spaces() {
        let record = parse_package_line("kernel\tkernel-3.10.0-1160.el7.x86_64\tRed Hat, Inc.").unwrap();
        assert_eq!(record.name, "kernel");
        assert_eq!(record.nevra, "kernel-3.10.0-1160.el7.x86_64");
        assert_eq!(record.vendor, "red hat, inc.");
    }

    #[test]
    fn test_parse_package_line_malformed() {
        assert!(parse_package_line("kernel kernel-3.10 CentOS").is_none());
        assert!(parse_package_line("\t\tCentOS").is_none());
    }

    #[test]
    fn test_secure_boot_packages_filtered_by_prefix() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);
        let runner = ScriptedRunner::new();
        runner.on(
            &["rpm", "-qa"],
            CommandOutput::ok(
                "shim-x64\tshim-x64-15-8.el7.x86_64\tRed Hat, Inc.\n\
                 bash\tbash-4.2.46-34.el7.x86_64\tRed Hat, Inc.\n\
                 kernel\tkernel-3.10.0-1160.el7.x86_64\tRed Hat, Inc.\n\
                 kernel-tools\tkernel-tools-3.10.0-1160.el7.x86_64\tCentOS\n\
                 garbage line\n\
                 grub2-efi-x64\tgrub2-efi-x64-2.02-0.87.el7.x86_64\tCentOS\n",
            ),
        );
        let exec = Executor::new(&runner);

        let records = HostProbe::new(&config, &exec).list_secure_boot_packages().unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        // "kernel" itself does not match the "kernel-" prefix
        assert_eq!(names, vec!["shim-x64", "kernel-tools", "grub2-efi-x64"]);
        assert_eq!(records[1].vendor, "centos");
    }

    #[test]
    fn test_secure_boot_listing_failure_is_hard() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);
        let runner = ScriptedRunner::new();
        runner.on(&["rpm", "-qa"], CommandOutput::failed(1, "rpmdb open failed"));
        let exec = Executor::new(&runner);

        let err = HostProbe::new(&config, &exec)
            .list_secure_boot_packages()
            .unwrap_err();
        assert!(err.to_string().contains("rpmdb open failed"));
    }

    #[test]
    fn test_default_boot_kernel_package() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);
        let runner = ScriptedRunner::new();
        runner
            .on(
                &["grubby", "--default-kernel"],
                CommandOutput::ok("/boot/vmlinuz-3.10.0-1160.el7.x86_64\n"),
            )
            .on(
                &["rpm", "-qf", "/boot/vmlinuz-3.10.0-1160.el7.x86_64"],
                CommandOutput::ok("kernel\tkernel-3.10.0-1160.el7.x86_64\tRed Hat, Inc.\n"),
            );
        let exec = Executor::new(&runner);

        let record = HostProbe::new(&config, &exec)
            .default_boot_kernel_package()
            .unwrap();
        assert_eq!(
            record,
            PackageRecord::new("kernel", "kernel-3.10.0-1160.el7.x86_64", "Red Hat, Inc.")
        );
    }

    #[test]
    fn test_empty_default_kernel_is_parse_error() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);
        let runner = ScriptedRunner::new();
        runner.on(&["grubby", "--default-kernel"], CommandOutput::ok("\n"));
        let exec = Executor::new(&runner);

        assert!(matches!(
            HostProbe::new(&config, &exec).default_boot_kernel_package(),
            Err(Error::ParseError(_))
        ));
    }
}
