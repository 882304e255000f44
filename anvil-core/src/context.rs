//! Shared installation state threaded through every phase.

use crate::defaults;
use serde::Serialize;
use std::path::PathBuf;

/// Firmware interface style of the host.
///
/// Detected exactly once during validation and cached here; bootloader
/// installation branches on it much later, and a changed answer between
/// detection and use would be a correctness bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BootMode {
    Uefi,
    Bios,
}

/// Fixed partition size budget. The root partition always consumes the
/// remainder of the device and therefore has no entry here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBudget {
    pub efi_mib: u64,
    pub swap_mib: u64,
}

/// Identity and locale selections applied inside the target root.
#[derive(Debug, Clone)]
pub struct SystemSettings {
    pub hostname: String,
    pub username: String,
    pub user_password: String,
    pub root_password: String,
    pub timezone: String,
    pub locale: String,
    pub locale_gen: String,
    pub keymap: String,
}

/// Resolved partition device paths, set by the executor after the
/// partition table is written and the device nodes have settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDevices {
    pub esp: PathBuf,
    pub swap: PathBuf,
    pub root: PathBuf,
}

/// Mutable context owned by the orchestrator and passed by reference to
/// each phase. Created once from compiled-in defaults, populated
/// incrementally, discarded at process exit.
#[derive(Debug, Clone)]
pub struct InstallationContext {
    pub device: PathBuf,
    pub budget: SizeBudget,
    pub settings: SystemSettings,
    pub packages: Vec<String>,
    pub mount_root: PathBuf,
    pub dry_run: bool,
    pub confirmed: bool,

    // Populated by phases.
    pub boot_mode: Option<BootMode>,
    pub device_size_mib: Option<u64>,
    pub partitions: Option<PartitionDevices>,
}

impl InstallationContext {
    pub fn from_defaults(dry_run: bool, confirmed: bool) -> Self {
        Self {
            device: PathBuf::from(defaults::TARGET_DEVICE),
            budget: SizeBudget {
                efi_mib: defaults::EFI_MIB,
                swap_mib: defaults::SWAP_MIB,
            },
            settings: SystemSettings {
                hostname: defaults::HOSTNAME.to_string(),
                username: defaults::USERNAME.to_string(),
                user_password: defaults::USER_PASSWORD.to_string(),
                root_password: defaults::ROOT_PASSWORD.to_string(),
                timezone: defaults::TIMEZONE.to_string(),
                locale: defaults::LOCALE.to_string(),
                locale_gen: defaults::LOCALE_GEN.to_string(),
                keymap: defaults::KEYMAP.to_string(),
            },
            packages: defaults::BASE_PACKAGES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            mount_root: PathBuf::from(defaults::MOUNT_ROOT),
            dry_run,
            confirmed,
            boot_mode: None,
            device_size_mib: None,
            partitions: None,
        }
    }
}
