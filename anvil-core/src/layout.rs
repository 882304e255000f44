//! Disk layout planning.
//!
//! `plan` is a pure function from (device size, EFI size, swap size) to an
//! ordered, contiguous, non-overlapping partition plan. It touches no
//! device, so it is unit-testable with plain numbers. All offsets are
//! whole MiB to avoid rounding drift.

use crate::context::PartitionDevices;
use crate::errors::ProvisionError;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Reserved gap at the start of the device; keeps the first partition
/// off sector zero and aligned.
pub const ALIGNMENT_GAP_MIB: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartitionRole {
    Esp,
    Swap,
    Root,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilesystemKind {
    Fat32,
    Swap,
    Ext4,
}

impl FilesystemKind {
    /// Filesystem name as `parted mkpart` expects it.
    pub fn parted_name(&self) -> &'static str {
        match self {
            FilesystemKind::Fat32 => "fat32",
            FilesystemKind::Swap => "linux-swap",
            FilesystemKind::Ext4 => "ext4",
        }
    }
}

/// Upper bound of a partition: a fixed MiB offset, or the rest of the
/// device (root only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PartitionEnd {
    Mib(u64),
    Remainder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionEntry {
    pub role: PartitionRole,
    pub start_mib: u64,
    pub end: PartitionEnd,
    pub fs: FilesystemKind,
    pub boot_flag: bool,
}

impl PartitionEntry {
    /// Start offset as a `parted` position argument.
    pub fn start_arg(&self) -> String {
        format!("{}MiB", self.start_mib)
    }

    /// End offset as a `parted` position argument.
    pub fn end_arg(&self) -> String {
        match self.end {
            PartitionEnd::Mib(end) => format!("{end}MiB"),
            PartitionEnd::Remainder => "100%".to_string(),
        }
    }

    pub fn size_mib(&self, device_size_mib: u64) -> u64 {
        match self.end {
            PartitionEnd::Mib(end) => end - self.start_mib,
            PartitionEnd::Remainder => device_size_mib - self.start_mib,
        }
    }
}

/// Ordered partition plan: ESP, swap, root. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPlan {
    pub entries: Vec<PartitionEntry>,
}

impl PartitionPlan {
    pub fn entry(&self, role: PartitionRole) -> &PartitionEntry {
        self.entries
            .iter()
            .find(|e| e.role == role)
            .unwrap_or_else(|| unreachable!("plan always carries one entry per role"))
    }
}

/// Compute the partition plan for a device.
///
/// Fails when the fixed budgets leave no room for the root partition.
pub fn plan(
    device_size_mib: u64,
    efi_mib: u64,
    swap_mib: u64,
) -> Result<PartitionPlan, ProvisionError> {
    let reserved_mib = ALIGNMENT_GAP_MIB + efi_mib + swap_mib;
    if reserved_mib >= device_size_mib {
        return Err(ProvisionError::InsufficientSpace {
            device_mib: device_size_mib,
            required_mib: reserved_mib,
        });
    }

    let esp_start = ALIGNMENT_GAP_MIB;
    let esp_end = esp_start + efi_mib;
    let swap_end = esp_end + swap_mib;

    Ok(PartitionPlan {
        entries: vec![
            PartitionEntry {
                role: PartitionRole::Esp,
                start_mib: esp_start,
                end: PartitionEnd::Mib(esp_end),
                fs: FilesystemKind::Fat32,
                boot_flag: true,
            },
            PartitionEntry {
                role: PartitionRole::Swap,
                start_mib: esp_end,
                end: PartitionEnd::Mib(swap_end),
                fs: FilesystemKind::Swap,
                boot_flag: false,
            },
            PartitionEntry {
                role: PartitionRole::Root,
                start_mib: swap_end,
                end: PartitionEnd::Remainder,
                fs: FilesystemKind::Ext4,
                boot_flag: false,
            },
        ],
    })
}

/// One mount operation derived from the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountStep {
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub fstype: &'static str,
}

/// Derive the mount order from resolved partition devices.
///
/// The root mount always precedes the ESP mount: the boot mount point is
/// a subdirectory of the root and cannot exist before root is mounted.
pub fn mount_plan(devices: &PartitionDevices, mount_root: &Path) -> Vec<MountStep> {
    vec![
        MountStep {
            device: devices.root.clone(),
            mount_point: mount_root.to_path_buf(),
            fstype: "ext4",
        },
        MountStep {
            device: devices.esp.clone(),
            mount_point: mount_root.join("boot"),
            fstype: "vfat",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB_100_MIB: u64 = 100 * 1024;

    #[test]
    fn happy_path_layout() {
        let plan = plan(GIB_100_MIB, 512, 4096).unwrap();
        assert_eq!(plan.entries.len(), 3);

        let esp = plan.entry(PartitionRole::Esp);
        assert_eq!(esp.start_mib, 1);
        assert_eq!(esp.end, PartitionEnd::Mib(513));
        assert_eq!(esp.size_mib(GIB_100_MIB), 512);
        assert!(esp.boot_flag);

        let swap = plan.entry(PartitionRole::Swap);
        assert_eq!(swap.start_mib, 513);
        assert_eq!(swap.end, PartitionEnd::Mib(4609));

        let root = plan.entry(PartitionRole::Root);
        assert_eq!(root.start_mib, 4609);
        assert_eq!(root.end, PartitionEnd::Remainder);
        assert_eq!(root.size_mib(GIB_100_MIB), GIB_100_MIB - 1 - 512 - 4096);
    }

    #[test]
    fn entries_are_contiguous_and_cover_the_device() {
        let plan = plan(GIB_100_MIB, 512, 4096).unwrap();
        let mut expected_start = ALIGNMENT_GAP_MIB;
        for entry in &plan.entries {
            assert_eq!(entry.start_mib, expected_start);
            expected_start = match entry.end {
                PartitionEnd::Mib(end) => end,
                PartitionEnd::Remainder => GIB_100_MIB,
            };
        }
        assert_eq!(expected_start, GIB_100_MIB);
    }

    #[test]
    fn planning_is_deterministic() {
        let a = plan(GIB_100_MIB, 512, 4096).unwrap();
        let b = plan(GIB_100_MIB, 512, 4096).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn too_small_device_is_rejected() {
        let err = plan(1024, 512, 4096).unwrap_err();
        match err {
            crate::errors::ProvisionError::InsufficientSpace {
                device_mib,
                required_mib,
            } => {
                assert_eq!(device_mib, 1024);
                assert_eq!(required_mib, 1 + 512 + 4096);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn device_with_no_room_for_root_is_rejected() {
        // Exactly gap + efi + swap leaves zero MiB for root.
        assert!(plan(1 + 512 + 4096, 512, 4096).is_err());
        assert!(plan(1 + 512 + 4096 + 1, 512, 4096).is_ok());
    }

    #[test]
    fn parted_position_arguments() {
        let plan = plan(GIB_100_MIB, 512, 4096).unwrap();
        let esp = plan.entry(PartitionRole::Esp);
        assert_eq!(esp.start_arg(), "1MiB");
        assert_eq!(esp.end_arg(), "513MiB");
        let root = plan.entry(PartitionRole::Root);
        assert_eq!(root.end_arg(), "100%");
    }

    #[test]
    fn root_is_mounted_before_the_esp() {
        let devices = PartitionDevices {
            esp: PathBuf::from("/dev/sda1"),
            swap: PathBuf::from("/dev/sda2"),
            root: PathBuf::from("/dev/sda3"),
        };
        let steps = mount_plan(&devices, Path::new("/mnt"));
        assert_eq!(steps[0].mount_point, PathBuf::from("/mnt"));
        assert_eq!(steps[0].device, PathBuf::from("/dev/sda3"));
        assert_eq!(steps[1].mount_point, PathBuf::from("/mnt/boot"));
        assert_eq!(steps[1].device, PathBuf::from("/dev/sda1"));
    }
}
