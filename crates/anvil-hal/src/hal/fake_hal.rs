//! Fake HAL implementation for testing.
//!
//! Records operations without executing them, so workflows can be tested
//! in CI without root privileges or a sacrificial disk. Individual
//! operations can be scripted to fail, which is how mid-run failure
//! scenarios are exercised.

use super::chroot_ops::ChrootOps;
use super::format_ops::{FormatOps, FormatOptions};
use super::mount_ops::{MountOps, MountOptions};
use super::partition_ops::{PartedOp, PartedOptions, PartitionOps};
use super::probe_ops::ProbeOps;
use super::process_ops::ProcessOps;
use super::swap_ops::SwapOps;
use super::system_ops::SystemOps;
use crate::{HalError, HalResult};
use std::collections::{HashMap, HashSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex};

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    MkLabel {
        disk: PathBuf,
        label: String,
    },
    MkPart {
        disk: PathBuf,
        part_type: String,
        fs_type: String,
        start: String,
        end: String,
    },
    SetFlag {
        disk: PathBuf,
        part_num: u32,
        flag: String,
    },
    RereadTable {
        disk: PathBuf,
    },
    FormatVfat {
        device: PathBuf,
        label: String,
    },
    FormatExt4 {
        device: PathBuf,
    },
    MakeSwap {
        device: PathBuf,
    },
    SwapOn {
        device: PathBuf,
    },
    SwapOffAll,
    Mount {
        device: PathBuf,
        target: PathBuf,
        fstype: Option<String>,
    },
    UnmountRecursive {
        target: PathBuf,
    },
    Chroot {
        root: PathBuf,
        program: String,
        args: Vec<String>,
    },
    ChrootStdin {
        root: PathBuf,
        program: String,
        args: Vec<String>,
        input: String,
    },
    Command {
        program: String,
        args: Vec<String>,
    },
    DetectBootMode,
    LsblkTable {
        disk: Option<PathBuf>,
    },
    UdevSettle,
    SyncClock,
}

#[derive(Debug, Default)]
struct FakeHalState {
    operations: Vec<Operation>,
    mounted_paths: HashSet<PathBuf>,
    swap_devices: HashSet<PathBuf>,
    efi_present: bool,
    fail_ops: HashSet<String>,
    missing_nodes: HashSet<PathBuf>,
    command_stdout: HashMap<String, String>,
}

/// Fake HAL implementation that records operations without executing them.
#[derive(Debug, Clone)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl Default for FakeHal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeHalState {
                efi_present: true,
                ..FakeHalState::default()
            })),
        }
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    /// Count operations matching a predicate.
    pub fn count_operations(&self, check: impl Fn(&Operation) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| check(op))
            .count()
    }

    /// Configure the firmware probe answer (true = UEFI).
    pub fn set_efi_present(&self, present: bool) {
        self.state.lock().unwrap().efi_present = present;
    }

    /// Script the named operation to fail (keys are tool names, e.g.
    /// `"mkswap"`, `"parted"`, `"pacstrap"`).
    pub fn fail_on(&self, key: impl Into<String>) {
        self.state.lock().unwrap().fail_ops.insert(key.into());
    }

    /// Script a partition device node that never appears.
    pub fn set_node_missing(&self, device: impl Into<PathBuf>) {
        self.state.lock().unwrap().missing_nodes.insert(device.into());
    }

    /// Script stdout for a `command_output` program (e.g. `"genfstab"`).
    pub fn set_command_stdout(&self, program: impl Into<String>, stdout: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .command_stdout
            .insert(program.into(), stdout.into());
    }

    pub fn is_swap_active(&self, device: &Path) -> bool {
        self.state.lock().unwrap().swap_devices.contains(device)
    }

    fn check_fail(&self, key: &str) -> HalResult<()> {
        if self.state.lock().unwrap().fail_ops.contains(key) {
            return Err(HalError::CommandFailed {
                program: key.to_string(),
                code: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }
}

impl PartitionOps for FakeHal {
    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String> {
        if opts.dry_run {
            return Ok(String::new());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }
        self.check_fail("parted")?;
        match op {
            PartedOp::MkLabel { label } => {
                self.check_fail("mklabel")?;
                self.record(Operation::MkLabel {
                    disk: disk.to_path_buf(),
                    label,
                });
            }
            PartedOp::MkPart {
                part_type,
                fs_type,
                start,
                end,
            } => {
                self.check_fail("mkpart")?;
                self.record(Operation::MkPart {
                    disk: disk.to_path_buf(),
                    part_type,
                    fs_type,
                    start,
                    end,
                });
            }
            PartedOp::SetFlag { part_num, flag, .. } => {
                self.record(Operation::SetFlag {
                    disk: disk.to_path_buf(),
                    part_num,
                    flag,
                });
            }
        }
        Ok(String::new())
    }

    fn reread_partition_table(&self, disk: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            return Ok(());
        }
        self.check_fail("partprobe")?;
        self.record(Operation::RereadTable {
            disk: disk.to_path_buf(),
        });
        Ok(())
    }
}

impl FormatOps for FakeHal {
    fn format_vfat(&self, device: &Path, label: &str, opts: &FormatOptions) -> HalResult<()> {
        if opts.dry_run {
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }
        self.check_fail("mkfs.vfat")?;
        self.record(Operation::FormatVfat {
            device: device.to_path_buf(),
            label: label.to_string(),
        });
        Ok(())
    }

    fn format_ext4(&self, device: &Path, opts: &FormatOptions) -> HalResult<()> {
        if opts.dry_run {
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }
        self.check_fail("mkfs.ext4")?;
        self.record(Operation::FormatExt4 {
            device: device.to_path_buf(),
        });
        Ok(())
    }

    fn make_swap(&self, device: &Path, opts: &FormatOptions) -> HalResult<()> {
        if opts.dry_run {
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }
        self.check_fail("mkswap")?;
        self.record(Operation::MakeSwap {
            device: device.to_path_buf(),
        });
        Ok(())
    }
}

impl MountOps for FakeHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        _options: MountOptions,
        dry_run: bool,
    ) -> HalResult<()> {
        if dry_run {
            return Ok(());
        }
        self.check_fail("mount")?;
        self.record(Operation::Mount {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.map(str::to_string),
        });
        self.state
            .lock()
            .unwrap()
            .mounted_paths
            .insert(target.to_path_buf());
        Ok(())
    }

    fn unmount_recursive(&self, target: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            return Ok(());
        }
        self.check_fail("unmount")?;
        self.record(Operation::UnmountRecursive {
            target: target.to_path_buf(),
        });
        let mut state = self.state.lock().unwrap();
        state
            .mounted_paths
            .retain(|p| !(p == target || p.starts_with(target)));
        Ok(())
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        Ok(self.state.lock().unwrap().mounted_paths.contains(path))
    }
}

impl SwapOps for FakeHal {
    fn swapon(&self, device: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            return Ok(());
        }
        self.check_fail("swapon")?;
        self.record(Operation::SwapOn {
            device: device.to_path_buf(),
        });
        self.state
            .lock()
            .unwrap()
            .swap_devices
            .insert(device.to_path_buf());
        Ok(())
    }

    fn swapoff_all(&self, dry_run: bool) -> HalResult<()> {
        if dry_run {
            return Ok(());
        }
        self.check_fail("swapoff")?;
        self.record(Operation::SwapOffAll);
        self.state.lock().unwrap().swap_devices.clear();
        Ok(())
    }
}

impl ChrootOps for FakeHal {
    fn chroot_status(
        &self,
        root: &Path,
        program: &str,
        args: &[&str],
        dry_run: bool,
    ) -> HalResult<()> {
        if dry_run {
            return Ok(());
        }
        self.check_fail(program)?;
        self.record(Operation::Chroot {
            root: root.to_path_buf(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        Ok(())
    }

    fn chroot_status_with_stdin(
        &self,
        root: &Path,
        program: &str,
        args: &[&str],
        input: &str,
        dry_run: bool,
    ) -> HalResult<()> {
        if dry_run {
            return Ok(());
        }
        self.check_fail(program)?;
        self.record(Operation::ChrootStdin {
            root: root.to_path_buf(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            input: input.to_string(),
        });
        Ok(())
    }
}

impl ProbeOps for FakeHal {
    fn lsblk_table(&self, disk: Option<&Path>) -> HalResult<String> {
        self.record(Operation::LsblkTable {
            disk: disk.map(Path::to_path_buf),
        });
        let name = disk.map_or("sda".to_string(), |d| d.display().to_string());
        Ok(format!("NAME SIZE TYPE\n{name} 100G disk\n"))
    }

    fn efi_firmware_present(&self) -> HalResult<bool> {
        self.record(Operation::DetectBootMode);
        Ok(self.state.lock().unwrap().efi_present)
    }

    fn device_node_present(&self, device: &Path) -> HalResult<bool> {
        Ok(!self.state.lock().unwrap().missing_nodes.contains(device))
    }
}

impl ProcessOps for FakeHal {
    fn command_status(&self, program: &str, args: &[&str], dry_run: bool) -> HalResult<()> {
        if dry_run {
            return Ok(());
        }
        self.check_fail(program)?;
        self.record(Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        Ok(())
    }

    fn command_output(&self, program: &str, args: &[&str]) -> HalResult<Output> {
        self.check_fail(program)?;
        self.record(Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        let stdout = self
            .state
            .lock()
            .unwrap()
            .command_stdout
            .get(program)
            .cloned()
            .unwrap_or_default();
        Ok(Output {
            status: std::process::ExitStatus::from_raw(0),
            stdout: stdout.into_bytes(),
            stderr: Vec::new(),
        })
    }
}

impl SystemOps for FakeHal {
    fn udev_settle(&self) -> HalResult<()> {
        self.record(Operation::UdevSettle);
        Ok(())
    }

    fn sync_clock(&self) -> HalResult<()> {
        self.check_fail("timedatectl")?;
        self.record(Operation::SyncClock);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_tracks_state() {
        let hal = FakeHal::new();
        hal.mount_device(
            Path::new("/dev/sda3"),
            Path::new("/mnt"),
            Some("ext4"),
            MountOptions::new(),
            false,
        )
        .unwrap();
        assert!(hal.is_mounted(Path::new("/mnt")).unwrap());

        hal.unmount_recursive(Path::new("/mnt"), false).unwrap();
        assert!(!hal.is_mounted(Path::new("/mnt")).unwrap());
    }

    #[test]
    fn unmount_recursive_releases_nested_mounts() {
        let hal = FakeHal::new();
        for (dev, target) in [("/dev/sda3", "/mnt"), ("/dev/sda1", "/mnt/boot")] {
            hal.mount_device(
                Path::new(dev),
                Path::new(target),
                None,
                MountOptions::new(),
                false,
            )
            .unwrap();
        }
        hal.unmount_recursive(Path::new("/mnt"), false).unwrap();
        assert!(!hal.is_mounted(Path::new("/mnt/boot")).unwrap());
    }

    #[test]
    fn scripted_failure_surfaces_as_command_failed() {
        let hal = FakeHal::new();
        hal.fail_on("mkswap");
        let err = hal
            .make_swap(Path::new("/dev/sda2"), &FormatOptions::new(false, true))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandFailed { .. }));
    }

    #[test]
    fn dry_run_records_nothing() {
        let hal = FakeHal::new();
        hal.make_swap(Path::new("/dev/sda2"), &FormatOptions::new(true, true))
            .unwrap();
        hal.swapon(Path::new("/dev/sda2"), true).unwrap();
        assert!(hal.operations().is_empty());
    }

    #[test]
    fn node_presence_is_scriptable() {
        let hal = FakeHal::new();
        assert!(hal.device_node_present(Path::new("/dev/sda1")).unwrap());
        hal.set_node_missing("/dev/sda1");
        assert!(!hal.device_node_present(Path::new("/dev/sda1")).unwrap());
    }

    #[test]
    fn command_output_returns_scripted_stdout() {
        let hal = FakeHal::new();
        hal.set_command_stdout("genfstab", "UUID=abcd / ext4 rw 0 1\n");
        let out = hal.command_output("genfstab", &["-U", "/mnt"]).unwrap();
        assert_eq!(
            String::from_utf8_lossy(&out.stdout),
            "UUID=abcd / ext4 rw 0 1\n"
        );
    }
}
