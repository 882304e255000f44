//! Linux HAL implementation using real system calls and external tools.

use super::chroot_ops::ChrootOps;
use super::format_ops::{FormatOps, FormatOptions};
use super::mount_ops::{MountOps, MountOptions};
use super::partition_ops::{PartedOp, PartedOptions, PartitionOps};
use super::probe_ops::ProbeOps;
use super::process_ops::ProcessOps;
use super::swap_ops::SwapOps;
use super::system_ops::SystemOps;
use crate::{HalError, HalResult};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone, Default)]
pub struct LinuxHal {
    efi_firmware_dir: PathBuf,
}

impl LinuxHal {
    pub fn new() -> Self {
        Self {
            efi_firmware_dir: PathBuf::from("/sys/firmware/efi/efivars"),
        }
    }

    /// Override the firmware probe directory (tests).
    pub fn with_efi_firmware_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            efi_firmware_dir: dir.into(),
        }
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);
const CLOCK_TIMEOUT: Duration = Duration::from_secs(30);
const PARTED_TIMEOUT: Duration = Duration::from_secs(5 * 60);

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::Io(err)
}

fn output_failed(program: &str, output: &Output) -> HalError {
    HalError::CommandFailed {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn output_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<Output> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Drain pipes concurrently to avoid deadlocks on large output.
    let stdout_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout.take() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr.take() {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn status_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<()> {
    let output = output_with_timeout(program, cmd, timeout)?;
    if !output.status.success() {
        return Err(output_failed(program, &output));
    }
    Ok(())
}

/// Run without a deadline. Used for destructive operations (mkfs, package
/// materialization, bootloader install) that have no safe cancellation
/// point and are allowed to block.
fn output_unbounded(program: &str, cmd: &mut Command) -> HalResult<Output> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.output().map_err(|e| map_command_err(program, e))
}

fn status_unbounded(program: &str, cmd: &mut Command) -> HalResult<()> {
    let output = output_unbounded(program, cmd)?;
    if !output.status.success() {
        return Err(output_failed(program, &output));
    }
    Ok(())
}

fn map_nix_err(err: nix::errno::Errno) -> HalError {
    use nix::errno::Errno;
    match err {
        Errno::EACCES | Errno::EPERM => HalError::PermissionDenied,
        other => HalError::Nix(other),
    }
}

impl PartitionOps for LinuxHal {
    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String> {
        if opts.dry_run {
            log::info!("DRY RUN: parted -s {} {:?}", disk.display(), op);
            return Ok(String::new());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        let mut args: Vec<String> = vec!["-s".to_string(), disk.display().to_string()];
        match op {
            PartedOp::MkLabel { label } => {
                args.push("mklabel".to_string());
                args.push(label);
            }
            PartedOp::MkPart {
                part_type,
                fs_type,
                start,
                end,
            } => {
                args.push("-a".to_string());
                args.push("optimal".to_string());
                args.push("mkpart".to_string());
                args.push(part_type);
                args.push(fs_type);
                args.push(start);
                args.push(end);
            }
            PartedOp::SetFlag {
                part_num,
                flag,
                state,
            } => {
                args.push("set".to_string());
                args.push(part_num.to_string());
                args.push(flag);
                args.push(state);
            }
        }

        let mut cmd = Command::new("parted");
        cmd.args(&args);
        let output = output_with_timeout("parted", &mut cmd, PARTED_TIMEOUT)?;
        if !output.status.success() {
            return Err(output_failed("parted", &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn reread_partition_table(&self, disk: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: partprobe {}", disk.display());
            return Ok(());
        }
        let mut cmd = Command::new("partprobe");
        cmd.arg(disk);
        status_with_timeout("partprobe", &mut cmd, SETTLE_TIMEOUT)
    }
}

impl FormatOps for LinuxHal {
    fn format_vfat(&self, device: &Path, label: &str, opts: &FormatOptions) -> HalResult<()> {
        if opts.dry_run {
            log::info!("DRY RUN: mkfs.vfat {} ({})", device.display(), label);
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        let mut args: Vec<String> = vec!["-F".to_string(), "32".to_string()];
        args.push("-n".to_string());
        args.push(label.to_string());
        args.extend(opts.extra_args.iter().cloned());
        args.push(device.display().to_string());

        let mut cmd = Command::new("mkfs.vfat");
        cmd.args(&args);
        status_unbounded("mkfs.vfat", &mut cmd)
    }

    fn format_ext4(&self, device: &Path, opts: &FormatOptions) -> HalResult<()> {
        if opts.dry_run {
            log::info!("DRY RUN: mkfs.ext4 {}", device.display());
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        let mut args = opts.extra_args.clone();
        args.push(device.display().to_string());

        let mut cmd = Command::new("mkfs.ext4");
        cmd.args(&args);
        status_unbounded("mkfs.ext4", &mut cmd)
    }

    fn make_swap(&self, device: &Path, opts: &FormatOptions) -> HalResult<()> {
        if opts.dry_run {
            log::info!("DRY RUN: mkswap {}", device.display());
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::SafetyLock);
        }

        let mut args = opts.extra_args.clone();
        args.push(device.display().to_string());

        let mut cmd = Command::new("mkswap");
        cmd.args(&args);
        status_unbounded("mkswap", &mut cmd)
    }
}

impl MountOps for LinuxHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: MountOptions,
        dry_run: bool,
    ) -> HalResult<()> {
        if dry_run {
            log::info!(
                "DRY RUN: mount {} -> {}",
                device.display(),
                target.display()
            );
            return Ok(());
        }

        let flags = nix::mount::MsFlags::empty();
        let data = options.options.as_deref();
        nix::mount::mount(Some(device), target, fstype, flags, data).map_err(map_nix_err)?;
        Ok(())
    }

    fn unmount_recursive(&self, target: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: unmount -R {}", target.display());
            return Ok(());
        }

        let content = fs::read_to_string("/proc/self/mountinfo")?;
        let entries = crate::procfs::mountinfo::parse_mountinfo(&content);

        for mp in crate::procfs::mountinfo::mounts_under(target, &entries) {
            // Already-unmounted paths are fine; anything else (EBUSY and
            // friends) is logged here, since teardown never escalates.
            if let Err(err) = nix::mount::umount2(&mp, nix::mount::MntFlags::empty()) {
                use nix::errno::Errno;
                if err != Errno::EINVAL && err != Errno::ENOENT {
                    log::warn!("teardown: umount of {} failed: {}", mp.display(), err);
                }
            }
        }

        Ok(())
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        let content = fs::read_to_string("/proc/self/mountinfo")?;
        let entries = crate::procfs::mountinfo::parse_mountinfo(&content);
        Ok(crate::procfs::mountinfo::is_mounted_from_info(
            path, &entries,
        ))
    }
}

impl SwapOps for LinuxHal {
    fn swapon(&self, device: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: swapon {}", device.display());
            return Ok(());
        }
        let mut cmd = Command::new("swapon");
        cmd.arg(device);
        status_unbounded("swapon", &mut cmd)
    }

    fn swapoff_all(&self, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: swapoff -a");
            return Ok(());
        }
        let mut cmd = Command::new("swapoff");
        cmd.arg("-a");
        status_unbounded("swapoff", &mut cmd)
    }
}

impl ChrootOps for LinuxHal {
    fn chroot_status(
        &self,
        root: &Path,
        program: &str,
        args: &[&str],
        dry_run: bool,
    ) -> HalResult<()> {
        if dry_run {
            log::info!(
                "DRY RUN: arch-chroot {} {} {}",
                root.display(),
                program,
                args.join(" ")
            );
            return Ok(());
        }
        let mut cmd = Command::new("arch-chroot");
        cmd.arg(root).arg(program).args(args);
        status_unbounded("arch-chroot", &mut cmd)
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
            log::info!(
                "DRY RUN: arch-chroot {} {} {} (stdin elided)",
                root.display(),
                program,
                args.join(" ")
            );
            return Ok(());
        }
        let mut child = Command::new("arch-chroot")
            .arg(root)
            .arg(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| map_command_err("arch-chroot", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(output_failed("arch-chroot", &output));
        }
        Ok(())
    }
}

impl ProbeOps for LinuxHal {
    fn lsblk_table(&self, disk: Option<&Path>) -> HalResult<String> {
        let mut cmd = Command::new("lsblk");
        cmd.args(["-o", "NAME,SIZE,TYPE,FSTYPE,MOUNTPOINTS,MODEL"]);
        // lsblk rejects non-device paths; no argument means the full
        // device table.
        if let Some(disk) = disk {
            cmd.arg(disk);
        }
        let output = output_with_timeout("lsblk", &mut cmd, PROBE_TIMEOUT)?;

        if !output.status.success() {
            return Err(output_failed("lsblk", &output));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn efi_firmware_present(&self) -> HalResult<bool> {
        Ok(self.efi_firmware_dir.is_dir())
    }

    fn device_node_present(&self, device: &Path) -> HalResult<bool> {
        Ok(device.exists())
    }
}

impl ProcessOps for LinuxHal {
    fn command_status(&self, program: &str, args: &[&str], dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: {} {}", program, args.join(" "));
            return Ok(());
        }
        let mut cmd = Command::new(program);
        cmd.args(args);
        status_unbounded(program, &mut cmd)
    }

    fn command_output(&self, program: &str, args: &[&str]) -> HalResult<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = output_unbounded(program, &mut cmd)?;
        if !output.status.success() {
            return Err(output_failed(program, &output));
        }
        Ok(output)
    }
}

impl SystemOps for LinuxHal {
    fn udev_settle(&self) -> HalResult<()> {
        let mut cmd = Command::new("udevadm");
        cmd.arg("settle");
        status_with_timeout("udevadm", &mut cmd, SETTLE_TIMEOUT)
    }

    fn sync_clock(&self) -> HalResult<()> {
        let mut cmd = Command::new("timedatectl");
        cmd.args(["set-ntp", "true"]);
        status_with_timeout("timedatectl", &mut cmd, CLOCK_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parted_requires_confirmation() {
        let hal = LinuxHal::new();
        let opts = PartedOptions::new(false, false);
        let err = hal
            .parted(
                Path::new("/dev/null"),
                PartedOp::MkLabel {
                    label: "gpt".to_string(),
                },
                &opts,
            )
            .unwrap_err();
        assert!(matches!(err, HalError::SafetyLock));
    }

    #[test]
    fn format_ext4_requires_confirmation() {
        let hal = LinuxHal::new();
        let opts = FormatOptions::new(false, false);
        let err = hal.format_ext4(Path::new("/dev/null"), &opts).unwrap_err();
        assert!(matches!(err, HalError::SafetyLock));
    }

    #[test]
    fn make_swap_requires_confirmation() {
        let hal = LinuxHal::new();
        let opts = FormatOptions::new(false, false);
        let err = hal.make_swap(Path::new("/dev/null"), &opts).unwrap_err();
        assert!(matches!(err, HalError::SafetyLock));
    }

    #[test]
    fn dry_run_skips_destructive_calls() {
        let hal = LinuxHal::new();
        let opts = FormatOptions::new(true, false);
        hal.format_ext4(Path::new("/dev/null"), &opts).unwrap();
        hal.make_swap(Path::new("/dev/null"), &opts).unwrap();
        hal.swapon(Path::new("/dev/null"), true).unwrap();
    }

    #[test]
    fn efi_probe_follows_firmware_dir() {
        let dir = tempdir().unwrap();
        let hal = LinuxHal::with_efi_firmware_dir(dir.path());
        assert!(hal.efi_firmware_present().unwrap());

        let hal = LinuxHal::with_efi_firmware_dir(dir.path().join("missing"));
        assert!(!hal.efi_firmware_present().unwrap());
    }

    #[test]
    fn unmount_recursive_of_an_unmounted_tree_succeeds() {
        let dir = tempdir().unwrap();
        let hal = LinuxHal::new();
        hal.unmount_recursive(dir.path(), false).unwrap();
    }

    #[test]
    fn lsblk_rejects_a_directory_argument() {
        let dir = tempdir().unwrap();
        let hal = LinuxHal::new();
        // lsblk only accepts block devices as arguments; a directory
        // path can never yield a listing.
        assert!(hal.lsblk_table(Some(dir.path())).is_err());
    }

    #[test]
    fn device_node_probe_checks_existence() {
        let dir = tempdir().unwrap();
        let node = dir.path().join("sda1");
        let hal = LinuxHal::new();
        assert!(!hal.device_node_present(&node).unwrap());
        std::fs::write(&node, b"").unwrap();
        assert!(hal.device_node_present(&node).unwrap());
    }
}
