//! Partition, format and mount execution against the real device.
//!
//! Ordering is fixed: table write, partition creation, device-node
//! settle, formatting, mounting. Nothing here may be reordered;
//! formatting before partitions exist or mounting before formatting is
//! undefined.

use crate::context::{InstallationContext, PartitionDevices};
use crate::errors::ProvisionError;
use crate::layout::{self, PartitionPlan};
use anvil_hal::{
    release_target, FormatOptions, MountOptions, PartedOp, PartedOptions, SystemHal,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Bounded wait for partition device nodes after a table reread. The
/// reread races with udev node creation; a short wait absorbs it, and
/// anything longer is a real failure.
const NODE_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const NODE_SETTLE_POLL: Duration = Duration::from_millis(200);

const ESP_LABEL: &str = "EFI";

/// Partition device path for a 1-based partition index.
///
/// Drivers that end the disk name with a digit (nvme, mmcblk) insert a
/// `p` separator before the partition number.
pub fn partition_device(disk: &Path, index: u32) -> PathBuf {
    let name = disk.to_string_lossy();
    if name.ends_with(|c: char| c.is_ascii_digit()) {
        PathBuf::from(format!("{name}p{index}"))
    } else {
        PathBuf::from(format!("{name}{index}"))
    }
}

pub fn provision<H: SystemHal + ?Sized>(
    hal: &H,
    ctx: &InstallationContext,
    plan: &PartitionPlan,
) -> Result<PartitionDevices, ProvisionError> {
    let disk = ctx.device.as_path();
    let parted_opts = PartedOptions::new(ctx.dry_run, ctx.confirmed);
    let format_opts = FormatOptions::new(ctx.dry_run, ctx.confirmed);

    // Idempotent pre-clean: a previous aborted run may have left mounts
    // or swap active. "Nothing to do" is success.
    log::info!("Releasing any prior mounts under {}", ctx.mount_root.display());
    release_target(hal, &ctx.mount_root, ctx.dry_run);

    log::info!("Writing fresh GPT label to {}", disk.display());
    hal.parted(
        disk,
        PartedOp::MkLabel {
            label: "gpt".to_string(),
        },
        &parted_opts,
    )
    .map_err(ProvisionError::Partition)?;

    for (idx, entry) in plan.entries.iter().enumerate() {
        let part_num = (idx + 1) as u32;
        hal.parted(
            disk,
            PartedOp::MkPart {
                part_type: "primary".to_string(),
                fs_type: entry.fs.parted_name().to_string(),
                start: entry.start_arg(),
                end: entry.end_arg(),
            },
            &parted_opts,
        )
        .map_err(ProvisionError::Partition)?;

        if entry.boot_flag {
            hal.parted(
                disk,
                PartedOp::SetFlag {
                    part_num,
                    flag: "esp".to_string(),
                    state: "on".to_string(),
                },
                &parted_opts,
            )
            .map_err(ProvisionError::Partition)?;
        }
    }

    hal.reread_partition_table(disk, ctx.dry_run)
        .map_err(ProvisionError::Partition)?;
    if let Err(err) = hal.udev_settle() {
        log::warn!("udev settle failed (continuing): {}", err);
    }

    let devices = PartitionDevices {
        esp: partition_device(disk, 1),
        swap: partition_device(disk, 2),
        root: partition_device(disk, 3),
    };

    if !ctx.dry_run {
        wait_for_nodes(hal, &devices, NODE_SETTLE_TIMEOUT)?;
    }

    log::info!("Formatting partitions");
    hal.format_vfat(&devices.esp, ESP_LABEL, &format_opts)
        .map_err(ProvisionError::Format)?;
    hal.make_swap(&devices.swap, &format_opts)
        .map_err(ProvisionError::Format)?;
    hal.format_ext4(&devices.root, &format_opts)
        .map_err(ProvisionError::Format)?;

    log::info!("Activating swap and mounting target tree");
    hal.swapon(&devices.swap, ctx.dry_run)
        .map_err(ProvisionError::Mount)?;

    for step in layout::mount_plan(&devices, &ctx.mount_root) {
        if !ctx.dry_run {
            std::fs::create_dir_all(&step.mount_point)
                .map_err(|e| ProvisionError::Mount(e.into()))?;
        }
        hal.mount_device(
            &step.device,
            &step.mount_point,
            Some(step.fstype),
            MountOptions::new(),
            ctx.dry_run,
        )
        .map_err(ProvisionError::Mount)?;
    }

    Ok(devices)
}

fn wait_for_nodes<H: SystemHal + ?Sized>(
    hal: &H,
    devices: &PartitionDevices,
    timeout: Duration,
) -> Result<(), ProvisionError> {
    let deadline = Instant::now() + timeout;
    loop {
        let mut all_present = true;
        for node in [&devices.esp, &devices.swap, &devices.root] {
            if !hal
                .device_node_present(node)
                .map_err(ProvisionError::Partition)?
            {
                all_present = false;
                break;
            }
        }
        if all_present {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ProvisionError::Partition(anvil_hal::HalError::Other(
                format!("partition device nodes did not appear within {timeout:?}"),
            )));
        }
        std::thread::sleep(NODE_SETTLE_POLL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::plan;
    use anvil_hal::{FakeHal, Operation};
    use tempfile::tempdir;

    fn test_ctx(tmp: &Path) -> InstallationContext {
        let mut ctx = InstallationContext::from_defaults(false, true);
        ctx.device = PathBuf::from("/dev/sda");
        ctx.mount_root = tmp.join("mnt");
        ctx
    }

    #[test]
    fn partition_device_naming() {
        assert_eq!(
            partition_device(Path::new("/dev/sda"), 1),
            PathBuf::from("/dev/sda1")
        );
        assert_eq!(
            partition_device(Path::new("/dev/nvme0n1"), 2),
            PathBuf::from("/dev/nvme0n1p2")
        );
        assert_eq!(
            partition_device(Path::new("/dev/mmcblk0"), 3),
            PathBuf::from("/dev/mmcblk0p3")
        );
    }

    #[test]
    fn operations_run_in_the_required_order() {
        let tmp = tempdir().unwrap();
        let ctx = test_ctx(tmp.path());
        let hal = FakeHal::new();
        let plan = plan(100 * 1024, 512, 4096).unwrap();

        let devices = provision(&hal, &ctx, &plan).unwrap();
        assert_eq!(devices.root, PathBuf::from("/dev/sda3"));

        let ops = hal.operations();
        let pos = |check: &dyn Fn(&Operation) -> bool| {
            ops.iter().position(|op| check(op)).expect("operation missing")
        };

        let preclean_unmount = pos(&|op| matches!(op, Operation::UnmountRecursive { .. }));
        let label = pos(&|op| matches!(op, Operation::MkLabel { .. }));
        let first_part = pos(&|op| matches!(op, Operation::MkPart { .. }));
        let reread = pos(&|op| matches!(op, Operation::RereadTable { .. }));
        let first_format = pos(&|op| matches!(op, Operation::FormatVfat { .. }));
        let swap_on = pos(&|op| matches!(op, Operation::SwapOn { .. }));
        let first_mount = pos(&|op| matches!(op, Operation::Mount { .. }));

        assert!(preclean_unmount < label);
        assert!(label < first_part);
        assert!(first_part < reread);
        assert!(reread < first_format);
        assert!(first_format < swap_on);
        assert!(swap_on < first_mount);
    }

    #[test]
    fn esp_gets_the_boot_flag() {
        let tmp = tempdir().unwrap();
        let ctx = test_ctx(tmp.path());
        let hal = FakeHal::new();
        let plan = plan(100 * 1024, 512, 4096).unwrap();

        provision(&hal, &ctx, &plan).unwrap();

        assert!(hal.has_operation(|op| matches!(
            op,
            Operation::SetFlag { part_num: 1, flag, .. } if flag == "esp"
        )));
    }

    #[test]
    fn root_mounts_before_the_esp() {
        let tmp = tempdir().unwrap();
        let ctx = test_ctx(tmp.path());
        let hal = FakeHal::new();
        let plan = plan(100 * 1024, 512, 4096).unwrap();

        provision(&hal, &ctx, &plan).unwrap();

        let mounts: Vec<_> = hal
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                Operation::Mount { device, .. } => Some(device),
                _ => None,
            })
            .collect();
        assert_eq!(
            mounts,
            vec![PathBuf::from("/dev/sda3"), PathBuf::from("/dev/sda1")]
        );
    }

    #[test]
    fn absent_device_node_surfaces_as_a_partition_error() {
        let hal = FakeHal::new();
        hal.set_node_missing("/dev/sda2");
        let devices = PartitionDevices {
            esp: PathBuf::from("/dev/sda1"),
            swap: PathBuf::from("/dev/sda2"),
            root: PathBuf::from("/dev/sda3"),
        };

        let err = wait_for_nodes(&hal, &devices, Duration::from_millis(300)).unwrap_err();
        assert!(matches!(err, ProvisionError::Partition(_)));
        assert!(err.to_string().contains("did not appear"));
    }

    #[test]
    fn swap_format_failure_stops_before_mounting() {
        let tmp = tempdir().unwrap();
        let ctx = test_ctx(tmp.path());
        let hal = FakeHal::new();
        hal.fail_on("mkswap");
        let plan = plan(100 * 1024, 512, 4096).unwrap();

        let err = provision(&hal, &ctx, &plan).unwrap_err();
        assert!(matches!(err, ProvisionError::Format(_)));

        // Table was already written, but nothing was mounted.
        assert!(hal.has_operation(|op| matches!(op, Operation::MkLabel { .. })));
        assert!(!hal.has_operation(|op| matches!(op, Operation::Mount { .. })));
    }

    #[test]
    fn dry_run_performs_no_destructive_operations() {
        let tmp = tempdir().unwrap();
        let mut ctx = test_ctx(tmp.path());
        ctx.dry_run = true;
        let hal = FakeHal::new();
        let plan = plan(100 * 1024, 512, 4096).unwrap();

        provision(&hal, &ctx, &plan).unwrap();

        assert!(!hal.has_operation(|op| matches!(
            op,
            Operation::MkLabel { .. }
                | Operation::MkPart { .. }
                | Operation::FormatVfat { .. }
                | Operation::FormatExt4 { .. }
                | Operation::MakeSwap { .. }
                | Operation::Mount { .. }
        )));
    }
}
