//! HAL trait definitions and implementations.
//!
//! One trait per system concern, a real Linux backend, and a recording
//! fake for tests that must never touch a disk.

pub mod chroot_ops;
pub mod fake_hal;
pub mod format_ops;
pub mod guards;
pub mod linux_hal;
pub mod mount_ops;
pub mod partition_ops;
pub mod probe_ops;
pub mod process_ops;
pub mod swap_ops;
pub mod system_ops;

use chroot_ops::ChrootOps;
use format_ops::FormatOps;
use mount_ops::MountOps;
use partition_ops::PartitionOps;
use probe_ops::ProbeOps;
use process_ops::ProcessOps;
use swap_ops::SwapOps;
use system_ops::SystemOps;

/// Complete HAL combining every system operation trait the provisioning
/// workflow needs.
pub trait SystemHal:
    PartitionOps
    + FormatOps
    + MountOps
    + SwapOps
    + ChrootOps
    + ProbeOps
    + ProcessOps
    + SystemOps
    + Send
    + Sync
{
}

impl<T> SystemHal for T where
    T: PartitionOps
        + FormatOps
        + MountOps
        + SwapOps
        + ChrootOps
        + ProbeOps
        + ProcessOps
        + SystemOps
        + Send
        + Sync
{
}
