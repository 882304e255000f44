//! anvil hardware abstraction layer.
//!
//! Every world-touching operation of the provisioning workflow (partition
//! table edits, mkfs, swap, mount, in-root command execution) goes through
//! the traits in this crate, so the workflow can be exercised in CI against
//! a recording fake instead of a live disk.

pub mod error;
pub mod hal;
pub mod procfs;

pub use error::{HalError, HalResult};
pub use hal::chroot_ops::ChrootOps;
pub use hal::fake_hal::{FakeHal, Operation};
pub use hal::format_ops::{FormatOps, FormatOptions};
pub use hal::guards::{release_target, TeardownGuard};
pub use hal::linux_hal::LinuxHal;
pub use hal::mount_ops::{MountOps, MountOptions};
pub use hal::partition_ops::{PartedOp, PartedOptions, PartitionOps};
pub use hal::probe_ops::ProbeOps;
pub use hal::process_ops::ProcessOps;
pub use hal::swap_ops::SwapOps;
pub use hal::system_ops::SystemOps;
pub use hal::SystemHal;
