//! Read-only environment probes.

use crate::HalResult;
use std::path::Path;

pub trait ProbeOps {
    /// Return a human-readable lsblk table for diagnostics. `None`
    /// lists every block device on the machine.
    fn lsblk_table(&self, disk: Option<&Path>) -> HalResult<String>;

    /// Whether the firmware exposes an EFI interface (UEFI boot mode).
    fn efi_firmware_present(&self) -> HalResult<bool>;

    /// Whether a partition device node exists yet.
    fn device_node_present(&self, device: &Path) -> HalResult<bool>;
}
