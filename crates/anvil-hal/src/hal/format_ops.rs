//! Filesystem and swap formatting operations.

use crate::HalResult;
use std::path::Path;

/// Trait for writing filesystem signatures to block devices.
pub trait FormatOps {
    /// Format a device with VFAT (FAT32), used for the EFI system partition.
    fn format_vfat(&self, device: &Path, label: &str, opts: &FormatOptions) -> HalResult<()>;

    /// Format a device with ext4.
    fn format_ext4(&self, device: &Path, opts: &FormatOptions) -> HalResult<()>;

    /// Initialize a device as swap space.
    fn make_swap(&self, device: &Path, opts: &FormatOptions) -> HalResult<()>;
}

/// Options for formatting operations.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// If true, log the operation but don't execute it
    pub dry_run: bool,
    /// If true, the user has confirmed the destructive operation
    pub confirmed: bool,
    /// Additional arguments to pass to the format command
    pub extra_args: Vec<String>,
}

impl FormatOptions {
    pub fn new(dry_run: bool, confirmed: bool) -> Self {
        Self {
            dry_run,
            confirmed,
            extra_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}
