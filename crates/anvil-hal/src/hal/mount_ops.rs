//! Mount operations trait.

use crate::HalResult;
use std::path::Path;

/// Trait for mounting and releasing filesystems.
pub trait MountOps {
    /// Mount a device to a target path.
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: MountOptions,
        dry_run: bool,
    ) -> HalResult<()>;

    /// Unmount everything mounted at or below `target`, deepest first.
    ///
    /// An empty mount table under `target` is success, not an error.
    fn unmount_recursive(&self, target: &Path, dry_run: bool) -> HalResult<()>;

    /// Check if a path is currently a mount point.
    fn is_mounted(&self, path: &Path) -> HalResult<bool>;
}

/// Mount options and flags.
#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    /// Additional mount options as a comma-separated string (e.g., "ro,noexec")
    pub options: Option<String>,
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: impl Into<String>) -> Self {
        Self {
            options: Some(options.into()),
        }
    }
}
