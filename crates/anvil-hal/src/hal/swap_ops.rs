//! Swap activation and deactivation.

use crate::HalResult;
use std::path::Path;

pub trait SwapOps {
    /// Activate swap on the given device.
    fn swapon(&self, device: &Path, dry_run: bool) -> HalResult<()>;

    /// Deactivate all active swap. Nothing active is success, not an error.
    fn swapoff_all(&self, dry_run: bool) -> HalResult<()>;
}
