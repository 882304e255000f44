//! System-level operations (udev settle, clock sync).

use crate::HalResult;

pub trait SystemOps {
    /// Best-effort udev settle (wait for block device events to quiesce).
    fn udev_settle(&self) -> HalResult<()>;

    /// Best-effort NTP clock sync enablement.
    fn sync_clock(&self) -> HalResult<()>;
}
