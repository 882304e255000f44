//! RAII teardown of the provisioning staging area.

use super::mount_ops::MountOps;
use super::swap_ops::SwapOps;
use std::path::{Path, PathBuf};

/// Release everything the provisioning run may hold on the target:
/// unmount the staging tree recursively and deactivate swap.
///
/// Both steps tolerate "nothing to do" and neither escalates its own
/// failure; the device must come out re-attemptable no matter what.
pub fn release_target<H: MountOps + SwapOps + ?Sized>(hal: &H, target: &Path, dry_run: bool) {
    if let Err(err) = hal.unmount_recursive(target, dry_run) {
        log::warn!("teardown: unmount of {} failed: {}", target.display(), err);
    }
    if let Err(err) = hal.swapoff_all(dry_run) {
        log::warn!("teardown: swapoff failed: {}", err);
    }
}

/// RAII guard that releases the staging area when dropped.
///
/// Armed before the first destructive operation; fires exactly once on
/// every exit path (normal return, error return, panic unwind).
#[derive(Debug)]
pub struct TeardownGuard<'a, H: MountOps + SwapOps + ?Sized> {
    hal: &'a H,
    target: PathBuf,
    dry_run: bool,
    fired: bool,
}

impl<'a, H: MountOps + SwapOps + ?Sized> TeardownGuard<'a, H> {
    pub fn new(hal: &'a H, target: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            hal,
            target: target.into(),
            dry_run,
            fired: false,
        }
    }

    /// Run the teardown now instead of at drop.
    pub fn trigger(&mut self) {
        if self.fired {
            return;
        }
        self.fired = true;
        release_target(self.hal, &self.target, self.dry_run);
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl<'a, H: MountOps + SwapOps + ?Sized> Drop for TeardownGuard<'a, H> {
    fn drop(&mut self) {
        self.trigger();
    }
}
