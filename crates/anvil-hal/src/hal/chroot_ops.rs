//! In-root command execution.
//!
//! Configuration of the freshly installed system runs inside the target
//! root's execution context. Parameters that carry secrets (credentials)
//! are passed on stdin, never interpolated into command lines.

use crate::HalResult;
use std::path::Path;

pub trait ChrootOps {
    /// Run a command inside the target root, expecting exit code zero.
    fn chroot_status(
        &self,
        root: &Path,
        program: &str,
        args: &[&str],
        dry_run: bool,
    ) -> HalResult<()>;

    /// Same as [`ChrootOps::chroot_status`], but with `input` fed to the
    /// command's stdin.
    fn chroot_status_with_stdin(
        &self,
        root: &Path,
        program: &str,
        args: &[&str],
        input: &str,
        dry_run: bool,
    ) -> HalResult<()>;
}
