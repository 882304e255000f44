//! Generic external command execution.
//!
//! Long-running destructive collaborators (package materialization,
//! bootloader install) run without a deadline; there is no safe
//! cancellation point mid-operation.

use crate::HalResult;
use std::process::Output;

pub trait ProcessOps {
    /// Run a command to completion, expecting exit code zero.
    fn command_status(&self, program: &str, args: &[&str], dry_run: bool) -> HalResult<()>;

    /// Run a command to completion and capture its output.
    fn command_output(&self, program: &str, args: &[&str]) -> HalResult<Output>;
}
