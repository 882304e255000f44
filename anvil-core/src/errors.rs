use anvil_hal::HalError;
use thiserror::Error;

/// Fatal provisioning failures, one kind per phase.
///
/// Every kind is fail-fast: no phase retries or partially recovers. The
/// single recovery guarantee lives in the teardown guard, which releases
/// mounts and swap before the process exits.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("preflight failed: {0}")]
    Preflight(anyhow::Error),

    #[error("insufficient space: device is {device_mib} MiB but {required_mib} MiB are reserved before the root partition")]
    InsufficientSpace { device_mib: u64, required_mib: u64 },

    #[error("partitioning failed: {0}")]
    Partition(#[source] HalError),

    #[error("formatting failed: {0}")]
    Format(#[source] HalError),

    #[error("mounting failed: {0}")]
    Mount(#[source] HalError),

    #[error("base system install failed: {0}")]
    Install(anyhow::Error),

    #[error("target configuration failed: {0}")]
    Config(anyhow::Error),
}
