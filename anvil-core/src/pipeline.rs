//! The provisioning state machine.
//!
//! `Start → Validated → Planned → Mounted → BaseInstalled → Configured
//! → Success`, with any phase able to fail directly to `Failed`. The
//! teardown guard is armed before the first destructive operation and
//! fires on every exit path.

use crate::context::InstallationContext;
use crate::errors::ProvisionError;
use crate::layout::{self, PartitionPlan};
use crate::preflight::{self, PreflightChecks, PreflightConfig};
use crate::{configure, executor, installer};
use anvil_hal::{SystemHal, TeardownGuard};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Validated,
    Planned,
    Mounted,
    BaseInstalled,
    Configured,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Validated => "validated",
            Phase::Planned => "planned",
            Phase::Mounted => "mounted",
            Phase::BaseInstalled => "base-installed",
            Phase::Configured => "configured",
        }
    }
}

/// What a successful run produced; feeds the install report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub boot_mode: crate::context::BootMode,
    pub device_size_mib: u64,
    pub phases: Vec<String>,
    pub plan: PartitionPlan,
}

pub fn run<H: SystemHal + ?Sized>(
    hal: &H,
    preflight_cfg: &PreflightConfig,
    checks: &PreflightChecks,
    ctx: &mut InstallationContext,
) -> Result<RunSummary, ProvisionError> {
    let mut phases: Vec<Phase> = Vec::new();
    let enter = |phase: Phase, phases: &mut Vec<Phase>| {
        log::info!("Phase complete: {}", phase.name());
        phases.push(phase);
    };

    let report =
        preflight::run(preflight_cfg, checks, hal).map_err(ProvisionError::Preflight)?;
    ctx.boot_mode = Some(report.boot_mode);
    ctx.device_size_mib = Some(report.device_size_mib);
    enter(Phase::Validated, &mut phases);

    let plan = layout::plan(
        report.device_size_mib,
        ctx.budget.efi_mib,
        ctx.budget.swap_mib,
    )?;
    enter(Phase::Planned, &mut phases);

    // Destructive work begins past this point. The guard outlives every
    // remaining phase and releases mounts and swap on success, failure,
    // and unwind alike.
    let _guard = TeardownGuard::new(hal, ctx.mount_root.clone(), ctx.dry_run);

    let devices = executor::provision(hal, ctx, &plan)?;
    ctx.partitions = Some(devices);
    enter(Phase::Mounted, &mut phases);

    installer::install_base(hal, ctx)?;
    enter(Phase::BaseInstalled, &mut phases);

    configure::apply(hal, ctx)?;
    enter(Phase::Configured, &mut phases);

    Ok(RunSummary {
        boot_mode: report.boot_mode,
        device_size_mib: report.device_size_mib,
        phases: phases.iter().map(|p| p.name().to_string()).collect(),
        plan,
    })
}
