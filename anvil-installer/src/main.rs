use anvil_core::context::InstallationContext;
use anvil_core::preflight::{PreflightChecks, PreflightConfig};
use anvil_core::report::{self, InstallReport};
use anvil_core::{logging, pipeline};
use anvil_hal::LinuxHal;
use anyhow::bail;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

mod cancel;
mod cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::init_with(cli.log_file.clone());

    if !cli.wipe_acknowledged && !cli.dry_run {
        bail!(
            "Refusing to run: this program erases the target disk. \
             Pass --yes-i-know-this-wipes-the-disk to proceed, or --dry-run to rehearse."
        );
    }

    let mut ctx = InstallationContext::from_defaults(cli.dry_run, cli.wipe_acknowledged);
    log::info!(
        "Provisioning {} (dry_run={})",
        ctx.device.display(),
        ctx.dry_run
    );

    let hal = Arc::new(LinuxHal::new());

    // An interrupt mid-run must still leave the target released. The
    // pipeline's own guard cannot fire on SIGINT, so the handler does
    // the same release before exiting.
    {
        let hal = Arc::clone(&hal);
        let mount_root = ctx.mount_root.clone();
        let dry_run = ctx.dry_run;
        cancel::install_ctrlc_handler(move || {
            anvil_hal::release_target(hal.as_ref(), &mount_root, dry_run);
        })?;
    }

    let preflight_cfg = PreflightConfig::for_device(ctx.device.clone());
    let checks = PreflightChecks::default();

    let summary = pipeline::run(hal.as_ref(), &preflight_cfg, &checks, &mut ctx)?;

    if !ctx.dry_run {
        let report_file = InstallReport::new(&ctx.device, summary);
        if let Err(err) =
            report::save_report_atomic(Path::new(report::DEFAULT_REPORT_PATH), &report_file)
        {
            log::warn!("Could not write install report: {:#}", err);
        }
    }

    log::info!("Provisioning complete. Remove the media and reboot.");
    Ok(())
}
