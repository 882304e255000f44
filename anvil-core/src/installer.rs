//! Base system installation into the mounted target root.

use crate::context::InstallationContext;
use crate::errors::ProvisionError;
use anvil_hal::SystemHal;
use anyhow::Context;
use std::fs::OpenOptions;
use std::io::Write;

/// Materialize the base package set into the target root, then append
/// the generated filesystem table so the installed system can mount
/// itself on first boot.
///
/// Network and mounts were validated by earlier phases; nothing is
/// re-checked here.
pub fn install_base<H: SystemHal + ?Sized>(
    hal: &H,
    ctx: &InstallationContext,
) -> Result<(), ProvisionError> {
    let root = ctx.mount_root.to_string_lossy().to_string();

    let mut args: Vec<&str> = vec!["-K", &root];
    args.extend(ctx.packages.iter().map(String::as_str));

    log::info!("Installing base system ({} packages)", ctx.packages.len());
    hal.command_status("pacstrap", &args, ctx.dry_run)
        .map_err(|e| ProvisionError::Install(e.into()))?;

    if ctx.dry_run {
        log::info!("DRY RUN: skipping fstab generation");
        return Ok(());
    }

    let output = hal
        .command_output("genfstab", &["-U", &root])
        .map_err(|e| ProvisionError::Install(e.into()))?;

    append_fstab(ctx, &output.stdout).map_err(ProvisionError::Install)?;
    Ok(())
}

fn append_fstab(ctx: &InstallationContext, table: &[u8]) -> anyhow::Result<()> {
    let fstab = ctx.mount_root.join("etc/fstab");
    if let Some(parent) = fstab.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Unable to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&fstab)
        .with_context(|| format!("Unable to open {}", fstab.display()))?;
    file.write_all(table)
        .with_context(|| format!("Unable to append to {}", fstab.display()))?;
    Ok(())
}
