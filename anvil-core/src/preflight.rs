//! Environment validation: tool probing, privilege, target device,
//! network reachability, boot mode, clock sync.
//!
//! All fatal checks complete before any destructive operation; a failing
//! check aborts the run with the device untouched.

use crate::context::BootMode;
use crate::defaults;
use anvil_hal::{ProbeOps, SystemOps};
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PreflightConfig {
    pub required_binaries: Vec<String>,
    pub path_env: String,
    pub disk: PathBuf,
    pub sys_block_dir: PathBuf,
    pub effective_uid: u32,
    pub require_dev_prefix: bool,
}

impl PreflightConfig {
    pub fn for_device(disk: PathBuf) -> Self {
        let path_env = std::env::var("PATH").unwrap_or_default();
        Self {
            required_binaries: defaults::REQUIRED_TOOLS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            path_env,
            disk,
            sys_block_dir: PathBuf::from("/sys/class/block"),
            effective_uid: nix::unistd::geteuid().as_raw(),
            require_dev_prefix: true,
        }
    }
}

pub struct PreflightChecks {
    pub network_check: Box<dyn Fn() -> Result<()> + Send + Sync>,
}

impl PreflightChecks {
    pub fn with_network_check(check: Box<dyn Fn() -> Result<()> + Send + Sync>) -> Self {
        Self {
            network_check: check,
        }
    }
}

impl Default for PreflightChecks {
    fn default() -> Self {
        Self {
            network_check: Box::new(check_network),
        }
    }
}

/// Facts the validator hands to the rest of the workflow.
#[derive(Debug, Clone, Copy)]
pub struct PreflightReport {
    pub boot_mode: BootMode,
    pub device_size_mib: u64,
}

pub fn run<H: ProbeOps + SystemOps + ?Sized>(
    cfg: &PreflightConfig,
    checks: &PreflightChecks,
    hal: &H,
) -> Result<PreflightReport> {
    log::info!("Preflight checks");

    check_binaries(cfg)?;
    check_privilege(cfg)?;
    let device_size_mib = check_device(cfg, hal)?;

    (checks.network_check)().map_err(|err| anyhow!("Network connectivity required: {}", err))?;

    // Detected once and cached by the caller; later phases must never
    // re-derive this.
    let boot_mode = if hal.efi_firmware_present()? {
        BootMode::Uefi
    } else {
        BootMode::Bios
    };
    log::info!("Boot mode: {:?}", boot_mode);

    if let Err(err) = hal.sync_clock() {
        log::warn!("Clock sync unavailable (continuing): {}", err);
    }

    log::info!("Preflight complete");
    Ok(PreflightReport {
        boot_mode,
        device_size_mib,
    })
}

fn check_binaries(cfg: &PreflightConfig) -> Result<()> {
    let mut missing = Vec::new();
    for bin in &cfg.required_binaries {
        if find_executable_in_path(bin, &cfg.path_env).is_none() {
            missing.push(bin.clone());
        }
    }
    if !missing.is_empty() {
        bail!("Missing required tools on PATH: {}", missing.join(", "));
    }
    Ok(())
}

fn check_privilege(cfg: &PreflightConfig) -> Result<()> {
    if cfg.effective_uid != 0 {
        bail!(
            "Administrative privilege required (effective uid {})",
            cfg.effective_uid
        );
    }
    Ok(())
}

fn check_device<H: ProbeOps + ?Sized>(cfg: &PreflightConfig, hal: &H) -> Result<u64> {
    let disk = &cfg.disk;
    if cfg.require_dev_prefix && !disk.starts_with("/dev/") {
        bail!("Target device must be under /dev: {}", disk.display());
    }

    let present = disk.exists() && is_block_device_path(disk, &cfg.sys_block_dir);
    if !present {
        // Surface the block device listing so the diagnostic names what
        // actually exists on this machine.
        match hal.lsblk_table(None) {
            Ok(table) => log::error!("Available block devices:\n{}", table),
            Err(err) => log::warn!("Could not list block devices: {}", err),
        }
        bail!("Target is not a block device: {}", disk.display());
    }

    let size_bytes = device_size_bytes(disk, &cfg.sys_block_dir)?;
    Ok(size_bytes / (1024 * 1024))
}

fn check_network() -> Result<()> {
    let (a, b, c, d) = defaults::NETWORK_PROBE_ADDR;
    let addr = SocketAddr::from((Ipv4Addr::new(a, b, c, d), defaults::NETWORK_PROBE_PORT));
    TcpStream::connect_timeout(
        &addr,
        Duration::from_secs(defaults::NETWORK_PROBE_TIMEOUT_SECS),
    )
    .map(|_| ())
    .context("Unable to reach network")
}

fn find_executable_in_path(binary: &str, path_env: &str) -> Option<PathBuf> {
    for dir in path_env.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(binary);
        if let Ok(metadata) = fs::metadata(&candidate) {
            if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
                return Some(candidate);
            }
        }
    }
    None
}

fn is_block_device_path(path: &Path, sys_block_dir: &Path) -> bool {
    match resolve_device_name(path) {
        Some(name) => sys_block_dir.join(name).join("size").exists(),
        None => false,
    }
}

fn device_size_bytes(path: &Path, sys_block_dir: &Path) -> Result<u64> {
    let name = resolve_device_name(path)
        .ok_or_else(|| anyhow!("Unable to resolve device name for {}", path.display()))?;
    let size_path = sys_block_dir.join(&name).join("size");
    let sectors_str = fs::read_to_string(&size_path)
        .with_context(|| format!("Unable to read {}", size_path.display()))?;
    let sectors = sectors_str
        .trim()
        .parse::<u64>()
        .context("Unable to parse device size sectors")?;
    Ok(sectors.saturating_mul(512))
}

fn resolve_device_name(path: &Path) -> Option<String> {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolved
        .file_name()
        .and_then(|value| value.to_str())
        .map(str::to_string)
}
