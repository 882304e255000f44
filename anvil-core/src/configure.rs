//! Target configuration: an ordered sequence of structured actions
//! applied to the new root.
//!
//! Two kinds of action exist: commands executed inside the target root's
//! execution context, and files written directly into the target tree.
//! Credentials travel on stdin, never in command lines. Bootloader
//! installation is modeled as an explicit two-step plan because the
//! legacy (BIOS) path targets the whole-disk device from *outside* the
//! target root.

use crate::context::{BootMode, InstallationContext, SystemSettings};
use crate::errors::ProvisionError;
use anvil_hal::SystemHal;
use anyhow::{anyhow, Context, Result};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Command run inside the target root.
    InRoot { program: &'static str, args: Vec<String> },
    /// Command run inside the target root with data on stdin.
    InRootStdin {
        program: &'static str,
        args: Vec<String>,
        input: String,
    },
    /// File written into the target tree, relative to the mount root.
    WriteFile {
        rel_path: &'static str,
        contents: String,
        append: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStep {
    pub name: &'static str,
    pub kind: StepKind,
}

/// Bootloader installation split by execution context. `in_root` runs as
/// part of the in-root sequence; `post_step` (BIOS only) runs against
/// the raw device after that sequence completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootloaderPlan {
    pub in_root: Vec<ConfigStep>,
    pub post_step: Option<PostStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostStep {
    pub program: &'static str,
    pub args: Vec<String>,
}

/// The ordered in-root configuration sequence, bootloader excluded.
pub fn config_steps(settings: &SystemSettings) -> Vec<ConfigStep> {
    vec![
        ConfigStep {
            name: "timezone",
            kind: StepKind::InRoot {
                program: "ln",
                args: vec![
                    "-sf".to_string(),
                    format!("/usr/share/zoneinfo/{}", settings.timezone),
                    "/etc/localtime".to_string(),
                ],
            },
        },
        ConfigStep {
            name: "hardware-clock",
            kind: StepKind::InRoot {
                program: "hwclock",
                args: vec!["--systohc".to_string()],
            },
        },
        ConfigStep {
            name: "locale-gen-entry",
            kind: StepKind::WriteFile {
                rel_path: "etc/locale.gen",
                contents: format!("{}\n", settings.locale_gen),
                append: true,
            },
        },
        ConfigStep {
            name: "locale-gen",
            kind: StepKind::InRoot {
                program: "locale-gen",
                args: Vec::new(),
            },
        },
        ConfigStep {
            name: "locale-conf",
            kind: StepKind::WriteFile {
                rel_path: "etc/locale.conf",
                contents: format!("LANG={}\n", settings.locale),
                append: false,
            },
        },
        ConfigStep {
            name: "console-keymap",
            kind: StepKind::WriteFile {
                rel_path: "etc/vconsole.conf",
                contents: format!("KEYMAP={}\n", settings.keymap),
                append: false,
            },
        },
        ConfigStep {
            name: "hostname",
            kind: StepKind::WriteFile {
                rel_path: "etc/hostname",
                contents: format!("{}\n", settings.hostname),
                append: false,
            },
        },
        ConfigStep {
            name: "hosts-table",
            kind: StepKind::WriteFile {
                rel_path: "etc/hosts",
                contents: format!(
                    "127.0.0.1\tlocalhost\n::1\t\tlocalhost\n127.0.1.1\t{}\n",
                    settings.hostname
                ),
                append: true,
            },
        },
        ConfigStep {
            name: "root-password",
            kind: StepKind::InRootStdin {
                program: "chpasswd",
                args: Vec::new(),
                input: format!("root:{}\n", settings.root_password),
            },
        },
        ConfigStep {
            name: "create-user",
            kind: StepKind::InRoot {
                program: "useradd",
                args: vec![
                    "-m".to_string(),
                    "-G".to_string(),
                    "wheel".to_string(),
                    "-s".to_string(),
                    "/bin/bash".to_string(),
                    settings.username.clone(),
                ],
            },
        },
        ConfigStep {
            name: "user-password",
            kind: StepKind::InRootStdin {
                program: "chpasswd",
                args: Vec::new(),
                input: format!("{}:{}\n", settings.username, settings.user_password),
            },
        },
        ConfigStep {
            name: "sudoers-wheel",
            kind: StepKind::WriteFile {
                rel_path: "etc/sudoers.d/10-wheel",
                contents: "%wheel ALL=(ALL:ALL) ALL\n".to_string(),
                append: false,
            },
        },
        ConfigStep {
            name: "enable-network",
            kind: StepKind::InRoot {
                program: "systemctl",
                args: vec!["enable".to_string(), "NetworkManager".to_string()],
            },
        },
    ]
}

/// Compute the bootloader plan from the cached boot mode.
///
/// UEFI installs entirely in-root. BIOS skips the in-root install (it
/// would target nothing useful there) and instead writes the boot
/// sector on the whole-disk device as a post-step. `grub-mkconfig`
/// runs in-root either way.
pub fn bootloader_plan(mode: BootMode, device: &Path) -> BootloaderPlan {
    let mkconfig = ConfigStep {
        name: "bootloader-config",
        kind: StepKind::InRoot {
            program: "grub-mkconfig",
            args: vec!["-o".to_string(), "/boot/grub/grub.cfg".to_string()],
        },
    };

    match mode {
        BootMode::Uefi => BootloaderPlan {
            in_root: vec![
                ConfigStep {
                    name: "bootloader-install",
                    kind: StepKind::InRoot {
                        program: "grub-install",
                        args: vec![
                            "--target=x86_64-efi".to_string(),
                            "--efi-directory=/boot".to_string(),
                            "--bootloader-id=GRUB".to_string(),
                        ],
                    },
                },
                mkconfig,
            ],
            post_step: None,
        },
        BootMode::Bios => BootloaderPlan {
            in_root: vec![mkconfig],
            post_step: Some(PostStep {
                program: "grub-install",
                args: vec![
                    "--target=i386-pc".to_string(),
                    device.display().to_string(),
                ],
            }),
        },
    }
}

pub fn apply<H: SystemHal + ?Sized>(
    hal: &H,
    ctx: &InstallationContext,
) -> Result<(), ProvisionError> {
    let boot_mode = ctx
        .boot_mode
        .ok_or_else(|| ProvisionError::Config(anyhow!("boot mode was never detected")))?;

    let mut steps = config_steps(&ctx.settings);
    let bootloader = bootloader_plan(boot_mode, &ctx.device);
    steps.extend(bootloader.in_root);

    for step in &steps {
        log::info!("Configure: {}", step.name);
        run_step(hal, ctx, step)
            .with_context(|| format!("configuration step '{}'", step.name))
            .map_err(ProvisionError::Config)?;
    }

    if let Some(post) = bootloader.post_step {
        log::info!("Configure: boot-sector install on {}", ctx.device.display());
        let args: Vec<&str> = post.args.iter().map(String::as_str).collect();
        hal.command_status(post.program, &args, ctx.dry_run)
            .map_err(|e| ProvisionError::Config(e.into()))?;
    }

    Ok(())
}

fn run_step<H: SystemHal + ?Sized>(
    hal: &H,
    ctx: &InstallationContext,
    step: &ConfigStep,
) -> Result<()> {
    match &step.kind {
        StepKind::InRoot { program, args } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            hal.chroot_status(&ctx.mount_root, program, &args, ctx.dry_run)?;
        }
        StepKind::InRootStdin {
            program,
            args,
            input,
        } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            hal.chroot_status_with_stdin(&ctx.mount_root, program, &args, input, ctx.dry_run)?;
        }
        StepKind::WriteFile {
            rel_path,
            contents,
            append,
        } => {
            if ctx.dry_run {
                log::info!("DRY RUN: write {}", rel_path);
                return Ok(());
            }
            let path = ctx.mount_root.join(rel_path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Unable to create {}", parent.display()))?;
            }
            if *append {
                use std::io::Write;
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("Unable to open {}", path.display()))?;
                file.write_all(contents.as_bytes())?;
            } else {
                std::fs::write(&path, contents)
                    .with_context(|| format!("Unable to write {}", path.display()))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_hal::{FakeHal, Operation};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn test_ctx(mount_root: PathBuf, mode: BootMode) -> InstallationContext {
        let mut ctx = InstallationContext::from_defaults(false, true);
        ctx.mount_root = mount_root;
        ctx.device = PathBuf::from("/dev/sda");
        ctx.boot_mode = Some(mode);
        ctx
    }

    #[test]
    fn writes_identity_files_into_the_target_tree() {
        let tmp = tempdir().unwrap();
        let mount_root = tmp.path().join("mnt");
        let ctx = test_ctx(mount_root.clone(), BootMode::Uefi);
        let hal = FakeHal::new();

        apply(&hal, &ctx).unwrap();

        let hostname = std::fs::read_to_string(mount_root.join("etc/hostname")).unwrap();
        assert_eq!(hostname, format!("{}\n", ctx.settings.hostname));

        let hosts = std::fs::read_to_string(mount_root.join("etc/hosts")).unwrap();
        assert!(hosts.contains(&format!("127.0.1.1\t{}", ctx.settings.hostname)));

        let sudoers = std::fs::read_to_string(mount_root.join("etc/sudoers.d/10-wheel")).unwrap();
        assert!(sudoers.contains("%wheel"));
    }

    #[test]
    fn credentials_travel_on_stdin() {
        let tmp = tempdir().unwrap();
        let ctx = test_ctx(tmp.path().join("mnt"), BootMode::Uefi);
        let hal = FakeHal::new();

        apply(&hal, &ctx).unwrap();

        assert!(hal.has_operation(|op| matches!(
            op,
            Operation::ChrootStdin { program, input, .. }
                if program == "chpasswd" && input.starts_with("root:")
        )));
        let user_line = format!("{}:", ctx.settings.username);
        assert!(hal.has_operation(|op| matches!(
            op,
            Operation::ChrootStdin { program, input, .. }
                if program == "chpasswd" && input.starts_with(&user_line)
        )));
    }

    #[test]
    fn uefi_installs_bootloader_in_root_only() {
        let tmp = tempdir().unwrap();
        let ctx = test_ctx(tmp.path().join("mnt"), BootMode::Uefi);
        let hal = FakeHal::new();

        apply(&hal, &ctx).unwrap();

        assert!(hal.has_operation(|op| matches!(
            op,
            Operation::Chroot { program, .. } if program == "grub-install"
        )));
        assert!(!hal.has_operation(|op| matches!(
            op,
            Operation::Command { program, .. } if program == "grub-install"
        )));
    }

    #[test]
    fn bios_runs_the_raw_device_post_step_exactly_once() {
        let tmp = tempdir().unwrap();
        let ctx = test_ctx(tmp.path().join("mnt"), BootMode::Bios);
        let hal = FakeHal::new();

        apply(&hal, &ctx).unwrap();

        // No in-root install for BIOS, one whole-disk install after.
        assert!(!hal.has_operation(|op| matches!(
            op,
            Operation::Chroot { program, .. } if program == "grub-install"
        )));
        assert_eq!(
            hal.count_operations(|op| matches!(
                op,
                Operation::Command { program, args }
                    if program == "grub-install" && args.contains(&"/dev/sda".to_string())
            )),
            1
        );
        // grub-mkconfig still runs in-root.
        assert!(hal.has_operation(|op| matches!(
            op,
            Operation::Chroot { program, .. } if program == "grub-mkconfig"
        )));
    }

    #[test]
    fn step_failure_is_a_config_error() {
        let tmp = tempdir().unwrap();
        let ctx = test_ctx(tmp.path().join("mnt"), BootMode::Uefi);
        let hal = FakeHal::new();
        hal.fail_on("useradd");

        let err = apply(&hal, &ctx).unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
        assert!(err.to_string().contains("target configuration failed"));
    }

    #[test]
    fn dry_run_touches_no_files() {
        let tmp = tempdir().unwrap();
        let mount_root = tmp.path().join("mnt");
        let mut ctx = test_ctx(mount_root.clone(), BootMode::Uefi);
        ctx.dry_run = true;
        let hal = FakeHal::new();

        apply(&hal, &ctx).unwrap();
        assert!(!mount_root.join("etc/hostname").exists());
        assert!(hal.operations().is_empty());
    }
}
