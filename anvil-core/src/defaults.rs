//! Compiled-in installation parameters.
//!
//! The binary parses no configuration flags; everything below is fixed at
//! build time. Sizes are whole MiB.

pub const TARGET_DEVICE: &str = "/dev/sda";
pub const MOUNT_ROOT: &str = "/mnt";

pub const EFI_MIB: u64 = 512;
pub const SWAP_MIB: u64 = 4096;

pub const HOSTNAME: &str = "anvil";
pub const USERNAME: &str = "smith";
pub const USER_PASSWORD: &str = "changeme";
pub const ROOT_PASSWORD: &str = "changeme";

pub const TIMEZONE: &str = "UTC";
pub const LOCALE: &str = "en_US.UTF-8";
pub const LOCALE_GEN: &str = "en_US.UTF-8 UTF-8";
pub const KEYMAP: &str = "us";

pub const BASE_PACKAGES: &[&str] = &[
    "base",
    "linux",
    "linux-firmware",
    "grub",
    "efibootmgr",
    "networkmanager",
    "sudo",
    "vim",
];

/// Tools the workflow shells out to. Probed before anything else runs.
pub const REQUIRED_TOOLS: &[&str] = &[
    "parted",
    "partprobe",
    "mkfs.vfat",
    "mkfs.ext4",
    "mkswap",
    "swapon",
    "swapoff",
    "pacstrap",
    "genfstab",
    "arch-chroot",
    "grub-install",
    "lsblk",
    "udevadm",
];

/// Reachability probe target: a well-known public resolver.
pub const NETWORK_PROBE_ADDR: (u8, u8, u8, u8) = (1, 1, 1, 1);
pub const NETWORK_PROBE_PORT: u16 = 53;
pub const NETWORK_PROBE_TIMEOUT_SECS: u64 = 2;
