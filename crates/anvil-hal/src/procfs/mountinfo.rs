//! `/proc/self/mountinfo` parsing.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub mount_point: PathBuf,
}

pub fn parse_mountinfo(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split(" - ");
            let pre = parts.next()?;
            let pre_fields: Vec<&str> = pre.split_whitespace().collect();
            if pre_fields.len() < 5 {
                return None;
            }
            let mount_point = unescape_mount_path(pre_fields[4]);
            Some(MountEntry {
                mount_point: PathBuf::from(mount_point),
            })
        })
        .collect()
}

pub fn is_mounted_from_info(path: &Path, entries: &[MountEntry]) -> bool {
    let target = normalize_path(path);
    entries
        .iter()
        .any(|entry| normalize_path(&entry.mount_point) == target)
}

/// Mount points at or below `target`, deepest first. Nested mounts can
/// only be released in that order.
pub fn mounts_under(target: &Path, entries: &[MountEntry]) -> Vec<PathBuf> {
    let mut under: Vec<PathBuf> = entries
        .iter()
        .map(|entry| entry.mount_point.clone())
        .filter(|mp| mp == target || mp.starts_with(target))
        .collect();
    under.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
    under
}

fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.len() > 1 && s.ends_with('/') {
        s.trim_end_matches('/').to_string()
    } else {
        s.to_string()
    }
}

fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "36 28 0:31 / / rw,relatime - ext4 /dev/sda3 rw\n\
        37 28 0:32 / /mnt rw,relatime - ext4 /dev/sda2 rw\n\
        38 28 0:33 / /mnt/boot rw,relatime - vfat /dev/sda1 rw\n";

    #[test]
    fn parses_mount_points() {
        let entries = parse_mountinfo(SAMPLE);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].mount_point, PathBuf::from("/mnt"));
    }

    #[test]
    fn mounts_under_orders_deepest_first() {
        let entries = parse_mountinfo(SAMPLE);
        let under = mounts_under(Path::new("/mnt"), &entries);
        assert_eq!(
            under,
            vec![PathBuf::from("/mnt/boot"), PathBuf::from("/mnt")]
        );
    }

    #[test]
    fn is_mounted_matches_exact_paths() {
        let entries = parse_mountinfo(SAMPLE);
        assert!(is_mounted_from_info(Path::new("/mnt"), &entries));
        assert!(!is_mounted_from_info(Path::new("/srv"), &entries));
    }

    #[test]
    fn unescapes_octal_sequences() {
        let sample = "36 28 0:31 / /mnt/usb\\040stick rw,relatime - ext4 /dev/sdb1 rw\n";
        let entries = parse_mountinfo(sample);
        assert_eq!(entries[0].mount_point, PathBuf::from("/mnt/usb stick"));
    }
}
