//! Persistent install report artifact.
//!
//! On success the provisioner leaves a JSON record of what it did next
//! to nothing else on the freshly wiped machine, so losing it half-way
//! through a write would be worse than not writing it at all. The save
//! goes through a temp file and rename.

use crate::pipeline::RunSummary;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_REPORT_PATH: &str = "/var/log/anvil/install-report.json";

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub version: u32,
    pub completed_unix_secs: u64,
    pub device: String,
    #[serde(flatten)]
    pub summary: RunSummary,
}

impl InstallReport {
    pub fn new(device: &Path, summary: RunSummary) -> Self {
        let completed_unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            version: 1,
            completed_unix_secs,
            device: device.display().to_string(),
            summary,
        }
    }
}

pub fn save_report_atomic(path: &Path, report: &InstallReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }

    let tmp_path = temp_path(path);
    let payload = serde_json::to_string_pretty(report).context("Failed to serialize report")?;

    let mut file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp report file: {}", tmp_path.display()))?;
    file.write_all(payload.as_bytes())
        .context("Failed to write report")?;
    file.sync_all().context("Failed to flush report")?;

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to atomically replace report file: {}",
            path.display()
        )
    })?;

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("install-report.json");
    path.with_file_name(format!("{}.tmp", file_name))
}
