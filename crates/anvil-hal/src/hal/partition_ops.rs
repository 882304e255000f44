//! Partition table operations (`parted`, table reread).

use crate::HalResult;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PartedOptions {
    pub dry_run: bool,
    pub confirmed: bool,
}

impl PartedOptions {
    pub fn new(dry_run: bool, confirmed: bool) -> Self {
        Self { dry_run, confirmed }
    }
}

/// A single partition table operation executed via `parted -s`.
#[derive(Debug, Clone)]
pub enum PartedOp {
    MkLabel {
        label: String,
    },
    MkPart {
        part_type: String,
        fs_type: String,
        start: String,
        end: String,
    },
    SetFlag {
        part_num: u32,
        flag: String,
        state: String,
    },
}

pub trait PartitionOps {
    /// Execute a single `parted` operation on the given disk.
    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String>;

    /// Ask the kernel to re-read the partition table after an edit.
    fn reread_partition_table(&self, disk: &Path, dry_run: bool) -> HalResult<()>;
}
