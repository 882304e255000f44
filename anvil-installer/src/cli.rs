use clap::Parser;
use std::path::PathBuf;

/// The target device, layout, and system identity are compiled in; the
/// command line only carries the safety interlocks and log routing.
#[derive(Parser, Debug)]
#[command(author, version, about = "Bare-disk Arch provisioner")]
pub struct Cli {
    /// Log every step without touching the device.
    #[arg(long)]
    pub dry_run: bool,

    /// Required acknowledgement before any destructive operation.
    #[arg(long = "yes-i-know-this-wipes-the-disk")]
    pub wipe_acknowledged: bool,

    /// Write logs here instead of /var/log/anvil/install.log.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn wipe_flag_spells_out_the_consequence() {
        let cli = Cli::parse_from(["anvil", "--yes-i-know-this-wipes-the-disk"]);
        assert!(cli.wipe_acknowledged);
        assert!(!cli.dry_run);
    }
}
