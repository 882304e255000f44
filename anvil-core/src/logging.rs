use std::path::PathBuf;

pub fn init() {
    init_with(None);
}

pub fn init_with(log_file: Option<PathBuf>) {
    use env_logger::Target;
    use std::fs;
    use std::io;

    // Prefer a stable on-disk location for one-shot installs. If the
    // file cannot be created (permissions, readonly FS, etc.), fall
    // back to stderr.
    let path = log_file.unwrap_or_else(|| PathBuf::from("/var/log/anvil/install.log"));
    let target = (|| -> io::Result<Target> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Target::Pipe(Box::new(file)))
    })()
    .unwrap_or(Target::Stderr);

    env_logger::Builder::from_default_env()
        .target(target)
        .filter_level(log::LevelFilter::Info)
        .init();
}
