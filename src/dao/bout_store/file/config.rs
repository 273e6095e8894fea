use std::path::PathBuf;

/// Directory used when `BOUT_DATA_DIR` is not set.
const DEFAULT_DATA_DIR: &str = "data/bouts";

/// Where the file backend keeps bout snapshots.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Directory holding one JSON file per bout.
    pub dir: PathBuf,
}

impl FileStoreConfig {
    /// Store snapshots under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read `BOUT_DATA_DIR`, falling back to `data/bouts`.
    pub fn from_env() -> Self {
        let dir = std::env::var_os("BOUT_DATA_DIR")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Self::new(dir)
    }
}
