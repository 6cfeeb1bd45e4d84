use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DEALSYNC_DIR: &str = ".dealsync";
pub const REPORTS_DIR: &str = ".dealsync/reports";

pub const CONFIG_FILE: &str = ".dealsync/config.yaml";
pub const REPORT_FILE: &str = "sync-report.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn dealsync_dir(root: &Path) -> PathBuf {
    root.join(DEALSYNC_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn reports_dir(root: &Path) -> PathBuf {
    root.join(REPORTS_DIR)
}

/// Where a run writes its summary unless `--report` says otherwise.
pub fn default_report_path(root: &Path) -> PathBuf {
    reports_dir(root).join(REPORT_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_root() {
        let root = Path::new("/work/pipeline");
        assert_eq!(
            config_path(root),
            PathBuf::from("/work/pipeline/.dealsync/config.yaml")
        );
        assert_eq!(
            default_report_path(root),
            PathBuf::from("/work/pipeline/.dealsync/reports/sync-report.json")
        );
        assert_eq!(dealsync_dir(root), PathBuf::from("/work/pipeline/.dealsync"));
    }
}
