use std::path::{Path, PathBuf};

/// Resolve the dealsync project root.
///
/// `--root` / `DEALSYNC_ROOT` wins. Otherwise the nearest ancestor of the
/// working directory holding `.dealsync/`, then `.git/`, then the working
/// directory itself.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    discover_from(&cwd)
}

fn discover_from(start: &Path) -> PathBuf {
    [dealsync_core::paths::DEALSYNC_DIR, ".git"]
        .iter()
        .find_map(|marker| nearest_with(start, marker))
        .unwrap_or_else(|| start.to_path_buf())
}

fn nearest_with(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}
