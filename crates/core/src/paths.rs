//! Centralized path functions for larder's storage locations.

use std::path::PathBuf;

/// App cache root: `~/Library/Caches/larder/` (macOS) or `~/.cache/larder/` (Linux).
pub fn app_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("larder"))
}

/// SQLite database file: `<app_cache_dir>/larder.db`.
pub fn db_path() -> Option<PathBuf> {
    app_cache_dir().map(|d| d.join("larder.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path_lives_under_cache_dir() {
        let (Some(root), Some(db)) = (app_cache_dir(), db_path()) else {
            return; // no cache dir on this platform/user
        };
        assert!(db.starts_with(&root));
        assert!(db.to_string_lossy().ends_with("larder.db"));
    }
}
