use directories::ProjectDirs;
use std::path::PathBuf;

const DB_FILE: &str = "progress.db";
const LOG_FILE: &str = "eigo.log";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `~/.local/state/eigo`, or the platform data-local dir without `$HOME`
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("eigo"))
        } else {
            ProjectDirs::from("", "", "eigo").map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join(DB_FILE))
    }

    /// Log file kept next to the database at `db_path`
    pub fn log_path_for(db_path: &std::path::Path) -> PathBuf {
        db_path
            .parent()
            .map(|dir| dir.join(LOG_FILE))
            .unwrap_or_else(|| PathBuf::from(LOG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn db_path_ends_with_file_name() {
        if let Some(path) = AppDirs::db_path() {
            assert!(path.ends_with(Path::new("eigo").join(DB_FILE)));
        }
    }

    #[test]
    fn log_sits_next_to_db() {
        assert_eq!(
            AppDirs::log_path_for(Path::new("/tmp/eigo/progress.db")),
            PathBuf::from("/tmp/eigo/eigo.log")
        );
        assert_eq!(
            AppDirs::log_path_for(Path::new("progress.db")),
            PathBuf::from("eigo.log")
        );
    }
}
