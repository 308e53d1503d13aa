use directories::ProjectDirs;
use std::path::PathBuf;

pub fn data_root() -> PathBuf {
    if let Some(pd) = ProjectDirs::from("com", "studyloop", "StudyLoop") {
        pd.data_dir().to_path_buf()
    } else {
        // Fallback: current dir
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

pub fn default_checkpoint_file() -> PathBuf {
    data_root().join("checkpoints.json")
}

pub fn default_db_file() -> PathBuf {
    data_root().join("studyloop.sqlite3")
}
