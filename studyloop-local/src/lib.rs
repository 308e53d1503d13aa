use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;

use async_trait::async_trait;
use studyloop_core::store::CheckpointStore;
use studyloop_core::{Checkpoint, CoreError, ListId};

pub mod paths;

const FILE_VERSION: u32 = 1;

#[derive(Clone, Serialize, Deserialize)]
struct FileImage {
    version: u32,
    updated_at: DateTime<Utc>,
    checkpoints: HashMap<ListId, Checkpoint>,
}

impl FileImage {
    fn new_empty() -> Self {
        Self {
            version: FILE_VERSION,
            updated_at: Utc::now(),
            checkpoints: HashMap::new(),
        }
    }
}

/// Device-local checkpoint store: one JSON file holding the continuity
/// record per list. Writes go through a tempfile rename, so a crash
/// mid-write leaves the previous image intact.
pub struct LocalCheckpoints {
    path: PathBuf,
    state: RwLock<HashMap<ListId, Checkpoint>>,
}

impl LocalCheckpoints {
    pub async fn open_default() -> Result<Self, CoreError> {
        Self::open_at(paths::default_checkpoint_file()).await
    }

    pub async fn open_at(path: PathBuf) -> Result<Self, CoreError> {
        ensure_parent_dirs(&path)?;
        let image = load_or_init(&path).await?;
        Ok(Self {
            path,
            state: RwLock::new(image.checkpoints),
        })
    }

    async fn save_file(&self) -> Result<(), CoreError> {
        let image = FileImage {
            version: FILE_VERSION,
            updated_at: Utc::now(),
            checkpoints: self.state.read().clone(),
        };
        let path = self.path.clone();
        task::spawn_blocking(move || write_atomic(&path, &image))
            .await
            .map_err(|_| CoreError::Storage("io"))?
            .map_err(|_| CoreError::Storage("io"))?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for LocalCheckpoints {
    async fn load(&self, list: ListId) -> Result<Option<Checkpoint>, CoreError> {
        Ok(self.state.read().get(&list).cloned())
    }

    async fn save(&self, list: ListId, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        self.state.write().insert(list, checkpoint.clone());
        self.save_file().await
    }

    async fn clear(&self, list: ListId) -> Result<(), CoreError> {
        let removed = self.state.write().remove(&list);
        if removed.is_some() {
            self.save_file().await?;
        }
        Ok(())
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| CoreError::Storage("io"))?;
    }
    Ok(())
}

async fn load_or_init(path: &Path) -> Result<FileImage, CoreError> {
    if path.exists() {
        let p = path.to_path_buf();
        task::spawn_blocking(move || {
            let mut f = fs::File::open(&p)?;
            let mut buf = String::new();
            f.read_to_string(&mut buf)?;
            let v = serde_json::from_str::<FileImage>(&buf)?;
            Ok::<FileImage, std::io::Error>(v)
        })
        .await
        .map_err(|_| CoreError::Storage("io"))
        .and_then(|r| r.map_err(|_| CoreError::Storage("io")))
    } else {
        Ok(FileImage::new_empty())
    }
}

fn write_atomic(path: &Path, image: &FileImage) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(image)?;
    let mut tmp = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    let _ = fs::remove_file(path);
    tmp.persist(path)?;
    Ok(())
}
