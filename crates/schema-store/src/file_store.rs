use super::{SchemaStore, StoreResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Single JSON file on disk, replaced via temp file + rename.
///
/// The temp file is fsynced before the rename and the directory after it,
/// so a crash leaves either the old or the new document, never a truncated
/// one.
pub struct FileSchemaStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileSchemaStore {
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// Make a completed rename durable.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> StoreResult<()> {
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> StoreResult<()> {
    Ok(())
}

#[async_trait]
impl SchemaStore for FileSchemaStore {
    async fn read_raw(&self) -> StoreResult<Option<Vec<u8>>> {
        let _g = self.guard.lock().await;
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }
        Ok(Some(tokio::fs::read(&self.path).await?))
    }

    async fn write_raw(&self, bytes: &[u8]) -> StoreResult<()> {
        let _g = self.guard.lock().await;
        let dir = self.dir();
        tokio::fs::create_dir_all(dir).await?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        sync_dir(dir).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "schema store written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
