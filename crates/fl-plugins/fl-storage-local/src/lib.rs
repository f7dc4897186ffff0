//! # fl-storage-local
//!
//! Local filesystem implementation of `MediaStore`.
//! Layout: `<root>/<owner>/files/<name>` and `<root>/<owner>/comments/<name>`,
//! where `<name>` is a fresh v4 UUID. Returned paths are relative to the root.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use fl_core::models::MediaKind;
use fl_core::traits::MediaStore;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root_path: root.into() }
    }

    fn area(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::File => "files",
            MediaKind::CommentAttachment => "comments",
        }
    }

    /// Resolves a stored relative path, refusing anything that could escape the root.
    fn resolve(&self, rel: &str) -> anyhow::Result<PathBuf> {
        let rel_path = Path::new(rel);
        let clean = rel_path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if rel.is_empty() || !clean {
            bail!("refusing media path {rel:?}");
        }
        Ok(self.root_path.join(rel_path))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save_upload(&self, owner_id: Uuid, kind: MediaKind, data: Bytes) -> anyhow::Result<String> {
        let rel = format!("{owner_id}/{}/{}", Self::area(kind), Uuid::new_v4());
        let target = self.resolve(&rel)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&target)
            .await
            .with_context(|| format!("creating {}", target.display()))?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        debug!(path = %rel, bytes = data.len(), "media saved");
        Ok(rel)
    }

    async fn load(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let target = self.resolve(path)?;
        fs::read(&target)
            .await
            .with_context(|| format!("reading {}", target.display()))
    }

    async fn remove(&self, path: &str) -> anyhow::Result<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
