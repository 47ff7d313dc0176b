use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::constants::MAX_ALLOCATION_ATTEMPTS;
use crate::errors::StorageError;
use crate::naming::{allocate, candidates, sanitize};
use crate::storage::{NamePolicy, SavedObject, StorageBackend, StoredFile};
use crate::validation::validate_segment;

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// ローカルファイルシステム上のストレージ
///
/// ファイルはルートディレクトリ直下にフラットに置かれ、
/// URL は `base_url` とファイル名を結合したものになる。
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url, file_name)
    }

    /// 現時点で空いている名前を返す
    ///
    /// 確認だけで予約はしない。保存には [`StorageBackend::save`] を使うこと。
    pub fn available_name(&self, desired: &str) -> Result<String, StorageError> {
        allocate(&self.root, desired, path_exists)
    }

    /// 候補名を順に排他的に作成し、最初に作成できた名前とファイルを返す
    async fn reserve(&self, desired: &str) -> Result<(String, File), StorageError> {
        let safe = sanitize(desired);

        for candidate in candidates(&safe) {
            let path = self.root.join(&candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(candidate = %candidate, "name already taken");
                }
                Err(e) => return Err(StorageError::io(path, e)),
            }
        }

        Err(StorageError::Exhausted {
            name: safe,
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    async fn create_verbatim(&self, name: &str) -> Result<(String, File), StorageError> {
        validate_segment(name)?;
        let path = self.root.join(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        Ok((name.to_string(), file))
    }
}

/// 存在確認。NotFound 以外のエラーは「存在しない」とは扱わない。
fn path_exists(path: &Path) -> Result<bool, StorageError> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// reader からファイルへ書き込みつつ、同じバイト列を手元にも残す
async fn write_through(
    mut file: File,
    reader: &mut (dyn AsyncRead + Unpin + Send),
) -> std::io::Result<Bytes> {
    let mut copied = Vec::new();
    let mut chunk = vec![0u8; COPY_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        file.write_all(&chunk[..n]).await?;
        copied.extend_from_slice(&chunk[..n]);
    }
    file.flush().await?;

    Ok(Bytes::from(copied))
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn save(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        policy: NamePolicy,
    ) -> Result<SavedObject, StorageError> {
        let (file_name, file) = match policy {
            NamePolicy::Allocate => self.reserve(name).await?,
            NamePolicy::Verbatim => self.create_verbatim(name).await?,
        };
        let path = self.root.join(&file_name);

        match write_through(file, reader).await {
            Ok(bytes) => {
                tracing::info!(file = %file_name, size = bytes.len(), "stored file");
                Ok(SavedObject {
                    file: StoredFile {
                        url: self.url_for(&file_name),
                        file_name,
                    },
                    bytes,
                })
            }
            Err(e) => {
                // 途中まで書かれたファイルを成功扱いで残さない
                match fs::remove_file(&path).await {
                    Ok(()) => tracing::warn!(file = %file_name, error = %e, "removed partially written file"),
                    Err(rm) => tracing::error!(
                        file = %file_name,
                        error = %e,
                        cleanup_error = %rm,
                        "failed to remove partially written file"
                    ),
                }
                Err(StorageError::io(path, e))
            }
        }
    }

    async fn open(&self, name: &str) -> Result<Bytes, StorageError> {
        validate_segment(name)?;
        let path = self.root.join(name);

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                key: name.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(StorageError::Forbidden),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}
