pub mod bucket;
pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncRead;

pub use crate::errors::StorageError;
pub use bucket::BucketStorage;
pub use local::LocalStorage;

/// 保存に成功したファイルの記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub file_name: String,
    pub url: String,
}

/// 保存結果と、保存したバイト列そのもの
#[derive(Debug, Clone)]
pub struct SavedObject {
    pub file: StoredFile,
    pub bytes: Bytes,
}

/// 保存時の名前の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePolicy {
    /// サニタイズし、既存のオブジェクトと衝突しない名前を割り当てる
    Allocate,
    /// 指定された名前をそのまま使う（既存のものは上書きされる）
    Verbatim,
}

/// ストレージバックエンド
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// `reader` の内容を `name` として保存する
    async fn save(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        policy: NamePolicy,
    ) -> Result<SavedObject, StorageError>;

    /// 保存済みのオブジェクトを読み出す
    async fn open(&self, name: &str) -> Result<Bytes, StorageError>;

    async fn save_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        policy: NamePolicy,
    ) -> Result<SavedObject, StorageError> {
        let mut reader = bytes;
        self.save(name, &mut reader, policy).await
    }
}
