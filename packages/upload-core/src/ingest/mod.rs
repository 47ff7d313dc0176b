pub mod download;

use std::path::Path;

use bytes::Bytes;

pub use download::{download, download_to_storage, download_upload};

/// 取り込み対象のファイル（フォーム・バッファ・ダウンロードのいずれか由来）
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl Upload {
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// 小文字の拡張子（ドットなし）
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}
