use std::path::PathBuf;

use thiserror::Error;

/// アップロード処理の統合エラー型
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to encode pipeline: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("image service responded with {status}: {body}")]
    RemoteProcessing { status: u16, body: String },

    #[error("download of {url} failed with status {status}")]
    Download { url: String, status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to read image dimensions: {0}")]
    Decode(String),
}

impl UploadError {
    /// 再試行で回復し得るエラーかどうか
    ///
    /// 通信エラーと 5xx 応答のみ。4xx は入力の問題なので再試行しない。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::RemoteProcessing { status, .. } | Self::Download { status, .. } => {
                (500..600).contains(status)
            }
            _ => false,
        }
    }
}

/// ストレージアクセスエラー
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("access denied")]
    Forbidden,

    #[error("invalid object name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("no free name for {name} after {attempts} attempts")]
    Exhausted { name: String, attempts: u32 },

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(UploadError::Transport("connection reset".to_string()).is_retryable());
        assert!(
            UploadError::RemoteProcessing {
                status: 503,
                body: String::new(),
            }
            .is_retryable()
        );
        assert!(
            !UploadError::RemoteProcessing {
                status: 422,
                body: "bad width".to_string(),
            }
            .is_retryable()
        );
        assert!(!UploadError::Input("missing file".to_string()).is_retryable());
    }

    #[test]
    fn test_storage_error_converts() {
        let err: UploadError = StorageError::Forbidden.into();
        assert!(matches!(err, UploadError::Storage(StorageError::Forbidden)));
    }
}
