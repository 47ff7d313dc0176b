use std::net::SocketAddr;
use std::path::PathBuf;

use upload_core::ProxyConfig;

/// 保存先の種類
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Local { folder: PathBuf, base_url: String },
    Bucket,
}

/// ゲートウェイの設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub storage: StorageConfig,
    pub proxy: Option<ProxyConfig>,
}

impl AppConfig {
    /// 環境変数から AppConfig を作成する
    ///
    /// - LISTEN_ADDR（既定: 0.0.0.0:8080）
    /// - STORAGE_BACKEND: `local`（既定）または `bucket`
    /// - ATTACHMENTS_FOLDER: local の場合は必須
    /// - ATTACHMENTS_BASE_URL（既定: /files）
    ///
    /// 画像処理サービスの設定が無い場合、画像変換エンドポイントは無効になる。
    pub fn from_env() -> Result<Self, String> {
        let listen_addr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|e| format!("LISTEN_ADDR is invalid: {e}"))?;

        let storage = match std::env::var("STORAGE_BACKEND").as_deref() {
            Ok("local") | Err(_) => StorageConfig::Local {
                folder: std::env::var("ATTACHMENTS_FOLDER")
                    .map_err(|_| "ATTACHMENTS_FOLDER is not set".to_string())?
                    .into(),
                base_url: std::env::var("ATTACHMENTS_BASE_URL")
                    .unwrap_or_else(|_| "/files".to_string()),
            },
            Ok("bucket") => StorageConfig::Bucket,
            Ok(other) => return Err(format!("unknown STORAGE_BACKEND: {other}")),
        };

        let proxy = match ProxyConfig::from_env() {
            Ok(config) => Some(config),
            Err(msg) => {
                tracing::warn!(reason = %msg, "image processing disabled");
                None
            }
        };

        Ok(Self {
            listen_addr,
            storage,
            proxy,
        })
    }
}
