use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::constants::FILE_FIELD;
use crate::errors::UploadError;
use crate::proxy::config::ProxyConfig;

/// マルチパートで送るファイル 1 件
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub content: Bytes,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// 画像処理サービスへの HTTP 呼び出し
///
/// テストではモックに差し替える。
#[async_trait]
pub trait Transport: Send + Sync {
    /// `file` を `file` フィールドとして持つマルチパート本文を POST し、応答全体を返す
    async fn post_file(&self, url: &str, file: FilePart) -> Result<TransportResponse, UploadError>;
}

/// reqwest による Transport 実装
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, UploadError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| UploadError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_file(&self, url: &str, file: FilePart) -> Result<TransportResponse, UploadError> {
        let length = file.content.len() as u64;
        let part = Part::stream_with_length(file.content, length).file_name(file.file_name);
        let form = Form::new().part(FILE_FIELD, part);

        // Content-Type（boundary 付き）は reqwest が設定する
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::Transport(format!("failed to read response body: {e}")))?;

        Ok(TransportResponse { status, body })
    }
}
