use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::constants::{
    DEFAULT_EXTENSION, MAX_LOGGED_BODY_CHARS, OPERATIONS_QUERY_KEY, PIPELINE_ROUTE,
};
use crate::errors::UploadError;
use crate::pipeline::{OutputFormat, Pipeline};
use crate::proxy::compress::{is_png, recompress_png};
use crate::proxy::config::ProxyConfig;
use crate::proxy::transport::{FilePart, ReqwestTransport, Transport};
use crate::storage::{NamePolicy, SavedObject, StorageBackend};

/// 外部の画像処理サービスにパイプラインを送るクライアント
///
/// パイプラインは URL のクエリに、画像はマルチパート本文に載せて 1 回だけ POST する。
/// タイムアウトは [`ProxyConfig::timeout`] か呼び出し側で設定すること。
#[derive(Clone)]
pub struct ImageProxyClient {
    config: ProxyConfig,
    transport: Arc<dyn Transport>,
}

impl ImageProxyClient {
    pub fn new(config: ProxyConfig) -> Result<Self, UploadError> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ProxyConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// パイプライン送信先の URL
    pub fn pipeline_url(&self, pipeline: &Pipeline) -> Result<String, UploadError> {
        Ok(format!(
            "{}{PIPELINE_ROUTE}?{OPERATIONS_QUERY_KEY}={}",
            self.config.endpoint(),
            pipeline.to_query_value()?
        ))
    }

    /// 画像を変換して、変換後のバイト列を返す
    ///
    /// 画像処理サービスは拡張子でデコーダを選ぶため、`source_extension` を
    /// 送信ファイル名に付ける。未知・未指定の拡張子は jpg として扱う。
    pub async fn process(
        &self,
        source_extension: &str,
        source: Bytes,
        pipeline: &Pipeline,
    ) -> Result<Bytes, UploadError> {
        let extension = normalize_extension(source_extension);
        let url = self.pipeline_url(pipeline)?;

        tracing::info!(
            endpoint = %self.config.endpoint(),
            operations = pipeline.len(),
            extension = %extension,
            size = source.len(),
            "sending image to processing service"
        );

        let response = self
            .transport
            .post_file(
                &url,
                FilePart {
                    file_name: format!("source.{extension}"),
                    content: source,
                },
            )
            .await?;

        if !(200..300).contains(&response.status) {
            let body = String::from_utf8_lossy(&response.body).into_owned();
            tracing::error!(
                status = response.status,
                body = %truncate(&body, MAX_LOGGED_BODY_CHARS),
                "image processing failed"
            );
            return Err(UploadError::RemoteProcessing {
                status: response.status,
                body,
            });
        }

        // 変換で PNG 以外になった応答には手を付けない
        if extension == "png" && self.config.compress_png && is_png(&response.body) {
            let body = response.body;
            return tokio::task::spawn_blocking(move || recompress_png(&body))
                .await
                .map_err(|e| UploadError::Decode(format!("png recompression aborted: {e}")))?;
        }

        Ok(response.body)
    }

    /// 画像を変換し、結果を衝突しない名前で保存する
    pub async fn process_and_store(
        &self,
        storage: &dyn StorageBackend,
        file_name: &str,
        source: Bytes,
        pipeline: &Pipeline,
    ) -> Result<SavedObject, UploadError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        let processed = self.process(extension, source, pipeline).await?;
        Ok(storage
            .save_bytes(file_name, &processed, NamePolicy::Allocate)
            .await?)
    }
}

fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    match OutputFormat::from_name(&ext) {
        Some(_) => ext,
        None => DEFAULT_EXTENSION.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
