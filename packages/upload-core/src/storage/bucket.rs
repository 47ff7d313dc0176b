use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Body, Client, RequestBuilder, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::errors::StorageError;
use crate::naming::sanitize;
use crate::storage::{NamePolicy, SavedObject, StorageBackend, StoredFile};
use crate::validation::validate_key;

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
const UPLOAD_QUEUE_DEPTH: usize = 4;

/// Storage Proxy 経由のオブジェクトストレージ
///
/// `{base_url}/{key}` への PUT/GET でオブジェクトを読み書きする。
/// キーの衝突回避は行わない（同じキーへの保存は上書きになる）。
#[derive(Clone)]
pub struct BucketStorage {
    client: Client,
    base_url: String,
    public_url: String,
    credentials: Option<AccessCredentials>,
}

/// Cloudflare Access のサービストークン
#[derive(Clone)]
pub struct AccessCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl BucketStorage {
    /// 新しい BucketStorage を作成する
    ///
    /// `public_url` は保存後に返す URL の接頭辞。
    pub fn new(client: Client, base_url: &str, public_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: AccessCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// 環境変数から BucketStorage を作成する
    ///
    /// 必須の環境変数:
    /// - STORAGE_PROXY_URL
    ///
    /// 任意の環境変数:
    /// - STORAGE_PUBLIC_URL（未設定なら STORAGE_PROXY_URL）
    /// - CF_ACCESS_CLIENT_ID / CF_ACCESS_CLIENT_SECRET
    pub fn from_env() -> Result<Self, String> {
        let base_url = std::env::var("STORAGE_PROXY_URL")
            .map_err(|_| "STORAGE_PROXY_URL is not set".to_string())?;
        let public_url = std::env::var("STORAGE_PUBLIC_URL").unwrap_or_else(|_| base_url.clone());

        let storage = Self::new(Client::new(), &base_url, &public_url);

        match (
            std::env::var("CF_ACCESS_CLIENT_ID"),
            std::env::var("CF_ACCESS_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Ok(storage.with_credentials(AccessCredentials {
                client_id,
                client_secret,
            })),
            (Err(_), Err(_)) => Ok(storage),
            _ => Err("CF_ACCESS_CLIENT_ID and CF_ACCESS_CLIENT_SECRET must be set together".to_string()),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request
                .header("CF-Access-Client-Id", &c.client_id)
                .header("CF-Access-Client-Secret", &c.client_secret),
            None => request,
        }
    }

    /// キーを指定して Storage Proxy からオブジェクトを取得する
    pub async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        validate_key(key)?;

        let response = self
            .authorize(self.client.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        check_status(response.status(), key)?;

        response
            .bytes()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))
    }

    /// キーを指定して Storage Proxy にオブジェクトを書き込む
    pub async fn put_object(&self, key: &str, body: Bytes) -> Result<(), StorageError> {
        validate_key(key)?;

        let response = self
            .authorize(self.client.put(self.object_url(key)))
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        check_status(response.status(), key)
    }
}

fn check_status(status: StatusCode, key: &str) -> Result<(), StorageError> {
    match status {
        status if status.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(StorageError::NotFound {
            key: key.to_string(),
        }),
        StatusCode::FORBIDDEN => {
            tracing::error!(key = %key, "access denied by Storage Proxy");
            Err(StorageError::Forbidden)
        }
        status => {
            tracing::error!(key = %key, status = %status, "unexpected response from Storage Proxy");
            Err(StorageError::Internal(format!("unexpected status: {status}")))
        }
    }
}

#[async_trait]
impl StorageBackend for BucketStorage {
    async fn save(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        policy: NamePolicy,
    ) -> Result<SavedObject, StorageError> {
        let key = match policy {
            NamePolicy::Allocate => sanitize(name),
            NamePolicy::Verbatim => name.to_string(),
        };
        validate_key(&key)?;

        // reader の内容をチャンクごとに PUT のボディへ流しつつ、手元にも控える
        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(UPLOAD_QUEUE_DEPTH);
        let upload = async {
            self.authorize(self.client.put(self.object_url(&key)))
                .body(Body::wrap_stream(ReceiverStream::new(rx)))
                .send()
                .await
                .map_err(|e| StorageError::Internal(e.to_string()))
        };
        let feed = async move {
            let mut copied = Vec::new();
            let mut chunk = vec![0u8; UPLOAD_CHUNK_SIZE];
            loop {
                let n = match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        // ボディをエラーで終わらせ、途中までの内容を確定させない
                        let kind = e.kind();
                        let _ = tx.send(Err(std::io::Error::new(kind, "upload source failed"))).await;
                        return Err(e);
                    }
                };
                copied.extend_from_slice(&chunk[..n]);
                tx.send(Ok(Bytes::copy_from_slice(&chunk[..n])))
                    .await
                    .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "upload aborted"))?;
            }
            Ok(Bytes::from(copied))
        };
        let feed = async { feed.await.map_err(|e| StorageError::io(&key, e)) };

        let (response, bytes) = tokio::try_join!(upload, feed)?;
        check_status(response.status(), &key)?;
        tracing::info!(key = %key, size = bytes.len(), "stored object");

        Ok(SavedObject {
            file: StoredFile {
                url: format!("{}/{}", self.public_url, key),
                file_name: key,
            },
            bytes,
        })
    }

    async fn open(&self, name: &str) -> Result<Bytes, StorageError> {
        self.get_object(name).await
    }
}
