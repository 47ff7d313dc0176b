pub mod constants;
pub mod errors;
pub mod ingest;
pub mod naming;
pub mod pipeline;
pub mod probe;
pub mod proxy;
pub mod storage;
pub mod validation;

// 公開API
pub use constants::{DEFAULT_QUALITY, MAX_ALLOCATION_ATTEMPTS};
pub use errors::{StorageError, UploadError};
pub use ingest::{Upload, download, download_to_storage, download_upload};
pub use naming::{allocate, candidates, sanitize};
pub use pipeline::{Operation, OutputFormat, ParamValue, Pipeline, Region, ThumbnailOptions};
pub use probe::probe_dimensions;
pub use proxy::{FilePart, ImageProxyClient, ProxyConfig, Transport, TransportResponse};
pub use storage::{BucketStorage, LocalStorage, NamePolicy, SavedObject, StorageBackend, StoredFile};
pub use validation::{validate_key, validate_segment};

#[cfg(test)]
pub(crate) mod test_support {
    /// テスト用の HTTP スタブを起動し、ベース URL を返す
    pub async fn spawn_stub(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}
