use std::path::Path;

use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::AppState;
use upload_core::constants::FILE_FIELD;
use upload_core::{
    NamePolicy, OutputFormat, Pipeline, StorageError, StoredFile, ThumbnailOptions, Upload,
    UploadError, download_to_storage,
};

#[derive(Debug, Deserialize)]
pub struct TransformQuery {
    #[serde(rename = "w")]
    pub width: Option<u32>,
    #[serde(rename = "h")]
    pub height: Option<u32>,
    #[serde(rename = "f")]
    pub format: Option<String>,
    #[serde(rename = "q")]
    pub quality: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    pub name: Option<String>,
    #[serde(default = "default_sanitize")]
    pub sanitize: bool,
}

fn default_sanitize() -> bool {
    true
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// マルチパートの `file` フィールドを読み出す
async fn read_file_field(multipart: &mut Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(Upload::from_bytes(file_name, bytes));
    }

    Err(AppError::BadRequest(format!("missing form field `{FILE_FIELD}`")))
}

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StoredFile>, AppError> {
    let upload = read_file_field(&mut multipart).await?;

    tracing::info!(file = %upload.file_name, size = upload.bytes.len(), "storing upload");
    let saved = state
        .storage
        .save_bytes(&upload.file_name, &upload.bytes, NamePolicy::Allocate)
        .await?;

    Ok(Json(saved.file))
}

pub async fn fetch_file(
    State(state): State<AppState>,
    Json(request): Json<FetchRequest>,
) -> Result<Json<StoredFile>, AppError> {
    let policy = if request.sanitize {
        NamePolicy::Allocate
    } else {
        NamePolicy::Verbatim
    };

    let saved = download_to_storage(
        &state.http,
        &request.url,
        request.name.as_deref(),
        state.storage.as_ref(),
        policy,
    )
    .await?;

    Ok(Json(saved.file))
}

pub async fn process_image(
    State(state): State<AppState>,
    Query(query): Query<TransformQuery>,
    mut multipart: Multipart,
) -> Result<Json<StoredFile>, AppError> {
    let proxy = state
        .proxy
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("image processing is not configured".to_string()))?;

    let (Some(width), Some(height)) = (query.width, query.height) else {
        return Err(AppError::BadRequest("both w and h are required".to_string()));
    };
    let convert_to = match query.format.as_deref() {
        Some(name) => Some(
            OutputFormat::from_name(name)
                .ok_or_else(|| AppError::BadRequest(format!("unsupported format: {name}")))?,
        ),
        None => None,
    };

    let options = ThumbnailOptions::new(width, height, convert_to, query.quality);
    let pipeline = Pipeline::thumbnail(&options)?;

    let upload = read_file_field(&mut multipart).await?;
    let source_extension = upload.extension().unwrap_or_default();
    let target_name = match convert_to {
        Some(format) => Path::new(&upload.file_name)
            .with_extension(format.extension())
            .to_string_lossy()
            .into_owned(),
        None => upload.file_name.clone(),
    };

    tracing::info!(
        file = %upload.file_name,
        w = width,
        h = height,
        f = ?convert_to,
        q = options.quality,
        "transforming image"
    );

    let processed = proxy
        .process(&source_extension, upload.bytes, &pipeline)
        .await?;
    let saved = state
        .storage
        .save_bytes(&target_name, &processed, NamePolicy::Allocate)
        .await?;

    Ok(Json(saved.file))
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TransformFailed(String),
    StorageUnavailable(String),
    Upstream(String),
    Unavailable(String),
    Internal(String),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Input(msg) => {
                tracing::warn!(error = %msg, "invalid input");
                AppError::BadRequest(msg)
            }
            UploadError::Storage(storage_err) => storage_err.into(),
            UploadError::Encoding(e) => {
                tracing::error!(error = %e, "failed to encode pipeline");
                AppError::Internal(e.to_string())
            }
            UploadError::RemoteProcessing { status, body } if (400..500).contains(&status) => {
                tracing::warn!(status = status, body = %body, "image service rejected the request");
                AppError::TransformFailed(body)
            }
            UploadError::RemoteProcessing { status, body } => {
                tracing::error!(status = status, body = %body, "image service failed");
                AppError::Upstream(format!("image service responded with {status}"))
            }
            UploadError::Download { url, status } => {
                tracing::warn!(url = %url, status = status, "download failed");
                AppError::Upstream(format!("download failed with status {status}"))
            }
            UploadError::Transport(msg) => {
                tracing::error!(error = %msg, "upstream unreachable");
                AppError::Upstream("upstream unreachable".to_string())
            }
            UploadError::Decode(msg) => {
                tracing::error!(error = %msg, "image decoding failed");
                AppError::TransformFailed(msg)
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => {
                tracing::warn!(key = %key, "object not found");
                AppError::NotFound("object not found".to_string())
            }
            StorageError::InvalidName { name, reason } => {
                tracing::warn!(name = %name, reason = reason, "invalid object name");
                AppError::BadRequest(format!("invalid file name: {reason}"))
            }
            StorageError::Forbidden => {
                tracing::error!("access denied by Storage Proxy (check CF Access credentials)");
                AppError::StorageUnavailable("storage access denied".to_string())
            }
            StorageError::Exhausted { name, attempts } => {
                tracing::warn!(name = %name, attempts = attempts, "no free file name left");
                AppError::Conflict(format!("no free file name for {name}"))
            }
            StorageError::Io { .. } => {
                tracing::error!(error = %err, "local storage i/o failed");
                AppError::Internal(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "storage error");
                AppError::StorageUnavailable("storage error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::TransformFailed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::StorageUnavailable(msg) => {
                tracing::error!(error = %msg, "storage unavailable");
                (StatusCode::BAD_GATEWAY, "storage unavailable".to_string())
            }
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router;
    use axum::extract::Multipart;
    use axum::routing::post;
    use axum::Router;
    use bytes::Bytes;
    use reqwest::multipart::{Form, Part};
    use std::sync::Arc;
    use upload_core::{ImageProxyClient, LocalStorage, ProxyConfig};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// 受け取ったファイルの内容を大文字にして返す画像処理サービスのスタブ
    async fn image_service(mut multipart: Multipart) -> Vec<u8> {
        let field = multipart.next_field().await.unwrap().unwrap();
        field.bytes().await.unwrap().to_ascii_uppercase()
    }

    async fn gateway(dir: &tempfile::TempDir, proxy: Option<ImageProxyClient>) -> String {
        let state = AppState {
            storage: Arc::new(LocalStorage::new(dir.path(), "/files")),
            proxy,
            http: reqwest::Client::new(),
        };
        serve(router(state)).await
    }

    fn file_form(name: &str, content: &'static [u8]) -> Form {
        Form::new().part("file", Part::bytes(content).file_name(name.to_string()))
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (UploadError::Input("x".into()), StatusCode::BAD_REQUEST),
            (
                UploadError::RemoteProcessing { status: 422, body: "bad width".into() },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                UploadError::RemoteProcessing { status: 500, body: String::new() },
                StatusCode::BAD_GATEWAY,
            ),
            (UploadError::Transport("refused".into()), StatusCode::BAD_GATEWAY),
            (
                UploadError::Storage(StorageError::NotFound { key: "a".into() }),
                StatusCode::NOT_FOUND,
            ),
            (
                UploadError::Storage(StorageError::Exhausted { name: "a".into(), attempts: 1 }),
                StatusCode::CONFLICT,
            ),
            (
                UploadError::Storage(StorageError::Io {
                    path: "/data/a.jpg".into(),
                    source: std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                UploadError::Storage(StorageError::Forbidden),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let base = gateway(&dir, None).await;

        let response = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_upload_allocates_names() {
        let dir = tempfile::tempdir().unwrap();
        let base = gateway(&dir, None).await;
        let client = reqwest::Client::new();

        let mut names = Vec::new();
        for _ in 0..2 {
            let stored: serde_json::Value = client
                .post(format!("{base}/files"))
                .multipart(file_form("../report.pdf", b"%PDF"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            names.push(stored["file_name"].as_str().unwrap().to_string());
        }

        assert_eq!(names, vec!["report.pdf", "1-report.pdf"]);
        assert_eq!(std::fs::read(dir.path().join("1-report.pdf")).unwrap(), b"%PDF");
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let base = gateway(&dir, None).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/files"))
            .multipart(Form::new().text("comment", "no file here"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_process_image() {
        let service = serve(Router::new().route("/pipeline", post(image_service))).await;
        let proxy = ImageProxyClient::new(ProxyConfig::new(service)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let base = gateway(&dir, Some(proxy)).await;

        let stored: serde_json::Value = reqwest::Client::new()
            .post(format!("{base}/images?w=100&h=80&f=png"))
            .multipart(file_form("cat.jpg", b"pixels"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(stored["file_name"], "cat.png");
        assert_eq!(stored["url"], "/files/cat.png");
        assert_eq!(std::fs::read(dir.path().join("cat.png")).unwrap(), b"PIXELS");
    }

    #[tokio::test]
    async fn test_process_image_requires_proxy_and_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let base = gateway(&dir, None).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/images?w=10&h=10"))
            .multipart(file_form("a.jpg", b"x"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        let proxy = ImageProxyClient::new(ProxyConfig::new("http://127.0.0.1:9")).unwrap();
        let base = gateway(&dir, Some(proxy)).await;
        let response = client
            .post(format!("{base}/images?w=10"))
            .multipart(file_form("a.jpg", b"x"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_fetch_file() {
        let origin = serve(Router::new().route(
            "/assets/logo.svg",
            axum::routing::get(|| async { Bytes::from_static(b"<svg/>") }),
        ))
        .await;

        let dir = tempfile::tempdir().unwrap();
        let base = gateway(&dir, None).await;

        let stored: serde_json::Value = reqwest::Client::new()
            .post(format!("{base}/files/fetch"))
            .json(&serde_json::json!({ "url": format!("{origin}/assets/logo.svg") }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(stored["file_name"], "logo.svg");
        assert_eq!(std::fs::read(dir.path().join("logo.svg")).unwrap(), b"<svg/>");
    }
}
