use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};

use crate::errors::UploadError;
use crate::ingest::Upload;
use crate::storage::{NamePolicy, SavedObject, StorageBackend};

/// ファイル名が決められないときに使う名前
const DEFAULT_DOWNLOAD_NAME: &str = "download";

fn parse_url(url: &str) -> Result<Url, UploadError> {
    let parsed = Url::parse(url).map_err(|e| UploadError::Input(format!("invalid url {url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(UploadError::Input(format!("unsupported url scheme: {scheme}"))),
    }
}

/// URL の最後のパスセグメントをファイル名として使う
fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string())
}

/// URL を GET して本文を返す。200 以外はエラー。
pub async fn download(client: &Client, url: &str) -> Result<Bytes, UploadError> {
    let parsed = parse_url(url)?;

    tracing::info!(url = %parsed, "downloading file");
    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| UploadError::Transport(e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        tracing::warn!(url = %url, status = %status, "download failed");
        return Err(UploadError::Download {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .bytes()
        .await
        .map_err(|e| UploadError::Transport(format!("failed to read download body: {e}")))
}

/// ダウンロードしてアップロードとして扱う
///
/// `file_name` が無ければ URL の末尾から決める。
pub async fn download_upload(
    client: &Client,
    url: &str,
    file_name: Option<&str>,
) -> Result<Upload, UploadError> {
    let file_name = match file_name {
        Some(name) => name.to_string(),
        None => file_name_from_url(&parse_url(url)?),
    };
    let bytes = download(client, url).await?;
    Ok(Upload::from_bytes(file_name, bytes))
}

/// ダウンロードしてそのままストレージに保存する
pub async fn download_to_storage(
    client: &Client,
    url: &str,
    file_name: Option<&str>,
    storage: &dyn StorageBackend,
    policy: NamePolicy,
) -> Result<SavedObject, UploadError> {
    let upload = download_upload(client, url, file_name).await?;
    Ok(storage
        .save_bytes(&upload.file_name, &upload.bytes, policy)
        .await?)
}
