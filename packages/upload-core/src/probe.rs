use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::errors::UploadError;

/// 画像のヘッダから幅と高さを読み取る
///
/// 拡張子が jpg/jpeg なら JPEG、それ以外は PNG として読む。
pub fn probe_dimensions(bytes: &[u8], extension: &str) -> Result<(u32, u32), UploadError> {
    let ext = extension.to_lowercase();
    let format = if ext.ends_with("jpeg") || ext.ends_with("jpg") {
        ImageFormat::Jpeg
    } else {
        ImageFormat::Png
    };

    ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| UploadError::Decode(format!("{format:?}: {e}")))
}
