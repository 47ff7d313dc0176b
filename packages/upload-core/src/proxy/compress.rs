use std::io::Cursor;

use bytes::Bytes;
use image::ImageFormat;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

use crate::errors::UploadError;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// PNG のシグネチャで始まっているか
pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(PNG_SIGNATURE)
}

/// PNG を最大圧縮で再エンコードする
///
/// 画像処理サービスの応答に対する任意の後処理。
/// 再エンコード結果が元より大きい場合は元のバイト列をそのまま返す。
pub fn recompress_png(input: &Bytes) -> Result<Bytes, UploadError> {
    let img = image::load_from_memory_with_format(input, ImageFormat::Png)
        .map_err(|e| UploadError::Decode(format!("PNG decode failed: {e}")))?;

    let mut buf = Cursor::new(Vec::new());
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| UploadError::Decode(format!("PNG encode failed: {e}")))?;

    let output = buf.into_inner();
    if output.len() < input.len() {
        tracing::debug!(before = input.len(), after = output.len(), "recompressed png");
        Ok(Bytes::from(output))
    } else {
        Ok(input.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn fast_png(img: &DynamicImage) -> Bytes {
        let mut buf = Cursor::new(Vec::new());
        let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Fast, FilterType::NoFilter);
        img.write_with_encoder(encoder).unwrap();
        Bytes::from(buf.into_inner())
    }

    #[test]
    fn test_recompressed_png_is_valid_and_not_larger() {
        let img = DynamicImage::new_rgb8(64, 64);
        let input = fast_png(&img);

        let output = recompress_png(&input).unwrap();
        assert!(output.len() <= input.len());
        // PNG マジックナンバー確認
        assert_eq!(&output[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        assert!(is_png(&output));

        let decoded = image::load_from_memory_with_format(&output, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_is_png() {
        assert!(!is_png(b""));
        assert!(!is_png(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(is_png(&fast_png(&DynamicImage::new_rgb8(1, 1))));
    }

    #[test]
    fn test_non_png_input_is_decode_error() {
        let result = recompress_png(&Bytes::from_static(b"not a png"));
        assert!(matches!(result, Err(UploadError::Decode(_))));
    }
}
