use crate::constants::DEFAULT_QUALITY;
use crate::errors::UploadError;
use crate::pipeline::builder::Pipeline;
use crate::pipeline::geometry::{Region, scale_region, scale_size};

/// 出力フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl OutputFormat {
    /// 拡張子やフォーマット名から OutputFormat を作成
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// 画像処理サービスの `convert` に渡す型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            other => other.type_name(),
        }
    }

    /// Content-Type を取得
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }
}

/// サムネイル生成のパラメータ
#[derive(Debug, Clone)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub convert_to: Option<OutputFormat>,
}

impl ThumbnailOptions {
    pub fn new(width: u32, height: u32, convert_to: Option<OutputFormat>, quality: Option<u8>) -> Self {
        Self {
            width,
            height,
            quality: quality.unwrap_or(DEFAULT_QUALITY),
            convert_to,
        }
    }
}

fn validate_box(width: u32, height: u32) -> Result<(), UploadError> {
    if width == 0 || height == 0 {
        return Err(UploadError::Input(format!(
            "width and height must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

fn validate_quality(quality: u8) -> Result<(), UploadError> {
    if quality == 0 || quality > 100 {
        return Err(UploadError::Input(format!(
            "quality must be 1-100, got {quality}"
        )));
    }
    Ok(())
}

impl Pipeline {
    /// アスペクト比を保ったまま枠内に収め、メタデータを削除する
    pub fn fit(&mut self, width: u32, height: u32, quality: u8) -> Result<&mut Self, UploadError> {
        validate_box(width, height)?;
        validate_quality(quality)?;

        self.add("fit")
            .param("width", width)
            .param("height", height)
            .param("stripmeta", true)
            .param("quality", quality);
        Ok(self)
    }

    pub fn convert(&mut self, format: OutputFormat) -> &mut Self {
        self.add("convert").param("type", format.type_name());
        self
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<&mut Self, UploadError> {
        validate_box(width, height)?;

        self.add("resize")
            .param("width", width)
            .param("height", height);
        Ok(self)
    }

    /// 元画像を `scale` 倍に拡大してから、`region` を同じ倍率で切り出す
    ///
    /// `source` と `region` は元画像の座標系で指定する。
    /// 座標・寸法は四捨五入し、拡大後の画像からはみ出す分は切り詰める。
    pub fn enlarge_then_extract(
        &mut self,
        source: (u32, u32),
        scale: f64,
        region: Region,
    ) -> Result<&mut Self, UploadError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(UploadError::Input(format!("invalid scale factor {scale}")));
        }
        validate_box(source.0, source.1)?;
        validate_box(region.width, region.height)?;

        let (width, height) = scale_size(source.0, source.1, scale);
        let area = scale_region(region, scale, (width, height)).ok_or_else(|| {
            UploadError::Input(format!(
                "region at ({}, {}) lies outside the {}x{} source",
                region.left, region.top, source.0, source.1
            ))
        })?;

        self.add("enlarge")
            .param("width", width)
            .param("height", height);
        self.add("extract")
            .param("top", area.top)
            .param("left", area.left)
            .param("areawidth", area.width)
            .param("areaheight", area.height);
        Ok(self)
    }

    /// 必要ならフォーマットを変換してから枠内に収める
    pub fn thumbnail(options: &ThumbnailOptions) -> Result<Self, UploadError> {
        let mut pipeline = Self::new();
        if let Some(format) = options.convert_to {
            pipeline.convert(format);
        }
        pipeline.fit(options.width, options.height, options.quality)?;
        Ok(pipeline)
    }
}
