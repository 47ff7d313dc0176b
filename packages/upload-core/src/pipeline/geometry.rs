/// 画像内の矩形領域（ピクセル単位）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// 倍率を適用した座標（四捨五入）
pub fn scale_offset(value: u32, scale: f64) -> u32 {
    (value as f64 * scale).round() as u32
}

/// 倍率を適用した長さ（四捨五入、最小 1px）
pub fn scale_length(value: u32, scale: f64) -> u32 {
    scale_offset(value, scale).max(1)
}

/// 倍率を適用して新しい寸法を計算する
pub fn scale_size(width: u32, height: u32, scale: f64) -> (u32, u32) {
    (scale_length(width, scale), scale_length(height, scale))
}

/// 領域を拡大後の画像座標に変換する
///
/// 丸めで画像外へはみ出した分は切り詰める。領域の始点が画像外なら `None`。
pub fn scale_region(region: Region, scale: f64, bounds: (u32, u32)) -> Option<Region> {
    let (bound_w, bound_h) = bounds;
    let left = scale_offset(region.left, scale);
    let top = scale_offset(region.top, scale);
    if left >= bound_w || top >= bound_h {
        return None;
    }

    Some(Region {
        left,
        top,
        width: scale_length(region.width, scale).min(bound_w - left),
        height: scale_length(region.height, scale).min(bound_h - top),
    })
}
