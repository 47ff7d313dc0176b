/// 衝突回避で試行する候補名の上限
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 10_000;

/// ファイル名として許容する最大バイト数
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// サニタイズ後に何も残らなかった場合の名前
pub const FALLBACK_FILE_NAME: &str = "file";

/// 画像処理サービスのパイプラインルート
pub const PIPELINE_ROUTE: &str = "pipeline";

/// パイプラインを埋め込むクエリパラメータ名
pub const OPERATIONS_QUERY_KEY: &str = "operations";

/// マルチパートのファイルフィールド名（受信・送信共通）
pub const FILE_FIELD: &str = "file";

/// 拡張子が不明な場合に使用する拡張子（JPEG 系として扱う）
pub const DEFAULT_EXTENSION: &str = "jpg";

/// 浮動小数パラメータの小数点以下桁数
pub const FLOAT_PRECISION: usize = 6;

/// デフォルト品質（1-100）
pub const DEFAULT_QUALITY: u8 = 80;

/// エラー本文をログに残す際の最大文字数
pub const MAX_LOGGED_BODY_CHARS: usize = 512;
