use std::time::Duration;

/// 画像処理サービスへの接続設定
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    endpoint: String,
    pub timeout: Option<Duration>,
    pub compress_png: bool,
}

impl ProxyConfig {
    /// エンドポイントは末尾が `/` になるよう正規化される
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            endpoint,
            timeout: None,
            compress_png: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_png_compression(mut self, enabled: bool) -> Self {
        self.compress_png = enabled;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 環境変数から ProxyConfig を作成する
    ///
    /// - IMAGE_PROCESSING_ENDPOINT（未設定なら旧名の IMAGINARY_ENDPOINT）
    /// - IMAGE_PROCESSING_TIMEOUT_SECS（任意）
    /// - IMAGE_PROCESSING_COMPRESS_PNG（任意、`true`/`1` で有効）
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("IMAGE_PROCESSING_ENDPOINT")
            .filter(|v| !v.is_empty())
            .or_else(|| lookup("IMAGINARY_ENDPOINT").filter(|v| !v.is_empty()))
            .ok_or_else(|| "IMAGE_PROCESSING_ENDPOINT is not set".to_string())?;

        let mut config = Self::new(endpoint);

        if let Some(secs) = lookup("IMAGE_PROCESSING_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| format!("IMAGE_PROCESSING_TIMEOUT_SECS is not a number: {secs}"))?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(flag) = lookup("IMAGE_PROCESSING_COMPRESS_PNG") {
            config.compress_png = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }
}
