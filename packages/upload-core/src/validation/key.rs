use crate::constants::MAX_FILE_NAME_BYTES;
use crate::errors::StorageError;

/// オブジェクトキーの最大長
const MAX_KEY_LEN: usize = 1024;

fn invalid(name: &str, reason: &'static str) -> StorageError {
    StorageError::InvalidName {
        name: name.to_string(),
        reason,
    }
}

/// 単一セグメントとして安全か。`name` はエラー表示用の元の名前。
fn check_segment(segment: &str, name: &str) -> Result<(), StorageError> {
    match segment {
        "" => Err(invalid(name, "empty path segment")),
        "." | ".." => Err(invalid(name, "path traversal detected")),
        s if s.len() > MAX_FILE_NAME_BYTES => Err(invalid(name, "file name is too long (max 255)")),
        s if s.contains(['/', '\\', '\0']) => Err(invalid(name, "file name contains a path separator")),
        _ => Ok(()),
    }
}

/// Storage Proxy に渡すオブジェクトキーを検証する
///
/// URL デコード後に `/` 区切りの各セグメントを検査し、
/// 英数字と `-` `_` `.` 以外を含むキーを拒否する。
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(invalid(key, "key is empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid(key, "key is too long (max 1024)"));
    }

    let decoded = urlencoding::decode(key).map_err(|_| invalid(key, "invalid URL encoding"))?;
    for segment in decoded.split('/') {
        check_segment(segment, key)?;
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid(key, "invalid characters in key"));
        }
    }

    Ok(())
}

/// ローカルストレージにそのまま使う名前を検証する
///
/// サニタイズしない保存経路向け。ルート直下の単一セグメントであることだけを要求する。
pub fn validate_segment(name: &str) -> Result<(), StorageError> {
    check_segment(name, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(validate_key("test.jpg").is_ok());
        assert!(validate_key("folder/image.png").is_ok());
        assert!(validate_key("2024/01/photo-123.webp").is_ok());
    }

    #[test]
    fn test_empty_key() {
        assert!(validate_key("").is_err());
        assert!(validate_key("folder/").is_err());
    }

    #[test]
    fn test_path_traversal() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("folder/../secret.txt").is_err());
        assert!(validate_key("//etc/passwd").is_err());
        assert!(validate_key("%2e%2e/etc/passwd").is_err());
        assert!(validate_key("a/./b.jpg").is_err());
        assert!(validate_key("a\\b.jpg").is_err());
    }

    #[test]
    fn test_dots_inside_segment_are_allowed() {
        assert!(validate_key("photo..v2.jpg").is_ok());
        assert!(validate_key("2024/archive.tar.gz").is_ok());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(validate_key("photo 1.jpg").is_err());
        assert!(validate_key("写真.jpg").is_err());
    }

    #[test]
    fn test_valid_segments() {
        assert!(validate_segment("photo.jpg").is_ok());
        assert!(validate_segment("写真 (1).jpg").is_ok());
    }

    #[test]
    fn test_invalid_segments() {
        assert!(validate_segment("").is_err());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment("a/b.jpg").is_err());
        assert!(validate_segment("a\\b.jpg").is_err());
        assert!(validate_segment(&"x".repeat(300)).is_err());
    }
}
