use crate::constants::{FALLBACK_FILE_NAME, MAX_FILE_NAME_BYTES};

/// Windows で予約されているデバイス名
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// 拡張子として保持する最大バイト数（ドットを含む）
const MAX_EXTENSION_BYTES: usize = 16;

/// 任意のファイル名を、ストレージルート直下に置ける単一のパスセグメントへ正規化する
///
/// - 英数字・`-`・`_`・`.` 以外の文字はすべて `-` に置換する
/// - 連続する `-` と `.` はそれぞれ 1 文字に畳み込む（`..` は残らない）
/// - 先頭・末尾の `.` と `-` を取り除く
/// - Windows の予約名には `_` を前置する
/// - 255 バイトを超える場合は拡張子を残して切り詰める
///
/// 失敗することはなく、何も残らなければ `file` を返す。
/// 語幹だけが消えた場合（`家族写真.jpg` など）は拡張子を残して `file.jpg` とする。
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            c
        } else {
            '-'
        };
        match (mapped, out.chars().last()) {
            ('-', Some('-')) | ('.', Some('.')) => {}
            _ => out.push(mapped),
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '-');
    if trimmed.is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }

    if let Some(extension) = orphaned_extension(raw, trimmed) {
        return fit_within(&format!("{FALLBACK_FILE_NAME}.{extension}"), MAX_FILE_NAME_BYTES);
    }

    let name = if is_reserved(trimmed) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    };

    fit_within(&name, MAX_FILE_NAME_BYTES)
}

/// 語幹がすべて置換で失われ、拡張子だけが残った場合にその拡張子を返す
fn orphaned_extension<'a>(raw: &str, trimmed: &'a str) -> Option<&'a str> {
    let raw_stem = raw.strip_suffix(trimmed)?.strip_suffix('.')?;
    raw_stem.chars().any(|c| c != '.').then_some(trimmed)
}

fn is_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
}

/// `limit` バイトに収まるよう、拡張子を残して語幹を切り詰める
pub(crate) fn fit_within(name: &str, limit: usize) -> String {
    if name.len() <= limit {
        return name.to_string();
    }

    let extension = match name.rfind('.') {
        Some(idx) if name.len() - idx <= MAX_EXTENSION_BYTES && idx > 0 => &name[idx..],
        _ => "",
    };
    let mut end = limit.saturating_sub(extension.len());
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let stem = name[..end].trim_end_matches(|c| c == '.' || c == '-');

    format!("{stem}{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_pass_through() {
        assert_eq!(sanitize("photo.jpg"), "photo.jpg");
        assert_eq!(sanitize("IMG_0001.PNG"), "IMG_0001.PNG");
        assert_eq!(sanitize("report-2024.tar.gz"), "report-2024.tar.gz");
    }

    #[test]
    fn test_path_traversal() {
        let safe = sanitize("../../etc/passwd");
        assert_eq!(safe, "etc-passwd");
        assert!(!safe.contains(".."));
        assert!(!safe.contains('/'));

        let safe = sanitize("..\\..\\windows\\system32\\config");
        assert!(!safe.contains(".."));
        assert!(!safe.contains('\\'));
    }

    #[test]
    fn test_separators_and_whitespace() {
        assert_eq!(sanitize("my holiday/photo 1.jpg"), "my-holiday-photo-1.jpg");
        assert_eq!(sanitize("C:\\Users\\me\\cat.png"), "C-Users-me-cat.png");
        assert_eq!(sanitize("a\tb\nc.txt"), "a-b-c.txt");
    }

    #[test]
    fn test_leading_dots_removed() {
        assert_eq!(sanitize(".htaccess"), "htaccess");
        assert_eq!(sanitize("...hidden..txt"), "hidden.txt");
    }

    #[test]
    fn test_non_ascii_degrades() {
        assert_eq!(sanitize("家族写真.jpg"), "file.jpg");
        assert_eq!(sanitize("写真.tar.gz"), "file.tar.gz");
        assert_eq!(sanitize("café.png"), "caf-.png");
    }

    #[test]
    fn test_empty_fallback() {
        assert_eq!(sanitize(""), "file");
        assert_eq!(sanitize("../.."), "file");
        assert_eq!(sanitize("///"), "file");
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(sanitize("con"), "_con");
        assert_eq!(sanitize("NUL.txt"), "_NUL.txt");
        assert_eq!(sanitize("console.txt"), "console.txt");
    }

    #[test]
    fn test_long_names_keep_extension() {
        let raw = format!("{}.jpeg", "a".repeat(400));
        let safe = sanitize(&raw);
        assert_eq!(safe.len(), MAX_FILE_NAME_BYTES);
        assert!(safe.ends_with(".jpeg"));
    }

    #[test]
    fn test_dotfiles_are_not_renamed() {
        assert_eq!(sanitize(".bashrc"), "bashrc");
        assert_eq!(sanitize("../../etc/passwd"), "etc-passwd");
    }

    #[test]
    fn test_fit_within_keeps_extension() {
        let name = format!("{}.png", "b".repeat(300));
        let fitted = fit_within(&name, 250);
        assert_eq!(fitted.len(), 250);
        assert!(fitted.ends_with(".png"));
        assert_eq!(fit_within("short.png", 250), "short.png");
    }

    #[test]
    fn test_deterministic() {
        let raw = "../we ird/../na:me?.png";
        assert_eq!(sanitize(raw), sanitize(raw));
    }
}
