use std::path::Path;

use crate::constants::{MAX_ALLOCATION_ATTEMPTS, MAX_FILE_NAME_BYTES};
use crate::errors::StorageError;
use crate::naming::sanitize;
use crate::naming::sanitize::fit_within;

/// 衝突回避の候補名を順に返すイテレータ
///
/// `name`, `1-name`, `2-name`, ... の順で、上限に達すると終了する。
/// 接頭辞で区別するため拡張子は変わらない。
/// 接頭辞を付けると長さの上限を超える場合は、語幹の末尾を削って収める。
#[derive(Debug, Clone)]
pub struct Candidates {
    name: String,
    next: u32,
}

/// サニタイズ済みの名前から候補名のイテレータを作成する
pub fn candidates(safe_name: &str) -> Candidates {
    Candidates {
        name: safe_name.to_string(),
        next: 0,
    }
}

impl Iterator for Candidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= MAX_ALLOCATION_ATTEMPTS {
            return None;
        }
        let candidate = match self.next {
            0 => self.name.clone(),
            n => {
                let prefix = format!("{n}-");
                let rest = fit_within(&self.name, MAX_FILE_NAME_BYTES - prefix.len());
                format!("{prefix}{rest}")
            }
        };
        self.next += 1;
        Some(candidate)
    }
}

/// `directory` 内で既存オブジェクトと衝突しない名前を決める
///
/// `exists` には `directory` と候補名を結合したパスが渡される。
/// `exists` がエラーを返した場合は「存在しない」とは見なさずにそのまま返す。
///
/// 存在確認と作成の間に競合が起こり得るため、並行して書き込む場合は
/// [`candidates`] を使って排他的に作成する方を使うこと。
pub fn allocate<F>(directory: &Path, desired: &str, mut exists: F) -> Result<String, StorageError>
where
    F: FnMut(&Path) -> Result<bool, StorageError>,
{
    let safe = sanitize(desired);

    for candidate in candidates(&safe) {
        if !exists(&directory.join(&candidate))? {
            return Ok(candidate);
        }
        tracing::debug!(candidate = %candidate, "name already taken");
    }

    Err(StorageError::Exhausted {
        name: safe,
        attempts: MAX_ALLOCATION_ATTEMPTS,
    })
}
