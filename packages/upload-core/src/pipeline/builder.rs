use crate::errors::UploadError;
use crate::pipeline::operation::{Operation, ParamValue};

/// 順序付きの画像操作列
///
/// 操作は追加順に適用される。空のパイプラインも有効で、何も変換しない。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    operations: Vec<Operation>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// 操作を末尾に追加し、その操作への参照を返す
    pub fn add(&mut self, name: impl Into<String>) -> &mut Operation {
        self.operations.push(Operation::new(name));
        let last = self.operations.len() - 1;
        &mut self.operations[last]
    }

    /// 最後に追加した操作
    pub fn last_mut(&mut self) -> Option<&mut Operation> {
        self.operations.last_mut()
    }

    /// 最後に追加した操作にパラメータを設定する
    pub fn set_param(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<&mut Operation, UploadError> {
        let op = self
            .last_mut()
            .ok_or_else(|| UploadError::Input("no operation to set a parameter on".to_string()))?;
        op.param(key, value);
        Ok(op)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// `[{"operation": ..., "params": {...}}, ...]` 形式の JSON にする
    pub fn to_wire(&self) -> Result<String, UploadError> {
        Ok(serde_json::to_string(&self.operations)?)
    }

    /// クエリパラメータに埋め込むためにパーセントエンコードした JSON
    pub fn to_query_value(&self) -> Result<String, UploadError> {
        let wire = self.to_wire()?;
        Ok(urlencoding::encode(&wire).into_owned())
    }
}
