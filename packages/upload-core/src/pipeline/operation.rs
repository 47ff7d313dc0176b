use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::constants::FLOAT_PRECISION;

/// 操作パラメータの値
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

// 浮動小数は小数点以下 6 桁の文字列として送る（ロケール非依存の表現にする）
impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_str(&format!("{v:.prec$}", prec = FLOAT_PRECISION)),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::String(v) => serializer.serialize_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u8> for ParamValue {
    fn from(v: u8) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// 名前付きの画像操作 1 件
///
/// パラメータはキー順に保持されるため、シリアライズ結果は常に同じになる。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    #[serde(rename = "operation")]
    name: String,
    params: BTreeMap<String, ParamValue>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// パラメータを設定する。同じキーは上書きされる。
    pub fn param(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }
}
