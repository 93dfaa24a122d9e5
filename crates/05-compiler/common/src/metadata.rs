//! 元数据定义
//!
//! 提供类型名、限定符和源码位置等基础值类型

use serde::{Deserialize, Serialize};
use std::fmt;

/// 类型名称
///
/// 保存 Rust 类型路径文本，例如 `crate::db::Pool` 或 `dyn crate::Handler`。
/// 空白会被规整为单个空格，因此 `dyn  Foo` 与 `dyn Foo` 视为同一类型。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TypeName(String);

impl TypeName {
    /// 创建新的类型名称
    pub fn new(name: impl Into<String>) -> Self {
        let raw: String = name.into();
        Self(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// 获取完整类型路径
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 获取简短的类型名称（不包含模块路径和 `dyn` 前缀）
    pub fn short_name(&self) -> &str {
        let name = self.0.strip_prefix("dyn ").unwrap_or(&self.0);
        let name = name.split('<').next().unwrap_or(name);
        name.rsplit("::").next().unwrap_or(name)
    }

    /// 是否为空类型名
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for TypeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<TypeName> for String {
    fn from(value: TypeName) -> Self {
        value.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 限定符
///
/// 附加在 Bean 与插槽过滤条件上的不透明区分值，只做相等比较。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qualifier(String);

impl Qualifier {
    /// 创建新的限定符
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 获取限定符文本
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 检查限定符是否满足过滤条件
    ///
    /// 缺省过滤条件匹配任意限定符（包括无限定符），存在时要求完全相等。
    pub fn matches(candidate: Option<&Qualifier>, filter: Option<&Qualifier>) -> bool {
        match filter {
            None => true,
            Some(expected) => candidate == Some(expected),
        }
    }
}

impl From<&str> for Qualifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 源码位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    /// 文件路径
    pub file: String,
    /// 行号（从 1 开始）
    pub line: u32,
    /// 列号（从 1 开始）
    pub column: u32,
}

impl SourcePosition {
    /// 创建新的源码位置
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
