//! Bean 生命周期、可见性与插槽多重性

use crate::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bean 生命周期类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// 单例模式 - 模块启动时构造一次
    #[default]
    Singleton,
    /// 按请求模式 - 每次请求重新构造，单例依赖复用
    PerRequest,
}

impl Lifetime {
    /// 获取生命周期名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::PerRequest => "per_request",
        }
    }
}

impl std::str::FromStr for Lifetime {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(Self::Singleton),
            "per_request" | "per-request" | "prototype" => Ok(Self::PerRequest),
            _ => Err(ModelError::parse_error(format!("未知的生命周期: {}", s))),
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bean 可见性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// 对父模块、子模块和显式连线的兄弟模块可见
    Public,
    /// 仅模块内部可见
    #[default]
    Private,
}

impl Visibility {
    /// 是否对外暴露
    pub fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

impl std::str::FromStr for Visibility {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            _ => Err(ModelError::parse_error(format!("未知的可见性: {}", s))),
        }
    }
}

/// 插槽多重性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    /// 恰好一个
    #[default]
    Single,
    /// 零个或一个
    Optional,
    /// 零个或多个
    Collection,
}

impl Multiplicity {
    /// 获取多重性名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Optional => "optional",
            Self::Collection => "collection",
        }
    }

    /// 作为候选提供者时能保证的取值基数
    pub fn cardinality(self) -> Cardinality {
        match self {
            Self::Single => Cardinality::One,
            Self::Optional => Cardinality::MaybeOne,
            Self::Collection => Cardinality::Many,
        }
    }

    /// 判断该多重性的插槽能否接收给定基数的候选
    pub fn accepts(self, cardinality: Cardinality) -> bool {
        match self {
            Self::Single => cardinality == Cardinality::One,
            Self::Optional => cardinality != Cardinality::Many,
            Self::Collection => true,
        }
    }
}

impl std::str::FromStr for Multiplicity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "optional" => Ok(Self::Optional),
            "collection" | "multiple" => Ok(Self::Collection),
            _ => Err(ModelError::parse_error(format!("未知的插槽多重性: {}", s))),
        }
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 候选提供者的取值基数
///
/// Bean 总是恰好提供一个值；模块插槽作为候选时继承其多重性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// 恰好一个
    One,
    /// 可能缺失
    MaybeOne,
    /// 多个
    Many,
}
