//! 诊断记录
//!
//! 每条诊断都是 `(错误种类, 位置, 说明)` 三元组，另可附带相关 Bean 列表与根因模块。
//! 诊断输出是调用方构建工具的消费契约，种类名称保持稳定。

use crate::metadata::SourcePosition;
use crate::model::ModuleId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 诊断种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// 同一可见范围内两个提供者共享 (类型, 限定符)
    #[serde(rename = "DuplicateBeanError")]
    DuplicateBean,
    /// `single` 插槽没有候选
    #[serde(rename = "UnsatisfiedDependencyError")]
    UnsatisfiedDependency,
    /// `single`/`optional` 插槽有多个候选且没有唯一默认
    #[serde(rename = "AmbiguousDependencyError")]
    AmbiguousDependency,
    /// 非延迟依赖形成环
    #[serde(rename = "CyclicDependencyError")]
    CyclicDependency,
    /// 声明本身不合法（名称、类型路径、连线目标等）
    #[serde(rename = "InvalidDeclarationError")]
    InvalidDeclaration,
    /// 依赖的模块解析失败而派生的错误
    #[serde(rename = "UpstreamResolutionError")]
    UpstreamResolution,
}

impl DiagnosticKind {
    /// 获取稳定的错误种类名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateBean => "DuplicateBeanError",
            Self::UnsatisfiedDependency => "UnsatisfiedDependencyError",
            Self::AmbiguousDependency => "AmbiguousDependencyError",
            Self::CyclicDependency => "CyclicDependencyError",
            Self::InvalidDeclaration => "InvalidDeclarationError",
            Self::UpstreamResolution => "UpstreamResolutionError",
        }
    }

    /// 是否为派生错误
    pub fn is_derived(self) -> bool {
        matches!(self, Self::UpstreamResolution)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 诊断位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// 模块路径
    pub module: String,
    /// Bean 名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bean: Option<String>,
    /// 插槽名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<String>,
    /// 源码位置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
}

impl Location {
    /// 创建模块级位置
    pub fn module(path: impl Into<String>) -> Self {
        Self {
            module: path.into(),
            bean: None,
            socket: None,
            position: None,
        }
    }

    /// 设置 Bean
    pub fn with_bean(mut self, bean: impl Into<String>) -> Self {
        self.bean = Some(bean.into());
        self
    }

    /// 设置插槽
    pub fn with_socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    /// 设置源码位置
    pub fn with_position(mut self, position: Option<SourcePosition>) -> Self {
        self.position = position;
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.module)?;
        if let Some(bean) = &self.bean {
            write!(f, ":{}", bean)?;
        }
        if let Some(socket) = &self.socket {
            write!(f, "#{}", socket)?;
        }
        if let Some(position) = &self.position {
            write!(f, " ({})", position)?;
        }
        Ok(())
    }
}

/// 诊断记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 错误种类
    pub kind: DiagnosticKind,
    /// 位置
    pub location: Location,
    /// 说明
    pub message: String,
    /// 相关 Bean（`模块路径:名称`），循环与歧义错误必定携带
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implicated: Vec<String>,
    /// 派生错误的根因模块路径
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub root_causes: Vec<String>,
    /// 所属模块
    #[serde(skip)]
    pub module_id: Option<ModuleId>,
}

impl Diagnostic {
    /// 创建新的诊断
    pub fn new(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
            implicated: Vec::new(),
            root_causes: Vec::new(),
            module_id: None,
        }
    }

    /// 绑定所属模块
    pub fn in_module(mut self, module: ModuleId) -> Self {
        self.module_id = Some(module);
        self
    }

    /// 设置相关 Bean
    pub fn with_implicated(mut self, implicated: Vec<String>) -> Self {
        self.implicated = implicated;
        self
    }

    /// 设置根因模块
    pub fn with_root_causes(mut self, root_causes: Vec<String>) -> Self {
        self.root_causes = root_causes;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)?;
        if !self.implicated.is_empty() {
            write!(f, " [{}]", self.implicated.join(", "))?;
        }
        if !self.root_causes.is_empty() {
            write!(f, " (根因: {})", self.root_causes.join(", "))?;
        }
        Ok(())
    }
}
