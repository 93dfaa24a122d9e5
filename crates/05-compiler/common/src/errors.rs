//! 错误类型定义
//!
//! 依赖解析问题以 [`crate::Diagnostic`] 数据形式收集，不走 `Err` 通道；
//! 这里的错误只覆盖让整次构建无法继续的基础设施故障。

use thiserror::Error;

/// 元数据错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("元数据取值解析失败: {message}")]
    ParseError { message: String },

    #[error("模块不存在: {path}")]
    ModuleNotFound { path: String },
}

impl ModelError {
    /// 创建解析错误
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }
}

/// 编译错误类型
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("元数据加载失败: {message}")]
    SourceError { message: String },

    #[error("元数据格式无效: {source}")]
    MetadataFormat {
        #[from]
        source: serde_json::Error,
    },

    #[error("文件读写失败: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("产物写出失败: {path}, 原因: {message}")]
    SinkError { path: String, message: String },

    #[error("编译任务执行失败: {message}")]
    TaskFailed { message: String },

    #[error("配置错误: {message}")]
    ConfigError { message: String },

    #[error("日志初始化失败: {message}")]
    LoggingError { message: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CompileError {
    /// 创建元数据加载错误
    pub fn source_error(message: impl Into<String>) -> Self {
        Self::SourceError {
            message: message.into(),
        }
    }

    /// 创建任务失败错误
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

/// 编译结果类型
pub type CompileResult<T> = Result<T, CompileError>;
