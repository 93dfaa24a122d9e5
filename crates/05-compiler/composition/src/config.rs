//! 编译器配置
//!
//! 配置来源按优先级从低到高：内置默认值、TOML 配置文件、`WIRING__` 前缀的环境变量。
//! 嵌套键使用双下划线分隔，例如 `WIRING__LOGGING__LEVEL=debug`。

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use wiring_common::CompileError;
use wiring_impl::emitter::DEFAULT_HEADER;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "WIRING";

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置源加载失败
    #[error("配置加载失败: {source}")]
    Load {
        /// 底层错误
        #[from]
        source: config::ConfigError,
    },

    /// TOML 解析失败
    #[error("TOML 解析失败: {source}")]
    Toml {
        /// 底层错误
        #[from]
        source: toml::de::Error,
    },

    /// TOML 序列化失败
    #[error("TOML 序列化失败: {source}")]
    TomlSerialize {
        /// 底层错误
        #[from]
        source: toml::ser::Error,
    },

    /// 配置值无效
    #[error("配置值无效: {key}, 原因: {message}")]
    Invalid {
        /// 配置键
        key: String,
        /// 原因
        message: String,
    },
}

impl From<ConfigError> for CompileError {
    fn from(error: ConfigError) -> Self {
        CompileError::config_error(error.to_string())
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// `EnvFilter` 指令，存在时覆盖 `level`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filter: None,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            filter: None,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            filter: None,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 实际生效的过滤指令
    pub fn directives(&self) -> &str {
        self.filter.as_deref().unwrap_or(&self.level)
    }
}

/// 编译器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// 并行处理的模块数上限
    pub max_parallel_modules: usize,
    /// 是否同时写出模块描述符 JSON
    pub emit_descriptors: bool,
    /// 生成文件的文件头
    pub header: String,
    /// 存在诊断时命令行以失败状态退出
    pub fail_on_diagnostics: bool,
    /// 日志配置
    pub logging: LoggingConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_parallel_modules: std::thread::available_parallelism().map_or(4, |n| n.get()),
            emit_descriptors: true,
            header: DEFAULT_HEADER.to_string(),
            fail_on_diagnostics: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl CompilerConfig {
    /// 从配置文件（可选）与环境变量加载
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("加载配置文件: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 校验配置值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel_modules == 0 {
            return Err(ConfigError::Invalid {
                key: "max_parallel_modules".to_string(),
                message: "必须大于 0".to_string(),
            });
        }
        if self.logging.directives().trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "logging.level".to_string(),
                message: "不能为空".to_string(),
            });
        }
        Ok(())
    }
}
