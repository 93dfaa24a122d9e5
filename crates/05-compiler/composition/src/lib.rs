//! # 编译器组合层
//!
//! 这个 crate 把编译流水线的各个阶段组合成一个可直接使用的编译器，
//! 并负责配置加载、日志初始化以及元数据读取和产物写出。
//!
//! ## 主要功能
//!
//! - **编译器构建器**: 使用构建者模式组装流水线，可替换任意阶段
//! - **配置管理**: TOML 文件与 `WIRING__*` 环境变量
//! - **并行编译**: 按模块并行解析与生成，受 `max_parallel_modules` 限制
//! - **构建报告**: 构建编号、时间戳与每个模块的结果
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use wiring_composition::{CompilerBuilder, DirectoryArtifactSink, JsonMetadataSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let compiler = CompilerBuilder::new().load_config(None)?.build()?;
//!
//!     let source = JsonMetadataSource::new("wiring.json");
//!     let sink = DirectoryArtifactSink::new("src/generated");
//!     let report = compiler.compile_into(&source, &sink).await?;
//!
//!     print!("{}", report.render_text());
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod compiler;
pub mod config;
pub mod report;
pub mod sinks;
pub mod sources;

// 重新导出主要类型
pub use builder::{initialize_logging, CompilerBuilder};
pub use compiler::ContainerCompiler;
pub use config::{CompilerConfig, ConfigError, LoggingConfig};
pub use report::{BuildOutput, BuildReport, ModuleOutcome, ModuleReport};
pub use sinks::{DirectoryArtifactSink, MemoryArtifactSink, SinkError};
pub use sources::{JsonMetadataSource, StaticMetadataSource};
