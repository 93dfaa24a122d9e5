//! 编译器构建器

use crate::compiler::ContainerCompiler;
use crate::config::{CompilerConfig, LoggingConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wiring_abstractions::{CodeEmitter, CycleDetector, InstantiationPlanner, SocketResolver};
use wiring_common::{CompileError, CompileResult};
use wiring_impl::{DefaultInstantiationPlanner, DefaultSocketResolver, RustCodeEmitter, TarjanCycleDetector};

/// 编译器构建器
///
/// 使用建造者模式组装编译流水线，未指定的阶段使用默认实现。
pub struct CompilerBuilder {
    /// 编译器配置
    config: CompilerConfig,
    /// 是否启用日志初始化
    logging_enabled: bool,
    /// 插槽解析器
    resolver: Option<Arc<dyn SocketResolver>>,
    /// 循环检测器
    cycle_detector: Option<Arc<dyn CycleDetector>>,
    /// 实例化规划器
    planner: Option<Arc<dyn InstantiationPlanner>>,
    /// 代码生成器
    emitter: Option<Arc<dyn CodeEmitter>>,
}

impl CompilerBuilder {
    /// 创建新的编译器构建器
    pub fn new() -> Self {
        Self {
            config: CompilerConfig::default(),
            logging_enabled: false,
            resolver: None,
            cycle_detector: None,
            planner: None,
            emitter: None,
        }
    }

    /// 使用给定配置
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// 从配置文件（可选）与 `WIRING__*` 环境变量加载配置
    pub fn load_config(mut self, path: Option<&Path>) -> CompileResult<Self> {
        self.config = CompilerConfig::load(path)?;
        info!("编译器配置加载完成");
        Ok(self)
    }

    /// 启用日志初始化
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self.logging_enabled = true;
        self
    }

    /// 按当前配置中的日志设置启用日志初始化
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// 设置并行处理的模块数上限
    pub fn max_parallel_modules(mut self, limit: usize) -> Self {
        self.config.max_parallel_modules = limit;
        self
    }

    /// 使用自定义插槽解析器
    pub fn with_resolver(mut self, resolver: Arc<dyn SocketResolver>) -> Self {
        debug!("使用自定义插槽解析器");
        self.resolver = Some(resolver);
        self
    }

    /// 使用自定义循环检测器
    pub fn with_cycle_detector(mut self, detector: Arc<dyn CycleDetector>) -> Self {
        debug!("使用自定义循环检测器");
        self.cycle_detector = Some(detector);
        self
    }

    /// 使用自定义实例化规划器
    pub fn with_planner(mut self, planner: Arc<dyn InstantiationPlanner>) -> Self {
        debug!("使用自定义实例化规划器");
        self.planner = Some(planner);
        self
    }

    /// 使用自定义代码生成器
    pub fn with_emitter(mut self, emitter: Arc<dyn CodeEmitter>) -> Self {
        debug!("使用自定义代码生成器");
        self.emitter = Some(emitter);
        self
    }

    /// 构建编译器
    pub fn build(self) -> CompileResult<ContainerCompiler> {
        self.config.validate()?;

        if self.logging_enabled {
            initialize_logging(&self.config.logging)?;
        }

        let emitter = self
            .emitter
            .unwrap_or_else(|| Arc::new(RustCodeEmitter::with_header(self.config.header.clone())));

        info!(
            max_parallel_modules = self.config.max_parallel_modules,
            "编译器构建完成"
        );
        Ok(ContainerCompiler::new(
            self.config,
            self.resolver.unwrap_or_else(|| Arc::new(DefaultSocketResolver::new())),
            self.cycle_detector.unwrap_or_else(|| Arc::new(TarjanCycleDetector::new())),
            self.planner.unwrap_or_else(|| Arc::new(DefaultInstantiationPlanner::new())),
            emitter,
        ))
    }
}

impl Default for CompilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 初始化全局日志订阅者
///
/// 进程内只能成功一次，重复调用返回 [`CompileError::LoggingError`]。
pub fn initialize_logging(config: &LoggingConfig) -> CompileResult<()> {
    let filter = EnvFilter::try_new(config.directives()).map_err(|e| CompileError::LoggingError {
        message: format!("过滤指令 `{}` 无效: {}", config.directives(), e),
    })?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_file(config.show_file)
        .with_line_number(config.show_line_number)
        .with_writer(std::io::stderr);

    if config.json_format {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    }
    .map_err(|e| CompileError::LoggingError {
        message: e.to_string(),
    })?;

    info!("日志系统初始化完成");
    Ok(())
}
