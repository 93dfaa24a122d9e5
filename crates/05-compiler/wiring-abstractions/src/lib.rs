//! # Wiring Abstractions
//!
//! 编译流水线的抽象层，定义每个阶段的核心接口。
//!
//! ## 核心接口
//!
//! - [`CandidateLookup`] - 候选索引查询接口
//! - [`SocketResolver`] - 插槽解析器接口
//! - [`CycleDetector`] - 循环依赖检测接口
//! - [`InstantiationPlanner`] - 实例化规划接口
//! - [`CodeEmitter`] - 代码生成接口
//! - [`MetadataSource`] / [`ArtifactSink`] - 元数据读取与产物写出接口

pub mod emitter;
pub mod graph;
pub mod index;
pub mod io;
pub mod planner;
pub mod resolver;

pub use emitter::*;
pub use graph::*;
pub use index::*;
pub use io::*;
pub use planner::*;
pub use resolver::*;
