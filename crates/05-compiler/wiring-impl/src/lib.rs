//! # Wiring Impl
//!
//! 编译流水线各阶段的默认实现：
//!
//! 1. [`ScopeIndexes`] 为每个模块的可见范围建立候选索引
//! 2. [`DefaultSocketResolver`] 按多重性规则把插槽解析为连线
//! 3. [`build_dependency_graph`] + [`TarjanCycleDetector`] 建图并检测循环
//! 4. [`propagate_failures`] 把失败传播给依赖它的模块
//! 5. [`DefaultInstantiationPlanner`] 计算确定性的构造顺序
//! 6. [`RustCodeEmitter`] 生成 Rust 装配代码与模块描述符
//! 7. [`DiagnosticsReporter`] 汇总全部诊断

pub mod candidate_index;
pub mod diagnostics;
pub mod emitter;
pub mod graph;
pub mod planner;
pub mod propagation;
pub mod resolver;

pub use candidate_index::*;
pub use diagnostics::*;
pub use emitter::RustCodeEmitter;
pub use graph::*;
pub use planner::*;
pub use propagation::*;
pub use resolver::*;
