//! # Wiring Common
//!
//! 依赖注入容器编译器的公共层：元数据模型、诊断记录与命名工具。
//!
//! ## 核心类型
//!
//! - [`MetadataModel`] - 模块/Bean/插槽的元数据竞技场
//! - [`ModuleDeclaration`] - 前端解析后的声明输入
//! - [`Diagnostic`] - 结构化诊断记录
//! - [`CompileError`] - 基础设施错误
//!
//! ## 设计原则
//!
//! - 模块树以竞技场 + 父索引表示，不存在父子之间的循环所有权
//! - 限定符是仅支持相等比较的不透明令牌
//! - 每次构建都从空模型开始，不跨构建保留状态

pub mod diagnostics;
pub mod errors;
pub mod lifecycle;
pub mod metadata;
pub mod model;
pub mod naming;

pub use diagnostics::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
pub use model::*;
