//! 插槽解析器抽象接口

use crate::index::CandidateLookup;
use wiring_common::{Diagnostic, MetadataModel, ModuleId, Wire};

/// 单个模块的解析结果
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// 成功解析的连线
    pub wires: Vec<Wire>,
    /// 解析中发现的问题
    pub diagnostics: Vec<Diagnostic>,
}

/// 插槽解析器 trait
///
/// 只依赖已构建好的索引，不做图遍历，也不检测循环。
pub trait SocketResolver: Send + Sync {
    /// 解析模块内全部 Bean 插槽，以及其直接子模块的模块插槽（在本模块可见范围内解析）
    fn resolve_module(
        &self,
        model: &MetadataModel,
        index: &dyn CandidateLookup,
        module: ModuleId,
    ) -> Resolution;
}
