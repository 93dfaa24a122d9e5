//! 候选索引抽象接口

use wiring_common::{Cardinality, ModuleId, Provider, Qualifier, TypeName};

/// 候选提供者
///
/// 排序即集合插槽的稳定顺序：先按模块声明顺序，再按模块内声明顺序（Bean 在模块插槽之前）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    /// 提供者所在模块
    pub module: ModuleId,
    /// 提供者
    pub provider: Provider,
    /// 取值基数
    pub cardinality: Cardinality,
    /// 是否为默认候选
    pub default: bool,
}

/// 候选查询 trait
///
/// 实现必须在并行解析开始前构建完成，查询期间只读。
pub trait CandidateLookup: Send + Sync {
    /// 在 `scope` 模块的可见范围内查找可赋值给 `required` 且限定符匹配 `filter` 的候选
    fn lookup(&self, scope: ModuleId, required: &TypeName, filter: Option<&Qualifier>) -> Vec<Candidate>;
}
