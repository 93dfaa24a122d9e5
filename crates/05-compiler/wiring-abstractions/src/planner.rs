//! 实例化规划抽象接口

use crate::graph::DependencyGraph;
use std::collections::{BTreeMap, BTreeSet};
use wiring_common::{BeanId, Diagnostic, MetadataModel, ModuleId, Provider, SocketId, WireSet};

/// 模块构造步骤
///
/// 子模块作为整体构造，是其父模块的一个步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlanStep {
    /// 构造本模块的 Bean
    Bean(BeanId),
    /// 构造子模块
    Module(ModuleId),
}

/// 延迟边
///
/// 单元格在 `anchor` 模块（需求方与目标的最近公共祖先）构造开始时创建，
/// 沿子模块输入向下传递到需求方，并在 `anchor` 全部构造完成后回填。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredEdge {
    /// 延迟插槽
    pub socket: SocketId,
    /// 需求方 Bean
    pub bean: BeanId,
    /// 目标，`optional` 插槽可能没有目标
    pub target: Option<Provider>,
    /// 创建并回填单元格的模块
    pub anchor: ModuleId,
}

/// 单个模块的构造计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePlan {
    /// 模块
    pub module: ModuleId,
    /// 构造步骤（已拓扑排序）
    pub steps: Vec<PlanStep>,
    /// 需要从子树外部传入的 Bean
    pub imports: Vec<BeanId>,
    /// 由上层传入的延迟单元格
    pub deferred_in: Vec<SocketId>,
    /// 本模块创建并回填的延迟单元格
    pub deferred_owned: Vec<SocketId>,
    /// 启动时构造一次的 Bean
    pub singletons: Vec<BeanId>,
    /// 按请求构造的 Bean
    pub per_request: Vec<BeanId>,
}

/// 整体实例化计划
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstantiationPlan {
    /// 全局构造顺序，每个 Bean 都排在其全部非延迟依赖之后
    pub order: Vec<BeanId>,
    /// 各模块计划，只包含未失败的模块
    pub modules: BTreeMap<ModuleId, ModulePlan>,
    /// 延迟边
    pub deferred: BTreeMap<SocketId, DeferredEdge>,
}

impl InstantiationPlan {
    /// 获取模块计划
    pub fn module(&self, module: ModuleId) -> Option<&ModulePlan> {
        self.modules.get(&module)
    }

    /// 获取延迟边
    pub fn deferred_edge(&self, socket: SocketId) -> Option<&DeferredEdge> {
        self.deferred.get(&socket)
    }
}

/// 规划结果
#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    /// 计划
    pub plan: InstantiationPlan,
    /// 规划中发现的问题（模块级循环）
    pub diagnostics: Vec<Diagnostic>,
}

/// 实例化规划器 trait
pub trait InstantiationPlanner: Send + Sync {
    /// 为所有未失败的模块生成计划
    fn plan(
        &self,
        model: &MetadataModel,
        wires: &WireSet,
        graph: &DependencyGraph,
        failed: &BTreeSet<ModuleId>,
    ) -> PlanOutcome;
}
