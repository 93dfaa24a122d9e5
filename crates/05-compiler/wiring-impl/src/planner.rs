//! 实例化规划器实现
//!
//! 规划分两层：
//!
//! - 全局顺序：对存活节点的非延迟边做 Kahn 排序，平局按 (模块序号, 插槽先于 Bean, 声明序号) 打破
//! - 模块计划：模块的构造单元是自身 Bean 与直接子模块，子模块整体构造；
//!   单元之间的循环（Bean 图无环但模块级有环）作为 `CyclicDependencyError` 报告

use crate::graph::{cycle_walk, strongly_connected_components};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};
use tracing::{debug, info};
use wiring_abstractions::{
    DeferredEdge, DependencyEdge, DependencyGraph, InstantiationPlan, InstantiationPlanner,
    ModulePlan, PlanOutcome, PlanStep,
};
use wiring_common::{
    BeanId, Diagnostic, DiagnosticKind, Lifetime, Location, MetadataModel, ModuleId, Provider,
    SocketId, SocketOwner, WireSet,
};

/// 默认实例化规划器
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInstantiationPlanner;

impl DefaultInstantiationPlanner {
    /// 创建规划器
    pub fn new() -> Self {
        Self
    }
}

impl InstantiationPlanner for DefaultInstantiationPlanner {
    fn plan(
        &self,
        model: &MetadataModel,
        wires: &WireSet,
        graph: &DependencyGraph,
        failed: &BTreeSet<ModuleId>,
    ) -> PlanOutcome {
        let deferred = deferred_edges(model, wires, failed);
        let mut plan = InstantiationPlan {
            order: global_order(model, graph, failed),
            modules: BTreeMap::new(),
            deferred: BTreeMap::new(),
        };
        let mut diagnostics = Vec::new();

        for module in model.modules() {
            if failed.contains(&module.id) {
                continue;
            }
            match plan_module(model, graph, &deferred, module.id) {
                Ok(module_plan) => {
                    plan.modules.insert(module.id, module_plan);
                }
                Err(cycles) => diagnostics.extend(cycles),
            }
        }
        plan.deferred = deferred;

        info!(
            beans = plan.order.len(),
            modules = plan.modules.len(),
            deferred = plan.deferred.len(),
            "实例化计划生成完成"
        );
        PlanOutcome { plan, diagnostics }
    }
}

/// 稳定的拓扑排序
///
/// `dependencies` 中的 `(a, b)` 表示 `a` 依赖 `b`；就绪节点中 `key` 最小者先出。
/// 残留在环上的节点不出现在结果中。
fn topological_order<K: Ord>(
    count: usize,
    dependencies: &[(usize, usize)],
    include: impl Fn(usize) -> bool,
    key: impl Fn(usize) -> K,
) -> Vec<usize> {
    let mut pending = vec![0usize; count];
    let mut dependents = vec![Vec::new(); count];
    for (dependent, dependency) in dependencies {
        pending[*dependent] += 1;
        dependents[*dependency].push(*dependent);
    }

    let mut ready: BinaryHeap<Reverse<(K, usize)>> = (0..count)
        .filter(|i| include(*i) && pending[*i] == 0)
        .map(|i| Reverse((key(i), i)))
        .collect();
    let mut order = Vec::with_capacity(count);
    while let Some(Reverse((_, node))) = ready.pop() {
        order.push(node);
        for dependent in &dependents[node] {
            pending[*dependent] -= 1;
            if pending[*dependent] == 0 {
                ready.push(Reverse((key(*dependent), *dependent)));
            }
        }
    }
    order
}

fn global_order(model: &MetadataModel, graph: &DependencyGraph, failed: &BTreeSet<ModuleId>) -> Vec<BeanId> {
    let nodes = graph.nodes();
    let alive = |node: Provider| !failed.contains(&model.provider_module(node));

    let dependencies: Vec<(usize, usize)> = graph
        .edges()
        .iter()
        .filter(|e| !e.lazy && alive(e.from) && alive(e.to))
        .filter_map(|e| Some((graph.node_index(e.from)?, graph.node_index(e.to)?)))
        .filter(|(from, to)| from != to)
        .collect();

    let key = |i: usize| match nodes[i] {
        Provider::Socket(id) => (model.socket(id).module, 0u8, id.0),
        Provider::Bean(id) => (model.bean(id).module, 1u8, id.0),
    };

    topological_order(nodes.len(), &dependencies, |i| alive(nodes[i]), key)
        .into_iter()
        .filter_map(|i| match nodes[i] {
            Provider::Bean(bean) => Some(bean),
            Provider::Socket(_) => None,
        })
        .collect()
}

/// 延迟边及其锚点模块
///
/// 锚点是需求方与目标的最近公共祖先；两者不在同一棵模块树中时取需求方的根模块。
fn deferred_edges(
    model: &MetadataModel,
    wires: &WireSet,
    failed: &BTreeSet<ModuleId>,
) -> BTreeMap<SocketId, DeferredEdge> {
    wires
        .iter()
        .filter(|wire| wire.lazy)
        .filter_map(|wire| {
            let SocketOwner::Bean(bean) = model.socket(wire.socket).owner else {
                return None;
            };
            let requirer = model.bean(bean).module;
            if failed.contains(&requirer) {
                return None;
            }
            let target = wire.targets.first().copied();
            let anchor = match target {
                Some(target) => model
                    .lowest_common_ancestor(requirer, model.provider_module(target))
                    .unwrap_or_else(|| model.ancestors(requirer).last().unwrap_or(requirer)),
                None => requirer,
            };
            Some((
                wire.socket,
                DeferredEdge {
                    socket: wire.socket,
                    bean,
                    target,
                    anchor,
                },
            ))
        })
        .collect()
}

fn plan_module(
    model: &MetadataModel,
    graph: &DependencyGraph,
    deferred: &BTreeMap<SocketId, DeferredEdge>,
    id: ModuleId,
) -> Result<ModulePlan, Vec<Diagnostic>> {
    let module = model.module(id);
    let units: Vec<PlanStep> = module
        .beans
        .iter()
        .map(|b| PlanStep::Bean(*b))
        .chain(module.children.iter().map(|c| PlanStep::Module(*c)))
        .collect();
    let unit_index: HashMap<PlanStep, usize> = units.iter().enumerate().map(|(i, u)| (*u, i)).collect();

    // 自身模块插槽是输入，不属于任何单元
    let unit_of = |node: Provider| -> Option<usize> {
        let owner = model.provider_module(node);
        let step = if owner == id {
            match node {
                Provider::Bean(bean) => PlanStep::Bean(bean),
                Provider::Socket(_) => return None,
            }
        } else {
            PlanStep::Module(model.child_containing(id, owner)?)
        };
        unit_index.get(&step).copied()
    };

    let mut imports = BTreeSet::new();
    let mut dependencies = Vec::new();
    let mut crossing: Vec<(usize, usize, DependencyEdge)> = Vec::new();
    for edge in graph.edges().iter().filter(|e| !e.lazy) {
        let from_module = model.provider_module(edge.from);
        if !model.is_within(from_module, id) {
            continue;
        }
        if from_module == id && matches!(edge.from, Provider::Socket(_)) {
            continue;
        }
        let Some(from) = unit_of(edge.from) else {
            continue;
        };
        if !model.is_within(model.provider_module(edge.to), id) {
            if let Provider::Bean(bean) = edge.to {
                imports.insert(bean);
            }
            continue;
        }
        let Some(to) = unit_of(edge.to) else {
            continue;
        };
        if from != to {
            dependencies.push((from, to));
            crossing.push((from, to, *edge));
        }
    }

    for edge in deferred.values().filter(|d| d.anchor == id) {
        if let Some(Provider::Bean(target)) = edge.target {
            if !model.is_within(model.bean(target).module, id) {
                imports.insert(target);
            }
        }
    }

    let mut successors = vec![Vec::new(); units.len()];
    for (from, to) in &dependencies {
        successors[*from].push(*to);
    }
    let cycles: Vec<Diagnostic> = strongly_connected_components(&successors)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| unit_cycle_diagnostic(model, id, &units, &successors, &crossing, &component))
        .collect();
    if !cycles.is_empty() {
        return Err(cycles);
    }

    let steps: Vec<PlanStep> = topological_order(units.len(), &dependencies, |_| true, |i| i)
        .into_iter()
        .map(|i| units[i])
        .collect();

    let deferred_in = deferred
        .values()
        .filter(|d| d.anchor != id && model.is_within(id, d.anchor))
        .filter(|d| model.is_within(model.bean(d.bean).module, id))
        .map(|d| d.socket)
        .collect();
    let deferred_owned = deferred
        .values()
        .filter(|d| d.anchor == id)
        .map(|d| d.socket)
        .collect();

    let own_beans = steps.iter().filter_map(|step| match step {
        PlanStep::Bean(bean) => Some(*bean),
        PlanStep::Module(_) => None,
    });
    let (singletons, per_request): (Vec<BeanId>, Vec<BeanId>) =
        own_beans.partition(|bean| model.bean(*bean).lifetime == Lifetime::Singleton);

    debug!(
        module = %module.path,
        steps = steps.len(),
        imports = imports.len(),
        "模块构造计划完成"
    );
    Ok(ModulePlan {
        module: id,
        steps,
        imports: imports.into_iter().collect(),
        deferred_in,
        deferred_owned,
        singletons,
        per_request,
    })
}

fn unit_cycle_diagnostic(
    model: &MetadataModel,
    id: ModuleId,
    units: &[PlanStep],
    successors: &[Vec<usize>],
    crossing: &[(usize, usize, DependencyEdge)],
    component: &[usize],
) -> Diagnostic {
    let unit_name = |unit: PlanStep| match unit {
        PlanStep::Bean(bean) => model.qualified_name(Provider::Bean(bean)),
        PlanStep::Module(child) => format!("模块 {}", model.module(child).path),
    };
    let mut chain: Vec<String> = cycle_walk(component, successors)
        .into_iter()
        .map(|i| unit_name(units[i]))
        .collect();
    if let Some(first) = chain.first().cloned() {
        chain.push(first);
    }

    let implicated: BTreeSet<Provider> = crossing
        .iter()
        .filter(|(from, to, _)| component.contains(from) && component.contains(to))
        .flat_map(|(_, _, edge)| [edge.from, edge.to])
        .collect();
    let module = model.module(id);

    Diagnostic::new(
        DiagnosticKind::CyclicDependency,
        Location::module(&module.path).with_position(module.position.clone()),
        format!("模块 `{}` 的构造单元之间存在循环: {}", module.path, chain.join(" -> ")),
    )
    .with_implicated(implicated.into_iter().map(|p| model.qualified_name(p)).collect())
    .in_module(id)
}
