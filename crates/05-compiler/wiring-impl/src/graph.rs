//! 依赖图构建与循环检测

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;
use wiring_abstractions::{CycleDetector, DependencyCycle, DependencyEdge, DependencyGraph};
use wiring_common::{Diagnostic, DiagnosticKind, MetadataModel, ModuleId, Provider, WireSet};

/// 由模型与连线构建依赖图
///
/// 节点是全部 Bean 与模块插槽；每条连线的每个目标产生一条 `需求方 -> 目标` 的边。
pub fn build_dependency_graph(model: &MetadataModel, wires: &WireSet) -> DependencyGraph {
    let nodes = model
        .beans()
        .iter()
        .map(|b| Provider::Bean(b.id))
        .chain(
            model
                .modules()
                .iter()
                .flat_map(|m| m.sockets.iter().map(|s| Provider::Socket(*s))),
        );
    let mut graph = DependencyGraph::new(nodes);

    for wire in wires.iter() {
        let from = model.requirer(wire.socket);
        for target in &wire.targets {
            graph.add_edge(DependencyEdge {
                from,
                to: *target,
                socket: wire.socket,
                lazy: wire.lazy,
            });
        }
    }

    debug!(
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        "依赖图构建完成"
    );
    graph
}

/// 强连通分量（迭代版 Tarjan）
///
/// 输入为按节点下标的邻接表，每个分量内的下标升序排列。
pub fn strongly_connected_components(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;

    let count = successors.len();
    let mut index = vec![UNVISITED; count];
    let mut lowlink = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut frames: Vec<(usize, usize)> = Vec::new();
    let mut components = Vec::new();
    let mut next_index = 0;

    for start in 0..count {
        if index[start] != UNVISITED {
            continue;
        }
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        frames.push((start, 0));

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            if let Some(&next) = successors[node].get(frame.1) {
                frame.1 += 1;
                if index[next] == UNVISITED {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    frames.push((next, 0));
                } else if on_stack[next] {
                    lowlink[node] = lowlink[node].min(index[next]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }
            if lowlink[node] == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }

    components
}

/// 强连通分量内经过最小节点的最短环
///
/// 从最小节点出发按后继升序做广度优先搜索，第一次回到起点时得到的路径即为结果。
/// 环上相邻节点之间都有真实的边；只有自环的单节点分量返回该节点本身。
pub fn cycle_walk(component: &[usize], successors: &[Vec<usize>]) -> Vec<usize> {
    let members: BTreeSet<usize> = component.iter().copied().collect();
    let Some(start) = members.first().copied() else {
        return Vec::new();
    };

    let mut parent: BTreeMap<usize, usize> = BTreeMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        let next_nodes: BTreeSet<usize> = successors[node]
            .iter()
            .copied()
            .filter(|next| members.contains(next))
            .collect();
        for next in next_nodes {
            if next == start {
                let mut walk = vec![node];
                let mut current = node;
                while let Some(&previous) = parent.get(&current) {
                    walk.push(previous);
                    current = previous;
                }
                walk.reverse();
                return walk;
            }
            if !parent.contains_key(&next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    vec![start]
}

/// 基于 Tarjan 算法的循环检测器
///
/// 延迟边不参与检测。节点数大于一的分量或带非延迟自环的单节点都视为循环。
#[derive(Debug, Clone, Copy, Default)]
pub struct TarjanCycleDetector;

impl TarjanCycleDetector {
    /// 创建检测器
    pub fn new() -> Self {
        Self
    }
}

impl CycleDetector for TarjanCycleDetector {
    fn detect_cycles(&self, graph: &DependencyGraph) -> Vec<DependencyCycle> {
        let successors = graph.successors(false);
        let nodes = graph.nodes();

        let mut cycles: Vec<DependencyCycle> = strongly_connected_components(&successors)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.has_self_edge(nodes[component[0]])
            })
            .map(|component| DependencyCycle {
                nodes: cycle_walk(&component, &successors)
                    .into_iter()
                    .map(|i| nodes[i])
                    .collect(),
                members: component.iter().map(|i| nodes[*i]).collect(),
            })
            .collect();
        cycles.sort_by(|a, b| a.nodes.first().cmp(&b.nodes.first()));

        debug!(cycles = cycles.len(), "循环检测完成");
        cycles
    }
}

/// 把循环转换为诊断
///
/// 分量涉及的每个模块各得到一条 `CyclicDependencyError`，相关 Bean 列表完全相同：
/// 先是环上的节点（按行走顺序），再是分量中其余节点。
pub fn cycle_diagnostics(model: &MetadataModel, cycles: &[DependencyCycle]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for cycle in cycles {
        let mut chain: Vec<String> = cycle.nodes.iter().map(|n| model.qualified_name(*n)).collect();
        let others: Vec<String> = cycle
            .members
            .iter()
            .filter(|n| !cycle.nodes.contains(n))
            .map(|n| model.qualified_name(*n))
            .collect();
        let mut implicated = chain.clone();
        implicated.extend(others.iter().cloned());

        if let Some(first) = chain.first().cloned() {
            chain.push(first);
        }
        let mut message = format!("检测到循环依赖: {}", chain.join(" -> "));
        if !others.is_empty() {
            message.push_str(&format!("（同一强连通分量还包括 {}）", others.join(", ")));
        }

        let ordered = cycle.nodes.iter().chain(cycle.members.iter().filter(|n| !cycle.nodes.contains(n)));
        let modules: BTreeSet<ModuleId> = ordered.clone().map(|n| model.provider_module(*n)).collect();
        for module in modules {
            let anchor = ordered
                .clone()
                .copied()
                .find(|n| model.provider_module(*n) == module);
            let location = match anchor {
                Some(node) => model.provider_location(node),
                None => wiring_common::Location::module(&model.module(module).path),
            };
            diagnostics.push(
                Diagnostic::new(DiagnosticKind::CyclicDependency, location, message.clone())
                    .with_implicated(implicated.clone())
                    .in_module(module),
            );
        }
    }
    diagnostics
}
