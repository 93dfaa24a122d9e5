//! 依赖图与循环检测抽象接口

use std::collections::HashMap;
use wiring_common::{Provider, SocketId};

/// 依赖边：`from` 需要 `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    /// 需求方
    pub from: Provider,
    /// 被依赖方
    pub to: Provider,
    /// 产生该边的插槽
    pub socket: SocketId,
    /// 是否为延迟边
    pub lazy: bool,
}

/// 依赖图
///
/// 节点是 Bean 与模块插槽，按 [`Provider`] 顺序存放；边按加入顺序存放。
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Provider>,
    index: HashMap<Provider, usize>,
    edges: Vec<DependencyEdge>,
    outgoing: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// 以给定节点创建空图
    pub fn new(nodes: impl IntoIterator<Item = Provider>) -> Self {
        let mut nodes: Vec<Provider> = nodes.into_iter().collect();
        nodes.sort_unstable();
        nodes.dedup();
        let index = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let outgoing = vec![Vec::new(); nodes.len()];
        Self {
            nodes,
            index,
            edges: Vec::new(),
            outgoing,
        }
    }

    /// 添加边，端点不在图中时忽略并返回 `false`
    pub fn add_edge(&mut self, edge: DependencyEdge) -> bool {
        let (Some(from), Some(_)) = (self.index.get(&edge.from), self.index.get(&edge.to)) else {
            return false;
        };
        self.outgoing[*from].push(self.edges.len());
        self.edges.push(edge);
        true
    }

    /// 全部节点
    pub fn nodes(&self) -> &[Provider] {
        &self.nodes
    }

    /// 全部边
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// 节点下标
    pub fn node_index(&self, node: Provider) -> Option<usize> {
        self.index.get(&node).copied()
    }

    /// 节点的出边
    pub fn outgoing(&self, node: Provider) -> impl Iterator<Item = &DependencyEdge> {
        let edges = self
            .node_index(node)
            .map(|i| self.outgoing[i].as_slice())
            .unwrap_or_default();
        edges.iter().map(move |e| &self.edges[*e])
    }

    /// 邻接表（按节点下标），可选择是否包含延迟边
    pub fn successors(&self, include_lazy: bool) -> Vec<Vec<usize>> {
        self.outgoing
            .iter()
            .map(|edges| {
                edges
                    .iter()
                    .map(|e| &self.edges[*e])
                    .filter(|e| include_lazy || !e.lazy)
                    .filter_map(|e| self.node_index(e.to))
                    .collect()
            })
            .collect()
    }

    /// 是否存在 `node -> node` 的非延迟自环
    pub fn has_self_edge(&self, node: Provider) -> bool {
        self.outgoing(node).any(|e| !e.lazy && e.to == node)
    }
}

/// 依赖循环
///
/// `nodes` 是强连通分量内一条真实存在的简单环，按行走顺序排列；
/// `members` 是整个分量，分量不是单个简单环时比 `nodes` 多。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCycle {
    /// 环上的节点
    pub nodes: Vec<Provider>,
    /// 分量的全部节点（升序）
    pub members: Vec<Provider>,
}

/// 循环依赖检测器
pub trait CycleDetector: Send + Sync {
    /// 检测图中全部非延迟循环
    fn detect_cycles(&self, graph: &DependencyGraph) -> Vec<DependencyCycle>;
}
