//! 失败传播
//!
//! 模块 A 依赖模块 B，当 A 的构造需要 B 的构造结果：
//! 父模块依赖每个子模块；连线的求值模块依赖目标所在模块。
//! 求值模块对 Bean 插槽是 Bean 所在模块，对模块插槽是该模块的父模块。

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use wiring_common::{
    Diagnostic, DiagnosticKind, Location, MetadataModel, ModuleId, SocketOwner, WireSet,
};

/// 模块依赖关系：模块 -> 它依赖的模块
pub type ModuleDependencies = BTreeMap<ModuleId, BTreeSet<ModuleId>>;

/// 计算模块之间的依赖
pub fn module_dependencies(model: &MetadataModel, wires: &WireSet) -> ModuleDependencies {
    let mut dependencies: ModuleDependencies =
        model.modules().iter().map(|m| (m.id, BTreeSet::new())).collect();

    for module in model.modules() {
        if let Some(parent) = module.parent {
            dependencies.entry(parent).or_default().insert(module.id);
        }
    }

    for wire in wires.iter() {
        let socket = model.socket(wire.socket);
        let evaluator = match socket.owner {
            SocketOwner::Bean(bean) => Some(model.bean(bean).module),
            SocketOwner::Module(module) => model.module(module).parent,
        };
        let Some(evaluator) = evaluator else {
            continue;
        };
        for target in &wire.targets {
            let owner = model.provider_module(*target);
            if owner != evaluator {
                dependencies.entry(evaluator).or_default().insert(owner);
            }
        }
    }

    dependencies
}

/// 失败传播结果
#[derive(Debug, Clone, Default)]
pub struct FailureReport {
    /// 直接失败与派生失败的全部模块
    pub failed: BTreeSet<ModuleId>,
    /// 派生的 `UpstreamResolutionError`
    pub upstream: Vec<Diagnostic>,
}

impl FailureReport {
    /// 模块是否失败
    pub fn is_failed(&self, module: ModuleId) -> bool {
        self.failed.contains(&module)
    }
}

/// 把直接失败传播给所有（传递地）依赖它们的模块
///
/// 每个派生失败的模块得到一条诊断，根因是它能到达的直接失败模块。
pub fn propagate_failures(
    model: &MetadataModel,
    dependencies: &ModuleDependencies,
    direct: &BTreeSet<ModuleId>,
) -> FailureReport {
    let mut report = FailureReport {
        failed: direct.clone(),
        upstream: Vec::new(),
    };

    for module in model.modules() {
        if direct.contains(&module.id) {
            continue;
        }
        let causes = root_causes(dependencies, direct, module.id);
        if causes.is_empty() {
            continue;
        }

        let paths: Vec<String> = causes.iter().map(|c| model.module(*c).path.clone()).collect();
        warn!(module = %module.path, causes = ?paths, "模块因上游失败而跳过");
        report.failed.insert(module.id);
        report.upstream.push(
            Diagnostic::new(
                DiagnosticKind::UpstreamResolution,
                Location::module(&module.path).with_position(module.position.clone()),
                format!("依赖的模块解析失败: {}", paths.join(", ")),
            )
            .with_root_causes(paths)
            .in_module(module.id),
        );
    }

    debug!(
        direct = direct.len(),
        upstream = report.upstream.len(),
        "失败传播完成"
    );
    report
}

fn root_causes(
    dependencies: &ModuleDependencies,
    direct: &BTreeSet<ModuleId>,
    start: ModuleId,
) -> BTreeSet<ModuleId> {
    let mut causes = BTreeSet::new();
    let mut visited = BTreeSet::from([start]);
    let mut pending = vec![start];

    while let Some(current) = pending.pop() {
        for next in dependencies.get(&current).into_iter().flatten() {
            if !visited.insert(*next) {
                continue;
            }
            if direct.contains(next) {
                causes.insert(*next);
            } else {
                pending.push(*next);
            }
        }
    }
    causes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate_index::ScopeIndexes;
    use crate::resolver::DefaultSocketResolver;
    use wiring_abstractions::SocketResolver;
    use wiring_common::{BeanDeclaration, ModuleDeclaration, SocketDeclaration};

    fn resolve(declarations: &[ModuleDeclaration]) -> (MetadataModel, WireSet) {
        let (model, _) = MetadataModel::build(declarations);
        let (indexes, _) = ScopeIndexes::build(&model);
        let mut wires = WireSet::new();
        for module in model.modules() {
            wires.extend(DefaultSocketResolver::new().resolve_module(&model, &indexes, module.id).wires);
        }
        (model, wires)
    }

    fn sample() -> Vec<ModuleDeclaration> {
        vec![ModuleDeclaration::new("app")
            .with_module(
                ModuleDeclaration::new("db")
                    .with_bean(BeanDeclaration::new("pool", "crate::Pool").public()),
            )
            .with_module(
                ModuleDeclaration::new("web").with_wired_module("db").with_bean(
                    BeanDeclaration::new("router", "crate::Router")
                        .with_socket(SocketDeclaration::single("pool", "crate::Pool")),
                ),
            )
            .with_module(ModuleDeclaration::new("jobs").with_bean(BeanDeclaration::new("worker", "crate::Worker")))]
    }

    #[test]
    fn test_module_dependencies() {
        let (model, wires) = resolve(&sample());
        let dependencies = module_dependencies(&model, &wires);
        let app = model.module_by_path("app").unwrap();
        let db = model.module_by_path("app.db").unwrap();
        let web = model.module_by_path("app.web").unwrap();
        let jobs = model.module_by_path("app.jobs").unwrap();

        assert_eq!(dependencies[&app], BTreeSet::from([db, web, jobs]));
        assert_eq!(dependencies[&web], BTreeSet::from([db]));
        assert!(dependencies[&jobs].is_empty());
    }

    #[test]
    fn test_failure_reaches_parent_and_wired_sibling_only() {
        let (model, wires) = resolve(&sample());
        let dependencies = module_dependencies(&model, &wires);
        let db = model.module_by_path("app.db").unwrap();

        let report = propagate_failures(&model, &dependencies, &BTreeSet::from([db]));
        let failed: Vec<&str> = report.failed.iter().map(|m| model.module(*m).path.as_str()).collect();
        assert_eq!(failed, vec!["app", "app.db", "app.web"]);
        assert!(!report.is_failed(model.module_by_path("app.jobs").unwrap()));

        assert_eq!(report.upstream.len(), 2);
        assert!(report
            .upstream
            .iter()
            .all(|d| d.kind == DiagnosticKind::UpstreamResolution && d.root_causes == vec!["app.db"]));
    }

    #[test]
    fn test_root_causes_stop_at_direct_failures() {
        let (model, wires) = resolve(&sample());
        let dependencies = module_dependencies(&model, &wires);
        let db = model.module_by_path("app.db").unwrap();
        let web = model.module_by_path("app.web").unwrap();

        let report = propagate_failures(&model, &dependencies, &BTreeSet::from([db, web]));
        assert_eq!(report.upstream.len(), 1);
        assert_eq!(report.upstream[0].location.module, "app");
        assert_eq!(report.upstream[0].root_causes, vec!["app.db", "app.web"]);
    }

    #[test]
    fn test_no_failures_no_diagnostics() {
        let (model, wires) = resolve(&sample());
        let report = propagate_failures(&model, &module_dependencies(&model, &wires), &BTreeSet::new());
        assert!(report.failed.is_empty());
        assert!(report.upstream.is_empty());
    }
}
