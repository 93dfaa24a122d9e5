//! 容器编译器
//!
//! 一次构建的完整流程：
//!
//! 1. 由声明构建元数据模型并为每个模块的可见范围建立候选索引
//! 2. 按模块并行解析插槽
//! 3. 建立依赖图并检测循环
//! 4. 传播失败并规划实例化顺序，规划发现新的失败时重新传播
//! 5. 按模块并行生成代码
//! 6. 最终传播失败，丢弃失败模块的产物并生成报告

use crate::config::CompilerConfig;
use crate::report::{BuildOutput, BuildReport, ModuleOutcome, ModuleReport};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wiring_abstractions::{
    ArtifactSink, CodeEmitter, CycleDetector, EmitContext, GeneratedModule, InstantiationPlan,
    InstantiationPlanner, MetadataSource, SocketResolver,
};
use wiring_common::{CompileError, CompileResult, MetadataModel, ModuleDeclaration, ModuleId, WireSet};
use wiring_impl::{
    build_dependency_graph, cycle_diagnostics, module_dependencies, propagate_failures, DiagnosticsReporter,
    FailureReport, ModuleDependencies, ScopeIndexes,
};

/// 容器编译器
///
/// 不在构建之间保留任何状态，同一实例可以重复编译。
pub struct ContainerCompiler {
    config: CompilerConfig,
    resolver: Arc<dyn SocketResolver>,
    cycle_detector: Arc<dyn CycleDetector>,
    planner: Arc<dyn InstantiationPlanner>,
    emitter: Arc<dyn CodeEmitter>,
}

impl ContainerCompiler {
    /// 以给定阶段实现创建编译器
    pub fn new(
        config: CompilerConfig,
        resolver: Arc<dyn SocketResolver>,
        cycle_detector: Arc<dyn CycleDetector>,
        planner: Arc<dyn InstantiationPlanner>,
        emitter: Arc<dyn CodeEmitter>,
    ) -> Self {
        Self {
            config,
            resolver,
            cycle_detector,
            planner,
            emitter,
        }
    }

    /// 编译器配置
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// 编译一组根模块声明
    ///
    /// 依赖问题记录在报告的诊断中，只有基础设施故障（任务异常等）才返回 `Err`。
    pub async fn compile(&self, declarations: &[ModuleDeclaration]) -> CompileResult<BuildOutput> {
        let build_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%build_id, roots = declarations.len(), "开始编译");

        let reporter = Arc::new(DiagnosticsReporter::new());
        let (model, structural) = MetadataModel::build(declarations);
        reporter.extend(structural);

        let (indexes, duplicates) = ScopeIndexes::build(&model);
        reporter.extend(duplicates);

        let model = Arc::new(model);
        let wires = Arc::new(self.resolve(&model, Arc::new(indexes), &reporter).await?);
        debug!(wires = wires.len(), "插槽解析完成");

        let graph = build_dependency_graph(&model, &wires);
        let cycles = self.cycle_detector.detect_cycles(&graph);
        reporter.extend(cycle_diagnostics(&model, &cycles));

        let dependencies = module_dependencies(&model, &wires);
        let plan = Arc::new(self.plan(&model, &wires, &graph, &dependencies, &reporter));

        let mut artifacts = self.emit(&model, &wires, &plan, &reporter).await?;

        let direct = reporter.failed_modules();
        let failure = propagate_failures(&model, &dependencies, &direct);
        reporter.extend(failure.upstream.iter().cloned());
        artifacts.retain(|module, _| !failure.is_failed(*module));

        let modules = module_reports(&model, &artifacts, &direct, &failure);
        let report = BuildReport {
            build_id,
            started_at,
            finished_at: Utc::now(),
            diagnostics: reporter.snapshot(),
            modules,
        };
        info!(
            %build_id,
            emitted = artifacts.len(),
            diagnostics = report.diagnostics.len(),
            elapsed_ms = report.elapsed_ms(),
            "编译完成"
        );

        Ok(BuildOutput {
            artifacts: artifacts.into_values().collect(),
            report,
        })
    }

    /// 从来源读取声明，编译后写出到产物目标
    pub async fn compile_into(
        &self,
        source: &dyn MetadataSource,
        sink: &dyn ArtifactSink,
    ) -> CompileResult<BuildReport> {
        info!(source = %source.describe(), "读取元数据");
        let declarations = source.load().await?;
        let output = self.compile(&declarations).await?;

        for module in output.report.modules.iter().filter(|m| m.outcome != ModuleOutcome::Emitted) {
            sink.discard(&module.module).await?;
        }
        for artifact in &output.artifacts {
            sink.write(artifact).await?;
        }
        sink.finish().await?;
        debug!(artifacts = output.artifacts.len(), "产物写出完成");

        Ok(output.report)
    }

    async fn resolve(
        &self,
        model: &Arc<MetadataModel>,
        indexes: Arc<ScopeIndexes>,
        reporter: &Arc<DiagnosticsReporter>,
    ) -> CompileResult<WireSet> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_modules));
        let mut tasks = JoinSet::new();

        for module in model.modules() {
            let id = module.id;
            let model = Arc::clone(model);
            let indexes = Arc::clone(&indexes);
            let reporter = Arc::clone(reporter);
            let resolver = Arc::clone(&self.resolver);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| CompileError::task_failed(format!("获取并发许可失败: {}", e)))?;
                let resolution = resolver.resolve_module(&model, &*indexes, id);
                reporter.extend(resolution.diagnostics);
                Ok::<_, CompileError>(resolution.wires)
            });
        }

        let mut wires = WireSet::new();
        while let Some(joined) = tasks.join_next().await {
            let resolved = joined.map_err(|e| CompileError::task_failed(format!("插槽解析任务异常: {}", e)))??;
            wires.extend(resolved);
        }
        Ok(wires)
    }

    /// 规划实例化顺序
    ///
    /// 规划发现的模块级循环会让更多模块失败，失败集合不再变化时结束。
    fn plan(
        &self,
        model: &MetadataModel,
        wires: &WireSet,
        graph: &wiring_abstractions::DependencyGraph,
        dependencies: &ModuleDependencies,
        reporter: &DiagnosticsReporter,
    ) -> InstantiationPlan {
        loop {
            let failed = propagate_failures(model, dependencies, &reporter.failed_modules()).failed;
            let outcome = self.planner.plan(model, wires, graph, &failed);
            if outcome.diagnostics.is_empty() {
                return outcome.plan;
            }

            reporter.extend(outcome.diagnostics);
            let grown = reporter.failed_modules().iter().any(|m| !failed.contains(m));
            if !grown {
                warn!("规划诊断没有产生新的失败模块");
                return outcome.plan;
            }
        }
    }

    async fn emit(
        &self,
        model: &Arc<MetadataModel>,
        wires: &Arc<WireSet>,
        plan: &Arc<InstantiationPlan>,
        reporter: &Arc<DiagnosticsReporter>,
    ) -> CompileResult<BTreeMap<ModuleId, GeneratedModule>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_modules));
        let mut tasks = JoinSet::new();

        for module in plan.modules.keys().copied() {
            let model = Arc::clone(model);
            let wires = Arc::clone(wires);
            let plan = Arc::clone(plan);
            let reporter = Arc::clone(reporter);
            let emitter = Arc::clone(&self.emitter);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| CompileError::task_failed(format!("获取并发许可失败: {}", e)))?;
                let context = EmitContext {
                    model: &*model,
                    wires: &*wires,
                    plan: &*plan,
                };
                match emitter.emit(&context, module) {
                    Ok(generated) => Ok::<_, CompileError>(Some(generated)),
                    Err(diagnostics) => {
                        reporter.extend(diagnostics);
                        Ok(None)
                    }
                }
            });
        }

        let mut artifacts = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let generated = joined.map_err(|e| CompileError::task_failed(format!("代码生成任务异常: {}", e)))??;
            if let Some(generated) = generated {
                artifacts.insert(generated.module, generated);
            }
        }
        Ok(artifacts)
    }
}

fn module_reports(
    model: &MetadataModel,
    artifacts: &BTreeMap<ModuleId, GeneratedModule>,
    direct: &BTreeSet<ModuleId>,
    failure: &FailureReport,
) -> Vec<ModuleReport> {
    model
        .modules()
        .iter()
        .map(|module| {
            let outcome = if artifacts.contains_key(&module.id) {
                ModuleOutcome::Emitted
            } else if direct.contains(&module.id) || !failure.is_failed(module.id) {
                ModuleOutcome::Failed
            } else {
                ModuleOutcome::UpstreamFailed
            };
            ModuleReport {
                module: module.path.clone(),
                outcome,
            }
        })
        .collect()
}
