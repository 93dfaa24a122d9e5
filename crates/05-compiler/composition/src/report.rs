//! 构建报告

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use wiring_abstractions::GeneratedModule;
use wiring_common::{Diagnostic, DiagnosticKind};

/// 模块编译结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleOutcome {
    /// 已生成代码
    Emitted,
    /// 模块自身存在错误
    Failed,
    /// 因依赖的模块失败而跳过
    UpstreamFailed,
}

impl fmt::Display for ModuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Emitted => "emitted",
            Self::Failed => "failed",
            Self::UpstreamFailed => "upstream_failed",
        };
        f.write_str(text)
    }
}

/// 单个模块的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReport {
    /// 模块路径
    pub module: String,
    /// 结果
    pub outcome: ModuleOutcome,
}

/// 一次构建的完整报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// 构建编号
    pub build_id: Uuid,
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 结束时间
    pub finished_at: DateTime<Utc>,
    /// 全部诊断（已排序）
    pub diagnostics: Vec<Diagnostic>,
    /// 各模块结果（模块声明顺序）
    pub modules: Vec<ModuleReport>,
}

impl BuildReport {
    /// 是否没有任何诊断
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// 指定结果的模块数量
    pub fn count(&self, outcome: ModuleOutcome) -> usize {
        self.modules.iter().filter(|m| m.outcome == outcome).count()
    }

    /// 查询模块结果
    pub fn outcome(&self, module: &str) -> Option<ModuleOutcome> {
        self.modules.iter().find(|m| m.module == module).map(|m| m.outcome)
    }

    /// 指定种类的诊断
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// 构建耗时（毫秒）
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// 文本形式：摘要行之后每条诊断一行
    pub fn render_text(&self) -> String {
        let mut text = format!(
            "构建 {}: {} 个模块已生成, {} 个失败, {} 个因上游失败跳过, {} 条诊断\n",
            self.build_id,
            self.count(ModuleOutcome::Emitted),
            self.count(ModuleOutcome::Failed),
            self.count(ModuleOutcome::UpstreamFailed),
            self.diagnostics.len()
        );
        text.push_str(&wiring_impl::render_text(&self.diagnostics));
        text
    }

    /// JSON 形式
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// 编译输出：生成的模块与构建报告
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// 生成的模块（模块声明顺序）
    pub artifacts: Vec<GeneratedModule>,
    /// 构建报告
    pub report: BuildReport,
}

impl BuildOutput {
    /// 按模块路径查找产物
    pub fn artifact(&self, path: &str) -> Option<&GeneratedModule> {
        self.artifacts.iter().find(|a| a.path == path)
    }

    /// 是否没有任何诊断
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }
}
