//! 诊断汇总
//!
//! 并行任务共享同一个 [`DiagnosticsReporter`]，构建结束时按确定顺序输出。

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;
use wiring_common::{Diagnostic, DiagnosticKind, ModuleId};

/// 线程安全的诊断收集器
#[derive(Debug, Default)]
pub struct DiagnosticsReporter {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticsReporter {
    /// 创建空的收集器
    pub fn new() -> Self {
        Self::default()
    }

    /// 报告一条诊断
    pub fn report(&self, diagnostic: Diagnostic) {
        warn!(kind = %diagnostic.kind, location = %diagnostic.location, "{}", diagnostic.message);
        self.entries.lock().push(diagnostic);
    }

    /// 批量报告
    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }
    }

    /// 诊断数量
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// 是否没有任何诊断
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 直接失败的模块（派生错误不计入）
    pub fn failed_modules(&self) -> BTreeSet<ModuleId> {
        self.entries
            .lock()
            .iter()
            .filter(|d| !d.kind.is_derived())
            .filter_map(|d| d.module_id)
            .collect()
    }

    /// 按种类统计
    pub fn counts_by_kind(&self) -> BTreeMap<DiagnosticKind, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in self.entries.lock().iter() {
            *counts.entry(diagnostic.kind).or_insert(0) += 1;
        }
        counts
    }

    /// 当前全部诊断（已排序）
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        sort_diagnostics(self.entries.lock().clone())
    }

    /// 取出全部诊断（已排序）
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        sort_diagnostics(self.entries.into_inner())
    }
}

/// 排序并去重
///
/// 顺序只取决于诊断内容：所属模块、种类、位置、说明。
pub fn sort_diagnostics(mut diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics.sort_by(|a, b| {
        a.module_id
            .cmp(&b.module_id)
            .then(a.kind.cmp(&b.kind))
            .then_with(|| a.location.module.cmp(&b.location.module))
            .then_with(|| a.location.bean.cmp(&b.location.bean))
            .then_with(|| a.location.socket.cmp(&b.location.socket))
            .then_with(|| a.message.cmp(&b.message))
            .then_with(|| a.implicated.cmp(&b.implicated))
    });
    diagnostics.dedup();
    diagnostics
}

/// 文本格式，每条诊断一行
pub fn render_text(diagnostics: &[Diagnostic]) -> String {
    let mut text = String::new();
    for diagnostic in diagnostics {
        text.push_str(&diagnostic.to_string());
        text.push('\n');
    }
    text
}

/// JSON 格式
pub fn render_json(diagnostics: &[Diagnostic]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(diagnostics)
}
