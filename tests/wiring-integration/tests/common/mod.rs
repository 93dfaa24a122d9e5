//! 集成测试公共工具

#![allow(dead_code)]

use wiring_common::{Diagnostic, DiagnosticKind, ModuleDeclaration};
use wiring_composition::{BuildOutput, CompilerBuilder};

/// 用默认流水线编译，并确认每个产物都是合法的 Rust 源码
pub async fn compile(declarations: &[ModuleDeclaration]) -> BuildOutput {
    let output = CompilerBuilder::new()
        .max_parallel_modules(4)
        .build()
        .expect("编译器构建失败")
        .compile(declarations)
        .await
        .expect("编译任务失败");
    for artifact in &output.artifacts {
        assert_parses(&artifact.source);
    }
    output
}

/// 生成代码必须能被解析为 Rust 文件
pub fn assert_parses(source: &str) {
    if let Err(error) = syn::parse_file(source) {
        panic!("生成代码无法解析: {}\n{}", error, source);
    }
}

/// 指定种类的诊断
pub fn diagnostics_of(output: &BuildOutput, kind: DiagnosticKind) -> Vec<&Diagnostic> {
    output.report.diagnostics_of(kind).collect()
}

/// 生成代码中某段文本的位置，缺失时带上完整源码失败
pub fn position(source: &str, needle: &str) -> usize {
    source
        .find(needle)
        .unwrap_or_else(|| panic!("生成代码中缺少 `{}`:\n{}", needle, source))
}

/// 模块的生成源码
pub fn source<'a>(output: &'a BuildOutput, path: &str) -> &'a str {
    &output
        .artifact(path)
        .unwrap_or_else(|| panic!("模块 {} 没有生成产物: {:?}", path, output.report.diagnostics))
        .source
}
