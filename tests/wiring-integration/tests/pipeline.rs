//! 单模块内的解析、循环检测与代码生成

mod common;

use common::{compile, diagnostics_of, position, source};
use wiring_common::{BeanDeclaration, DiagnosticKind, ModuleDeclaration, SocketDeclaration};
use wiring_composition::ModuleOutcome;

fn plugin(name: &str, ty: &str) -> BeanDeclaration {
    BeanDeclaration::new(name, ty).provides("dyn crate::Plugin")
}

#[tokio::test]
async fn test_identical_input_produces_identical_output() {
    let declarations = vec![ModuleDeclaration::new("app")
        .with_bean(BeanDeclaration::new("config", "crate::Config").public())
        .with_bean(plugin("audit", "crate::Audit"))
        .with_bean(plugin("metrics", "crate::Metrics"))
        .with_bean(
            BeanDeclaration::new("host", "crate::Host")
                .public()
                .with_socket(SocketDeclaration::collection("plugins", "dyn crate::Plugin")),
        )
        .with_module(
            ModuleDeclaration::new("db").with_bean(
                BeanDeclaration::new("pool", "crate::Pool")
                    .public()
                    .with_socket(SocketDeclaration::single("config", "crate::Config")),
            ),
        )];

    let first = compile(&declarations).await;
    let second = compile(&declarations).await;

    assert!(first.is_success());
    assert_eq!(first.artifacts.len(), 2);
    assert_eq!(first.artifacts, second.artifacts);
    for (a, b) in first.artifacts.iter().zip(&second.artifacts) {
        assert_eq!(a.descriptor.to_json().unwrap(), b.descriptor.to_json().unwrap());
    }
}

#[tokio::test]
async fn test_bean_is_constructed_after_its_dependency() {
    let output = compile(&[ModuleDeclaration::new("m")
        .with_bean(
            BeanDeclaration::new("b", "crate::B")
                .public()
                .with_socket(SocketDeclaration::single("a", "crate::A")),
        )
        .with_bean(BeanDeclaration::new("a", "crate::A").public())])
    .await;

    assert!(output.is_success(), "{:?}", output.report.diagnostics);
    let generated = output.artifact("m").unwrap();
    let a = position(&generated.source, "let b_a = ");
    let b = position(&generated.source, "let b_b = ");
    assert!(a < b);

    let exposed: Vec<&str> = generated.descriptor.exposed.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(exposed, vec!["b", "a"]);
}

#[tokio::test]
async fn test_three_bean_cycle_is_reported_and_not_emitted() {
    let output = compile(&[ModuleDeclaration::new("m")
        .with_bean(BeanDeclaration::new("a", "crate::A").with_socket(SocketDeclaration::single("b", "crate::B")))
        .with_bean(BeanDeclaration::new("b", "crate::B").with_socket(SocketDeclaration::single("c", "crate::C")))
        .with_bean(BeanDeclaration::new("c", "crate::C").with_socket(SocketDeclaration::single("a", "crate::A")))])
    .await;

    let cycles = diagnostics_of(&output, DiagnosticKind::CyclicDependency);
    assert_eq!(cycles.len(), 1);
    let mut implicated = cycles[0].implicated.clone();
    implicated.sort();
    assert_eq!(implicated, vec!["m:a", "m:b", "m:c"]);
    assert_eq!(cycles[0].message, "检测到循环依赖: m:a -> m:b -> m:c -> m:a");

    assert!(output.artifact("m").is_none());
    assert_eq!(output.report.outcome("m"), Some(ModuleOutcome::Failed));
}

#[tokio::test]
async fn test_lazy_edge_breaks_cycle() {
    let output = compile(&[ModuleDeclaration::new("m")
        .with_bean(BeanDeclaration::new("a", "crate::A").with_socket(SocketDeclaration::single("b", "crate::B")))
        .with_bean(BeanDeclaration::new("b", "crate::B").with_socket(SocketDeclaration::single("a", "crate::A").lazy()))])
    .await;

    assert!(output.is_success(), "{:?}", output.report.diagnostics);
    let source = source(&output, "m");
    let b = position(source, "let b_b = ");
    let a = position(source, "let b_a = ");
    let patch = position(source, "let _ = d_m__b__a.set(b_a.clone());");
    assert!(b < a && a < patch);
}

#[tokio::test]
async fn test_bean_never_satisfies_its_own_socket() {
    let output = compile(&[ModuleDeclaration::new("m").with_bean(
        BeanDeclaration::new("node", "crate::Node").with_socket(SocketDeclaration::single("next", "crate::Node")),
    )])
    .await;

    assert!(diagnostics_of(&output, DiagnosticKind::CyclicDependency).is_empty());
    let unsatisfied = diagnostics_of(&output, DiagnosticKind::UnsatisfiedDependency);
    assert_eq!(unsatisfied.len(), 1);
    assert_eq!(unsatisfied[0].location.socket.as_deref(), Some("next"));
    assert!(output.artifacts.is_empty());
}

#[tokio::test]
async fn test_collection_with_no_matches_is_empty() {
    let output = compile(&[ModuleDeclaration::new("m").with_bean(
        BeanDeclaration::new("host", "crate::Host")
            .with_socket(SocketDeclaration::collection("plugins", "dyn crate::Plugin")),
    )])
    .await;

    assert!(output.is_success());
    position(
        source(&output, "m"),
        "let c_host__plugins: Vec<::std::sync::Arc<dyn crate::Plugin>> = Vec::new();",
    );
}

#[tokio::test]
async fn test_collection_keeps_declaration_order() {
    let output = compile(&[ModuleDeclaration::new("m")
        .with_bean(plugin("zeta", "crate::Zeta"))
        .with_bean(plugin("alpha", "crate::Alpha"))
        .with_bean(plugin("mid", "crate::Mid"))
        .with_bean(
            BeanDeclaration::new("host", "crate::Host")
                .with_socket(SocketDeclaration::collection("plugins", "dyn crate::Plugin")),
        )])
    .await;

    assert!(output.is_success());
    let source = source(&output, "m");
    position(source, "Vec::with_capacity(3);");
    let zeta = position(source, "c_host__plugins.push(b_zeta.clone());");
    let alpha = position(source, "c_host__plugins.push(b_alpha.clone());");
    let mid = position(source, "c_host__plugins.push(b_mid.clone());");
    assert!(zeta < alpha && alpha < mid);
}

#[tokio::test]
async fn test_duplicate_in_one_module_and_resolved_by_moving() {
    let duplicated = compile(&[ModuleDeclaration::new("m")
        .with_bean(BeanDeclaration::new("first", "crate::Cache"))
        .with_bean(BeanDeclaration::new("second", "crate::Cache"))])
    .await;

    let duplicates = diagnostics_of(&duplicated, DiagnosticKind::DuplicateBean);
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].implicated, vec!["m:first", "m:second"]);
    assert!(duplicated.artifacts.is_empty());

    let moved = compile(&[
        ModuleDeclaration::new("m").with_bean(BeanDeclaration::new("first", "crate::Cache")),
        ModuleDeclaration::new("n").with_bean(BeanDeclaration::new("second", "crate::Cache")),
    ])
    .await;
    assert!(moved.is_success(), "{:?}", moved.report.diagnostics);
    assert_eq!(moved.artifacts.len(), 2);
}

#[tokio::test]
async fn test_ambiguous_single_and_default_resolution() {
    let module = |default_pg: bool| {
        let pg = BeanDeclaration::new("pg", "crate::PgStore").provides("dyn crate::Store");
        let pg = if default_pg { pg.as_default() } else { pg };
        ModuleDeclaration::new("m")
            .with_bean(pg)
            .with_bean(BeanDeclaration::new("mem", "crate::MemStore").provides("dyn crate::Store"))
            .with_bean(
                BeanDeclaration::new("service", "crate::Service")
                    .with_socket(SocketDeclaration::single("store", "dyn crate::Store")),
            )
    };

    let ambiguous = compile(&[module(false)]).await;
    let diagnostics = diagnostics_of(&ambiguous, DiagnosticKind::AmbiguousDependency);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].implicated, vec!["m:pg", "m:mem"]);
    assert_eq!(diagnostics[0].location.socket.as_deref(), Some("store"));
    assert!(ambiguous.artifacts.is_empty());

    let resolved = compile(&[module(true)]).await;
    assert!(resolved.is_success(), "{:?}", resolved.report.diagnostics);
    position(source(&resolved, "m"), "<crate::Service>::new(b_pg.clone())");
}

#[tokio::test]
async fn test_qualifier_selects_candidate() {
    let output = compile(&[ModuleDeclaration::new("m")
        .with_bean(
            BeanDeclaration::new("primary", "crate::PgStore")
                .provides("dyn crate::Store")
                .with_qualifier("primary"),
        )
        .with_bean(
            BeanDeclaration::new("replica", "crate::ReplicaStore")
                .provides("dyn crate::Store")
                .with_qualifier("replica"),
        )
        .with_bean(
            BeanDeclaration::new("reports", "crate::Reports")
                .with_socket(SocketDeclaration::single("store", "dyn crate::Store").with_qualifier("replica")),
        )])
    .await;

    assert!(output.is_success(), "{:?}", output.report.diagnostics);
    position(source(&output, "m"), "<crate::Reports>::new(b_replica.clone())");
}

#[tokio::test]
async fn test_unsatisfied_single_and_missing_optional() {
    let output = compile(&[ModuleDeclaration::new("m")
        .with_bean(
            BeanDeclaration::new("service", "crate::Service")
                .with_socket(SocketDeclaration::single("store", "dyn crate::Store")),
        )
        .with_bean(
            BeanDeclaration::new("tracer", "crate::Tracer")
                .with_socket(SocketDeclaration::optional("exporter", "dyn crate::Exporter")),
        )])
    .await;

    let unsatisfied = diagnostics_of(&output, DiagnosticKind::UnsatisfiedDependency);
    assert_eq!(unsatisfied.len(), 1);
    assert_eq!(unsatisfied[0].location.bean.as_deref(), Some("service"));
    assert_eq!(output.report.diagnostics.len(), 1);
}

#[tokio::test]
async fn test_per_request_bean_is_emitted_as_factory() {
    let output = compile(&[ModuleDeclaration::new("m")
        .with_bean(BeanDeclaration::new("pool", "crate::Pool"))
        .with_bean(
            BeanDeclaration::new("session", "crate::Session")
                .public()
                .per_request()
                .with_socket(SocketDeclaration::single("pool", "crate::Pool")),
        )])
    .await;

    assert!(output.is_success());
    let source = source(&output, "m");
    position(
        source,
        "let f_session: ::std::sync::Arc<dyn Fn() -> ::std::sync::Arc<crate::Session> + Send + Sync> = {",
    );
    position(source, "pub fn session_provider(&self)");
}

#[test]
fn test_empty_build_with_blocking_runtime() {
    let output = tokio_test::block_on(compile(&[]));
    assert!(output.is_success());
    assert!(output.artifacts.is_empty());
    assert!(output.report.modules.is_empty());
}
