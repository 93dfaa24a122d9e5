//! 多模块场景：失败传播、模块插槽、兄弟连线与构造单元循环

mod common;

use common::{compile, diagnostics_of, position, source};
use wiring_common::{BeanDeclaration, DiagnosticKind, ModuleDeclaration, SocketDeclaration};
use wiring_composition::ModuleOutcome;

#[tokio::test]
async fn test_failure_propagates_to_parent_and_wired_sibling() {
    let output = compile(&[ModuleDeclaration::new("app")
        .with_module(
            ModuleDeclaration::new("db").with_bean(
                BeanDeclaration::new("pool", "crate::Pool")
                    .public()
                    .with_socket(SocketDeclaration::single("url", "crate::DatabaseUrl")),
            ),
        )
        .with_module(
            ModuleDeclaration::new("web").with_wired_module("db").with_bean(
                BeanDeclaration::new("handler", "crate::Handler")
                    .with_socket(SocketDeclaration::single("pool", "crate::Pool")),
            ),
        )
        .with_module(ModuleDeclaration::new("metrics").with_bean(BeanDeclaration::new("counter", "crate::Counter")))])
    .await;

    let report = &output.report;
    assert_eq!(report.outcome("app.db"), Some(ModuleOutcome::Failed));
    assert_eq!(report.outcome("app.web"), Some(ModuleOutcome::UpstreamFailed));
    assert_eq!(report.outcome("app"), Some(ModuleOutcome::UpstreamFailed));
    assert_eq!(report.outcome("app.metrics"), Some(ModuleOutcome::Emitted));

    let paths: Vec<&str> = output.artifacts.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(paths, vec!["app.metrics"]);

    let upstream = diagnostics_of(&output, DiagnosticKind::UpstreamResolution);
    assert_eq!(upstream.len(), 2);
    assert!(upstream.iter().all(|d| d.root_causes == vec!["app.db".to_string()]));
    assert_eq!(diagnostics_of(&output, DiagnosticKind::UnsatisfiedDependency).len(), 1);
}

#[tokio::test]
async fn test_sibling_beans_need_explicit_wiring() {
    let declarations = |wired: bool| {
        let web = ModuleDeclaration::new("web").with_bean(
            BeanDeclaration::new("handler", "crate::Handler")
                .with_socket(SocketDeclaration::single("pool", "crate::Pool")),
        );
        let web = if wired { web.with_wired_module("db") } else { web };
        vec![ModuleDeclaration::new("app")
            .with_module(ModuleDeclaration::new("db").with_bean(BeanDeclaration::new("pool", "crate::Pool").public()))
            .with_module(web)]
    };

    let unwired = compile(&declarations(false)).await;
    assert_eq!(diagnostics_of(&unwired, DiagnosticKind::UnsatisfiedDependency).len(), 1);
    assert_eq!(unwired.report.outcome("app.db"), Some(ModuleOutcome::Emitted));

    let wired = compile(&declarations(true)).await;
    assert!(wired.is_success(), "{:?}", wired.report.diagnostics);
    assert_eq!(wired.artifacts.len(), 3);

    let web = source(&wired, "app.web");
    position(web, "pub import__app__db__pool: ::std::sync::Arc<crate::Pool>,");
}

#[tokio::test]
async fn test_child_module_socket_is_resolved_in_parent_scope() {
    let output = compile(&[ModuleDeclaration::new("app")
        .with_bean(BeanDeclaration::new("clock", "crate::SystemClock").provides("dyn crate::Clock"))
        .with_module(
            ModuleDeclaration::new("jobs")
                .with_socket(SocketDeclaration::single("clock", "dyn crate::Clock"))
                .with_bean(
                    BeanDeclaration::new("scheduler", "crate::Scheduler")
                        .with_socket(SocketDeclaration::single("clock", "dyn crate::Clock")),
                ),
        )])
    .await;

    assert!(output.is_success(), "{:?}", output.report.diagnostics);
    position(source(&output, "app"), "clock: b_clock.clone(),");

    let jobs = output.artifact("app.jobs").unwrap();
    position(&jobs.source, "pub clock: ::std::sync::Arc<dyn crate::Clock>,");
    position(&jobs.source, "<crate::Scheduler>::new(s_clock.clone())");
    assert_eq!(jobs.descriptor.sockets.len(), 1);
    assert_eq!(jobs.descriptor.sockets[0].name, "clock");
}

#[tokio::test]
async fn test_root_module_socket_is_an_external_input() {
    let output = compile(&[ModuleDeclaration::new("app")
        .with_socket(SocketDeclaration::single("settings", "crate::Settings"))
        .with_bean(
            BeanDeclaration::new("server", "crate::Server")
                .public()
                .with_socket(SocketDeclaration::single("settings", "crate::Settings")),
        )])
    .await;

    assert!(output.is_success(), "{:?}", output.report.diagnostics);
    let app = source(&output, "app");
    position(app, "pub struct AppModuleSockets {");
    position(app, "pub settings: ::std::sync::Arc<crate::Settings>,");
}

#[tokio::test]
async fn test_unsatisfied_module_socket_is_reported_at_the_socket() {
    let output = compile(&[ModuleDeclaration::new("app").with_module(
        ModuleDeclaration::new("jobs").with_socket(SocketDeclaration::single("clock", "dyn crate::Clock")),
    )])
    .await;

    let unsatisfied = diagnostics_of(&output, DiagnosticKind::UnsatisfiedDependency);
    assert_eq!(unsatisfied.len(), 1);
    assert_eq!(unsatisfied[0].location.module, "app.jobs");
    assert_eq!(unsatisfied[0].location.socket.as_deref(), Some("clock"));
    assert_eq!(output.report.outcome("app"), Some(ModuleOutcome::Failed));
}

#[tokio::test]
async fn test_unit_cycle_between_parent_bean_and_child_module() {
    let output = compile(&[ModuleDeclaration::new("app")
        .with_bean(
            BeanDeclaration::new("a", "crate::A")
                .public()
                .with_socket(SocketDeclaration::single("x", "crate::X")),
        )
        .with_module(
            ModuleDeclaration::new("db")
                .with_bean(BeanDeclaration::new("x", "crate::X").public())
                .with_bean(BeanDeclaration::new("y", "crate::Y").with_socket(SocketDeclaration::single("a", "crate::A"))),
        )])
    .await;

    let cycles = diagnostics_of(&output, DiagnosticKind::CyclicDependency);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].location.module, "app");
    assert_eq!(cycles[0].implicated, vec!["app:a", "app.db:x", "app.db:y"]);
    assert_eq!(
        cycles[0].message,
        "模块 `app` 的构造单元之间存在循环: app:a -> 模块 app.db -> app:a"
    );

    assert_eq!(output.report.outcome("app"), Some(ModuleOutcome::Failed));
    assert_eq!(output.report.outcome("app.db"), Some(ModuleOutcome::UpstreamFailed));
    assert!(output.artifacts.is_empty());
}

#[tokio::test]
async fn test_lazy_edge_across_modules_is_patched_by_common_ancestor() {
    let output = compile(&[ModuleDeclaration::new("app")
        .with_bean(
            BeanDeclaration::new("a", "crate::A")
                .public()
                .with_socket(SocketDeclaration::single("x", "crate::X")),
        )
        .with_module(
            ModuleDeclaration::new("db")
                .with_bean(BeanDeclaration::new("x", "crate::X").public())
                .with_bean(
                    BeanDeclaration::new("y", "crate::Y").with_socket(SocketDeclaration::single("a", "crate::A").lazy()),
                ),
        )])
    .await;

    assert!(output.is_success(), "{:?}", output.report.diagnostics);
    let app = source(&output, "app");
    let child = position(app, "let m_db = ");
    let a = position(app, "let b_a = ");
    let patch = position(app, "let _ = d_app__db__y__a.set(b_a.clone());");
    assert!(child < a && a < patch);

    let db = source(&output, "app.db");
    position(db, "pub deferred__app__db__y__a: ");
}

#[tokio::test]
async fn test_invalid_declarations_block_only_their_module() {
    let output = compile(&[
        ModuleDeclaration::new("broken")
            .with_wired_module("ghost")
            .with_bean(
                BeanDeclaration::new("host", "crate::Host")
                    .with_socket(SocketDeclaration::collection("plugins", "dyn crate::Plugin").lazy()),
            ),
        ModuleDeclaration::new("fine").with_bean(BeanDeclaration::new("clock", "crate::Clock")),
    ])
    .await;

    let invalid = diagnostics_of(&output, DiagnosticKind::InvalidDeclaration);
    assert_eq!(invalid.len(), 2);
    assert!(invalid.iter().all(|d| d.location.module == "broken"));
    assert_eq!(output.report.outcome("broken"), Some(ModuleOutcome::Failed));
    assert_eq!(output.report.outcome("fine"), Some(ModuleOutcome::Emitted));
}

#[tokio::test]
async fn test_nested_imports_factories_and_deferred_cells() {
    let output = compile(&[ModuleDeclaration::new("app")
        .with_bean(BeanDeclaration::new("config", "crate::Config").public())
        .with_bean(
            BeanDeclaration::new("session", "crate::Session")
                .public()
                .per_request()
                .with_destroy("close"),
        )
        .with_bean(BeanDeclaration::new("audit", "crate::Audit").provides("dyn crate::Plugin"))
        .with_bean(BeanDeclaration::new("metrics", "crate::Metrics").provides("dyn crate::Plugin"))
        .with_module(
            ModuleDeclaration::new("svc")
                .with_socket(SocketDeclaration::collection("plugins", "dyn crate::Plugin"))
                .with_bean(
                    BeanDeclaration::new("host", "crate::Host")
                        .public()
                        .with_socket(SocketDeclaration::collection("plugins", "dyn crate::Plugin")),
                )
                .with_module(
                    ModuleDeclaration::new("core")
                        .with_bean(
                            BeanDeclaration::new("worker", "crate::Worker")
                                .with_socket(SocketDeclaration::single("config", "crate::Config"))
                                .with_socket(SocketDeclaration::single("session", "crate::Session")),
                        )
                        .with_bean(
                            BeanDeclaration::new("watcher", "crate::Watcher")
                                .with_socket(SocketDeclaration::single("host", "crate::Host").lazy()),
                        ),
                ),
        )])
    .await;

    assert!(output.is_success(), "{:?}", output.report.diagnostics);
    assert_eq!(output.artifacts.len(), 3);

    let app = source(&output, "app");
    position(
        app,
        "let mut cm_svc__plugins: Vec<::std::sync::Arc<dyn crate::Plugin>> = Vec::with_capacity(2);",
    );
    position(app, "plugins: cm_svc__plugins,");
    position(app, "import__app__config: b_config.clone(),");
    position(app, "import__app__session: f_session.clone(),");
    position(app, "issued.push(::std::sync::Arc::downgrade(&bean));");
    position(app, "if let Ok(mut issued) = self.session_issued.lock() {");

    let svc = source(&output, "app.svc");
    let cell = position(svc, "let d_app__svc__core__watcher__host: ");
    position(svc, "c_host__plugins.extend(s_plugins.iter().cloned());");
    position(svc, "import__app__session: i_app__session.clone(),");
    let core = position(
        svc,
        "deferred__app__svc__core__watcher__host: d_app__svc__core__watcher__host.clone(),",
    );
    let patch = position(svc, "let _ = d_app__svc__core__watcher__host.set(b_host.clone());");
    assert!(cell < core && core < patch);

    let core = source(&output, "app.svc.core");
    position(
        core,
        "pub deferred__app__svc__core__watcher__host: ::std::sync::Arc<::std::sync::OnceLock<::std::sync::Arc<crate::Host>>>,",
    );
    position(core, "<crate::Worker>::new(i_app__config.clone(), (i_app__session)())");
    position(core, "<crate::Watcher>::new(d_app__svc__core__watcher__host.clone())");
}

#[tokio::test]
async fn test_modules_with_colliding_generated_names() {
    let output = compile(&[ModuleDeclaration::new("app")
        .with_module(ModuleDeclaration::new("my_db").with_bean(BeanDeclaration::new("a", "crate::A")))
        .with_module(ModuleDeclaration::new("myDb").with_bean(BeanDeclaration::new("b", "crate::B")))])
    .await;

    let invalid = diagnostics_of(&output, DiagnosticKind::InvalidDeclaration);
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].location.module, "app.myDb");
    assert!(invalid[0].message.contains("AppMyDbModule"));

    assert_eq!(output.report.outcome("app.my_db"), Some(ModuleOutcome::Emitted));
    assert_eq!(output.report.outcome("app.myDb"), Some(ModuleOutcome::Failed));
    assert_eq!(output.report.outcome("app"), Some(ModuleOutcome::UpstreamFailed));
    let paths: Vec<&str> = output.artifacts.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(paths, vec!["app.my_db"]);
}

#[tokio::test]
async fn test_beans_with_colliding_import_fields() {
    let output = compile(&[ModuleDeclaration::new("app")
        .with_bean(BeanDeclaration::new("db__pool", "crate::Pool").public())
        .with_module(ModuleDeclaration::new("db").with_bean(BeanDeclaration::new("pool", "crate::OtherPool")))])
    .await;

    let invalid = diagnostics_of(&output, DiagnosticKind::InvalidDeclaration);
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0].location.bean.as_deref(), Some("pool"));
    assert!(invalid[0].message.contains("import__app__db__pool"));
    assert_eq!(output.report.outcome("app.db"), Some(ModuleOutcome::Failed));
}
