//! 元数据读取、产物写出与配置的端到端测试

use std::io::Write;
use wiring_abstractions::ModuleDescriptor;
use wiring_composition::{
    BuildReport, CompilerBuilder, CompilerConfig, DirectoryArtifactSink, JsonMetadataSource, MemoryArtifactSink,
    ModuleOutcome,
};

const METADATA: &str = r#"{
    "modules": [
        {
            "name": "app",
            "beans": [
                {"name": "config", "bean_type": "crate::Config", "visibility": "public"},
                {
                    "name": "server",
                    "bean_type": "crate::Server",
                    "visibility": "public",
                    "sockets": [{"name": "config", "required_type": "crate::Config"}]
                }
            ],
            "modules": [
                {
                    "name": "db",
                    "beans": [
                        {
                            "name": "pool",
                            "bean_type": "crate::Pool",
                            "visibility": "public",
                            "sockets": [{"name": "config", "required_type": "crate::Config"}]
                        }
                    ]
                }
            ]
        }
    ]
}"#;

fn metadata_file(contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[tokio::test]
async fn test_json_to_directory_round_trip() -> anyhow::Result<()> {
    let input = metadata_file(METADATA)?;
    let out = tempfile::tempdir()?;

    let compiler = CompilerBuilder::new().max_parallel_modules(2).build()?;
    let report = compiler
        .compile_into(&JsonMetadataSource::new(input.path()), &DirectoryArtifactSink::new(out.path()))
        .await?;

    assert!(report.is_success(), "{}", report.render_text());
    assert_eq!(report.count(ModuleOutcome::Emitted), 2);

    let app = tokio::fs::read_to_string(out.path().join("app.rs")).await?;
    assert!(app.starts_with("// @generated by wiringc. DO NOT EDIT.\n// module: app\n"));
    assert!(app.contains("pub struct AppModule {"));

    let db = tokio::fs::read_to_string(out.path().join("app__db.rs")).await?;
    assert!(db.contains("pub struct AppDbModule {"));
    syn::parse_file(&app)?;
    syn::parse_file(&db)?;

    let descriptor: ModuleDescriptor =
        serde_json::from_str(&tokio::fs::read_to_string(out.path().join("app__db.module.json")).await?)?;
    assert_eq!(descriptor.module, "app.db");
    assert_eq!(descriptor.exposed[0].name, "pool");

    let parsed: BuildReport = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(parsed, report);
    Ok(())
}

#[tokio::test]
async fn test_failed_modules_are_not_written() -> anyhow::Result<()> {
    let input = metadata_file(
        r#"{"modules": [
            {"name": "broken", "beans": [{"name": "a", "bean_type": "crate::A",
                "sockets": [{"name": "b", "required_type": "crate::B"}]}]},
            {"name": "fine", "beans": [{"name": "c", "bean_type": "crate::C"}]}
        ]}"#,
    )?;
    let sink = MemoryArtifactSink::new();

    let compiler = CompilerBuilder::new().build()?;
    let report = compiler.compile_into(&JsonMetadataSource::new(input.path()), &sink).await?;

    assert!(!report.is_success());
    assert_eq!(sink.paths(), vec!["fine".to_string()]);
    assert!(report.render_text().contains("[UnsatisfiedDependencyError] broken:a#b"));
    Ok(())
}

#[tokio::test]
async fn test_custom_header_from_config_file() -> anyhow::Result<()> {
    let mut config_file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(config_file, "header = \"// generated for tests\"\nemit_descriptors = false")?;

    let config = CompilerConfig::load(Some(config_file.path()))?;
    assert!(!config.emit_descriptors);

    let input = metadata_file(METADATA)?;
    let out = tempfile::tempdir()?;
    let sink = DirectoryArtifactSink::new(out.path()).with_descriptors(config.emit_descriptors);
    let compiler = CompilerBuilder::new().with_config(config).build()?;
    compiler.compile_into(&JsonMetadataSource::new(input.path()), &sink).await?;

    let app = tokio::fs::read_to_string(out.path().join("app.rs")).await?;
    assert!(app.starts_with("// generated for tests\n// module: app\n"));
    assert!(!out.path().join("app.module.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_outputs_of_modules_that_stop_compiling_are_removed() -> anyhow::Result<()> {
    let out = tempfile::tempdir()?;
    let sink = DirectoryArtifactSink::new(out.path());
    let compiler = CompilerBuilder::new().build()?;

    let first = metadata_file(METADATA)?;
    let report = compiler.compile_into(&JsonMetadataSource::new(first.path()), &sink).await?;
    assert!(report.is_success());
    assert!(out.path().join("app__db.rs").exists());

    let broken = METADATA.replace(r#""required_type": "crate::Config"}]
                        }"#, r#""required_type": "crate::Missing"}]
                        }"#);
    assert_ne!(broken, METADATA);
    let second = metadata_file(&broken)?;
    let report = compiler.compile_into(&JsonMetadataSource::new(second.path()), &sink).await?;

    assert_eq!(report.outcome("app.db"), Some(ModuleOutcome::Failed));
    assert_eq!(report.outcome("app"), Some(ModuleOutcome::UpstreamFailed));
    for file in ["app.rs", "app.module.json", "app__db.rs", "app__db.module.json"] {
        assert!(!out.path().join(file).exists(), "{} 应被移除", file);
    }
    Ok(())
}
