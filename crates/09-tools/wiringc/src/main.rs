//! # wiringc
//!
//! 依赖注入容器编译器的命令行入口：读取元数据 JSON，编译，写出生成代码并打印诊断报告。

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use wiring_abstractions::MetadataSource;
use wiring_composition::{
    BuildReport, CompilerBuilder, CompilerConfig, DirectoryArtifactSink, JsonMetadataSource,
};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "wiringc")]
#[command(about = "编译期依赖注入容器编译器")]
#[command(version)]
struct Cli {
    /// 配置文件路径（TOML）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 编译元数据并写出生成代码
    Compile {
        /// 元数据 JSON 文件
        #[arg(short, long)]
        input: PathBuf,

        /// 输出目录
        #[arg(short, long)]
        out: PathBuf,

        /// 以 JSON 输出构建报告
        #[arg(long)]
        json: bool,
    },

    /// 只检查，不写出任何文件
    Check {
        /// 元数据 JSON 文件
        #[arg(short, long)]
        input: PathBuf,

        /// 以 JSON 输出构建报告
        #[arg(long)]
        json: bool,
    },

    /// 打印生效的配置
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = CompilerConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
        config.logging.filter = None;
    }

    if let Command::PrintConfig = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(ExitCode::SUCCESS);
    }

    let fail_on_diagnostics = config.fail_on_diagnostics;
    let emit_descriptors = config.emit_descriptors;
    let compiler = CompilerBuilder::new()
        .with_config(config)
        .enable_logging(true)
        .build()?;

    let (report, json) = match cli.command {
        Command::Compile { input, out, json } => {
            let source = JsonMetadataSource::new(&input);
            let sink = DirectoryArtifactSink::new(&out).with_descriptors(emit_descriptors);
            info!(input = %input.display(), out = %out.display(), "开始编译");
            let report = compiler
                .compile_into(&source, &sink)
                .await
                .with_context(|| format!("编译 {} 失败", input.display()))?;
            (report, json)
        }
        Command::Check { input, json } => {
            let declarations = load(&input).await?;
            let output = compiler.compile(&declarations).await?;
            (output.report, json)
        }
        Command::PrintConfig => return Ok(ExitCode::SUCCESS),
    };

    print_report(&report, json)?;

    if !report.is_success() {
        error!(diagnostics = report.diagnostics.len(), "构建存在诊断");
        if fail_on_diagnostics {
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn load(input: &Path) -> anyhow::Result<Vec<wiring_common::ModuleDeclaration>> {
    JsonMetadataSource::new(input)
        .load()
        .await
        .with_context(|| format!("读取元数据 {} 失败", input.display()))
}

fn print_report(report: &BuildReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}
