//! 元数据读取与产物写出抽象接口
//!
//! 核心流水线本身不做 I/O，读写由这两个协作者完成。

use crate::emitter::GeneratedModule;
use async_trait::async_trait;
use wiring_common::{CompileResult, ModuleDeclaration};

/// 元数据来源 trait
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// 读取模块声明
    async fn load(&self) -> CompileResult<Vec<ModuleDeclaration>>;

    /// 来源描述（用于日志）
    fn describe(&self) -> String;
}

/// 产物写出 trait
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// 写出单个模块的产物
    async fn write(&self, artifact: &GeneratedModule) -> CompileResult<()>;

    /// 移除模块在以往构建中写出的产物
    ///
    /// 本次构建没有生成产物的模块会在写出前调用此方法。
    async fn discard(&self, _module_path: &str) -> CompileResult<()> {
        Ok(())
    }

    /// 全部写出后调用
    async fn finish(&self) -> CompileResult<()> {
        Ok(())
    }
}
