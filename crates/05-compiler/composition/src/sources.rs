//! 元数据来源实现

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;
use wiring_abstractions::MetadataSource;
use wiring_common::{CompileError, CompileResult, MetadataDocument, ModuleDeclaration};

/// JSON 文件元数据来源
///
/// 文件内容是 [`MetadataDocument`]：`{"modules": [...]}`。
#[derive(Debug, Clone)]
pub struct JsonMetadataSource {
    path: PathBuf,
}

impl JsonMetadataSource {
    /// 创建来源
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetadataSource for JsonMetadataSource {
    async fn load(&self) -> CompileResult<Vec<ModuleDeclaration>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CompileError::source_error(format!("读取 {} 失败: {}", self.path.display(), e)))?;
        let document: MetadataDocument = serde_json::from_str(&text)?;
        debug!(path = %self.path.display(), roots = document.modules.len(), "元数据读取完成");
        Ok(document.modules)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// 内存中的固定声明
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataSource {
    modules: Vec<ModuleDeclaration>,
}

impl StaticMetadataSource {
    /// 创建来源
    pub fn new(modules: Vec<ModuleDeclaration>) -> Self {
        Self { modules }
    }
}

#[async_trait]
impl MetadataSource for StaticMetadataSource {
    async fn load(&self) -> CompileResult<Vec<ModuleDeclaration>> {
        Ok(self.modules.clone())
    }

    fn describe(&self) -> String {
        format!("static:{} 个根模块", self.modules.len())
    }
}
