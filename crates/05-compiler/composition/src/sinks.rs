//! 产物写出实现

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use wiring_abstractions::{ArtifactSink, GeneratedModule};
use wiring_common::naming::{descriptor_file_name, source_file_name};
use wiring_common::{CompileError, CompileResult};

/// 产物写出错误
#[derive(Error, Debug)]
pub enum SinkError {
    /// 文件系统操作失败
    #[error("写入 {path} 失败: {source}")]
    Io {
        /// 目标路径
        path: PathBuf,
        /// 底层错误
        source: std::io::Error,
    },

    /// 描述符序列化失败
    #[error("模块 {module} 的描述符序列化失败: {source}")]
    Descriptor {
        /// 模块路径
        module: String,
        /// 底层错误
        source: serde_json::Error,
    },
}

impl From<SinkError> for CompileError {
    fn from(error: SinkError) -> Self {
        let path = match &error {
            SinkError::Io { path, .. } => path.display().to_string(),
            SinkError::Descriptor { module, .. } => module.clone(),
        };
        CompileError::SinkError {
            path,
            message: error.to_string(),
        }
    }
}

/// 内存产物目标，主要用于测试与嵌入式调用
#[derive(Debug, Default)]
pub struct MemoryArtifactSink {
    artifacts: DashMap<String, GeneratedModule>,
}

impl MemoryArtifactSink {
    /// 创建空的内存目标
    pub fn new() -> Self {
        Self::default()
    }

    /// 按模块路径获取产物
    pub fn get(&self, path: &str) -> Option<GeneratedModule> {
        self.artifacts.get(path).map(|entry| entry.value().clone())
    }

    /// 已写出的模块路径（排序）
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.artifacts.iter().map(|entry| entry.key().clone()).collect();
        paths.sort();
        paths
    }

    /// 产物数量
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[async_trait]
impl ArtifactSink for MemoryArtifactSink {
    async fn write(&self, artifact: &GeneratedModule) -> CompileResult<()> {
        self.artifacts.insert(artifact.path.clone(), artifact.clone());
        Ok(())
    }

    async fn discard(&self, module_path: &str) -> CompileResult<()> {
        self.artifacts.remove(module_path);
        Ok(())
    }
}

/// 目录产物目标
///
/// 每个模块写出 `<路径>.rs`，可选写出 `<路径>.module.json`。
/// 先写临时文件再重命名，读者不会看到写了一半的文件。
#[derive(Debug, Clone)]
pub struct DirectoryArtifactSink {
    root: PathBuf,
    emit_descriptors: bool,
}

impl DirectoryArtifactSink {
    /// 创建目录目标
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            emit_descriptors: true,
        }
    }

    /// 是否写出描述符 JSON
    pub fn with_descriptors(mut self, enabled: bool) -> Self {
        self.emit_descriptors = enabled;
        self
    }

    /// 输出目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_atomic(&self, file_name: &str, contents: &[u8]) -> Result<(), SinkError> {
        let target = self.root.join(file_name);
        let temp = self.root.join(format!(".{}.tmp", file_name));

        tokio::fs::write(&temp, contents).await.map_err(|source| SinkError::Io {
            path: temp.clone(),
            source,
        })?;
        if let Err(source) = tokio::fs::rename(&temp, &target).await {
            if let Err(error) = tokio::fs::remove_file(&temp).await {
                warn!(path = %temp.display(), error = %error, "临时文件清理失败");
            }
            return Err(SinkError::Io { path: target, source });
        }

        debug!(path = %target.display(), bytes = contents.len(), "产物已写出");
        Ok(())
    }
}

#[async_trait]
impl ArtifactSink for DirectoryArtifactSink {
    async fn write(&self, artifact: &GeneratedModule) -> CompileResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|source| SinkError::Io {
            path: self.root.clone(),
            source,
        })?;

        self.write_atomic(&artifact.source_file_name(), artifact.source.as_bytes())
            .await?;

        if self.emit_descriptors {
            let json = artifact.descriptor.to_json().map_err(|source| SinkError::Descriptor {
                module: artifact.path.clone(),
                source,
            })?;
            self.write_atomic(&artifact.descriptor_file_name(), json.as_bytes())
                .await?;
        }
        Ok(())
    }

    async fn discard(&self, module_path: &str) -> CompileResult<()> {
        for file_name in [source_file_name(module_path), descriptor_file_name(module_path)] {
            let target = self.root.join(file_name);
            match tokio::fs::remove_file(&target).await {
                Ok(()) => debug!(path = %target.display(), "已移除过期产物"),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(SinkError::Io { path: target, source }.into()),
            }
        }
        Ok(())
    }

    async fn finish(&self) -> CompileResult<()> {
        info!(root = %self.root.display(), "产物目录写出完成");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiring_abstractions::ModuleDescriptor;
    use wiring_common::ModuleId;

    fn artifact(path: &str) -> GeneratedModule {
        GeneratedModule {
            module: ModuleId(0),
            path: path.to_string(),
            source: "// generated\n".to_string(),
            descriptor: ModuleDescriptor {
                module: path.to_string(),
                type_name: "AppModule".to_string(),
                sockets_type: "AppModuleSockets".to_string(),
                exposed: Vec::new(),
                sockets: Vec::new(),
                children: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_latest_write() {
        let sink = MemoryArtifactSink::new();
        sink.write(&artifact("app")).await.unwrap();
        let mut updated = artifact("app");
        updated.source = "// updated\n".to_string();
        sink.write(&updated).await.unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.get("app").unwrap().source, "// updated\n");
    }

    #[tokio::test]
    async fn test_directory_sink_writes_source_and_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("generated");
        let sink = DirectoryArtifactSink::new(&root);

        let generated = artifact("app.db");
        sink.write(&generated).await.unwrap();
        sink.finish().await.unwrap();

        let source = tokio::fs::read_to_string(root.join(generated.source_file_name()))
            .await
            .unwrap();
        assert_eq!(source, "// generated\n");

        let json = tokio::fs::read_to_string(root.join(generated.descriptor_file_name()))
            .await
            .unwrap();
        let descriptor: ModuleDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, generated.descriptor);

        let mut entries = tokio::fs::read_dir(&root).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert!(names.iter().all(|n| !n.ends_with(".tmp")));
        assert_eq!(names.len(), 2);
    }

    #[tokio::test]
    async fn test_directory_sink_without_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryArtifactSink::new(dir.path()).with_descriptors(false);
        let generated = artifact("app");
        sink.write(&generated).await.unwrap();

        assert!(dir.path().join(generated.source_file_name()).exists());
        assert!(!dir.path().join(generated.descriptor_file_name()).exists());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryArtifactSink::new(dir.path());
        let generated = artifact("app");
        let blocker = dir.path().join(generated.source_file_name());
        tokio::fs::create_dir_all(blocker.join("occupied")).await.unwrap();

        let error = sink.write(&generated).await.unwrap_err();
        assert!(matches!(error, CompileError::SinkError { ref path, .. } if path.ends_with("app.rs")));
        assert!(!dir.path().join(".app.rs.tmp").exists());
    }

    #[tokio::test]
    async fn test_discard_removes_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryArtifactSink::new(dir.path());
        let generated = artifact("app.db");
        sink.write(&generated).await.unwrap();

        sink.discard("app.db").await.unwrap();
        assert!(!dir.path().join(generated.source_file_name()).exists());
        assert!(!dir.path().join(generated.descriptor_file_name()).exists());

        sink.discard("never.written").await.unwrap();

        let memory = MemoryArtifactSink::new();
        memory.write(&generated).await.unwrap();
        memory.discard("app.db").await.unwrap();
        assert!(memory.is_empty());
    }

    #[test]
    fn test_sink_error_converts_to_compile_error() {
        let error: CompileError = SinkError::Io {
            path: PathBuf::from("/out/app.rs"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert!(matches!(error, CompileError::SinkError { ref path, .. } if path == "/out/app.rs"));
    }
}
