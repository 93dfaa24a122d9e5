//! Rust 装配代码生成
//!
//! 每个模块生成一个源码文件，包含：
//!
//! - `<Path>ModuleSockets`：模块输入（声明的模块插槽、从子树外部导入的 Bean、上层传入的延迟单元格）
//! - `<Path>Module`：持有全部 Bean 与子模块
//! - `EXPOSED`：对外暴露的 (类型, 限定符)
//! - `new`：按构造计划实例化，最后回填延迟单元格
//! - 公开 Bean 与子模块的访问器
//! - `shutdown`：按构造的逆序调用销毁方法
//!
//! 同一模块的所有生成文件应放在同一个 Rust 模块中（例如通过 `include!`），
//! 子模块类型按名称直接引用。

mod render;
mod validate;
mod writer;

use render::Renderer;
use tracing::debug;
use wiring_abstractions::{
    CodeEmitter, DescribedSocket, EmitContext, ExposedBean, GeneratedModule, ModuleDescriptor,
};
use wiring_common::naming::{module_type_name, sockets_type_name};
use wiring_common::{Diagnostic, DiagnosticKind, Location, MetadataModel, ModuleId};

/// 默认文件头
pub const DEFAULT_HEADER: &str = "// @generated by wiringc. DO NOT EDIT.";

/// Rust 代码生成器
#[derive(Debug, Clone)]
pub struct RustCodeEmitter {
    header: String,
}

impl Default for RustCodeEmitter {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
        }
    }
}

impl RustCodeEmitter {
    /// 创建使用默认文件头的生成器
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义文件头
    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// 生成模块描述符
    pub fn describe(model: &MetadataModel, id: ModuleId) -> ModuleDescriptor {
        let module = model.module(id);
        let exposed = module
            .beans
            .iter()
            .map(|b| model.bean(*b))
            .filter(|b| b.visibility.is_public())
            .map(|b| ExposedBean {
                name: b.name.clone(),
                types: b.provides.clone(),
                qualifier: b.qualifier.clone(),
                lifetime: b.lifetime,
            })
            .collect();
        let sockets = module
            .sockets
            .iter()
            .map(|s| model.socket(*s))
            .map(|s| DescribedSocket {
                name: s.name.clone(),
                required_type: s.required_type.clone(),
                qualifier: s.qualifier.clone(),
                multiplicity: s.multiplicity,
            })
            .collect();

        ModuleDescriptor {
            module: module.path.clone(),
            type_name: module_type_name(&module.path),
            sockets_type: sockets_type_name(&module.path),
            exposed,
            sockets,
            children: module
                .children
                .iter()
                .map(|c| model.module(*c).path.clone())
                .collect(),
        }
    }
}

impl CodeEmitter for RustCodeEmitter {
    fn emit(&self, context: &EmitContext<'_>, module: ModuleId) -> Result<GeneratedModule, Vec<Diagnostic>> {
        let model = context.model;
        let path = model.module(module).path.clone();
        let Some(module_plan) = context.plan.module(module) else {
            return Err(vec![Diagnostic::new(
                DiagnosticKind::InvalidDeclaration,
                Location::module(&path),
                "模块没有构造计划",
            )
            .in_module(module)]);
        };
        validate::validate_module(model, module)?;

        let descriptor = Self::describe(model, module);
        let source = Renderer::new(model, context.wires, context.plan, module_plan).render(&self.header, &descriptor);
        debug!(module = %path, bytes = source.len(), "模块源码生成完成");

        Ok(GeneratedModule {
            module,
            path,
            source,
            descriptor,
        })
    }
}
