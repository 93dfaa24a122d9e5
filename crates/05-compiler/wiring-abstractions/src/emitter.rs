//! 代码生成抽象接口

use crate::planner::InstantiationPlan;
use serde::{Deserialize, Serialize};
use wiring_common::naming;
use wiring_common::{Diagnostic, Lifetime, MetadataModel, ModuleId, Multiplicity, Qualifier, TypeName, WireSet};

/// 对外暴露的 Bean
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedBean {
    /// 名称
    pub name: String,
    /// 可赋值类型，首项为声明类型
    pub types: Vec<TypeName>,
    /// 限定符
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    /// 生命周期
    pub lifetime: Lifetime,
}

/// 模块输入描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedSocket {
    /// 名称
    pub name: String,
    /// 需要的类型
    pub required_type: TypeName,
    /// 限定符过滤条件
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    /// 多重性
    pub multiplicity: Multiplicity,
}

/// 模块描述符
///
/// 父模块与兄弟模块编译之间的稳定契约，字段顺序与内容只取决于输入声明。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// 模块路径
    pub module: String,
    /// 生成的模块类型名
    pub type_name: String,
    /// 生成的输入类型名
    pub sockets_type: String,
    /// 暴露的 Bean（声明顺序）
    pub exposed: Vec<ExposedBean>,
    /// 模块输入（声明顺序）
    pub sockets: Vec<DescribedSocket>,
    /// 子模块路径
    pub children: Vec<String>,
}

impl ModuleDescriptor {
    /// 暴露的 (类型, 限定符) 对
    pub fn exposed_pairs(&self) -> Vec<(&TypeName, Option<&Qualifier>)> {
        self.exposed
            .iter()
            .flat_map(|bean| bean.types.iter().map(move |ty| (ty, bean.qualifier.as_ref())))
            .collect()
    }

    /// 序列化为稳定的 JSON 文本
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// 单个模块的生成产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    /// 模块编号
    pub module: ModuleId,
    /// 模块路径
    pub path: String,
    /// 生成的源码
    pub source: String,
    /// 模块描述符
    pub descriptor: ModuleDescriptor,
}

impl GeneratedModule {
    /// 源码文件名
    pub fn source_file_name(&self) -> String {
        naming::source_file_name(&self.path)
    }

    /// 描述符文件名
    pub fn descriptor_file_name(&self) -> String {
        naming::descriptor_file_name(&self.path)
    }
}

/// 代码生成上下文
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    /// 元数据模型
    pub model: &'a MetadataModel,
    /// 连线
    pub wires: &'a WireSet,
    /// 实例化计划
    pub plan: &'a InstantiationPlan,
}

/// 代码生成器 trait
///
/// 对同一计划必须产生逐字节相同的输出。
pub trait CodeEmitter: Send + Sync {
    /// 生成单个模块；声明存在问题时返回诊断且不产生任何输出
    fn emit(&self, context: &EmitContext<'_>, module: ModuleId) -> Result<GeneratedModule, Vec<Diagnostic>>;
}
