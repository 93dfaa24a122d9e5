//! 候选索引实现
//!
//! 每个模块一个可见范围。模块 M 可见的提供者：
//! M 自身的全部 Bean 与模块插槽、祖先模块的公开 Bean、直接子模块的公开 Bean、
//! 以及 M 显式连线的兄弟模块的公开 Bean。

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;
use wiring_abstractions::{Candidate, CandidateLookup};
use wiring_common::{
    Diagnostic, DiagnosticKind, Location, MetadataModel, ModuleId, Provider, Qualifier, TypeName,
};

/// 索引错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// (声明类型, 限定符) 已被占用
    #[error("重复的提供者: ({type_name}, {qualifier:?}) 已由 {existing:?} 注册")]
    Duplicate {
        /// 声明类型
        type_name: TypeName,
        /// 限定符
        qualifier: Option<Qualifier>,
        /// 先注册的提供者
        existing: Provider,
        /// 被拒绝的提供者
        duplicate: Provider,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    candidate: Candidate,
    qualifier: Option<Qualifier>,
}

/// 单个可见范围的候选索引
///
/// 以 (声明类型, 限定符) 判重，以全部可赋值类型建立查询入口。只增不删。
#[derive(Debug, Clone, Default)]
pub struct CandidateIndex {
    by_type: HashMap<TypeName, Vec<Entry>>,
    keys: HashMap<(TypeName, Option<Qualifier>), Provider>,
}

impl CandidateIndex {
    /// 创建空索引
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册提供者
    pub fn register(&mut self, model: &MetadataModel, provider: Provider) -> Result<(), IndexError> {
        let (declared, types) = match provider {
            Provider::Bean(id) => {
                let bean = model.bean(id);
                (bean.bean_type.clone(), bean.provides.clone())
            }
            Provider::Socket(id) => {
                let socket = model.socket(id);
                (socket.required_type.clone(), vec![socket.required_type.clone()])
            }
        };
        let qualifier = model.provider_qualifier(provider).cloned();
        let key = (declared, qualifier.clone());

        if let Some(existing) = self.keys.get(&key).copied() {
            return Err(IndexError::Duplicate {
                type_name: key.0,
                qualifier: key.1,
                existing,
                duplicate: provider,
            });
        }
        self.keys.insert(key, provider);

        let candidate = Candidate {
            module: model.provider_module(provider),
            provider,
            cardinality: model.provider_cardinality(provider),
            default: model.provider_is_default(provider),
        };
        for ty in types {
            let entries = self.by_type.entry(ty).or_default();
            let position = entries.partition_point(|e| e.candidate < candidate);
            entries.insert(
                position,
                Entry {
                    candidate,
                    qualifier: qualifier.clone(),
                },
            );
        }
        Ok(())
    }

    /// 查找可赋值给 `required` 且限定符满足 `filter` 的候选（稳定顺序）
    pub fn lookup(&self, required: &TypeName, filter: Option<&Qualifier>) -> Vec<Candidate> {
        self.by_type
            .get(required)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| Qualifier::matches(e.qualifier.as_ref(), filter))
                    .map(|e| e.candidate)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 已注册的提供者数量
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// 模块 `module` 可见的全部提供者，按候选顺序排列
pub fn visible_providers(model: &MetadataModel, module: ModuleId) -> Vec<Provider> {
    let current = model.module(module);
    let public_beans = |id: ModuleId| {
        model
            .module(id)
            .beans
            .iter()
            .copied()
            .filter(|b| model.bean(*b).visibility.is_public())
            .map(Provider::Bean)
    };

    let mut providers: Vec<(ModuleId, Provider)> = Vec::new();
    providers.extend(current.beans.iter().map(|b| (module, Provider::Bean(*b))));
    providers.extend(current.sockets.iter().map(|s| (module, Provider::Socket(*s))));
    for ancestor in model.ancestors(module) {
        providers.extend(public_beans(ancestor).map(|p| (ancestor, p)));
    }
    for related in current.children.iter().chain(&current.wired_modules) {
        providers.extend(public_beans(*related).map(|p| (*related, p)));
    }

    providers.sort_unstable();
    providers.dedup();
    providers.into_iter().map(|(_, p)| p).collect()
}

/// 全部模块的可见范围索引
///
/// 在并行解析开始前一次性构建，之后只读共享。
#[derive(Debug, Clone, Default)]
pub struct ScopeIndexes {
    scopes: BTreeMap<ModuleId, CandidateIndex>,
}

impl ScopeIndexes {
    /// 为每个模块构建索引，重复提供者作为 `DuplicateBeanError` 返回
    pub fn build(model: &MetadataModel) -> (Self, Vec<Diagnostic>) {
        let mut scopes = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for module in model.modules() {
            let mut index = CandidateIndex::new();
            for provider in visible_providers(model, module.id) {
                if let Err(IndexError::Duplicate {
                    type_name,
                    qualifier,
                    existing,
                    duplicate,
                }) = index.register(model, provider)
                {
                    diagnostics.push(duplicate_diagnostic(
                        model,
                        module.id,
                        &type_name,
                        qualifier.as_ref(),
                        existing,
                        duplicate,
                    ));
                }
            }
            debug!(module = %module.path, providers = index.len(), "可见范围索引构建完成");
            scopes.insert(module.id, index);
        }

        (Self { scopes }, diagnostics)
    }

    /// 获取模块的索引
    pub fn scope(&self, module: ModuleId) -> Option<&CandidateIndex> {
        self.scopes.get(&module)
    }
}

impl CandidateLookup for ScopeIndexes {
    fn lookup(&self, scope: ModuleId, required: &TypeName, filter: Option<&Qualifier>) -> Vec<Candidate> {
        self.scopes
            .get(&scope)
            .map(|index| index.lookup(required, filter))
            .unwrap_or_default()
    }
}

fn duplicate_diagnostic(
    model: &MetadataModel,
    scope: ModuleId,
    type_name: &TypeName,
    qualifier: Option<&Qualifier>,
    existing: Provider,
    duplicate: Provider,
) -> Diagnostic {
    let scope_path = &model.module(scope).path;
    let mut location = Location::module(scope_path);
    if model.provider_module(duplicate) == scope {
        location = model.provider_location(duplicate);
    }
    let qualifier = qualifier.map_or_else(|| "无".to_string(), |q| format!("`{}`", q));
    let existing_name = model.qualified_name(existing);
    let duplicate_name = model.qualified_name(duplicate);

    Diagnostic::new(
        DiagnosticKind::DuplicateBean,
        location,
        format!(
            "`{}` 与 `{}` 在模块 `{}` 的可见范围内提供了相同的 (类型, 限定符): (`{}`, {})",
            duplicate_name, existing_name, scope_path, type_name, qualifier
        ),
    )
    .with_implicated(vec![existing_name, duplicate_name])
    .in_module(scope)
}
