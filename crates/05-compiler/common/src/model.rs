//! 元数据模型
//!
//! 输入契约是前端解析好的 [`ModuleDeclaration`] 树；构建时把它展开为以先序编号的
//! 竞技场（模块、Bean、插槽各一个数组，父子关系用索引表示）。
//! 先序编号即"模块声明顺序"，Bean 与插槽的编号同样遵循声明顺序，
//! 因此按编号排序就得到稳定的跨模块顺序。

use crate::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::lifecycle::{Cardinality, Lifetime, Multiplicity, Visibility};
use crate::metadata::{Qualifier, SourcePosition, TypeName};
use crate::naming::{bean_key, is_valid_identifier, module_type_name, socket_key, source_file_name};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// 声明（输入契约）
// ---------------------------------------------------------------------------

/// 元数据文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// 根模块列表
    #[serde(default)]
    pub modules: Vec<ModuleDeclaration>,
}

/// 模块声明
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleDeclaration {
    /// 模块名称（在父模块的子模块之间唯一）
    pub name: String,
    /// 模块拥有的 Bean
    pub beans: Vec<BeanDeclaration>,
    /// 模块级插槽（模块的外部输入）
    pub sockets: Vec<SocketDeclaration>,
    /// 子模块
    pub modules: Vec<ModuleDeclaration>,
    /// 显式连线的兄弟模块名称
    pub wired_modules: Vec<String>,
    /// 源码位置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
}

impl ModuleDeclaration {
    /// 创建新的模块声明
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 添加 Bean
    pub fn with_bean(mut self, bean: BeanDeclaration) -> Self {
        self.beans.push(bean);
        self
    }

    /// 添加模块级插槽
    pub fn with_socket(mut self, socket: SocketDeclaration) -> Self {
        self.sockets.push(socket);
        self
    }

    /// 添加子模块
    pub fn with_module(mut self, module: ModuleDeclaration) -> Self {
        self.modules.push(module);
        self
    }

    /// 显式连线兄弟模块
    pub fn with_wired_module(mut self, sibling: impl Into<String>) -> Self {
        self.wired_modules.push(sibling.into());
        self
    }

    /// 设置源码位置
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }
}

/// Bean 声明
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeanDeclaration {
    /// Bean 名称（在模块内唯一）
    pub name: String,
    /// 声明类型（具体类型路径）
    pub bean_type: TypeName,
    /// 额外可赋值的类型（例如 `dyn Trait`）
    pub provides: Vec<TypeName>,
    /// 限定符
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    /// 生命周期
    pub lifetime: Lifetime,
    /// 可见性
    pub visibility: Visibility,
    /// 是否为模块声明的默认候选
    pub default: bool,
    /// 构造函数路径，缺省为 `<bean_type>::new`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory: Option<String>,
    /// 构造后调用的初始化方法
    pub init: Vec<String>,
    /// 模块关闭时调用的销毁方法
    pub destroy: Vec<String>,
    /// 构造所需的插槽（按构造参数顺序）
    pub sockets: Vec<SocketDeclaration>,
    /// 源码位置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
}

impl BeanDeclaration {
    /// 创建新的 Bean 声明
    pub fn new(name: impl Into<String>, bean_type: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            bean_type: bean_type.into(),
            ..Self::default()
        }
    }

    /// 追加可赋值类型
    pub fn provides(mut self, ty: impl Into<TypeName>) -> Self {
        self.provides.push(ty.into());
        self
    }

    /// 设置限定符
    pub fn with_qualifier(mut self, qualifier: impl Into<Qualifier>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// 设为对外暴露
    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    /// 设为按请求构造
    pub fn per_request(mut self) -> Self {
        self.lifetime = Lifetime::PerRequest;
        self
    }

    /// 标记为默认候选
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    /// 设置构造函数路径
    pub fn with_factory(mut self, factory: impl Into<String>) -> Self {
        self.factory = Some(factory.into());
        self
    }

    /// 添加初始化方法
    pub fn with_init(mut self, method: impl Into<String>) -> Self {
        self.init.push(method.into());
        self
    }

    /// 添加销毁方法
    pub fn with_destroy(mut self, method: impl Into<String>) -> Self {
        self.destroy.push(method.into());
        self
    }

    /// 添加插槽
    pub fn with_socket(mut self, socket: SocketDeclaration) -> Self {
        self.sockets.push(socket);
        self
    }

    /// 设置源码位置
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }
}

/// 插槽声明
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketDeclaration {
    /// 插槽名称（在所属 Bean 或模块内唯一）
    pub name: String,
    /// 需要的类型
    pub required_type: TypeName,
    /// 限定符过滤条件
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    /// 多重性
    pub multiplicity: Multiplicity,
    /// 是否延迟注入（仅 Bean 插槽）
    pub lazy: bool,
    /// 显式指定的候选名称（`bean` 或 `模块路径:bean`）
    pub wired_to: Vec<String>,
    /// 源码位置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<SourcePosition>,
}

impl SocketDeclaration {
    fn with_multiplicity(
        name: impl Into<String>,
        required_type: impl Into<TypeName>,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            name: name.into(),
            required_type: required_type.into(),
            multiplicity,
            ..Self::default()
        }
    }

    /// 创建 `single` 插槽
    pub fn single(name: impl Into<String>, required_type: impl Into<TypeName>) -> Self {
        Self::with_multiplicity(name, required_type, Multiplicity::Single)
    }

    /// 创建 `optional` 插槽
    pub fn optional(name: impl Into<String>, required_type: impl Into<TypeName>) -> Self {
        Self::with_multiplicity(name, required_type, Multiplicity::Optional)
    }

    /// 创建 `collection` 插槽
    pub fn collection(name: impl Into<String>, required_type: impl Into<TypeName>) -> Self {
        Self::with_multiplicity(name, required_type, Multiplicity::Collection)
    }

    /// 设置限定符过滤条件
    pub fn with_qualifier(mut self, qualifier: impl Into<Qualifier>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// 设为延迟注入
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// 显式指定候选
    pub fn wired_to(mut self, provider: impl Into<String>) -> Self {
        self.wired_to.push(provider.into());
        self
    }

    /// 设置源码位置
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }
}

// ---------------------------------------------------------------------------
// 竞技场
// ---------------------------------------------------------------------------

/// 模块编号（先序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub usize);

/// Bean 编号（先序模块顺序 + 声明顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeanId(pub usize);

/// 插槽编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocketId(pub usize);

/// 模块
#[derive(Debug, Clone)]
pub struct Module {
    /// 编号，同时是模块声明顺序
    pub id: ModuleId,
    /// 名称
    pub name: String,
    /// 点分路径，例如 `app.storage`
    pub path: String,
    /// 父模块
    pub parent: Option<ModuleId>,
    /// 子模块（声明顺序）
    pub children: Vec<ModuleId>,
    /// 拥有的 Bean（声明顺序）
    pub beans: Vec<BeanId>,
    /// 模块级插槽（声明顺序）
    pub sockets: Vec<SocketId>,
    /// 显式连线的兄弟模块
    pub wired_modules: Vec<ModuleId>,
    /// 源码位置
    pub position: Option<SourcePosition>,
}

impl Module {
    /// 是否为根模块
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Bean
#[derive(Debug, Clone)]
pub struct Bean {
    /// 编号
    pub id: BeanId,
    /// 所属模块
    pub module: ModuleId,
    /// 模块内声明序号
    pub index: usize,
    /// 名称
    pub name: String,
    /// 声明类型
    pub bean_type: TypeName,
    /// 全部可赋值类型，首项为声明类型
    pub provides: Vec<TypeName>,
    /// 限定符
    pub qualifier: Option<Qualifier>,
    /// 生命周期
    pub lifetime: Lifetime,
    /// 可见性
    pub visibility: Visibility,
    /// 是否为默认候选
    pub default: bool,
    /// 构造函数路径
    pub factory: Option<String>,
    /// 初始化方法
    pub init: Vec<String>,
    /// 销毁方法
    pub destroy: Vec<String>,
    /// 插槽（构造参数顺序）
    pub sockets: Vec<SocketId>,
    /// 源码位置
    pub position: Option<SourcePosition>,
}

impl Bean {
    /// 是否无依赖
    pub fn is_root_candidate(&self) -> bool {
        self.sockets.is_empty()
    }
}

/// 插槽所有者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOwner {
    /// Bean 的构造依赖
    Bean(BeanId),
    /// 模块的外部输入
    Module(ModuleId),
}

/// 插槽
#[derive(Debug, Clone)]
pub struct Socket {
    /// 编号
    pub id: SocketId,
    /// 所有者
    pub owner: SocketOwner,
    /// 所在模块
    pub module: ModuleId,
    /// 所有者内声明序号
    pub index: usize,
    /// 名称
    pub name: String,
    /// 需要的类型
    pub required_type: TypeName,
    /// 限定符过滤条件
    pub qualifier: Option<Qualifier>,
    /// 多重性
    pub multiplicity: Multiplicity,
    /// 是否延迟注入
    pub lazy: bool,
    /// 显式指定的候选名称
    pub wired_to: Vec<String>,
    /// 源码位置
    pub position: Option<SourcePosition>,
}

/// 提供者：Bean 或模块插槽
///
/// 依赖图中的节点也使用该类型；排序时 Bean 先于插槽，再按编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    /// Bean
    Bean(BeanId),
    /// 模块插槽
    Socket(SocketId),
}

/// 连线：插槽到满足它的提供者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    /// 插槽
    pub socket: SocketId,
    /// 目标（集合插槽按稳定顺序排列）
    pub targets: Vec<Provider>,
    /// 是否延迟
    pub lazy: bool,
}

/// 一次构建产生的全部连线
#[derive(Debug, Clone, Default)]
pub struct WireSet {
    wires: BTreeMap<SocketId, Wire>,
}

impl WireSet {
    /// 创建空连线集
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入连线
    pub fn insert(&mut self, wire: Wire) {
        self.wires.insert(wire.socket, wire);
    }

    /// 获取插槽的连线
    pub fn get(&self, socket: SocketId) -> Option<&Wire> {
        self.wires.get(&socket)
    }

    /// 按插槽编号顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Wire> {
        self.wires.values()
    }

    /// 连线数量
    pub fn len(&self) -> usize {
        self.wires.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }
}

impl Extend<Wire> for WireSet {
    fn extend<I: IntoIterator<Item = Wire>>(&mut self, iter: I) {
        for wire in iter {
            self.insert(wire);
        }
    }
}

/// 元数据模型
#[derive(Debug, Clone, Default)]
pub struct MetadataModel {
    modules: Vec<Module>,
    beans: Vec<Bean>,
    sockets: Vec<Socket>,
    roots: Vec<ModuleId>,
}

impl MetadataModel {
    /// 由声明构建模型
    ///
    /// 结构性问题（非法名称、重名、无法解析的兄弟连线等）作为诊断返回，
    /// 模型本身总是完整构建，以便后续阶段继续汇总其他错误。
    pub fn build(declarations: &[ModuleDeclaration]) -> (Self, Vec<Diagnostic>) {
        let mut builder = ModelBuilder::default();
        for declaration in declarations {
            let id = builder.add_module(declaration, None);
            builder.model.roots.push(id);
        }
        builder.resolve_wired_modules(declarations);
        builder.check_sibling_names();
        builder.check_generated_names();
        tracing::debug!(
            modules = builder.model.modules.len(),
            beans = builder.model.beans.len(),
            sockets = builder.model.sockets.len(),
            "元数据模型构建完成"
        );
        (builder.model, builder.diagnostics)
    }

    /// 所有模块（先序）
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// 所有 Bean
    pub fn beans(&self) -> &[Bean] {
        &self.beans
    }

    /// 所有插槽
    pub fn sockets(&self) -> &[Socket] {
        &self.sockets
    }

    /// 根模块
    pub fn roots(&self) -> &[ModuleId] {
        &self.roots
    }

    /// 获取模块
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    /// 获取 Bean
    pub fn bean(&self, id: BeanId) -> &Bean {
        &self.beans[id.0]
    }

    /// 获取插槽
    pub fn socket(&self, id: SocketId) -> &Socket {
        &self.sockets[id.0]
    }

    /// 按路径查找模块
    pub fn module_by_path(&self, path: &str) -> Option<ModuleId> {
        self.modules.iter().find(|m| m.path == path).map(|m| m.id)
    }

    /// 祖先模块（由近及远，不含自身）
    pub fn ancestors(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        std::iter::successors(self.module(id).parent, move |current| {
            self.module(*current).parent
        })
    }

    /// `module` 是否位于以 `root` 为根的子树中（含 `root` 自身）
    pub fn is_within(&self, module: ModuleId, root: ModuleId) -> bool {
        module == root || self.ancestors(module).any(|a| a == root)
    }

    /// `parent` 的哪个直接子模块的子树包含 `module`
    pub fn child_containing(&self, parent: ModuleId, module: ModuleId) -> Option<ModuleId> {
        if module == parent {
            return None;
        }
        let mut current = module;
        loop {
            let next = self.module(current).parent?;
            if next == parent {
                return Some(current);
            }
            current = next;
        }
    }

    /// 最近公共祖先（含自身）
    pub fn lowest_common_ancestor(&self, a: ModuleId, b: ModuleId) -> Option<ModuleId> {
        let chain: BTreeSet<ModuleId> = std::iter::once(a).chain(self.ancestors(a)).collect();
        std::iter::once(b)
            .chain(self.ancestors(b))
            .find(|candidate| chain.contains(candidate))
    }

    /// 提供者所在模块
    pub fn provider_module(&self, provider: Provider) -> ModuleId {
        match provider {
            Provider::Bean(id) => self.bean(id).module,
            Provider::Socket(id) => self.socket(id).module,
        }
    }

    /// 提供者名称
    pub fn provider_name(&self, provider: Provider) -> &str {
        match provider {
            Provider::Bean(id) => &self.bean(id).name,
            Provider::Socket(id) => &self.socket(id).name,
        }
    }

    /// 提供者限定名 `模块路径:名称`
    pub fn qualified_name(&self, provider: Provider) -> String {
        format!(
            "{}:{}",
            self.module(self.provider_module(provider)).path,
            self.provider_name(provider)
        )
    }

    /// 提供者的限定符
    pub fn provider_qualifier(&self, provider: Provider) -> Option<&Qualifier> {
        match provider {
            Provider::Bean(id) => self.bean(id).qualifier.as_ref(),
            Provider::Socket(id) => self.socket(id).qualifier.as_ref(),
        }
    }

    /// 提供者作为候选时的取值基数
    pub fn provider_cardinality(&self, provider: Provider) -> Cardinality {
        match provider {
            Provider::Bean(_) => Cardinality::One,
            Provider::Socket(id) => self.socket(id).multiplicity.cardinality(),
        }
    }

    /// 提供者是否为默认候选
    pub fn provider_is_default(&self, provider: Provider) -> bool {
        match provider {
            Provider::Bean(id) => self.bean(id).default,
            Provider::Socket(_) => false,
        }
    }

    /// 插槽的需求方节点
    ///
    /// Bean 插槽由 Bean 需要；模块插槽作为节点自身向外需要。
    pub fn requirer(&self, socket: SocketId) -> Provider {
        match self.socket(socket).owner {
            SocketOwner::Bean(bean) => Provider::Bean(bean),
            SocketOwner::Module(_) => Provider::Socket(socket),
        }
    }

    /// Bean 的诊断位置
    pub fn bean_location(&self, id: BeanId) -> Location {
        let bean = self.bean(id);
        Location::module(&self.module(bean.module).path)
            .with_bean(&bean.name)
            .with_position(bean.position.clone())
    }

    /// 插槽的诊断位置
    pub fn socket_location(&self, id: SocketId) -> Location {
        let socket = self.socket(id);
        let location = Location::module(&self.module(socket.module).path);
        let location = match socket.owner {
            SocketOwner::Bean(bean) => location.with_bean(&self.bean(bean).name),
            SocketOwner::Module(_) => location,
        };
        location
            .with_socket(&socket.name)
            .with_position(socket.position.clone())
    }

    /// 提供者的诊断位置
    pub fn provider_location(&self, provider: Provider) -> Location {
        match provider {
            Provider::Bean(id) => self.bean_location(id),
            Provider::Socket(id) => self.socket_location(id),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 模型构建器
#[derive(Default)]
struct ModelBuilder {
    model: MetadataModel,
    diagnostics: Vec<Diagnostic>,
}

impl ModelBuilder {
    fn invalid(&mut self, module: ModuleId, location: Location, message: String) {
        self.diagnostics.push(
            Diagnostic::new(DiagnosticKind::InvalidDeclaration, location, message).in_module(module),
        );
    }

    fn add_module(&mut self, declaration: &ModuleDeclaration, parent: Option<ModuleId>) -> ModuleId {
        let id = ModuleId(self.model.modules.len());
        let path = match parent {
            Some(parent) => format!("{}.{}", self.model.module(parent).path, declaration.name),
            None => declaration.name.clone(),
        };
        self.model.modules.push(Module {
            id,
            name: declaration.name.clone(),
            path: path.clone(),
            parent,
            children: Vec::new(),
            beans: Vec::new(),
            sockets: Vec::new(),
            wired_modules: Vec::new(),
            position: declaration.position.clone(),
        });

        if !is_valid_identifier(&declaration.name) {
            self.invalid(
                id,
                Location::module(&path).with_position(declaration.position.clone()),
                format!("模块名称 `{}` 不是合法的标识符", declaration.name),
            );
        }

        let mut socket_names = BTreeSet::new();
        for (index, socket) in declaration.sockets.iter().enumerate() {
            let socket_id = self.add_socket(socket, SocketOwner::Module(id), id, index);
            self.model.modules[id.0].sockets.push(socket_id);
            if !socket_names.insert(socket.name.as_str()) {
                let location = self.model.socket_location(socket_id);
                self.invalid(id, location, format!("模块插槽名称 `{}` 重复", socket.name));
            }
            if socket.lazy {
                let location = self.model.socket_location(socket_id);
                self.invalid(id, location, "模块插槽不支持延迟注入".to_string());
            }
        }

        let mut bean_names = BTreeSet::new();
        for (index, bean) in declaration.beans.iter().enumerate() {
            let bean_id = self.add_bean(bean, id, index);
            self.model.modules[id.0].beans.push(bean_id);
            if !bean_names.insert(bean.name.as_str()) {
                let location = self.model.bean_location(bean_id);
                self.invalid(id, location, format!("Bean 名称 `{}` 在模块内重复", bean.name));
            }
        }

        for child in &declaration.modules {
            let child_id = self.add_module(child, Some(id));
            self.model.modules[id.0].children.push(child_id);
        }
        id
    }

    fn add_bean(&mut self, declaration: &BeanDeclaration, module: ModuleId, index: usize) -> BeanId {
        let id = BeanId(self.model.beans.len());
        let mut provides = vec![declaration.bean_type.clone()];
        for ty in &declaration.provides {
            if !provides.contains(ty) {
                provides.push(ty.clone());
            }
        }
        self.model.beans.push(Bean {
            id,
            module,
            index,
            name: declaration.name.clone(),
            bean_type: declaration.bean_type.clone(),
            provides,
            qualifier: declaration.qualifier.clone(),
            lifetime: declaration.lifetime,
            visibility: declaration.visibility,
            default: declaration.default,
            factory: declaration.factory.clone(),
            init: declaration.init.clone(),
            destroy: declaration.destroy.clone(),
            sockets: Vec::new(),
            position: declaration.position.clone(),
        });

        let location = self.model.bean_location(id);
        if !is_valid_identifier(&declaration.name) {
            self.invalid(
                module,
                location.clone(),
                format!("Bean 名称 `{}` 不是合法的标识符", declaration.name),
            );
        }
        if declaration.bean_type.is_empty() {
            self.invalid(module, location.clone(), "Bean 缺少声明类型".to_string());
        }
        for hook in declaration.init.iter().chain(&declaration.destroy) {
            if !is_valid_identifier(hook) {
                self.invalid(
                    module,
                    location.clone(),
                    format!("生命周期方法 `{}` 不是合法的标识符", hook),
                );
            }
        }

        let mut socket_names = BTreeSet::new();
        for (socket_index, socket) in declaration.sockets.iter().enumerate() {
            let socket_id = self.add_socket(socket, SocketOwner::Bean(id), module, socket_index);
            self.model.beans[id.0].sockets.push(socket_id);
            if !socket_names.insert(socket.name.as_str()) {
                let location = self.model.socket_location(socket_id);
                self.invalid(module, location, format!("插槽名称 `{}` 重复", socket.name));
            }
            if socket.lazy && socket.multiplicity == Multiplicity::Collection {
                let location = self.model.socket_location(socket_id);
                self.invalid(module, location, "集合插槽不支持延迟注入".to_string());
            }
        }
        id
    }

    fn add_socket(
        &mut self,
        declaration: &SocketDeclaration,
        owner: SocketOwner,
        module: ModuleId,
        index: usize,
    ) -> SocketId {
        let id = SocketId(self.model.sockets.len());
        self.model.sockets.push(Socket {
            id,
            owner,
            module,
            index,
            name: declaration.name.clone(),
            required_type: declaration.required_type.clone(),
            qualifier: declaration.qualifier.clone(),
            multiplicity: declaration.multiplicity,
            lazy: declaration.lazy,
            wired_to: declaration.wired_to.clone(),
            position: declaration.position.clone(),
        });

        let location = self.model.socket_location(id);
        if !is_valid_identifier(&declaration.name) {
            self.invalid(
                module,
                location.clone(),
                format!("插槽名称 `{}` 不是合法的标识符", declaration.name),
            );
        }
        if declaration.required_type.is_empty() {
            self.invalid(module, location, "插槽缺少需要的类型".to_string());
        }
        id
    }

    /// 把 `wired_modules` 名称解析为兄弟模块编号
    ///
    /// 模块按先序编号，与声明树的先序遍历一一对应。
    fn resolve_wired_modules(&mut self, declarations: &[ModuleDeclaration]) {
        let mut flattened = Vec::with_capacity(self.model.modules.len());
        fn flatten<'a>(decls: &'a [ModuleDeclaration], out: &mut Vec<&'a ModuleDeclaration>) {
            for decl in decls {
                out.push(decl);
                flatten(&decl.modules, out);
            }
        }
        flatten(declarations, &mut flattened);

        for (index, declaration) in flattened.into_iter().enumerate() {
            let id = ModuleId(index);
            let siblings: Vec<ModuleId> = match self.model.module(id).parent {
                Some(parent) => self.model.module(parent).children.clone(),
                None => self.model.roots.clone(),
            };
            for name in &declaration.wired_modules {
                let target = siblings
                    .iter()
                    .copied()
                    .find(|s| *s != id && self.model.module(*s).name == *name);
                match target {
                    Some(target) => {
                        if !self.model.modules[id.0].wired_modules.contains(&target) {
                            self.model.modules[id.0].wired_modules.push(target);
                        }
                    }
                    None => {
                        let module = self.model.module(id);
                        let location =
                            Location::module(&module.path).with_position(module.position.clone());
                        self.invalid(id, location, format!("连线的兄弟模块 `{}` 不存在", name));
                    }
                }
            }
        }
    }

    fn check_sibling_names(&mut self) {
        let mut groups: Vec<Vec<ModuleId>> = vec![self.model.roots.clone()];
        groups.extend(self.model.modules.iter().map(|m| m.children.clone()));

        for group in groups {
            let mut seen = BTreeSet::new();
            for id in group {
                let module = self.model.module(id);
                if !seen.insert(module.name.clone()) {
                    let location =
                        Location::module(&module.path).with_position(module.position.clone());
                    let message = format!("模块名称 `{}` 在同级模块之间重复", module.name);
                    self.invalid(id, location, message);
                }
            }
        }
    }

    /// 生成的类型名、文件名与字段键在整个构建内必须唯一
    ///
    /// 名称映射会丢失大小写与下划线信息（`my_db` 与 `myDb` 得到同一个类型名），
    /// 冲突报告在先序靠后的一方。声明本身重复的情况已由前面的检查报告，这里跳过。
    fn check_generated_names(&mut self) {
        let mut type_names: BTreeMap<String, ModuleId> = BTreeMap::new();
        let mut file_names: BTreeMap<String, ModuleId> = BTreeMap::new();
        for index in 0..self.model.modules.len() {
            let id = ModuleId(index);
            let path = self.model.module(id).path.clone();
            let type_name = module_type_name(&path);
            let file_name = source_file_name(&path);

            let other_path = |other: Option<&ModuleId>| {
                other
                    .map(|other| self.model.module(*other).path.clone())
                    .filter(|other| *other != path)
            };
            let message = if let Some(other) = other_path(type_names.get(&type_name)) {
                format!("生成的类型名 `{}` 与模块 `{}` 冲突", type_name, other)
            } else if let Some(other) = other_path(file_names.get(&file_name)) {
                format!("生成的文件名 `{}` 与模块 `{}` 冲突", file_name, other)
            } else {
                type_names.entry(type_name).or_insert(id);
                file_names.entry(file_name).or_insert(id);
                continue;
            };
            let location = Location::module(&path).with_position(self.model.module(id).position.clone());
            self.invalid(id, location, message);
        }

        let mut bean_keys: BTreeMap<String, BeanId> = BTreeMap::new();
        for index in 0..self.model.beans.len() {
            let id = BeanId(index);
            let bean = self.model.bean(id);
            let module = bean.module;
            let path = &self.model.module(module).path;
            let key = bean_key(path, &bean.name);
            let clash = bean_keys
                .get(&key)
                .filter(|other| {
                    let other = self.model.bean(**other);
                    self.model.module(other.module).path != *path || other.name != bean.name
                })
                .map(|other| self.model.qualified_name(Provider::Bean(*other)));
            match clash {
                Some(other) => {
                    let location = self.model.bean_location(id);
                    self.invalid(module, location, format!("生成的导入字段 `import__{}` 与 {} 冲突", key, other));
                }
                None => {
                    bean_keys.entry(key).or_insert(id);
                }
            }
        }

        let mut socket_keys: BTreeMap<String, SocketId> = BTreeMap::new();
        for index in 0..self.model.sockets.len() {
            let id = SocketId(index);
            let Some(key) = self.deferred_key(id) else {
                continue;
            };
            let clash = socket_keys
                .get(&key)
                .filter(|other| self.socket_identity(**other) != self.socket_identity(id))
                .map(|other| self.model.socket_location(*other));
            match clash {
                Some(other) => {
                    let module = self.model.socket(id).module;
                    let location = self.model.socket_location(id);
                    let message = format!("生成的延迟字段 `deferred__{}` 与插槽 {} 冲突", key, other);
                    self.invalid(module, location, message);
                }
                None => {
                    socket_keys.entry(key).or_insert(id);
                }
            }
        }
    }

    /// 延迟插槽的字段键，非延迟插槽不生成延迟字段
    fn deferred_key(&self, id: SocketId) -> Option<String> {
        let socket = self.model.socket(id);
        if !socket.lazy {
            return None;
        }
        let owner = match socket.owner {
            SocketOwner::Bean(bean) => Some(self.model.bean(bean).name.as_str()),
            SocketOwner::Module(_) => None,
        };
        Some(socket_key(&self.model.module(socket.module).path, owner, &socket.name))
    }

    /// (模块路径, 所有者, 插槽名)，声明层面重复的插槽具有相同的标识
    fn socket_identity(&self, id: SocketId) -> (String, Option<String>, String) {
        let socket = self.model.socket(id);
        let owner = match socket.owner {
            SocketOwner::Bean(bean) => Some(self.model.bean(bean).name.clone()),
            SocketOwner::Module(_) => None,
        };
        (self.model.module(socket.module).path.clone(), owner, socket.name.clone())
    }
}
