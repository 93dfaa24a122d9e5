//! 模块源码渲染
//!
//! 生成代码中的局部变量前缀：
//!
//! | 前缀 | 含义 |
//! |------|------|
//! | `s_` | 模块输入 |
//! | `i_` | 从子树外部导入的 Bean |
//! | `d_` | 延迟单元格 |
//! | `b_` | 单例 Bean |
//! | `f_` | 按请求构造的 Bean 工厂 |
//! | `t_` | 按请求构造且带销毁方法的 Bean 已发放实例 |
//! | `m_` | 子模块 |
//! | `c_` / `cm_` | 集合插槽的临时值 |

use super::writer::SourceWriter;
use std::collections::BTreeSet;
use wiring_abstractions::{DeferredEdge, InstantiationPlan, ModuleDescriptor, ModulePlan, PlanStep};
use wiring_common::naming::{bean_key, module_type_name, socket_key, sockets_type_name};
use wiring_common::{
    Bean, BeanId, Cardinality, Lifetime, MetadataModel, Module, ModuleId, Multiplicity, Provider,
    Socket, SocketId, SocketOwner, WireSet,
};

const ARC: &str = "::std::sync::Arc";
const ONCE_LOCK: &str = "::std::sync::OnceLock";
const MUTEX: &str = "::std::sync::Mutex";

fn arc(ty: &str) -> String {
    format!("{}<{}>", ARC, ty)
}

fn provider_type(ty: &str) -> String {
    format!("{}<dyn Fn() -> {} + Send + Sync>", ARC, arc(ty))
}

fn cell_type(ty: &str) -> String {
    format!("{}<{}<{}>>", ARC, ONCE_LOCK, arc(ty))
}

fn issued_type(ty: &str) -> String {
    format!("{}<{}<Vec<::std::sync::Weak<{}>>>>", ARC, MUTEX, ty)
}

/// 按请求构造且带销毁方法的 Bean 需要记录已发放的实例
fn tracks_issued(bean: &Bean) -> bool {
    bean.lifetime == Lifetime::PerRequest && !bean.destroy.is_empty()
}

/// 插槽取值的 Rust 类型
fn socket_value_type(socket: &Socket) -> String {
    let ty = socket.required_type.as_str();
    if socket.lazy {
        return cell_type(ty);
    }
    match socket.multiplicity {
        Multiplicity::Single => arc(ty),
        Multiplicity::Optional => format!("Option<{}>", arc(ty)),
        Multiplicity::Collection => format!("Vec<{}>", arc(ty)),
    }
}

fn import_key(model: &MetadataModel, bean: BeanId) -> String {
    let bean = model.bean(bean);
    bean_key(&model.module(bean.module).path, &bean.name)
}

fn deferred_key(model: &MetadataModel, socket: SocketId) -> String {
    let socket = model.socket(socket);
    let owner = match socket.owner {
        SocketOwner::Bean(bean) => Some(model.bean(bean).name.as_str()),
        SocketOwner::Module(_) => None,
    };
    socket_key(&model.module(socket.module).path, owner, &socket.name)
}

/// 单个模块的渲染器
pub(crate) struct Renderer<'a> {
    model: &'a MetadataModel,
    wires: &'a WireSet,
    plan: &'a InstantiationPlan,
    module_plan: &'a ModulePlan,
    module: &'a Module,
    out: SourceWriter,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(
        model: &'a MetadataModel,
        wires: &'a WireSet,
        plan: &'a InstantiationPlan,
        module_plan: &'a ModulePlan,
    ) -> Self {
        Self {
            model,
            wires,
            plan,
            module_plan,
            module: model.module(module_plan.module),
            out: SourceWriter::new(),
        }
    }

    pub(crate) fn render(mut self, header: &str, descriptor: &ModuleDescriptor) -> String {
        for line in header.lines() {
            self.out.line(line);
        }
        self.out.line(format!("// module: {}", self.module.path));
        self.out.blank();

        self.render_sockets_struct();
        self.out.blank();
        self.render_module_struct();
        self.out.blank();

        let type_name = module_type_name(&self.module.path);
        self.out.open(format!("impl {} {{", type_name));
        self.render_exposed(descriptor);
        self.out.blank();
        self.render_constructor();
        self.render_accessors();
        self.out.blank();
        self.render_shutdown();
        self.out.close("}");
        self.out.finish()
    }

    // -----------------------------------------------------------------------
    // 结构体
    // -----------------------------------------------------------------------

    /// (字段名, 局部变量名, 类型)
    fn input_fields(&self) -> Vec<(String, String, String)> {
        let model = self.model;
        let declared = self.module.sockets.iter().map(|id| {
            let socket = model.socket(*id);
            (socket.name.clone(), format!("s_{}", socket.name), socket_value_type(socket))
        });
        let imports = self.module_plan.imports.iter().map(|id| {
            let bean = model.bean(*id);
            let ty = match bean.lifetime {
                Lifetime::Singleton => arc(bean.bean_type.as_str()),
                Lifetime::PerRequest => provider_type(bean.bean_type.as_str()),
            };
            let key = import_key(model, *id);
            (format!("import__{}", key), format!("i_{}", key), ty)
        });
        let deferred = self.module_plan.deferred_in.iter().map(|id| {
            let key = deferred_key(model, *id);
            (
                format!("deferred__{}", key),
                format!("d_{}", key),
                cell_type(model.socket(*id).required_type.as_str()),
            )
        });
        declared.chain(imports).chain(deferred).collect()
    }

    fn render_sockets_struct(&mut self) {
        let fields = self.input_fields();
        self.out.line(format!("/// 模块 `{}` 的输入", self.module.path));
        self.out.line("#[allow(dead_code, non_snake_case)]");
        self.out.open(format!("pub struct {} {{", sockets_type_name(&self.module.path)));
        for (name, _, ty) in fields {
            self.out.line(format!("pub {}: {},", name, ty));
        }
        self.out.close("}");
    }

    fn render_module_struct(&mut self) {
        self.out.line(format!("/// 模块 `{}`", self.module.path));
        self.out.line("#[allow(dead_code, non_snake_case)]");
        self.out.open(format!("pub struct {} {{", module_type_name(&self.module.path)));
        for id in &self.module.beans {
            let bean = self.model.bean(*id);
            let ty = match bean.lifetime {
                Lifetime::Singleton => arc(bean.bean_type.as_str()),
                Lifetime::PerRequest => provider_type(bean.bean_type.as_str()),
            };
            self.out.line(format!("{}: {},", bean.name, ty));
            if tracks_issued(bean) {
                self.out.line(format!("{}_issued: {},", bean.name, issued_type(bean.bean_type.as_str())));
            }
        }
        for id in &self.module.children {
            let child = self.model.module(*id);
            self.out.line(format!("{}_module: {},", child.name, arc(&module_type_name(&child.path))));
        }
        self.out.close("}");
    }

    fn render_exposed(&mut self, descriptor: &ModuleDescriptor) {
        self.out.line("/// 对外暴露的 (类型, 限定符)");
        self.out.open("pub const EXPOSED: &'static [(&'static str, Option<&'static str>)] = &[");
        for (ty, qualifier) in descriptor.exposed_pairs() {
            let qualifier = qualifier.map_or_else(|| "None".to_string(), |q| format!("Some({:?})", q.as_str()));
            self.out.line(format!("({:?}, {}),", ty.as_str(), qualifier));
        }
        self.out.close("];");
    }

    // -----------------------------------------------------------------------
    // 引用表达式
    // -----------------------------------------------------------------------

    /// 从本模块到子树内某模块的访问链，首段是子模块局部变量
    fn child_chain(&self, target: ModuleId, uses: &mut BTreeSet<String>) -> String {
        let mut current = self.module.id;
        let mut chain = String::new();
        while let Some(next) = self.model.child_containing(current, target) {
            let name = &self.model.module(next).name;
            if current == self.module.id {
                let local = format!("m_{}", name);
                chain.push_str(&local);
                uses.insert(local);
            } else {
                chain.push_str(&format!(".{}_module()", name));
            }
            current = next;
        }
        chain
    }

    /// Bean 的取值表达式，类型为 `Arc<声明类型>`
    fn bean_value(&self, id: BeanId, uses: &mut BTreeSet<String>) -> String {
        let bean = self.model.bean(id);
        let per_request = bean.lifetime == Lifetime::PerRequest;
        if bean.module == self.module.id {
            let local = if per_request {
                format!("f_{}", bean.name)
            } else {
                format!("b_{}", bean.name)
            };
            uses.insert(local.clone());
            if per_request {
                format!("({})()", local)
            } else {
                format!("{}.clone()", local)
            }
        } else if self.model.is_within(bean.module, self.module.id) {
            format!("{}.{}()", self.child_chain(bean.module, uses), bean.name)
        } else {
            let local = format!("i_{}", import_key(self.model, id));
            uses.insert(local.clone());
            if per_request {
                format!("({})()", local)
            } else {
                format!("{}.clone()", local)
            }
        }
    }

    /// 导入字段的取值：单例传实例，按请求构造的 Bean 传工厂
    fn import_value(&self, id: BeanId, uses: &mut BTreeSet<String>) -> String {
        let bean = self.model.bean(id);
        if bean.lifetime == Lifetime::Singleton {
            return self.bean_value(id, uses);
        }
        if bean.module == self.module.id {
            let local = format!("f_{}", bean.name);
            uses.insert(local.clone());
            format!("{}.clone()", local)
        } else if self.model.is_within(bean.module, self.module.id) {
            format!("{}.{}_provider()", self.child_chain(bean.module, uses), bean.name)
        } else {
            let local = format!("i_{}", import_key(self.model, id));
            uses.insert(local.clone());
            format!("{}.clone()", local)
        }
    }

    fn socket_local(&self, id: SocketId, uses: &mut BTreeSet<String>) -> String {
        let local = format!("s_{}", self.model.socket(id).name);
        uses.insert(local.clone());
        local
    }

    /// 目标 Bean 转换为插槽需要的类型
    fn coerced_bean(&self, id: BeanId, required: &str, uses: &mut BTreeSet<String>) -> String {
        let value = self.bean_value(id, uses);
        if self.model.bean(id).bean_type.as_str() == required {
            value
        } else {
            format!("{} as {}", value, arc(required))
        }
    }

    /// 插槽实参表达式
    ///
    /// 集合插槽先在 `prelude` 中构造临时向量，实参是该临时变量。
    fn socket_argument(
        &self,
        id: SocketId,
        temp: &str,
        prelude: &mut Vec<String>,
        uses: &mut BTreeSet<String>,
    ) -> String {
        let socket = self.model.socket(id);
        if socket.lazy {
            let local = format!("d_{}", deferred_key(self.model, id));
            uses.insert(local.clone());
            return format!("{}.clone()", local);
        }

        let targets: &[Provider] = self.wires.get(id).map(|w| w.targets.as_slice()).unwrap_or_default();
        let required = socket.required_type.as_str();
        match socket.multiplicity {
            Multiplicity::Single => match targets.first() {
                Some(Provider::Bean(bean)) => self.bean_value(*bean, uses),
                Some(Provider::Socket(source)) => format!("{}.clone()", self.socket_local(*source, uses)),
                None => "unreachable!()".to_string(),
            },
            Multiplicity::Optional => match targets.first() {
                Some(Provider::Bean(bean)) => format!("Some({})", self.coerced_bean(*bean, required, uses)),
                Some(Provider::Socket(source)) => {
                    let local = self.socket_local(*source, uses);
                    match self.model.provider_cardinality(Provider::Socket(*source)) {
                        Cardinality::One => format!("Some({}.clone())", local),
                        _ => format!("{}.clone()", local),
                    }
                }
                None => "None".to_string(),
            },
            Multiplicity::Collection => {
                let ty = format!("Vec<{}>", arc(required));
                if targets.is_empty() {
                    prelude.push(format!("let {}: {} = Vec::new();", temp, ty));
                    return temp.to_string();
                }
                prelude.push(format!("let mut {}: {} = Vec::with_capacity({});", temp, ty, targets.len()));
                for target in targets {
                    let line = match target {
                        Provider::Bean(bean) => format!("{}.push({});", temp, self.bean_value(*bean, uses)),
                        Provider::Socket(source) => {
                            let local = self.socket_local(*source, uses);
                            match self.model.provider_cardinality(*target) {
                                Cardinality::One => format!("{}.push({}.clone());", temp, local),
                                Cardinality::MaybeOne => format!("{}.extend({}.clone());", temp, local),
                                Cardinality::Many => format!("{}.extend({}.iter().cloned());", temp, local),
                            }
                        }
                    };
                    prelude.push(line);
                }
                temp.to_string()
            }
        }
    }

    // -----------------------------------------------------------------------
    // 构造函数
    // -----------------------------------------------------------------------

    fn render_constructor(&mut self) {
        let path = self.module.path.clone();
        let sockets_type = sockets_type_name(&path);

        self.out.line(format!("/// 按依赖顺序构造模块 `{}`", path));
        self.out.line("#[allow(unused_variables, non_snake_case, clippy::redundant_clone)]");
        self.out.open(format!("pub fn new(sockets: {}) -> Self {{", sockets_type));

        let bindings: Vec<String> = self
            .input_fields()
            .into_iter()
            .map(|(field, local, _)| format!("{}: {}", field, local))
            .collect();
        if bindings.is_empty() {
            self.out.line(format!("let {} {{}} = sockets;", sockets_type));
        } else {
            self.out.open(format!("let {} {{", sockets_type));
            for binding in bindings {
                self.out.line(format!("{},", binding));
            }
            self.out.close("} = sockets;");
        }

        for socket in self.module_plan.deferred_owned.clone() {
            let ty = cell_type(self.model.socket(socket).required_type.as_str());
            self.out.line(format!(
                "let d_{}: {} = {}::new({}::new());",
                deferred_key(self.model, socket),
                ty,
                ARC,
                ONCE_LOCK
            ));
        }

        for step in self.module_plan.steps.clone() {
            match step {
                PlanStep::Bean(bean) => match self.model.bean(bean).lifetime {
                    Lifetime::Singleton => self.render_singleton(bean),
                    Lifetime::PerRequest => self.render_per_request(bean),
                },
                PlanStep::Module(child) => self.render_child(child),
            }
        }

        for socket in self.module_plan.deferred_owned.clone() {
            if let Some(edge) = self.plan.deferred_edge(socket).copied() {
                self.render_patch(&edge);
            }
        }

        self.out.open("Self {");
        for id in &self.module.beans {
            let bean = self.model.bean(*id);
            let prefix = match bean.lifetime {
                Lifetime::Singleton => "b",
                Lifetime::PerRequest => "f",
            };
            self.out.line(format!("{}: {}_{},", bean.name, prefix, bean.name));
            if tracks_issued(bean) {
                self.out.line(format!("{}_issued: t_{},", bean.name, bean.name));
            }
        }
        for id in &self.module.children {
            let name = &self.model.module(*id).name;
            self.out.line(format!("{}_module: m_{},", name, name));
        }
        self.out.close("}");
        self.out.close("}");
    }

    fn constructor_call(&self, bean: &Bean, prelude: &mut Vec<String>, uses: &mut BTreeSet<String>) -> String {
        let args: Vec<String> = bean
            .sockets
            .iter()
            .map(|socket| {
                let temp = format!("c_{}__{}", bean.name, self.model.socket(*socket).name);
                self.socket_argument(*socket, &temp, prelude, uses)
            })
            .collect();
        let constructor = bean
            .factory
            .clone()
            .unwrap_or_else(|| format!("<{}>::new", bean.bean_type));
        format!("{}::new({}({}))", ARC, constructor, args.join(", "))
    }

    fn render_singleton(&mut self, id: BeanId) {
        let bean = self.model.bean(id);
        let mut prelude = Vec::new();
        let mut uses = BTreeSet::new();
        let call = self.constructor_call(bean, &mut prelude, &mut uses);

        for line in prelude {
            self.out.line(line);
        }
        self.out.line(format!("let b_{} = {};", bean.name, call));
        for hook in &bean.init {
            self.out.line(format!("b_{}.{}();", bean.name, hook));
        }
    }

    fn render_per_request(&mut self, id: BeanId) {
        let bean = self.model.bean(id);
        let mut prelude = Vec::new();
        let mut uses = BTreeSet::new();
        let call = self.constructor_call(bean, &mut prelude, &mut uses);
        let tracked = tracks_issued(bean);

        if tracked {
            self.out.line(format!(
                "let t_{}: {} = {}::new({}::new(Vec::new()));",
                bean.name,
                issued_type(bean.bean_type.as_str()),
                ARC,
                MUTEX
            ));
            uses.insert(format!("t_{}", bean.name));
        }
        self.out.open(format!(
            "let f_{}: {} = {{",
            bean.name,
            provider_type(bean.bean_type.as_str())
        ));
        for local in &uses {
            self.out.line(format!("let {} = {}.clone();", local, local));
        }
        self.out.open(format!("{}::new(move || {{", ARC));
        for line in prelude {
            self.out.line(line);
        }
        self.out.line(format!("let bean = {};", call));
        for hook in &bean.init {
            self.out.line(format!("bean.{}();", hook));
        }
        if tracked {
            self.out.open(format!("if let Ok(mut issued) = t_{}.lock() {{", bean.name));
            self.out.line("issued.retain(|weak| weak.strong_count() > 0);");
            self.out.line(format!("issued.push({}::downgrade(&bean));", ARC));
            self.out.close("}");
        }
        self.out.line("bean");
        self.out.close("})");
        self.out.close("};");
    }

    fn render_child(&mut self, id: ModuleId) {
        let child = self.model.module(id);
        let Some(child_plan) = self.plan.module(id) else {
            return;
        };
        let mut prelude = Vec::new();
        let mut uses = BTreeSet::new();
        let mut fields = Vec::new();

        for socket in &child.sockets {
            let name = &self.model.socket(*socket).name;
            let temp = format!("cm_{}__{}", child.name, name);
            let value = self.socket_argument(*socket, &temp, &mut prelude, &mut uses);
            fields.push(format!("{}: {},", name, value));
        }
        for bean in &child_plan.imports {
            fields.push(format!(
                "import__{}: {},",
                import_key(self.model, *bean),
                self.import_value(*bean, &mut uses)
            ));
        }
        for socket in &child_plan.deferred_in {
            let key = deferred_key(self.model, *socket);
            fields.push(format!("deferred__{}: d_{}.clone(),", key, key));
        }

        for line in prelude {
            self.out.line(line);
        }
        self.out.open(format!(
            "let m_{} = {}::new({}::new({} {{",
            child.name,
            ARC,
            module_type_name(&child.path),
            sockets_type_name(&child.path)
        ));
        for field in fields {
            self.out.line(field);
        }
        self.out.close("}));");
    }

    fn render_patch(&mut self, edge: &DeferredEdge) {
        let socket = self.model.socket(edge.socket);
        let cell = format!("d_{}", deferred_key(self.model, edge.socket));
        let mut uses = BTreeSet::new();
        match edge.target {
            Some(Provider::Bean(bean)) => {
                let value = self.coerced_bean(bean, socket.required_type.as_str(), &mut uses);
                self.out.line(format!("let _ = {}.set({});", cell, value));
            }
            Some(Provider::Socket(source)) => {
                let local = self.socket_local(source, &mut uses);
                if self.model.provider_cardinality(Provider::Socket(source)) == Cardinality::One {
                    self.out.line(format!("let _ = {}.set({}.clone());", cell, local));
                } else {
                    self.out.open(format!("if let Some(value) = {}.clone() {{", local));
                    self.out.line(format!("let _ = {}.set(value);", cell));
                    self.out.close("}");
                }
            }
            None => {}
        }
    }

    // -----------------------------------------------------------------------
    // 访问器与关闭
    // -----------------------------------------------------------------------

    fn render_accessors(&mut self) {
        for id in &self.module.beans {
            let bean = self.model.bean(*id);
            if !bean.visibility.is_public() {
                continue;
            }
            let ty = bean.bean_type.as_str();
            self.out.blank();
            match bean.lifetime {
                Lifetime::Singleton => {
                    self.out.line(format!("/// 单例 `{}`", bean.name));
                    self.out.open(format!("pub fn {}(&self) -> {} {{", bean.name, arc(ty)));
                    self.out.line(format!("{}::clone(&self.{})", ARC, bean.name));
                    self.out.close("}");
                }
                Lifetime::PerRequest => {
                    self.out.line(format!("/// 构造新的 `{}`", bean.name));
                    self.out.open(format!("pub fn {}(&self) -> {} {{", bean.name, arc(ty)));
                    self.out.line(format!("(self.{})()", bean.name));
                    self.out.close("}");
                    self.out.blank();
                    self.out.line(format!("/// `{}` 的工厂", bean.name));
                    self.out.open(format!("pub fn {}_provider(&self) -> {} {{", bean.name, provider_type(ty)));
                    self.out.line(format!("{}::clone(&self.{})", ARC, bean.name));
                    self.out.close("}");
                }
            }
        }
        for id in &self.module.children {
            let child = self.model.module(*id);
            self.out.blank();
            self.out.line(format!("/// 子模块 `{}`", child.path));
            self.out.open(format!(
                "pub fn {}_module(&self) -> &{} {{",
                child.name,
                module_type_name(&child.path)
            ));
            self.out.line(format!("&self.{}_module", child.name));
            self.out.close("}");
        }
    }

    fn render_shutdown(&mut self) {
        self.out.line("/// 按构造的逆序关闭");
        self.out.open("pub fn shutdown(&self) {");
        for step in self.module_plan.steps.iter().rev() {
            match step {
                PlanStep::Bean(id) => {
                    let bean = self.model.bean(*id);
                    if bean.lifetime == Lifetime::Singleton {
                        for hook in &bean.destroy {
                            self.out.line(format!("self.{}.{}();", bean.name, hook));
                        }
                    } else if tracks_issued(bean) {
                        self.out.open(format!("if let Ok(mut issued) = self.{}_issued.lock() {{", bean.name));
                        self.out.open("for bean in issued.drain(..).filter_map(|weak| weak.upgrade()) {");
                        for hook in &bean.destroy {
                            self.out.line(format!("bean.{}();", hook));
                        }
                        self.out.close("}");
                        self.out.close("}");
                    }
                }
                PlanStep::Module(id) => {
                    self.out.line(format!("self.{}_module.shutdown();", self.model.module(*id).name));
                }
            }
        }
        self.out.close("}");
    }
}
