//! 生成前的声明校验
//!
//! 类型路径与构造函数路径必须能被解析为 Rust 语法；生成的成员名不能互相冲突。

use std::collections::BTreeSet;
use wiring_common::{Diagnostic, DiagnosticKind, Lifetime, Location, MetadataModel, ModuleId, Multiplicity};

/// 类型出现的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeRole {
    /// Bean 的声明类型，需要能调用 `<T>::new`
    Concrete,
    /// 可赋值类型或插槽需要的类型，允许 `dyn Trait`
    Assignable,
}

fn check_type(ty: &str, role: TypeRole) -> Result<(), String> {
    let parsed: syn::Type = syn::parse_str(ty).map_err(|e| format!("类型路径 `{}` 无法解析: {}", ty, e))?;
    match parsed {
        syn::Type::ImplTrait(_) => Err(format!("类型 `{}` 不能使用 `impl Trait`", ty)),
        syn::Type::Infer(_) => Err("类型不能是 `_`".to_string()),
        syn::Type::Never(_) => Err("类型不能是 `!`".to_string()),
        syn::Type::TraitObject(_) if role == TypeRole::Concrete => {
            Err(format!("Bean 的声明类型 `{}` 必须是具体类型", ty))
        }
        _ => Ok(()),
    }
}

fn check_factory(path: &str) -> Result<(), String> {
    syn::parse_str::<syn::ExprPath>(path)
        .map(|_| ())
        .map_err(|e| format!("构造函数路径 `{}` 无法解析: {}", path, e))
}

/// 校验模块自身的声明
pub(crate) fn validate_module(model: &MetadataModel, id: ModuleId) -> Result<(), Vec<Diagnostic>> {
    let module = model.module(id);
    let mut diagnostics = Vec::new();
    let mut invalid = |location: Location, message: String| {
        diagnostics.push(
            Diagnostic::new(DiagnosticKind::InvalidDeclaration, location, message).in_module(id),
        );
    };

    for socket in &module.sockets {
        if let Err(message) = check_type(model.socket(*socket).required_type.as_str(), TypeRole::Assignable) {
            invalid(model.socket_location(*socket), message);
        }
    }

    for bean_id in &module.beans {
        let bean = model.bean(*bean_id);
        if let Err(message) = check_type(bean.bean_type.as_str(), TypeRole::Concrete) {
            invalid(model.bean_location(*bean_id), message);
        }
        for ty in bean.provides.iter().skip(1) {
            if let Err(message) = check_type(ty.as_str(), TypeRole::Assignable) {
                invalid(model.bean_location(*bean_id), message);
            }
        }
        if let Some(factory) = &bean.factory {
            if let Err(message) = check_factory(factory) {
                invalid(model.bean_location(*bean_id), message);
            }
        }
        for socket in &bean.sockets {
            if let Err(message) = check_type(model.socket(*socket).required_type.as_str(), TypeRole::Assignable) {
                invalid(model.socket_location(*socket), message);
            }
        }
    }

    let mut members: BTreeSet<String> = ["new", "shutdown"].iter().map(|s| s.to_string()).collect();
    let generated = module
        .beans
        .iter()
        .flat_map(|bean_id| {
            let bean = model.bean(*bean_id);
            let per_request = bean.lifetime == Lifetime::PerRequest;
            let provider = (bean.visibility.is_public() && per_request).then(|| format!("{}_provider", bean.name));
            let issued = (per_request && !bean.destroy.is_empty()).then(|| format!("{}_issued", bean.name));
            std::iter::once(bean.name.clone()).chain(provider).chain(issued)
        })
        .chain(
            module
                .children
                .iter()
                .map(|child| format!("{}_module", model.module(*child).name)),
        );
    for member in generated {
        if !members.insert(member.clone()) {
            invalid(
                Location::module(&module.path).with_position(module.position.clone()),
                format!("生成的成员名 `{}` 冲突", member),
            );
        }
    }

    let mut temporaries = BTreeSet::new();
    let collection_sockets = module
        .beans
        .iter()
        .flat_map(|bean_id| {
            let bean = model.bean(*bean_id);
            bean.sockets.iter().map(move |socket| (format!("c_{}", bean.name), *socket))
        })
        .chain(module.children.iter().flat_map(|child| {
            let child = model.module(*child);
            child.sockets.iter().map(move |socket| (format!("cm_{}", child.name), *socket))
        }));
    for (prefix, socket_id) in collection_sockets {
        let socket = model.socket(socket_id);
        if socket.multiplicity != Multiplicity::Collection || socket.lazy {
            continue;
        }
        let temporary = format!("{}__{}", prefix, socket.name);
        if !temporaries.insert(temporary.clone()) {
            invalid(model.socket_location(socket_id), format!("生成的临时变量 `{}` 冲突", temporary));
        }
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiring_common::{BeanDeclaration, ModuleDeclaration, SocketDeclaration};

    #[test]
    fn test_check_type() {
        assert!(check_type("crate::db::Pool", TypeRole::Concrete).is_ok());
        assert!(check_type("std::collections::HashMap<String, u32>", TypeRole::Concrete).is_ok());
        assert!(check_type("dyn crate::Store + Send + Sync", TypeRole::Assignable).is_ok());

        assert!(check_type("dyn crate::Store", TypeRole::Concrete).is_err());
        assert!(check_type("impl crate::Store", TypeRole::Assignable).is_err());
        assert!(check_type("crate::Pool>", TypeRole::Assignable).is_err());
        assert!(check_type("!", TypeRole::Assignable).is_err());
    }

    #[test]
    fn test_check_factory() {
        assert!(check_factory("crate::db::connect").is_ok());
        assert!(check_factory("<crate::Pool as Default>::default").is_ok());
        assert!(check_factory("connect()").is_err());
    }

    #[test]
    fn test_validate_module_reports_each_problem() {
        let (model, _) = MetadataModel::build(&[ModuleDeclaration::new("app")
            .with_socket(SocketDeclaration::single("clock", "impl Clock"))
            .with_bean(BeanDeclaration::new("store", "dyn crate::Store"))
            .with_bean(BeanDeclaration::new("pool", "crate::Pool").with_factory("1 + 1"))
            .with_bean(BeanDeclaration::new("db_module", "crate::Db"))
            .with_module(ModuleDeclaration::new("db"))]);

        let diagnostics = validate_module(&model, ModuleId(0)).unwrap_err();
        assert_eq!(diagnostics.len(), 4);
        assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::InvalidDeclaration));
        assert!(diagnostics.iter().any(|d| d.message.contains("`db_module` 冲突")));
    }

    #[test]
    fn test_generated_locals_and_fields_must_not_collide() {
        let (model, _) = MetadataModel::build(&[ModuleDeclaration::new("m")
            .with_bean(
                BeanDeclaration::new("a", "crate::A")
                    .with_socket(SocketDeclaration::collection("b__c", "crate::C")),
            )
            .with_bean(
                BeanDeclaration::new("a__b", "crate::Ab")
                    .with_socket(SocketDeclaration::collection("c", "crate::C")),
            )
            .with_bean(BeanDeclaration::new("session", "crate::Session").per_request().with_destroy("close"))
            .with_bean(BeanDeclaration::new("session_issued", "crate::Log"))]);

        let diagnostics = validate_module(&model, ModuleId(0)).unwrap_err();
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages.len(), 2, "{:?}", messages);
        assert!(messages.contains(&"生成的成员名 `session_issued` 冲突"));
        assert!(messages.contains(&"生成的临时变量 `c_a__b__c` 冲突"));
    }
}
