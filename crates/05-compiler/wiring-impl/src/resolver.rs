//! 插槽解析器实现

use tracing::debug;
use wiring_abstractions::{Candidate, CandidateLookup, Resolution, SocketResolver};
use wiring_common::{
    Diagnostic, DiagnosticKind, MetadataModel, ModuleId, Multiplicity, Provider, SocketId,
    SocketOwner, Wire,
};

/// 默认插槽解析器
///
/// 按多重性选择候选：
///
/// - `single`：恰好一个；没有候选报 `UnsatisfiedDependencyError`，多个候选时由唯一默认候选打破平局，
///   否则报 `AmbiguousDependencyError`
/// - `optional`：零个或一个，多个候选时规则同上
/// - `collection`：全部候选，按稳定顺序排列
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSocketResolver;

impl DefaultSocketResolver {
    /// 创建解析器
    pub fn new() -> Self {
        Self
    }

    /// 解析单个插槽
    ///
    /// `scope` 是查找候选的可见范围；`excluded` 子树内的候选不参与匹配（模块插槽不能由自身子树满足）。
    pub fn resolve_socket(
        &self,
        model: &MetadataModel,
        index: &dyn CandidateLookup,
        scope: ModuleId,
        excluded: Option<ModuleId>,
        socket_id: SocketId,
    ) -> Result<Wire, Diagnostic> {
        let socket = model.socket(socket_id);
        let requirer = match socket.owner {
            SocketOwner::Bean(bean) => Some(Provider::Bean(bean)),
            SocketOwner::Module(_) => None,
        };

        let mut candidates: Vec<Candidate> = index
            .lookup(scope, &socket.required_type, socket.qualifier.as_ref())
            .into_iter()
            .filter(|c| Some(c.provider) != requirer)
            .filter(|c| excluded.map_or(true, |root| !model.is_within(c.module, root)))
            .filter(|c| socket.multiplicity.accepts(c.cardinality))
            .collect();

        if !socket.wired_to.is_empty() {
            candidates = self.restrict_to_wired(model, scope, socket_id, candidates)?;
        }

        let targets = match socket.multiplicity {
            Multiplicity::Collection => candidates.iter().map(|c| c.provider).collect(),
            Multiplicity::Single | Multiplicity::Optional => {
                match self.select_one(model, scope, socket_id, &candidates)? {
                    Some(provider) => vec![provider],
                    None if socket.multiplicity == Multiplicity::Optional => Vec::new(),
                    None => {
                        return Err(Diagnostic::new(
                            DiagnosticKind::UnsatisfiedDependency,
                            model.socket_location(socket_id),
                            format!(
                                "没有可满足 `{}`{} 的候选",
                                socket.required_type,
                                describe_qualifier(model, socket_id)
                            ),
                        )
                        .in_module(scope));
                    }
                }
            }
        };

        Ok(Wire {
            socket: socket_id,
            targets,
            lazy: socket.lazy,
        })
    }

    fn restrict_to_wired(
        &self,
        model: &MetadataModel,
        scope: ModuleId,
        socket_id: SocketId,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, Diagnostic> {
        let socket = model.socket(socket_id);
        let matches = |entry: &str, candidate: &Candidate| {
            entry == model.provider_name(candidate.provider)
                || entry == model.qualified_name(candidate.provider)
        };

        if let Some(unknown) = socket
            .wired_to
            .iter()
            .find(|entry| !candidates.iter().any(|c| matches(entry, c)))
        {
            return Err(Diagnostic::new(
                DiagnosticKind::InvalidDeclaration,
                model.socket_location(socket_id),
                format!(
                    "显式连线目标 `{}` 不是 `{}` 的可见候选",
                    unknown, socket.required_type
                ),
            )
            .in_module(scope));
        }

        Ok(candidates
            .into_iter()
            .filter(|c| socket.wired_to.iter().any(|entry| matches(entry, c)))
            .collect())
    }

    fn select_one(
        &self,
        model: &MetadataModel,
        scope: ModuleId,
        socket_id: SocketId,
        candidates: &[Candidate],
    ) -> Result<Option<Provider>, Diagnostic> {
        match candidates {
            [] => Ok(None),
            [only] => Ok(Some(only.provider)),
            _ => {
                let mut defaults = candidates.iter().filter(|c| c.default);
                if let (Some(chosen), None) = (defaults.next(), defaults.next()) {
                    return Ok(Some(chosen.provider));
                }

                let socket = model.socket(socket_id);
                let implicated: Vec<String> = candidates
                    .iter()
                    .map(|c| model.qualified_name(c.provider))
                    .collect();
                Err(Diagnostic::new(
                    DiagnosticKind::AmbiguousDependency,
                    model.socket_location(socket_id),
                    format!(
                        "`{}`{} 有 {} 个候选且没有唯一的默认候选",
                        socket.required_type,
                        describe_qualifier(model, socket_id),
                        candidates.len()
                    ),
                )
                .with_implicated(implicated)
                .in_module(scope))
            }
        }
    }
}

impl SocketResolver for DefaultSocketResolver {
    fn resolve_module(
        &self,
        model: &MetadataModel,
        index: &dyn CandidateLookup,
        module: ModuleId,
    ) -> Resolution {
        let current = model.module(module);
        let bean_sockets = current
            .beans
            .iter()
            .flat_map(|bean| model.bean(*bean).sockets.iter())
            .map(|socket| (*socket, None));
        let child_sockets = current.children.iter().flat_map(|child| {
            model
                .module(*child)
                .sockets
                .iter()
                .map(move |socket| (*socket, Some(*child)))
        });

        let mut resolution = Resolution::default();
        for (socket, excluded) in bean_sockets.chain(child_sockets) {
            match self.resolve_socket(model, index, module, excluded, socket) {
                Ok(wire) => resolution.wires.push(wire),
                Err(diagnostic) => resolution.diagnostics.push(diagnostic),
            }
        }

        debug!(
            module = %current.path,
            wires = resolution.wires.len(),
            diagnostics = resolution.diagnostics.len(),
            "模块插槽解析完成"
        );
        resolution
    }
}

fn describe_qualifier(model: &MetadataModel, socket: SocketId) -> String {
    model
        .socket(socket)
        .qualifier
        .as_ref()
        .map(|q| format!(" (限定符 `{}`)", q))
        .unwrap_or_default()
}
