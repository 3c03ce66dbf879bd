//! Connections to behaviors.
//!
//! C has no continuous assignment, so every connection becomes a statement
//! of a behavior in the same scope. Connections are grouped by what drives
//! them: constants go to one timed behavior, reads of module inputs or
//! instance outputs to one "inputs" behavior, writes of module outputs or
//! instance inputs to one "outputs" behavior. Inout connections get a
//! behavior each. A connection touching no port has no evident direction; it
//! is reported and forwarded by a behavior of its own.

use crate::codes::AMBIGUOUS_CONNECTION;
use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::LowerResult;
use lowr_diagnostics::Diagnostic;
use lowr_ir::resolve::{resolve, Decl, ResolveEnv};
use lowr_ir::walk::read;
use lowr_ir::{
    BehaviorKind, BlockId, Connection, Design, Interfaces, Mode, Module, Place, PortDirection,
    Ref, ScopeId, Statement,
};

/// Turns every connection into a behavior statement.
pub struct ConnectionsToBehaviorsPass;

impl LoweringPass for ConnectionsToBehaviorsPass {
    fn name(&self) -> &'static str {
        "connections-to-behaviors"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, interfaces| {
            for scope in module.live_scopes() {
                convert_scope(module, scope, interfaces, cx)?;
            }
            Ok(())
        })
    }
}

/// Where a connection goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Timed,
    Inputs,
    Outputs,
    Dedicated,
    Ambiguous,
}

/// The port a reference selects from, if it names one.
fn direction(env: ResolveEnv<'_>, module: &Module, place: Place, r: &Ref) -> LowerResult<Option<Side>> {
    let Some(name) = named_part(r) else {
        return Ok(None);
    };
    Ok(match resolve(env, module, place, name)? {
        Decl::Signal(s) => module.port_direction(s).map(Side::Module),
        Decl::Port { instance, signal } => env
            .interfaces
            .get(&module.instances[instance].module)
            .and_then(|iface| iface.port_by_signal(signal))
            .map(|port| Side::Instance(port.direction)),
        _ => None,
    })
}

/// A port touched by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Module(PortDirection),
    Instance(PortDirection),
}

impl Side {
    fn is_inout(self) -> bool {
        matches!(
            self,
            Side::Module(PortDirection::InOut) | Side::Instance(PortDirection::InOut)
        )
    }

    /// A value flowing into the module's logic.
    fn drives(self) -> bool {
        matches!(
            self,
            Side::Module(PortDirection::Input) | Side::Instance(PortDirection::Output)
        )
    }

    /// A value flowing out of the module's logic.
    fn receives(self) -> bool {
        matches!(
            self,
            Side::Module(PortDirection::Output) | Side::Instance(PortDirection::Input)
        )
    }
}

/// Strips bit selections down to the selected name.
fn named_part(r: &Ref) -> Option<&Ref> {
    match r {
        Ref::Name { .. } => Some(r),
        Ref::Index { base, .. } | Ref::Range { base, .. } => named_part(base),
        Ref::This | Ref::Concat { .. } => None,
    }
}

fn route(
    env: ResolveEnv<'_>,
    module: &Module,
    place: Place,
    connection: &Connection,
) -> LowerResult<Route> {
    if connection.right.is_constant() {
        return Ok(Route::Timed);
    }
    let mut targets = Vec::new();
    match &connection.left {
        Ref::Concat { parts, .. } => targets.extend(parts.iter()),
        left => targets.push(left),
    }
    let mut writes = Vec::new();
    for target in targets {
        writes.extend(direction(env, module, place, target)?);
    }
    let mut sources = Vec::new();
    read::expr_refs(&connection.right, &mut |r, _| sources.push(r.clone()));
    let mut reads = Vec::new();
    for source in &sources {
        // Selections are reported along with the names they select from.
        if let Ref::Name { .. } = source {
            reads.extend(direction(env, module, place, source)?);
        }
    }

    Ok(if writes.iter().chain(&reads).any(|s| s.is_inout()) {
        Route::Dedicated
    } else if reads.iter().any(|s| s.drives()) {
        Route::Inputs
    } else if writes.iter().any(|s| s.receives()) {
        Route::Outputs
    } else {
        Route::Ambiguous
    })
}

/// The behaviors created for one scope, by route.
#[derive(Default)]
struct Targets {
    timed: Option<BlockId>,
    inputs: Option<BlockId>,
    outputs: Option<BlockId>,
}

fn convert_scope(
    module: &mut Module,
    scope: ScopeId,
    interfaces: &Interfaces,
    cx: &LoweringContext<'_>,
) -> LowerResult<()> {
    let connections = std::mem::take(&mut module.scopes[scope].connections);
    if connections.is_empty() {
        return Ok(());
    }
    let env = ResolveEnv::new(interfaces, cx.interner);
    let place = Place::Scope(scope);
    let mut routed = Vec::with_capacity(connections.len());
    for connection in connections {
        routed.push((route(env, module, place, &connection)?, connection));
    }

    let mut targets = Targets::default();
    for (route, connection) in routed {
        if route == Route::Ambiguous {
            cx.sink.emit(
                Diagnostic::warning(
                    AMBIGUOUS_CONNECTION,
                    format!(
                        "connection to `{}` touches no port",
                        connection.left.display(cx.interner)
                    ),
                )
                .at(module.path(place, cx.interner))
                .with_help("it is forwarded by a combinational behavior of its own"),
            );
        }
        let block = match route {
            Route::Timed => *targets
                .timed
                .get_or_insert_with(|| new_behavior(module, scope, BehaviorKind::Timed, Mode::Seq)),
            Route::Inputs => *targets.inputs.get_or_insert_with(|| {
                let block = new_behavior(module, scope, BehaviorKind::Par, Mode::Par);
                module.blocks[block].name = Some(cx.fresh("inputs"));
                block
            }),
            Route::Outputs => *targets.outputs.get_or_insert_with(|| {
                let block = new_behavior(module, scope, BehaviorKind::Par, Mode::Par);
                module.blocks[block].name = Some(cx.fresh("outputs"));
                block
            }),
            Route::Dedicated | Route::Ambiguous => {
                new_behavior(module, scope, BehaviorKind::Par, Mode::Par)
            }
        };
        tracing::trace!(?route, left = %connection.left.display(cx.interner), "converted connection");
        module.blocks[block]
            .stmts
            .push(Statement::transmit(connection.left, connection.right));
    }
    Ok(())
}

fn new_behavior(module: &mut Module, scope: ScopeId, kind: BehaviorKind, mode: Mode) -> BlockId {
    let behavior = module.add_behavior(scope, kind, Vec::new(), mode);
    module.behaviors[behavior].block
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowr_common::Interner;
    use lowr_diagnostics::DiagnosticSink;
    use lowr_ir::{Expr, ModuleBuilder, TypeDb};

    #[test]
    fn connections_are_grouped_by_what_drives_them() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let top = design.add_module(interner.get_or_intern("top"));
        let leaf = design.add_module(interner.get_or_intern("leaf"));
        let mut b = ModuleBuilder::edit(&mut design, &interner, leaf);
        b.input("i", TypeDb::BIT);
        b.output("o", TypeDb::BIT);
        let mut b = ModuleBuilder::edit(&mut design, &interner, top);
        b.input("a", TypeDb::BIT);
        b.output("y", TypeDb::BIT);
        b.inout("io", TypeDb::BIT);
        b.inner("t", TypeDb::BIT);
        b.inner("s", TypeDb::BIT);
        let root = b.root();
        b.instance(root, "u0", leaf);
        let bit = TypeDb::BIT;
        let u0 = b.name("u0", bit);
        let connections = [
            (b.name("t", bit), Expr::int(0, bit)),
            (b.name("y", bit), b.read("a", bit)),
            (b.sub(u0.clone(), "i", bit), b.read("t", bit)),
            (b.name("t", bit), Expr::Ref(b.sub(u0, "o", bit))),
            (b.name("io", bit), b.read("t", bit)),
            (b.name("s", bit), b.read("t", bit)),
        ];
        for (left, right) in connections {
            b.connect(root, left, right);
        }

        let cx = LoweringContext::with_defaults(&interner, &sink);
        ConnectionsToBehaviorsPass.run(&mut design, &cx).unwrap();

        let m = &design.modules[top];
        let scope = &m.scopes[m.scope];
        assert!(scope.connections.is_empty());
        let shape: Vec<(BehaviorKind, usize)> = scope
            .behaviors
            .iter()
            .map(|b| {
                let behavior = &m.behaviors[*b];
                (behavior.kind, m.blocks[behavior.block].stmts.len())
            })
            .collect();
        assert_eq!(
            shape,
            vec![
                (BehaviorKind::Timed, 1),
                (BehaviorKind::Par, 2),
                (BehaviorKind::Par, 1),
                (BehaviorKind::Par, 1),
                (BehaviorKind::Par, 1),
            ]
        );
        let inputs = m.behaviors[scope.behaviors[1]].block;
        assert_eq!(interner.resolve(m.blocks[inputs].name.unwrap()), "_inputs_0");
        let warnings = sink.diagnostics();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, AMBIGUOUS_CONNECTION);
        assert!(warnings[0].message.contains("`s`"));
    }

    #[test]
    fn module_without_connections_is_untouched() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        b.input("a", TypeDb::BIT);
        let before = design.clone();
        let cx = LoweringContext::with_defaults(&interner, &sink);
        ConnectionsToBehaviorsPass.run(&mut design, &cx).unwrap();
        assert_eq!(design, before);
    }
}
