//! Port materialization.
//!
//! VHDL port maps only accept plain signals. Every reference into a port of
//! a sub-instance is redirected to a per-port wire declared next to the
//! instance, and the wire is tied to the port by one connection whose
//! direction follows how the port was used.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::{Ident, LowerResult};
use lowr_ir::resolve::{resolve, Decl, ResolveEnv};
use lowr_ir::walk::{read, rewrite_refs, Access};
use lowr_ir::{
    Connection, Design, Expr, InstanceId, Interfaces, Module, Place, Ref, ScopeId, SignalId,
    TypeDb, TypeId,
};
use std::collections::HashMap;

/// Routes references to sub-instance ports through wires.
pub struct PortMaterializePass;

impl LoweringPass for PortMaterializePass {
    fn name(&self) -> &'static str {
        "port-materialize"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, interfaces| {
            materialize_ports(module, interfaces, cx)
        })
    }
}

/// A sub-instance port in use.
struct PortUse {
    instance: InstanceId,
    signal: SignalId,
    written: bool,
}

/// The wire standing in for a port.
struct Wire {
    name: Ident,
    ty: TypeId,
}

fn materialize_ports(
    module: &mut Module,
    interfaces: &Interfaces,
    cx: &LoweringContext<'_>,
) -> LowerResult<()> {
    let env = ResolveEnv::new(interfaces, cx.interner);
    let mut uses: Vec<PortUse> = Vec::new();
    let mut failure = None;
    read::for_each_ref(module, |place, access, r| {
        if r.ident().is_none() || failure.is_some() {
            return;
        }
        match resolve(env, module, place, r) {
            Ok(Decl::Port { instance, signal }) => {
                let written = access == Access::Write;
                match uses
                    .iter_mut()
                    .find(|u| u.instance == instance && u.signal == signal)
                {
                    Some(found) => found.written |= written,
                    None => uses.push(PortUse {
                        instance,
                        signal,
                        written,
                    }),
                }
            }
            Ok(_) => {}
            Err(err) => failure = Some(err),
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    if uses.is_empty() {
        return Ok(());
    }

    let mut wires: HashMap<(InstanceId, SignalId), Wire> = HashMap::new();
    let mut ties: Vec<(ScopeId, Connection)> = Vec::new();
    for port_use in &uses {
        let instance = &module.instances[port_use.instance];
        let Some(port) = interfaces
            .get(&instance.module)
            .and_then(|iface| iface.port_by_signal(port_use.signal))
        else {
            continue;
        };
        let hint = format!("{}_{}", cx.text(instance.name), cx.text(port.name));
        let name = cx.fresh(&hint);
        let scope = holding_scope(module, port_use.instance);
        module.declare_inner(Place::Scope(scope), name, port.ty);

        let instance_ref = Ref::name(module.instances[port_use.instance].name, TypeDb::VOID);
        let port_ref = Ref::sub(instance_ref, port.name, port.ty);
        let wire_ref = Ref::name(name, port.ty);
        let tie = if port_use.written {
            Connection {
                left: port_ref,
                right: Expr::Ref(wire_ref),
            }
        } else {
            Connection {
                left: wire_ref,
                right: Expr::Ref(port_ref),
            }
        };
        tracing::trace!(wire = cx.text(name), written = port_use.written, "materialized port");
        ties.push((scope, tie));
        wires.insert((port_use.instance, port_use.signal), Wire { name, ty: port.ty });
    }

    rewrite_refs(module, |m, place, _, r| {
        if r.ident().is_none() {
            return Ok(());
        }
        if let Decl::Port { instance, signal } = resolve(env, m, place, r)? {
            if let Some(wire) = wires.get(&(instance, signal)) {
                *r = Ref::name(wire.name, wire.ty);
            }
        }
        Ok(())
    })?;

    for (scope, tie) in ties {
        module.scopes[scope].connections.push(tie);
    }
    Ok(())
}

fn holding_scope(module: &Module, instance: InstanceId) -> ScopeId {
    module
        .live_scopes()
        .into_iter()
        .find(|s| module.scopes[*s].instances.contains(&instance))
        .unwrap_or(module.scope)
}
