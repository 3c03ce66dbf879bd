//! Output-read elimination.
//!
//! Legacy VHDL cannot read an `out` port. Every output port that is read
//! anywhere in its module is replaced by a shadow inner signal, and the port
//! is driven from the shadow by one appended connection.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::{Ident, LowerResult};
use lowr_ir::resolve::{resolve, Decl, ResolveEnv};
use lowr_ir::walk::{read, rewrite_refs, Access};
use lowr_ir::{Connection, Design, Expr, Interfaces, Module, Place, Ref, SignalId, TypeId};
use std::collections::HashMap;

/// Redirects reads of output ports through shadow signals.
pub struct OutputReadPass;

impl LoweringPass for OutputReadPass {
    fn name(&self) -> &'static str {
        "output-read-elim"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, interfaces| {
            eliminate_output_reads(module, interfaces, cx)
        })
    }
}

fn eliminate_output_reads(
    module: &mut Module,
    interfaces: &Interfaces,
    cx: &LoweringContext<'_>,
) -> LowerResult<()> {
    let env = ResolveEnv::new(interfaces, cx.interner);
    let mut read_outputs: Vec<SignalId> = Vec::new();
    let mut failure = None;
    read::for_each_ref(module, |place, access, r| {
        if access != Access::Read || r.ident().is_none() || failure.is_some() {
            return;
        }
        match resolve(env, module, place, r) {
            Ok(Decl::Signal(s)) if module.outputs.contains(&s) && !read_outputs.contains(&s) => {
                read_outputs.push(s);
            }
            Ok(_) => {}
            Err(err) => failure = Some(err),
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    if read_outputs.is_empty() {
        return Ok(());
    }

    let root = module.scope;
    let mut shadows: HashMap<SignalId, (Ident, TypeId)> = HashMap::new();
    for &output in &read_outputs {
        let signal = &module.signals[output];
        let shadow_name = cx.fresh(cx.text(signal.name));
        let (ty, init) = (signal.ty, signal.init.clone());
        let shadow = module.declare_inner(Place::Scope(root), shadow_name, ty);
        module.signals[shadow].init = init;
        shadows.insert(output, (shadow_name, ty));
        tracing::trace!(output = cx.text(module.signals[output].name), "shadowing read output");
    }

    rewrite_refs(module, |m, place, _, r| {
        if r.ident().is_none() {
            return Ok(());
        }
        if let Decl::Signal(s) = resolve(env, m, place, r)? {
            if let Some(&(shadow, _)) = shadows.get(&s) {
                *r = Ref::name(shadow, r.ty());
            }
        }
        Ok(())
    })?;

    for output in read_outputs {
        let (shadow, ty) = shadows[&output];
        let port = &module.signals[output];
        let connection = Connection {
            left: Ref::name(port.name, port.ty),
            right: Expr::Ref(Ref::name(shadow, ty)),
        };
        module.scopes[root].connections.push(connection);
    }
    Ok(())
}
