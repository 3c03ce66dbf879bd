//! Variable extraction.
//!
//! Inside a sequential VHDL process, signal assignments only take effect
//! when the process suspends, while the IR's sequential blocks expect each
//! write to be visible to the next statement. Sequential behaviors therefore
//! work on process variables:
//!
//! - inner signals declared in the behavior's blocks and written there become
//!   variables of the top block, under fresh names;
//! - outer signals both written and read in the behavior are shadowed by a
//!   variable, loaded on entry and written back on exit.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::{Ident, LowerResult};
use lowr_ir::resolve::{resolve, Decl, ResolveEnv};
use lowr_ir::walk::{read, rewrite_block_refs, Access};
use lowr_ir::{
    BehaviorId, BlockId, Design, Expr, Interfaces, Mode, Module, Place, Ref, SignalId, SignalKind,
    Statement,
};
use std::collections::{HashMap, HashSet};

/// Turns the signals of sequential behaviors into variables.
pub struct VariableExtractPass;

impl LoweringPass for VariableExtractPass {
    fn name(&self) -> &'static str {
        "variable-extract"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, interfaces| {
            for behavior in module.live_behaviors() {
                extract_variables(module, behavior, interfaces, cx)?;
            }
            Ok(())
        })
    }
}

/// How the signals of one behavior are used.
#[derive(Default)]
struct Usage {
    /// Written signals with the reference of their first write.
    written: Vec<(SignalId, Ref)>,
    read: HashSet<SignalId>,
}

fn usage(
    env: ResolveEnv<'_>,
    module: &Module,
    blocks: &[BlockId],
) -> LowerResult<Usage> {
    let mut usage = Usage::default();
    let mut failure = None;
    for &block in blocks {
        let place = Place::Block(block);
        for stmt in &module.blocks[block].stmts {
            read::stmt_refs(stmt, &mut |r, access| {
                if r.ident().is_none() || failure.is_some() {
                    return;
                }
                match resolve(env, module, place, r) {
                    Ok(Decl::Signal(s)) => match access {
                        Access::Write => {
                            if !usage.written.iter().any(|(w, _)| *w == s) {
                                usage.written.push((s, r.clone()));
                            }
                        }
                        Access::Read => {
                            usage.read.insert(s);
                        }
                    },
                    Ok(_) => {}
                    Err(err) => failure = Some(err),
                }
            });
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(usage),
    }
}

fn extract_variables(
    module: &mut Module,
    behavior: BehaviorId,
    interfaces: &Interfaces,
    cx: &LoweringContext<'_>,
) -> LowerResult<()> {
    let top = module.behaviors[behavior].block;
    if module.blocks[top].mode != Mode::Seq {
        return Ok(());
    }
    let env = ResolveEnv::new(interfaces, cx.interner);
    let blocks = module.behavior_blocks(behavior);
    let local: HashSet<SignalId> = blocks
        .iter()
        .flat_map(|b| module.blocks[*b].inners.iter().copied())
        .collect();
    let usage = usage(env, module, &blocks)?;

    let mut renames: HashMap<SignalId, Ident> = HashMap::new();
    let mut hoisted: Vec<SignalId> = Vec::new();
    let mut shadowed: Vec<(SignalId, Ref)> = Vec::new();
    for (signal, first_write) in usage.written {
        let declared = &module.signals[signal];
        if local.contains(&signal) {
            if declared.kind != SignalKind::Variable {
                renames.insert(signal, cx.fresh_from(declared.name));
                hoisted.push(signal);
            }
        } else if usage.read.contains(&signal) {
            renames.insert(signal, cx.fresh_from(declared.name));
            shadowed.push((signal, first_write));
        }
    }
    if renames.is_empty() {
        return Ok(());
    }

    rewrite_block_refs(module, &blocks, |m, place, _, r| {
        if r.ident().is_none() {
            return Ok(());
        }
        if let Decl::Signal(s) = resolve(env, m, place, r)? {
            if let Some(&variable) = renames.get(&s) {
                *r = Ref::name(variable, r.ty());
            }
        }
        Ok(())
    })?;

    for signal in hoisted {
        for &block in &blocks {
            module.blocks[block].inners.retain(|s| *s != signal);
        }
        let declared = &mut module.signals[signal];
        declared.kind = SignalKind::Variable;
        declared.name = renames[&signal];
        module.blocks[top].inners.push(signal);
        tracing::trace!(variable = cx.text(renames[&signal]), "hoisted block signal");
    }

    let mut preloads = Vec::with_capacity(shadowed.len());
    let mut write_backs = Vec::with_capacity(shadowed.len());
    for (signal, target) in shadowed {
        let name = renames[&signal];
        let ty = module.signals[signal].ty;
        let variable = module.new_signal(name, ty, SignalKind::Variable);
        module.attach_signal(Place::Block(top), variable);
        let local_ref = Ref::name(name, ty);
        preloads.push(Statement::transmit(local_ref.clone(), Expr::Ref(target.clone())));
        write_backs.push(Statement::transmit(target, Expr::Ref(local_ref)));
        tracing::trace!(variable = cx.text(name), "shadowed outer signal");
    }
    let body = std::mem::take(&mut module.blocks[top].stmts);
    let stmts = &mut module.blocks[top].stmts;
    stmts.extend(preloads);
    stmts.extend(body);
    stmts.extend(write_backs);
    Ok(())
}
