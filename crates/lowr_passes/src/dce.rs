//! Dead-code elimination.
//!
//! A name is live if it is an output or inout port, an instance, or read
//! anywhere: connection right sides, conditions, indices, events, print
//! arguments and initializers. Inner signals that are not live are removed
//! together with every connection and transmit assigning them, until nothing
//! more can be removed.

use crate::codes::REMOVED_SIGNAL;
use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::{Ident, LowerResult};
use lowr_diagnostics::Diagnostic;
use lowr_ir::walk::{read, Access};
use lowr_ir::{Design, Module, Place, Ref, SignalId, Statement};
use std::collections::HashSet;

/// Removes signals nothing observes, and their assignments.
pub struct DeadCodePass;

impl LoweringPass for DeadCodePass {
    fn name(&self) -> &'static str {
        "dead-code-elim"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, _| {
            while eliminate_once(module, cx) {}
            Ok(())
        })
    }
}

/// Returns the names observable from outside the module or read inside it.
fn live_names(module: &Module) -> HashSet<Ident> {
    let mut names = Vec::new();
    for &port in module.outputs.iter().chain(&module.inouts) {
        names.push(module.signals[port].name);
    }
    for scope in module.live_scopes() {
        for &instance in &module.scopes[scope].instances {
            names.push(module.instances[instance].name);
        }
    }
    read::for_each_ref(module, |_, access, r| {
        if access == Access::Read {
            r.names(&mut names);
        }
    });
    names.into_iter().collect()
}

fn assigns_live(left: &Ref, live: &HashSet<Ident>) -> bool {
    let mut names = Vec::new();
    left.names(&mut names);
    names.iter().any(|n| live.contains(n))
}

/// Runs one elimination round and returns whether anything was removed.
fn eliminate_once(module: &mut Module, cx: &LoweringContext<'_>) -> bool {
    let live = live_names(module);
    let mut removed = 0;

    for scope in module.live_scopes() {
        let dead: Vec<_> = module.scopes[scope]
            .inners
            .iter()
            .copied()
            .filter(|s| !live.contains(&module.signals[*s].name))
            .collect();
        for &signal in &dead {
            report_removal(module, Place::Scope(scope), signal, cx);
        }
        let body = &mut module.scopes[scope];
        body.inners.retain(|s| !dead.contains(s));
        let before = body.connections.len();
        body.connections.retain(|c| assigns_live(&c.left, &live));
        removed += dead.len() + before - body.connections.len();
    }

    for block in module.live_blocks() {
        let dead: Vec<_> = module.blocks[block]
            .inners
            .iter()
            .copied()
            .filter(|s| !live.contains(&module.signals[*s].name))
            .collect();
        for &signal in &dead {
            report_removal(module, Place::Block(block), signal, cx);
        }
        let body = &mut module.blocks[block];
        body.inners.retain(|s| !dead.contains(s));
        removed += dead.len() + prune(&mut body.stmts, &live);
    }
    removed > 0
}

fn report_removal(module: &Module, place: Place, signal: SignalId, cx: &LoweringContext<'_>) {
    let name = cx.text(module.signals[signal].name);
    tracing::trace!(signal = name, "removing dead signal");
    cx.sink.emit(
        Diagnostic::note(REMOVED_SIGNAL, format!("signal `{name}` is never read"))
            .at(module.path(place, cx.interner)),
    );
}

/// Drops dead transmits from `stmts`, bottom-up, and returns how many
/// statements went away.
fn prune(stmts: &mut Vec<Statement>, live: &HashSet<Ident>) -> usize {
    let mut removed = 0;
    for stmt in stmts.iter_mut() {
        for branch in stmt.branches_mut() {
            removed += prune(branch, live);
        }
        match stmt {
            Statement::If { then_body, .. } if then_body.is_empty() => {
                then_body.push(Statement::Nop);
            }
            Statement::Case { arms, default, .. } => {
                for body in arms.iter_mut().map(|a| &mut a.body).chain(default.iter_mut()) {
                    if body.is_empty() {
                        body.push(Statement::Nop);
                    }
                }
            }
            _ => {}
        }
    }
    let before = stmts.len();
    stmts.retain(|stmt| match stmt {
        Statement::Transmit { left, .. } => assigns_live(left, live),
        Statement::If { .. } | Statement::Case { .. } => !stmt.is_empty(),
        _ => true,
    });
    removed + before - stmts.len()
}
