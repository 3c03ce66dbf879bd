//! Hierarchical-signal flattening.
//!
//! A signal with sub-signals has no direct counterpart in VHDL. A whole
//! reference to one is expanded into the concatenation of its leaf
//! sub-signals, in declaration order with the first one most significant.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::LowerResult;
use lowr_ir::resolve::{resolve, Decl, ResolveEnv};
use lowr_ir::walk::{rewrite_exprs, rewrite_refs};
use lowr_ir::{Design, Expr, Interfaces, Module, Ref, SignalId};

/// Expands references to hierarchical signals into concatenations.
pub struct SignalFlattenPass;

impl LoweringPass for SignalFlattenPass {
    fn name(&self) -> &'static str {
        "signal-flatten"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, interfaces| {
            flatten_signals(module, interfaces, cx)
        })
    }
}

fn flatten_signals(
    module: &mut Module,
    interfaces: &Interfaces,
    cx: &LoweringContext<'_>,
) -> LowerResult<()> {
    if module.signals.iter().all(|(_, s)| s.fields.is_empty()) {
        return Ok(());
    }
    let env = ResolveEnv::new(interfaces, cx.interner);
    rewrite_refs(module, |m, place, _, r| {
        if r.ident().is_none() {
            return Ok(());
        }
        if let Decl::Signal(s) = resolve(env, m, place, r)? {
            if !m.signals[s].fields.is_empty() {
                let whole = std::mem::replace(r, Ref::This);
                *r = expand(m, s, whole);
            }
        }
        Ok(())
    })?;

    // Read-side concatenations become concatenation expressions.
    rewrite_exprs(module, |_, _, e| {
        if let Expr::Ref(r @ Ref::Concat { .. }) = e {
            let r = std::mem::replace(r, Ref::This);
            *e = read_concat(r);
        }
        Ok(())
    })
}

fn read_concat(r: Ref) -> Expr {
    match r {
        Ref::Concat { parts, ty } => Expr::Concat {
            parts: parts.into_iter().map(read_concat).collect(),
            ty,
        },
        other => Expr::Ref(other),
    }
}

/// Expands `whole`, a reference to `signal`, down to its leaf sub-signals.
fn expand(module: &Module, signal: SignalId, whole: Ref) -> Ref {
    let fields = &module.signals[signal].fields;
    if fields.is_empty() {
        return whole;
    }
    let ty = whole.ty();
    let parts = fields
        .iter()
        .map(|&field| {
            let sub = &module.signals[field];
            expand(module, field, Ref::sub(whole.clone(), sub.name, sub.ty))
        })
        .collect();
    Ref::Concat { parts, ty }
}
