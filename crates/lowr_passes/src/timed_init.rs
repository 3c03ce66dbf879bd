//! Concatenation initializers to an initial block.
//!
//! Verilog declarations cannot be initialized with a concatenation. Such
//! initializers are removed from the declarations and replayed as
//! assignments of one `Timed` behavior in the root scope.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::LowerResult;
use lowr_ir::{
    BehaviorKind, Design, Expr, Mode, Module, Ref, ScopeId, SignalId, Statement, TypeDb,
};

/// Moves concatenation initializers into a timed behavior.
pub struct ConcatToTimedPass;

impl LoweringPass for ConcatToTimedPass {
    fn name(&self) -> &'static str {
        "concat-to-timed"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, _| {
            move_initializers(module, cx);
            Ok(())
        })
    }
}

fn has_concat_init(module: &Module, signal: SignalId) -> bool {
    matches!(module.signals[signal].init, Some(Expr::Concat { .. }))
}

/// Returns the reference to `signal` as seen from the root scope, or `None`
/// if an anonymous scope hides it.
fn reference_from_root(module: &Module, scope: ScopeId, signal: SignalId) -> Option<Ref> {
    let mut chain = Vec::new();
    let mut cursor = scope;
    while let Some(parent) = module.scopes[cursor].parent {
        chain.push(module.scopes[cursor].name?);
        cursor = parent;
    }
    let declared = &module.signals[signal];
    let mut names = chain.into_iter().rev();
    let Some(first) = names.next() else {
        return Some(Ref::name(declared.name, declared.ty));
    };
    let base = names.fold(Ref::name(first, TypeDb::VOID), |base, name| {
        Ref::sub(base, name, TypeDb::VOID)
    });
    Some(Ref::sub(base, declared.name, declared.ty))
}

fn move_initializers(module: &mut Module, cx: &LoweringContext<'_>) {
    let root = module.scope;
    let mut candidates: Vec<(ScopeId, SignalId)> = module
        .ports()
        .map(|(s, _)| (root, s))
        .filter(|(_, s)| has_concat_init(module, *s))
        .collect();
    for scope in module.live_scopes() {
        candidates.extend(
            module.scopes[scope]
                .inners
                .iter()
                .filter(|s| has_concat_init(module, **s))
                .map(|s| (scope, *s)),
        );
    }

    let mut stmts = Vec::new();
    for (scope, signal) in candidates {
        let Some(target) = reference_from_root(module, scope, signal) else {
            tracing::trace!(
                signal = cx.text(module.signals[signal].name),
                "initializer hidden in an anonymous scope"
            );
            continue;
        };
        if let Some(init) = module.signals[signal].init.take() {
            stmts.push(Statement::transmit(target, init));
        }
    }
    if stmts.is_empty() {
        return;
    }
    let behavior = module.add_behavior(root, BehaviorKind::Timed, Vec::new(), Mode::Seq);
    let top = module.behaviors[behavior].block;
    tracing::trace!(count = stmts.len(), "moved concatenation initializers");
    module.blocks[top].stmts = stmts;
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowr_common::Interner;
    use lowr_diagnostics::DiagnosticSink;
    use lowr_ir::{ModuleBuilder, Place};

    fn pair(b: &ModuleBuilder<'_>, ty: lowr_ir::TypeId) -> Expr {
        Expr::Concat {
            parts: vec![b.read("hi", TypeDb::BIT), b.read("lo", TypeDb::BIT)],
            ty,
        }
    }

    #[test]
    fn concatenation_initializers_move_to_one_timed_behavior() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let two = b.bits(2);
        b.input("hi", TypeDb::BIT);
        b.input("lo", TypeDb::BIT);
        let out = b.output("out", two);
        let init = pair(&b, two);
        b.init(out, init);
        let root = b.root();
        let sub = b.scope(root, Some("sub"));
        let x = b.inner_in(Place::Scope(sub), "x", two);
        let init = pair(&b, two);
        b.init(x, init);
        let plain = b.inner("p", TypeDb::BIT);
        b.init(plain, Expr::int(1, TypeDb::BIT));
        let hidden_scope = b.scope(root, None);
        let hidden = b.inner_in(Place::Scope(hidden_scope), "h", two);
        let init = pair(&b, two);
        b.init(hidden, init);

        let cx = LoweringContext::with_defaults(&interner, &sink);
        ConcatToTimedPass.run(&mut design, &cx).unwrap();

        let m = design.top_module();
        let behaviors = &m.scopes[m.scope].behaviors;
        assert_eq!(behaviors.len(), 1);
        let behavior = &m.behaviors[behaviors[0]];
        assert_eq!(behavior.kind, BehaviorKind::Timed);
        let targets: Vec<String> = m.blocks[behavior.block]
            .stmts
            .iter()
            .map(|s| match s {
                Statement::Transmit { left, .. } => left.display(&interner),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(targets, vec!["out", "sub.x"]);
        let Statement::Transmit { left, .. } = &m.blocks[behavior.block].stmts[1] else {
            panic!("expected the scoped initializer");
        };
        let Ref::Name { base: Some(base), ty, .. } = left else {
            panic!("expected a qualified name, got {left:?}");
        };
        assert_eq!(*ty, two);
        assert_eq!(base.ty(), TypeDb::VOID);
        assert!(m.signals[out].init.is_none());
        assert!(m.signals[x].init.is_none());
        assert!(m.signals[plain].init.is_some());
        assert!(m.signals[hidden].init.is_some());
    }

    #[test]
    fn design_without_concatenations_is_untouched() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let p = b.inner("p", TypeDb::BIT);
        b.init(p, Expr::int(0, TypeDb::BIT));
        let before = design.clone();
        let cx = LoweringContext::with_defaults(&interner, &sink);
        ConcatToTimedPass.run(&mut design, &cx).unwrap();
        assert_eq!(design, before);
    }
}
