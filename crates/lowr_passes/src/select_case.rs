//! Select-to-case conversion.
//!
//! VHDL has no multiplexer expression usable everywhere. Every `Select` is
//! computed into a fresh signal by a `case` statement placed just before the
//! statement that used it, innermost selects first. The cases and the using
//! statement run in order: inside a parallel block they go into a sequential
//! sub-block. A connection holding a select becomes a combinational behavior
//! with a sequential block.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::{Ident, LowerError, LowerResult};
use lowr_ir::walk::{
    expand_block_statements, visit_expr_mut, visit_ref_exprs_mut, visit_stmt_head_exprs_mut,
};
use lowr_ir::{
    BehaviorKind, CaseArm, Design, Expr, Mode, Module, Place, Ref, Statement, TypeId,
};

/// Extracts selects into case statements.
pub struct SelectToCasePass;

impl LoweringPass for SelectToCasePass {
    fn name(&self) -> &'static str {
        "select-to-case"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, _| {
            convert_connections(module, cx)?;
            convert_blocks(module, cx)
        })
    }
}

/// Collects the case statements and fresh signals of one statement.
struct Extraction<'a, 'cx> {
    cx: &'a LoweringContext<'cx>,
    cases: Vec<Statement>,
    signals: Vec<(Ident, TypeId)>,
}

impl<'a, 'cx> Extraction<'a, 'cx> {
    fn new(cx: &'a LoweringContext<'cx>) -> Self {
        Self {
            cx,
            cases: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// Replaces `e`, a select whose operands were already extracted, by a
    /// fresh signal computed by a case statement.
    fn extract(&mut self, e: &mut Expr) -> LowerResult<()> {
        let Expr::Select { .. } = e else {
            return Ok(());
        };
        let ty = e.ty();
        let name = self.cx.fresh("sel");
        let Expr::Select {
            index, mut choices, ..
        } = std::mem::replace(e, Expr::Ref(Ref::name(name, ty)))
        else {
            return Ok(());
        };
        let Some(last) = choices.pop() else {
            return Err(LowerError::unsupported("select-to-case", "select without choices"));
        };
        let subject_ty = index.ty();
        let target = Ref::name(name, ty);
        let arms = choices
            .into_iter()
            .enumerate()
            .map(|(i, choice)| CaseArm {
                value: Expr::int(i as i64, subject_ty),
                body: vec![Statement::transmit(target.clone(), choice)],
            })
            .collect();
        self.cases.push(Statement::Case {
            subject: *index,
            arms,
            default: Some(vec![Statement::transmit(target, last)]),
        });
        self.signals.push((name, ty));
        Ok(())
    }

    fn expr(&mut self, e: &mut Expr) -> LowerResult<()> {
        visit_expr_mut(e, &mut |sub| self.extract(sub))
    }

    fn target(&mut self, r: &mut Ref) -> LowerResult<()> {
        visit_ref_exprs_mut(r, &mut |sub| self.extract(sub))
    }
}

fn convert_blocks(module: &mut Module, cx: &LoweringContext<'_>) -> LowerResult<()> {
    let blocks = module.live_blocks();
    expand_block_statements(module, &blocks, |m, block, mut stmt| {
        let mut extraction = Extraction::new(cx);
        visit_stmt_head_exprs_mut(&mut stmt, &mut |e| extraction.extract(e))?;
        if extraction.cases.is_empty() {
            return Ok(vec![stmt]);
        }
        let mut sequence = extraction.cases;
        sequence.push(stmt);
        let (out, holder) = m.sequenced(block, sequence);
        for (name, ty) in extraction.signals {
            m.declare_inner(Place::Block(holder), name, ty);
        }
        Ok(out)
    })
}

fn convert_connections(module: &mut Module, cx: &LoweringContext<'_>) -> LowerResult<()> {
    for scope in module.live_scopes() {
        if !module.scopes[scope]
            .connections
            .iter()
            .any(|c| c.left.contains_select() || c.right.contains_select())
        {
            continue;
        }
        let mut kept = Vec::new();
        for mut connection in std::mem::take(&mut module.scopes[scope].connections) {
            if !connection.left.contains_select() && !connection.right.contains_select() {
                kept.push(connection);
                continue;
            }
            let mut extraction = Extraction::new(cx);
            extraction.target(&mut connection.left)?;
            extraction.expr(&mut connection.right)?;

            // The assignment reads what the cases wrote.
            let behavior = module.add_behavior(scope, BehaviorKind::Par, Vec::new(), Mode::Seq);
            let top = module.behaviors[behavior].block;
            for (name, ty) in extraction.signals {
                module.declare_inner(Place::Block(top), name, ty);
            }
            let mut stmts = extraction.cases;
            stmts.push(Statement::transmit(connection.left, connection.right));
            module.blocks[top].stmts = stmts;
        }
        module.scopes[scope].connections = kept;
    }
    Ok(())
}
