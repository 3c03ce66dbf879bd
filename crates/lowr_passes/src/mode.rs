//! Mode homogenization.
//!
//! Verilog and C cannot express a non-blocking block nested in a blocking
//! one. In a behavior whose blocks do not all share the top block's mode,
//! every parallel block is made sequential: its writes go to fresh signals,
//! which are copied to the real targets once all of the block's statements
//! have run.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::{Ident, LowerResult};
use lowr_ir::{BehaviorId, BlockId, Design, Expr, Mode, Module, Place, Ref, Statement};

/// Removes mixed concurrency modes from behaviors.
pub struct ModeHomogenizePass;

impl LoweringPass for ModeHomogenizePass {
    fn name(&self) -> &'static str {
        "mode-homogenize"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, _, _| {
            for behavior in module.live_behaviors() {
                homogenize(module, behavior, cx);
            }
            Ok(())
        })
    }
}

/// Returns `true` if a block of the behavior differs in mode from its top
/// block.
pub fn is_mixed(module: &Module, behavior: BehaviorId) -> bool {
    let top = module.blocks[module.behaviors[behavior].block].mode;
    module
        .behavior_blocks(behavior)
        .iter()
        .any(|b| module.blocks[*b].mode != top)
}

fn homogenize(module: &mut Module, behavior: BehaviorId, cx: &LoweringContext<'_>) {
    if !is_mixed(module, behavior) {
        return;
    }
    // Deepest blocks first.
    for block in module.behavior_blocks(behavior).into_iter().rev() {
        if module.blocks[block].mode == Mode::Par {
            sequentialize(module, block, cx);
        }
    }
}

/// A target of a converted block and the signal standing in for it.
struct Redirect {
    target: Ref,
    stand_in: Ident,
    conditional: bool,
}

fn sequentialize(module: &mut Module, block: BlockId, cx: &LoweringContext<'_>) {
    let mut stmts = std::mem::take(&mut module.blocks[block].stmts);
    let mut redirects: Vec<Redirect> = Vec::new();
    for stmt in &mut stmts {
        redirect(stmt, false, &mut redirects, cx);
    }

    let mut out = Vec::with_capacity(stmts.len() + 2 * redirects.len());
    for r in redirects.iter().filter(|r| r.conditional) {
        let stand_in = Ref::name(r.stand_in, r.target.ty());
        out.push(Statement::transmit(stand_in, Expr::Ref(r.target.clone())));
    }
    out.extend(stmts);
    for r in &redirects {
        let stand_in = Expr::Ref(Ref::name(r.stand_in, r.target.ty()));
        out.push(Statement::transmit(r.target.clone(), stand_in));
    }
    for r in &redirects {
        module.declare_inner(Place::Block(block), r.stand_in, r.target.ty());
    }
    tracing::trace!(redirects = redirects.len(), "sequentialized parallel block");

    let converted = &mut module.blocks[block];
    converted.stmts = out;
    converted.mode = Mode::Seq;
}

/// Redirects the transmits of `stmt` that belong to the converted block;
/// nested blocks keep their own statements.
fn redirect(stmt: &mut Statement, nested: bool, redirects: &mut Vec<Redirect>, cx: &LoweringContext<'_>) {
    if let Statement::Transmit { left, .. } = stmt {
        let position = match redirects.iter().position(|r| r.target == *left) {
            Some(position) => position,
            None => {
                redirects.push(Redirect {
                    target: left.clone(),
                    stand_in: cx.fresh_for(left, "par"),
                    conditional: false,
                });
                redirects.len() - 1
            }
        };
        let found = &mut redirects[position];
        found.conditional |= nested;
        *left = Ref::name(found.stand_in, left.ty());
        return;
    }
    for branch in stmt.branches_mut() {
        for inner in branch.iter_mut() {
            redirect(inner, true, redirects, cx);
        }
    }
}
