//! Boolean typing and boolean-to-select conversion.
//!
//! VHDL separates `boolean` from `std_logic`. [`BooleanTypingPass`] marks the
//! expressions that produce a truth value; [`BooleanToSelectPass`] then turns
//! every such expression used as a bit value into `Select(e, ['0', '1'])`,
//! leaving the ones in condition positions alone.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::LowerResult;
use lowr_ir::walk::{rewrite_exprs, visit_holders, Holder};
use lowr_ir::{Design, Expr, Ref, Statement, TypeDb, TypeId, UnaryOp};

/// Retypes truth-valued expressions to `Bool`.
pub struct BooleanTypingPass;

impl LoweringPass for BooleanTypingPass {
    fn name(&self) -> &'static str {
        "boolean-typing"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, types, _| {
            rewrite_exprs(module, |_, _, e| {
                if let Some(ty) = boolean_type(types, e) {
                    e.set_ty(ty);
                }
                Ok(())
            })
        })
    }
}

/// Returns `Bool` if `e` yields a truth value. Operands are typed first, so
/// nested logic propagates upward.
fn boolean_type(types: &TypeDb, e: &Expr) -> Option<TypeId> {
    let is_bool = |operand: &Expr| types.is_bool(operand.ty());
    match e {
        Expr::Binary { op, .. } if op.is_comparison() => Some(TypeDb::BOOL),
        Expr::Binary { op, lhs, rhs, .. }
            if (op.is_logical() || op.is_bitwise()) && is_bool(lhs) && is_bool(rhs) =>
        {
            Some(TypeDb::BOOL)
        }
        Expr::Unary {
            op: UnaryOp::LogicNot | UnaryOp::Not,
            operand,
            ..
        } if is_bool(operand) => Some(TypeDb::BOOL),
        _ => None,
    }
}

/// Wraps truth values used as bits into two-way selects.
pub struct BooleanToSelectPass;

impl LoweringPass for BooleanToSelectPass {
    fn name(&self) -> &'static str {
        "boolean-to-select"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, types, _| {
            let types = &*types;
            visit_holders(module, |_, _, holder| {
                match holder {
                    Holder::Statements(stmts) => {
                        stmts.iter_mut().for_each(|s| select_stmt(types, s));
                    }
                    Holder::Connections(connections) => {
                        for connection in connections.iter_mut() {
                            select_ref(types, &mut connection.left);
                            select_expr(types, &mut connection.right, false);
                        }
                    }
                    Holder::Events(events) => {
                        events.iter_mut().for_each(|e| select_ref(types, &mut e.signal));
                    }
                    Holder::Init(_, init) => select_expr(types, init, false),
                }
                Ok(())
            })
        })
    }
}

fn select_stmt(types: &TypeDb, stmt: &mut Statement) {
    match stmt {
        Statement::Transmit { left, right } => {
            select_ref(types, left);
            select_expr(types, right, false);
        }
        Statement::If { condition, .. } => select_expr(types, condition, true),
        Statement::Case { subject, arms, .. } => {
            select_expr(types, subject, false);
            for arm in arms.iter_mut() {
                select_expr(types, &mut arm.value, false);
            }
        }
        Statement::TimeWait { delay } => select_expr(types, delay, false),
        Statement::Print { args } => args.iter_mut().for_each(|a| select_expr(types, a, false)),
        Statement::TimeRepeat { .. } | Statement::Block(_) | Statement::Nop => {}
    }
    for branch in stmt.branches_mut() {
        branch.iter_mut().for_each(|s| select_stmt(types, s));
    }
}

fn select_ref(types: &TypeDb, r: &mut Ref) {
    match r {
        Ref::Name { base, .. } => {
            if let Some(base) = base {
                select_ref(types, base);
            }
        }
        Ref::This => {}
        Ref::Index { base, index, .. } => {
            select_ref(types, base);
            select_expr(types, index, false);
        }
        Ref::Range { base, .. } => select_ref(types, base),
        Ref::Concat { parts, .. } => parts.iter_mut().for_each(|p| select_ref(types, p)),
    }
}

/// Rewrites `e`; `condition` tells whether its context expects a truth value.
fn select_expr(types: &TypeDb, e: &mut Expr, condition: bool) {
    let is_logic = is_boolean_op(types, e);
    match e {
        Expr::Value { .. } => {}
        Expr::Ref(r) => select_ref(types, r),
        Expr::Unary { operand, .. } => {
            let keep = is_logic && types.is_bool(operand.ty());
            select_expr(types, operand, keep);
        }
        Expr::Binary { lhs, rhs, .. } => {
            let keep_lhs = is_logic && types.is_bool(lhs.ty());
            let keep_rhs = is_logic && types.is_bool(rhs.ty());
            select_expr(types, lhs, keep_lhs);
            select_expr(types, rhs, keep_rhs);
        }
        Expr::Select { index, choices, .. } => {
            select_expr(types, index, true);
            choices.iter_mut().for_each(|c| select_expr(types, c, false));
        }
        Expr::Concat { parts, .. } => parts.iter_mut().for_each(|p| select_expr(types, p, false)),
        Expr::Cast { expr, .. } => select_expr(types, expr, false),
    }
    if is_logic && !condition {
        let truth = std::mem::replace(e, Expr::int(0, TypeDb::BIT));
        *e = Expr::select(
            truth,
            vec![Expr::int(0, TypeDb::BIT), Expr::int(1, TypeDb::BIT)],
            TypeDb::BIT,
        );
    }
}

fn is_boolean_op(types: &TypeDb, e: &Expr) -> bool {
    matches!(e, Expr::Unary { .. } | Expr::Binary { .. }) && types.is_bool(e.ty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowr_common::Interner;
    use lowr_diagnostics::DiagnosticSink;
    use lowr_ir::{BehaviorKind, BinaryOp, Mode, ModuleBuilder};

    fn eq(b: &ModuleBuilder<'_>, l: &str, r: &str) -> Expr {
        Expr::binary(
            BinaryOp::Eq,
            b.read(l, TypeDb::BIT),
            b.read(r, TypeDb::BIT),
            TypeDb::BIT,
        )
    }

    #[test]
    fn comparisons_and_their_logic_become_bool() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        for name in ["a", "b", "c"] {
            b.input(name, TypeDb::BIT);
        }
        b.output("y", TypeDb::BIT);
        b.output("z", TypeDb::BIT);
        let root = b.root();
        let both = Expr::binary(BinaryOp::LogicAnd, eq(&b, "a", "b"), eq(&b, "b", "c"), TypeDb::BIT);
        let y = b.name("y", TypeDb::BIT);
        b.connect(root, y, both);
        let bits = Expr::binary(BinaryOp::And, b.read("a", TypeDb::BIT), b.read("b", TypeDb::BIT), TypeDb::BIT);
        let z = b.name("z", TypeDb::BIT);
        b.connect(root, z, bits);

        let cx = LoweringContext::with_defaults(&interner, &sink);
        BooleanTypingPass.run(&mut design, &cx).unwrap();

        let m = design.top_module();
        let connections = &m.scopes[m.scope].connections;
        let Expr::Binary { lhs, ty, .. } = &connections[0].right else {
            panic!("expected the conjunction");
        };
        assert_eq!(*ty, TypeDb::BOOL);
        assert_eq!(lhs.ty(), TypeDb::BOOL);
        assert_eq!(connections[1].right.ty(), TypeDb::BIT);
    }

    #[test]
    fn conditions_stay_bool_and_values_become_selects() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        b.input("a", TypeDb::BIT);
        b.input("b", TypeDb::BIT);
        b.output("y", TypeDb::BIT);
        let root = b.root();
        let blk = b.behavior(root, BehaviorKind::Par, vec![], Mode::Par);
        let y = b.name("y", TypeDb::BIT);
        let value = eq(&b, "a", "b");
        let condition = eq(&b, "a", "b");
        b.push(
            blk,
            Statement::If {
                condition,
                then_body: vec![Statement::transmit(y, value)],
                else_body: vec![],
            },
        );

        let cx = LoweringContext::with_defaults(&interner, &sink);
        BooleanTypingPass.run(&mut design, &cx).unwrap();
        BooleanToSelectPass.run(&mut design, &cx).unwrap();

        let m = design.top_module();
        let Statement::If {
            condition,
            then_body,
            ..
        } = &m.blocks[blk].stmts[0]
        else {
            panic!("expected the if");
        };
        assert!(matches!(condition, Expr::Binary { ty, .. } if *ty == TypeDb::BOOL));
        let Statement::Transmit { right, .. } = &then_body[0] else {
            panic!("expected the transmit");
        };
        let Expr::Select { index, choices, ty } = right else {
            panic!("expected a select, got {right:?}");
        };
        assert_eq!(*ty, TypeDb::BIT);
        assert_eq!(index.ty(), TypeDb::BOOL);
        assert_eq!(choices, &vec![Expr::int(0, TypeDb::BIT), Expr::int(1, TypeDb::BIT)]);
    }

    #[test]
    fn only_the_outermost_truth_value_is_wrapped() {
        let types = TypeDb::new();
        let interner = Interner::new();
        let x = |n: &str| Expr::Ref(Ref::name(interner.get_or_intern(n), TypeDb::BIT));
        let cmp = |l, r| Expr::binary(BinaryOp::Lt, l, r, TypeDb::BOOL);
        let mut e = Expr::unary(
            UnaryOp::LogicNot,
            Expr::binary(BinaryOp::LogicOr, cmp(x("a"), x("b")), cmp(x("c"), x("d")), TypeDb::BOOL),
            TypeDb::BOOL,
        );
        select_expr(&types, &mut e, false);
        let Expr::Select { index, .. } = &e else {
            panic!("expected a select");
        };
        assert!(!index.contains_select());
    }
}
