//! Explicit typing.
//!
//! C has its own promotion rules, so every implicit conversion of the IR is
//! spelled out as a [`Expr::Cast`]. Operands of a binary operator are brought
//! to one common type, and assigned values to the type of their target.
//! Literals are re-stamped with the demanded type instead of being cast.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::LowerResult;
use lowr_ir::walk::{visit_expr_mut, visit_holders, visit_ref_exprs_mut, visit_stmt_head_exprs_mut, Holder};
use lowr_ir::{Design, Expr, Module, Statement, TypeDb, TypeId, UnaryOp};

/// Makes every conversion of the design explicit.
pub struct TypeExplicitPass;

impl LoweringPass for TypeExplicitPass {
    fn name(&self) -> &'static str {
        "type-explicit"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, types, _| {
            explicit_module(module, types)
        })
    }
}

/// Returns the type both operands of a comparison are compared in: the
/// wider width, signed if either side is signed, unsigned if either side is
/// unsigned. Two one-bit leaves compare as a leaf.
pub fn promote(types: &mut TypeDb, a: TypeId, b: TypeId) -> TypeId {
    let (a, b) = (types.strip(a), types.strip(b));
    if a == b {
        return a;
    }
    let leaf = if types.is_signed(a) || types.is_signed(b) {
        TypeDb::SIGNED
    } else if types.leaf(a) == TypeDb::UNSIGNED || types.leaf(b) == TypeDb::UNSIGNED {
        TypeDb::UNSIGNED
    } else {
        TypeDb::BIT
    };
    let width = types.width(a).max(types.width(b));
    if width == 1 && types.is_leaf(a) && types.is_leaf(b) {
        leaf
    } else {
        types.vector(leaf, width)
    }
}

/// Brings `e` to `want`.
fn coerce(types: &TypeDb, e: &mut Expr, want: TypeId) {
    if types.strip(e.ty()) == types.strip(want) {
        return;
    }
    if e.is_value() {
        e.set_ty(want);
        return;
    }
    let inner = std::mem::replace(e, Expr::int(0, want));
    *e = Expr::cast(want, inner);
}

/// Makes the conversions of one node explicit; its operands are already done.
fn explicit_node(types: &mut TypeDb, e: &mut Expr) {
    match e {
        Expr::Binary { op, lhs, rhs, ty } => {
            let (l, r) = (lhs.ty(), rhs.ty());
            if types.is_float(l) || types.is_float(r) {
                let float = if types.is_float(l) { l } else { r };
                coerce(types, lhs, float);
                coerce(types, rhs, float);
            } else if op.is_comparison() {
                let common = promote(types, l, r);
                coerce(types, lhs, common);
                coerce(types, rhs, common);
            } else if op.is_shift() {
                coerce(types, lhs, *ty);
            } else {
                coerce(types, lhs, *ty);
                coerce(types, rhs, *ty);
            }
        }
        Expr::Unary {
            op: UnaryOp::Not | UnaryOp::Neg,
            operand,
            ty,
        } => coerce(types, operand, *ty),
        Expr::Select { choices, ty, .. } => {
            for choice in choices {
                coerce(types, choice, *ty);
            }
        }
        _ => {}
    }
}

fn explicit_expr(types: &mut TypeDb, e: &mut Expr) -> LowerResult<()> {
    visit_expr_mut(e, &mut |node| {
        explicit_node(types, node);
        Ok(())
    })
}

fn explicit_stmt(types: &mut TypeDb, stmt: &mut Statement) -> LowerResult<()> {
    visit_stmt_head_exprs_mut(stmt, &mut |node| {
        explicit_node(types, node);
        Ok(())
    })?;
    match stmt {
        Statement::Transmit { left, right } => coerce(types, right, left.ty()),
        Statement::Case { subject, arms, .. } => {
            let want = subject.ty();
            for arm in arms {
                coerce(types, &mut arm.value, want);
            }
        }
        _ => {}
    }
    for branch in stmt.branches_mut() {
        for inner in branch.iter_mut() {
            explicit_stmt(types, inner)?;
        }
    }
    Ok(())
}

fn explicit_module(module: &mut Module, types: &mut TypeDb) -> LowerResult<()> {
    visit_holders(module, |m, _, holder| match holder {
        Holder::Statements(stmts) => stmts.iter_mut().try_for_each(|s| explicit_stmt(types, s)),
        Holder::Connections(connections) => connections.iter_mut().try_for_each(|c| {
            visit_ref_exprs_mut(&mut c.left, &mut |node| {
                explicit_node(types, node);
                Ok(())
            })?;
            explicit_expr(types, &mut c.right)?;
            coerce(types, &mut c.right, c.left.ty());
            Ok(())
        }),
        Holder::Events(events) => events.iter_mut().try_for_each(|e| {
            visit_ref_exprs_mut(&mut e.signal, &mut |node| {
                explicit_node(types, node);
                Ok(())
            })
        }),
        Holder::Init(signal, init) => {
            explicit_expr(types, init)?;
            coerce(types, init, m.signals[signal].ty);
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowr_common::Interner;
    use lowr_diagnostics::DiagnosticSink;
    use lowr_ir::{BehaviorKind, BinaryOp, CaseArm, Mode, ModuleBuilder, Ref};

    fn run(design: &mut Design, interner: &Interner) {
        let sink = DiagnosticSink::new();
        let cx = LoweringContext::with_defaults(interner, &sink);
        TypeExplicitPass.run(design, &cx).unwrap();
    }

    #[test]
    fn comparison_operands_meet_in_the_wider_signed_type() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let u8_ty = b.types().vector(TypeDb::UNSIGNED, 8);
        let s4_ty = b.types().vector(TypeDb::SIGNED, 4);
        b.input("a", u8_ty);
        b.input("s", s4_ty);
        b.output("y", TypeDb::BIT);
        let root = b.root();
        let cmp = Expr::binary(BinaryOp::Lt, b.read("a", u8_ty), b.read("s", s4_ty), TypeDb::BIT);
        let y = b.name("y", TypeDb::BIT);
        b.connect(root, y, cmp);

        run(&mut design, &interner);

        let s8_ty = design.types.vector(TypeDb::SIGNED, 8);
        let m = design.top_module();
        let Expr::Binary { lhs, rhs, .. } = &m.scopes[m.scope].connections[0].right else {
            panic!("expected the comparison");
        };
        assert!(matches!(**lhs, Expr::Cast { ty, .. } if ty == s8_ty));
        assert!(matches!(**rhs, Expr::Cast { ty, .. } if ty == s8_ty));
    }

    #[test]
    fn assignments_cast_values_and_restamp_literals() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let u8_ty = b.types().vector(TypeDb::UNSIGNED, 8);
        let u4_ty = b.types().vector(TypeDb::UNSIGNED, 4);
        b.input("n", u4_ty);
        let y = b.output("y", u8_ty);
        b.init(y, Expr::int(3, u4_ty));
        let root = b.root();
        let top = b.behavior(root, BehaviorKind::Par, vec![], Mode::Par);
        let target = b.name("y", u8_ty);
        let n = b.read("n", u4_ty);
        b.push(top, Statement::transmit(target.clone(), n.clone()));
        b.push(
            top,
            Statement::Case {
                subject: n,
                arms: vec![CaseArm {
                    value: Expr::int(1, u8_ty),
                    body: vec![Statement::transmit(target, Expr::int(0, u4_ty))],
                }],
                default: None,
            },
        );

        run(&mut design, &interner);

        let m = design.top_module();
        assert_eq!(m.signals[y].init.as_ref().map(Expr::ty), Some(u8_ty));
        let stmts = &m.blocks[top].stmts;
        let Statement::Transmit { right, .. } = &stmts[0] else {
            panic!("expected the transmit");
        };
        assert_eq!(
            *right,
            Expr::cast(u8_ty, Expr::Ref(Ref::name(interner.get_or_intern("n"), u4_ty)))
        );
        let Statement::Case { arms, .. } = &stmts[1] else {
            panic!("expected the case");
        };
        assert_eq!(arms[0].value, Expr::int(1, u4_ty));
        let Statement::Transmit { right, .. } = &arms[0].body[0] else {
            panic!("expected the arm body");
        };
        assert_eq!(*right, Expr::int(0, u8_ty));
    }

    #[test]
    fn shifts_keep_their_amount_and_floats_win() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let u8_ty = b.types().vector(TypeDb::UNSIGNED, 8);
        let u4_ty = b.types().vector(TypeDb::UNSIGNED, 4);
        b.input("a", u4_ty);
        b.input("k", u8_ty);
        b.input("f", TypeDb::FLOAT);
        b.output("y", u8_ty);
        b.output("z", TypeDb::FLOAT);
        let root = b.root();
        let shift = Expr::binary(BinaryOp::Shl, b.read("a", u4_ty), b.read("k", u8_ty), u8_ty);
        let sum = Expr::binary(BinaryOp::Add, b.read("f", TypeDb::FLOAT), b.read("k", u8_ty), TypeDb::FLOAT);
        let (y, z) = (b.name("y", u8_ty), b.name("z", TypeDb::FLOAT));
        b.connect(root, y, shift);
        b.connect(root, z, sum);

        run(&mut design, &interner);

        let m = design.top_module();
        let connections = &m.scopes[m.scope].connections;
        let Expr::Binary { lhs, rhs, .. } = &connections[0].right else {
            panic!("expected the shift");
        };
        assert!(matches!(**lhs, Expr::Cast { ty, .. } if ty == u8_ty));
        assert!(matches!(**rhs, Expr::Ref(_)));
        let Expr::Binary { lhs, rhs, .. } = &connections[1].right else {
            panic!("expected the sum");
        };
        assert!(matches!(**lhs, Expr::Ref(_)));
        assert!(matches!(**rhs, Expr::Cast { ty, .. } if ty == TypeDb::FLOAT));
    }

    #[test]
    fn promotion_is_commutative() {
        let mut types = TypeDb::new();
        let candidates = [
            TypeDb::BIT,
            TypeDb::SIGNED,
            TypeDb::UNSIGNED,
            types.vector(TypeDb::BIT, 4),
            types.vector(TypeDb::UNSIGNED, 8),
            types.vector(TypeDb::SIGNED, 3),
        ];
        for &a in &candidates {
            for &b in &candidates {
                assert_eq!(promote(&mut types, a, b), promote(&mut types, b, a));
            }
        }
        let mixed = promote(&mut types, candidates[4], candidates[5]);
        assert_eq!(types.width(mixed), 8);
        assert!(types.is_signed(mixed));
    }

    #[test]
    fn second_run_changes_nothing() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let u8_ty = b.types().vector(TypeDb::UNSIGNED, 8);
        b.input("a", TypeDb::BIT);
        b.output("y", u8_ty);
        let root = b.root();
        let y = b.name("y", u8_ty);
        let sum = Expr::binary(BinaryOp::Add, b.read("a", TypeDb::BIT), Expr::int(1, TypeDb::BIT), u8_ty);
        b.connect(root, y, sum);
        run(&mut design, &interner);
        let once = design.clone();
        run(&mut design, &interner);
        assert_eq!(design, once);
    }
}
