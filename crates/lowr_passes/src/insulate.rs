//! Bit-to-vector insulation.
//!
//! Legacy VHDL does not mix `std_logic` and `std_logic_vector` operands. A
//! one-bit scalar used where a vector is expected is routed through a fresh
//! one-bit vector signal, written through its bit 0 just before the use.
//! Inside a parallel block the write and the use go into a sequential
//! sub-block, so the use sees the written bit.

use crate::context::{position, LoweringContext};
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::{Ident, LowerResult};
use lowr_ir::walk::expand_block_statements;
use lowr_ir::{Connection, Design, Expr, Module, Place, Ref, Statement, TypeDb, TypeId};

/// Routes one-bit scalars used as vectors through one-bit vector signals.
pub struct BitToVectorPass;

impl LoweringPass for BitToVectorPass {
    fn name(&self) -> &'static str {
        "bit-to-vector"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, types, _| {
            insulate_module(module, types, cx)
        })
    }
}

/// A scalar routed through a fresh vector: `name[0] <= value`.
struct Insulation {
    name: Ident,
    ty: TypeId,
    value: Expr,
}

impl Insulation {
    fn write(self, types: &TypeDb) -> (Ref, Expr) {
        let bit = types.leaf(self.ty);
        let target = Ref::index(Ref::name(self.name, self.ty), position(0), bit);
        (target, self.value)
    }
}

struct Insulator<'a, 'cx> {
    types: &'a mut TypeDb,
    cx: &'a LoweringContext<'cx>,
    found: Vec<Insulation>,
}

impl<'a, 'cx> Insulator<'a, 'cx> {
    fn new(types: &'a mut TypeDb, cx: &'a LoweringContext<'cx>) -> Self {
        Self {
            types,
            cx,
            found: Vec::new(),
        }
    }

    /// Rewrites `e`; `wants_vector` tells whether its context expects one.
    fn expr(&mut self, e: &mut Expr, wants_vector: bool) {
        match e {
            Expr::Binary { lhs, rhs, ty, .. } => {
                let vector = self.types.is_vector(*ty);
                self.expr(lhs, vector);
                self.expr(rhs, vector);
            }
            Expr::Unary { operand, .. } => self.expr(operand, false),
            Expr::Cast { expr, .. } => self.expr(expr, false),
            Expr::Select { index, choices, .. } => {
                self.expr(index, false);
                choices.iter_mut().for_each(|c| self.expr(c, false));
            }
            // Parts of references and concatenations keep their scalars.
            Expr::Value { .. } | Expr::Ref(_) | Expr::Concat { .. } => {}
        }
        let ty = e.ty();
        if wants_vector && !e.is_value() && self.types.is_leaf(ty) && !self.types.is_float(ty) {
            let leaf = self.types.leaf(ty);
            let vector = self.types.vector(leaf, 1);
            let name = match e {
                Expr::Ref(r) => self.cx.fresh_for(r, "bit"),
                _ => self.cx.fresh("bit"),
            };
            let value = std::mem::replace(e, Expr::Ref(Ref::name(name, vector)));
            tracing::trace!(signal = self.cx.text(name), "insulating scalar");
            self.found.push(Insulation {
                name,
                ty: vector,
                value,
            });
        }
    }

    fn assignment(&mut self, left: &Ref, right: &mut Expr) {
        let wants_vector = self.types.is_vector(left.ty());
        self.expr(right, wants_vector);
    }

    fn stmt(&mut self, stmt: &mut Statement) {
        match stmt {
            Statement::Transmit { left, right } => self.assignment(left, right),
            Statement::If { condition, .. } => self.expr(condition, false),
            Statement::Case { subject, .. } => self.expr(subject, false),
            Statement::Print { args } => args.iter_mut().for_each(|a| self.expr(a, false)),
            Statement::TimeWait { .. }
            | Statement::TimeRepeat { .. }
            | Statement::Block(_)
            | Statement::Nop => {}
        }
    }
}

fn insulate_module(
    module: &mut Module,
    types: &mut TypeDb,
    cx: &LoweringContext<'_>,
) -> LowerResult<()> {
    for scope in module.live_scopes() {
        let mut kept = Vec::new();
        for mut connection in std::mem::take(&mut module.scopes[scope].connections) {
            let found = {
                let mut insulator = Insulator::new(types, cx);
                insulator.assignment(&connection.left, &mut connection.right);
                insulator.found
            };
            for insulation in found {
                module.declare_inner(Place::Scope(scope), insulation.name, insulation.ty);
                let (left, right) = insulation.write(types);
                kept.push(Connection { left, right });
            }
            kept.push(connection);
        }
        module.scopes[scope].connections = kept;
    }

    let blocks = module.live_blocks();
    expand_block_statements(module, &blocks, |m, block, mut stmt| {
        let found = {
            let mut insulator = Insulator::new(types, cx);
            insulator.stmt(&mut stmt);
            insulator.found
        };
        if found.is_empty() {
            return Ok(vec![stmt]);
        }
        let mut signals = Vec::with_capacity(found.len());
        let mut sequence = Vec::with_capacity(found.len() + 1);
        for insulation in found {
            signals.push((insulation.name, insulation.ty));
            let (target, value) = insulation.write(types);
            sequence.push(Statement::transmit(target, value));
        }
        sequence.push(stmt);
        let (out, holder) = m.sequenced(block, sequence);
        for (name, ty) in signals {
            m.declare_inner(Place::Block(holder), name, ty);
        }
        Ok(out)
    })
}
