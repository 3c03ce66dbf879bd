//! Concatenation-target breaking.
//!
//! `{a, b} <= e` is rewritten as `aux <= e` followed by one slice
//! assignment per concatenated reference. Slices are taken from the least
//! significant end, so the last part reads the lowest bits of `aux`. The
//! auxiliary is at least as wide as the concatenation.
//!
//! A constant selection of a concatenation is pushed into its parts first,
//! so `{p, q}[0] <= e` is just `q <= e`. A selection at a run-time index
//! goes through the auxiliary preloaded with the parts: `aux <= {p, q}`,
//! `aux[i] <= e`, then the slices. In a parallel block the broken sequence
//! runs in a sequential sub-block, so every slice reads the new `aux`.

use crate::context::{position, LoweringContext};
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::{Ident, LowerResult};
use lowr_ir::walk::expand_block_statements;
use lowr_ir::{
    BehaviorKind, ConstValue, Connection, Design, Expr, Mode, Module, Place, Ref, Statement,
    TypeDb, TypeId,
};

/// Splits assignments to concatenations into slice assignments.
pub struct ConcatBreakPass {
    /// Wraps every slice in a cast to its target's type.
    pub cast: bool,
}

impl LoweringPass for ConcatBreakPass {
    fn name(&self) -> &'static str {
        if self.cast {
            "concat-break-cast"
        } else {
            "concat-break"
        }
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, types, _| {
            let breaker = Breaker {
                cx,
                cast: self.cast,
            };
            breaker.connections(module, types);
            breaker.blocks(module, types)
        })
    }
}

/// One broken assignment: the auxiliary and the assignments replacing it.
struct Broken {
    aux: Ident,
    ty: TypeId,
    assignments: Vec<(Ref, Expr)>,
    /// The assignments read what the previous ones wrote.
    preloaded: bool,
}

impl Broken {
    fn transmits(self) -> Vec<Statement> {
        self.assignments
            .into_iter()
            .map(|(left, right)| Statement::transmit(left, right))
            .collect()
    }
}

struct Breaker<'a, 'cx> {
    cx: &'a LoweringContext<'cx>,
    cast: bool,
}

impl Breaker<'_, '_> {
    /// Breaks `left <= right` if `left` is or selects from a concatenation.
    /// `zero` prepends a zero assignment of the auxiliary.
    fn split(&self, types: &mut TypeDb, left: Ref, right: Expr, zero: bool) -> Result<Broken, (Ref, Expr)> {
        let mut left = distribute(types, left);
        if matches!(left, Ref::Concat { .. }) {
            return Ok(self.split_whole(types, left, right, zero));
        }
        let Some(concat_ty) = selected_concat(&left).map(Ref::ty) else {
            return Err((left, right));
        };

        let aux = self.cx.fresh("concat");
        let whole = Ref::name(aux, concat_ty);
        let Some(Ref::Concat { parts, ty }) = swap_concat(&mut left, whole.clone()) else {
            return Err((left, right));
        };
        let mut flat = Vec::new();
        parts.into_iter().for_each(|p| flatten(p, &mut flat));
        let preload = Expr::Concat {
            parts: flat.iter().cloned().map(Expr::Ref).collect(),
            ty,
        };
        let mut assignments = vec![(whole.clone(), preload), (left, right)];
        assignments.extend(self.slices(types, &whole, flat));
        tracing::trace!(aux = self.cx.text(aux), "broke selected concatenation target");
        Ok(Broken {
            aux,
            ty: concat_ty,
            assignments,
            preloaded: true,
        })
    }

    fn split_whole(&self, types: &mut TypeDb, left: Ref, right: Expr, zero: bool) -> Broken {
        let mut parts = Vec::new();
        flatten(left, &mut parts);
        let total: u32 = parts.iter().map(|p| types.width(p.ty())).sum();
        let ty = if types.width(right.ty()) >= total {
            right.ty()
        } else {
            let leaf = types.leaf(right.ty());
            types.vector(leaf, total)
        };

        let aux = self.cx.fresh("concat");
        let whole = Ref::name(aux, ty);
        let mut assignments = Vec::with_capacity(parts.len() + 2);
        if zero {
            assignments.push((whole.clone(), Expr::int(0, ty)));
        }
        assignments.push((whole.clone(), right));
        assignments.extend(self.slices(types, &whole, parts));
        tracing::trace!(aux = self.cx.text(aux), "broke concatenation target");
        Broken {
            aux,
            ty,
            assignments,
            preloaded: false,
        }
    }

    /// One assignment per part from its bits of `whole`.
    fn slices(&self, types: &mut TypeDb, whole: &Ref, parts: Vec<Ref>) -> Vec<(Ref, Expr)> {
        let leaf = types.leaf(whole.ty());
        let widths: Vec<u32> = parts.iter().map(|p| types.width(p.ty())).collect();
        let mut offset: u32 = widths.iter().sum();
        let mut out = Vec::with_capacity(parts.len());
        for (part, width) in parts.into_iter().zip(widths) {
            offset -= width;
            let slice = bits(types, whole.clone(), offset + width - 1, offset, leaf);
            let value = if self.cast {
                Expr::cast(part.ty(), Expr::Ref(slice))
            } else {
                Expr::Ref(slice)
            };
            out.push((part, value));
        }
        out
    }

    fn connections(&self, module: &mut Module, types: &mut TypeDb) {
        for scope in module.live_scopes() {
            let mut kept = Vec::new();
            for connection in std::mem::take(&mut module.scopes[scope].connections) {
                match self.split(types, connection.left, connection.right, false) {
                    // Continuous assignments cannot read back a partial
                    // write, so the preloaded form becomes a behavior.
                    Ok(broken) if broken.preloaded => {
                        let behavior =
                            module.add_behavior(scope, BehaviorKind::Par, Vec::new(), Mode::Seq);
                        let top = module.behaviors[behavior].block;
                        module.declare_inner(Place::Block(top), broken.aux, broken.ty);
                        module.blocks[top].stmts = broken.transmits();
                    }
                    Ok(broken) => {
                        module.declare_inner(Place::Scope(scope), broken.aux, broken.ty);
                        kept.extend(
                            broken
                                .assignments
                                .into_iter()
                                .map(|(left, right)| Connection { left, right }),
                        );
                    }
                    Err((left, right)) => kept.push(Connection { left, right }),
                }
            }
            module.scopes[scope].connections = kept;
        }
    }

    fn blocks(&self, module: &mut Module, types: &mut TypeDb) -> LowerResult<()> {
        let blocks = module.live_blocks();
        expand_block_statements(module, &blocks, |m, block, stmt| {
            let Statement::Transmit { left, right } = stmt else {
                return Ok(vec![stmt]);
            };
            let zero = !m.behaviors[m.behavior_of(block)].is_edge_triggered();
            Ok(match self.split(types, left, right, zero) {
                Ok(broken) => {
                    let (aux, ty) = (broken.aux, broken.ty);
                    let (out, holder) = m.sequenced(block, broken.transmits());
                    m.declare_inner(Place::Block(holder), aux, ty);
                    out
                }
                Err((left, right)) => vec![Statement::transmit(left, right)],
            })
        })
    }
}

/// Collects the parts of a concatenation target, nested concatenations
/// flattened, most significant first.
fn flatten(r: Ref, out: &mut Vec<Ref>) {
    match r {
        Ref::Concat { parts, .. } => parts.into_iter().for_each(|p| flatten(p, out)),
        other => out.push(other),
    }
}

/// Selects bits `high..low` of `base`: an index for one bit, a range
/// otherwise.
fn bits(types: &mut TypeDb, base: Ref, high: u32, low: u32, leaf: TypeId) -> Ref {
    if high == low {
        Ref::index(base, position(low), leaf)
    } else {
        let ty = types.vector(leaf, high - low + 1);
        Ref::range(base, high, low, ty)
    }
}

fn constant_position(index: &Expr) -> Option<u32> {
    match index {
        Expr::Value {
            value: ConstValue::Int(v),
            ..
        } => u32::try_from(*v).ok(),
        _ => None,
    }
}

/// Pushes constant selections of concatenations down into the selected
/// parts.
fn distribute(types: &mut TypeDb, r: Ref) -> Ref {
    match r {
        Ref::Index { base, index, ty } => match (distribute(types, *base), constant_position(&index)) {
            (Ref::Concat { parts, .. }, Some(bit)) => select_parts(types, parts, bit, bit, ty),
            (base, _) => Ref::Index {
                base: Box::new(base),
                index,
                ty,
            },
        },
        Ref::Range {
            base,
            high,
            low,
            ty,
        } => match distribute(types, *base) {
            Ref::Concat { parts, .. } => select_parts(types, parts, high, low, ty),
            base => Ref::Range {
                base: Box::new(base),
                high,
                low,
                ty,
            },
        },
        Ref::Concat { parts, ty } => Ref::Concat {
            parts: parts.into_iter().map(|p| distribute(types, p)).collect(),
            ty,
        },
        other => other,
    }
}

/// Returns the parts of a concatenation overlapping bits `high..low`, each
/// narrowed to the overlap.
fn select_parts(types: &mut TypeDb, parts: Vec<Ref>, high: u32, low: u32, ty: TypeId) -> Ref {
    let mut flat = Vec::new();
    parts.into_iter().for_each(|p| flatten(p, &mut flat));
    let widths: Vec<u32> = flat.iter().map(|p| types.width(p.ty())).collect();
    let mut offset: u32 = widths.iter().sum();
    let mut pieces = Vec::new();
    for (part, width) in flat.into_iter().zip(widths) {
        offset -= width;
        if width == 0 || high < offset || low > offset + width - 1 {
            continue;
        }
        let (h, l) = (high.min(offset + width - 1) - offset, low.max(offset) - offset);
        pieces.push(narrow(types, part, width, h, l));
    }
    if pieces.len() == 1 {
        if let Some(piece) = pieces.pop() {
            return piece;
        }
    }
    Ref::Concat { parts: pieces, ty }
}

/// Selects local bits `h..l` of a part `width` bits wide.
fn narrow(types: &mut TypeDb, part: Ref, width: u32, h: u32, l: u32) -> Ref {
    if h == width - 1 && l == 0 {
        return part;
    }
    let leaf = types.leaf(part.ty());
    match part {
        Ref::Range { base, low, .. } => bits(types, *base, low + h, low + l, leaf),
        part => bits(types, part, h, l, leaf),
    }
}

/// Returns the concatenation a selection chain ends in.
fn selected_concat(r: &Ref) -> Option<&Ref> {
    match r {
        Ref::Concat { .. } => Some(r),
        Ref::Index { base, .. } | Ref::Range { base, .. } => selected_concat(base),
        Ref::Name { .. } | Ref::This => None,
    }
}

/// Puts `with` where the selection chain's concatenation was and returns it.
fn swap_concat(r: &mut Ref, with: Ref) -> Option<Ref> {
    match r {
        Ref::Concat { .. } => Some(std::mem::replace(r, with)),
        Ref::Index { base, .. } | Ref::Range { base, .. } => swap_concat(base, with),
        Ref::Name { .. } | Ref::This => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowr_common::Interner;
    use lowr_diagnostics::DiagnosticSink;
    use lowr_ir::ModuleBuilder;

    fn slices(stmts: &[Statement]) -> Vec<(u32, u32)> {
        stmts
            .iter()
            .filter_map(|s| match s {
                Statement::Transmit {
                    right: Expr::Ref(Ref::Range { high, low, .. }),
                    ..
                } => Some((*high, *low)),
                _ => None,
            })
            .collect()
    }

    fn run(design: &mut Design, interner: &Interner) {
        let sink = DiagnosticSink::new();
        let cx = LoweringContext::with_defaults(interner, &sink);
        ConcatBreakPass { cast: false }.run(design, &cx).unwrap();
    }

    fn rendered(connections: &[Connection], interner: &Interner) -> Vec<String> {
        connections
            .iter()
            .map(|c| c.left.display(interner))
            .collect()
    }

    #[test]
    fn combinational_target_gets_zero_and_slices() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let byte = b.bits(8);
        let nibble = b.bits(4);
        b.input("x", byte);
        b.output("a", byte);
        let root = b.root();
        let blk = b.behavior(root, BehaviorKind::Par, vec![], Mode::Seq);
        let a = b.name("a", byte);
        let hi = Ref::range(a.clone(), 7, 4, nibble);
        let lo = Ref::range(a, 3, 0, nibble);
        let target = Ref::Concat {
            parts: vec![hi, lo],
            ty: byte,
        };
        let x = b.read("x", byte);
        b.push(blk, Statement::transmit(target, x));

        run(&mut design, &interner);

        let m = design.top_module();
        let stmts = &m.blocks[blk].stmts;
        assert_eq!(stmts.len(), 4);
        let aux = m.blocks[blk].inners[0];
        assert_eq!(m.signals[aux].ty, byte);
        assert!(matches!(&stmts[0], Statement::Transmit { right, .. } if right.is_value()));
        assert_eq!(slices(stmts), vec![(7, 4), (3, 0)]);
    }

    #[test]
    fn clocked_par_target_runs_in_a_seq_block() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let two = b.bits(2);
        b.input("clk", TypeDb::BIT);
        b.input("x", two);
        b.output("p", TypeDb::BIT);
        b.output("q", TypeDb::BIT);
        let root = b.root();
        let clk = b.posedge("clk");
        let blk = b.behavior(root, BehaviorKind::Seq, vec![clk], Mode::Par);
        let target = Ref::Concat {
            parts: vec![b.name("p", TypeDb::BIT), b.name("q", TypeDb::BIT)],
            ty: two,
        };
        let x = b.read("x", two);
        b.push(blk, Statement::transmit(target, x));

        run(&mut design, &interner);

        let m = design.top_module();
        assert_eq!(m.blocks[blk].mode, Mode::Par);
        let [Statement::Block(sub)] = m.blocks[blk].stmts.as_slice() else {
            panic!("expected one nested block, got {:?}", m.blocks[blk].stmts);
        };
        let sub = &m.blocks[*sub];
        assert_eq!(sub.mode, Mode::Seq);
        assert!(m.blocks[blk].inners.is_empty());
        assert_eq!(sub.inners.len(), 1);
        let aux = m.signals[sub.inners[0]].name;
        assert_eq!(sub.stmts.len(), 3);
        let Statement::Transmit { left, .. } = &sub.stmts[0] else {
            panic!("expected the auxiliary write");
        };
        assert_eq!(left.ident(), Some(aux));
        let Statement::Transmit { right, .. } = &sub.stmts[2] else {
            panic!("expected the low bit");
        };
        let Expr::Ref(Ref::Index { base, index, ty }) = right else {
            panic!("expected a bit select, got {right:?}");
        };
        assert_eq!(base.ident(), Some(aux));
        assert_eq!(**index, position(0));
        assert_eq!(*ty, TypeDb::BIT);
    }

    #[test]
    fn narrow_value_gets_an_auxiliary_as_wide_as_the_target() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let nibble = b.bits(4);
        let byte = b.bits(8);
        b.output("h", nibble);
        b.output("l", nibble);
        let root = b.root();
        let target = Ref::Concat {
            parts: vec![b.name("h", nibble), b.name("l", nibble)],
            ty: byte,
        };
        b.connect(root, target, Expr::int(0, TypeDb::BIT));

        run(&mut design, &interner);

        let m = design.top_module();
        let aux = m.scopes[m.scope].inners[0];
        assert_eq!(design.types.width(m.signals[aux].ty), 8);
        let connections = &m.scopes[m.scope].connections;
        let sliced: Vec<Statement> = connections
            .iter()
            .map(|c| Statement::transmit(c.left.clone(), c.right.clone()))
            .collect();
        assert_eq!(slices(&sliced), vec![(7, 4), (3, 0)]);
    }

    #[test]
    fn constant_selection_of_a_concatenation_assigns_the_selected_parts() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let two = b.bits(2);
        let nibble = b.bits(4);
        let byte = b.bits(8);
        b.input("x", TypeDb::BIT);
        b.input("w", nibble);
        b.output("p", TypeDb::BIT);
        b.output("q", TypeDb::BIT);
        b.output("a", nibble);
        b.output("c", nibble);
        let root = b.root();
        let pair = Ref::Concat {
            parts: vec![b.name("p", TypeDb::BIT), b.name("q", TypeDb::BIT)],
            ty: two,
        };
        let x = b.read("x", TypeDb::BIT);
        b.connect(root, Ref::index(pair, position(0), TypeDb::BIT), x);
        let bytes = Ref::Concat {
            parts: vec![b.name("a", nibble), b.name("c", nibble)],
            ty: byte,
        };
        let w = b.read("w", nibble);
        b.connect(root, Ref::range(bytes, 5, 2, nibble), w);

        run(&mut design, &interner);

        let m = design.top_module();
        let connections = &m.scopes[m.scope].connections;
        assert_eq!(
            rendered(connections, &interner),
            vec!["q", "_concat_0", "a[1..0]", "c[3..2]"]
        );
        let aux = m.scopes[m.scope].inners[0];
        assert_eq!(design.types.width(m.signals[aux].ty), 4);
    }

    #[test]
    fn runtime_selection_goes_through_a_preloaded_auxiliary() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let two = b.bits(2);
        b.input("i", TypeDb::BIT);
        b.input("x", TypeDb::BIT);
        b.output("p", TypeDb::BIT);
        b.output("q", TypeDb::BIT);
        let root = b.root();
        let pair = Ref::Concat {
            parts: vec![b.name("p", TypeDb::BIT), b.name("q", TypeDb::BIT)],
            ty: two,
        };
        let target = Ref::index(pair, b.read("i", TypeDb::BIT), TypeDb::BIT);
        let x = b.read("x", TypeDb::BIT);
        b.connect(root, target, x);

        run(&mut design, &interner);

        let m = design.top_module();
        let scope = &m.scopes[m.scope];
        assert!(scope.connections.is_empty());
        assert_eq!(scope.behaviors.len(), 1);
        let behavior = &m.behaviors[scope.behaviors[0]];
        assert_eq!(behavior.kind, BehaviorKind::Par);
        let top = &m.blocks[behavior.block];
        assert_eq!(top.mode, Mode::Seq);
        assert_eq!(top.inners.len(), 1);
        let targets: Vec<String> = top
            .stmts
            .iter()
            .map(|s| match s {
                Statement::Transmit { left, .. } => left.display(&interner),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(targets, vec!["_concat_0", "_concat_0[..]", "p", "q"]);
        let Statement::Transmit { right, .. } = &top.stmts[0] else {
            panic!("expected the preload");
        };
        assert!(matches!(right, Expr::Concat { parts, .. } if parts.len() == 2));
    }

    #[test]
    fn cast_form_wraps_slices_in_connections() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let byte = b.bits(8);
        let nibble = b.bits(4);
        let signed = b.types().vector(TypeDb::SIGNED, 4);
        b.input("x", byte);
        b.output("h", nibble);
        b.output("l", signed);
        let root = b.root();
        let target = Ref::Concat {
            parts: vec![
                b.name("h", nibble),
                Ref::Concat {
                    parts: vec![b.name("l", signed)],
                    ty: signed,
                },
            ],
            ty: byte,
        };
        let x = b.read("x", byte);
        b.connect(root, target, x);

        let cx = LoweringContext::with_defaults(&interner, &sink);
        ConcatBreakPass { cast: true }.run(&mut design, &cx).unwrap();

        let m = design.top_module();
        let connections = &m.scopes[m.scope].connections;
        assert_eq!(connections.len(), 3);
        assert_eq!(m.scopes[m.scope].inners.len(), 1);
        let Expr::Cast { ty, expr } = &connections[2].right else {
            panic!("expected a cast");
        };
        assert_eq!(*ty, signed);
        assert!(matches!(**expr, Expr::Ref(Ref::Range { high: 3, low: 0, .. })));
        assert_eq!(ConcatBreakPass { cast: true }.name(), "concat-break-cast");
    }
}
