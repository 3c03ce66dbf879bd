//! Traversal helpers the lowering passes are written with.
//!
//! The module-level walkers take each statement list, connection list, event
//! list or initializer out of the module while visiting it. The callback
//! therefore receives the module read-only, together with the [`Place`] the
//! visited code lives at, and can [`resolve`](crate::resolve::resolve) names
//! while it rewrites the taken-out code.

use crate::expr::{Expr, Ref};
use crate::ids::{BlockId, SignalId};
use crate::module::{Connection, Event, Module, Place};
use crate::stmt::Statement;
use lowr_common::LowerResult;

/// Whether a reference is read or assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// The referenced value is read.
    Read,
    /// The reference is an assignment target.
    Write,
}

/// A piece of a module that holds expressions.
pub enum Holder<'a> {
    /// The statements of a block.
    Statements(&'a mut Vec<Statement>),
    /// The connections of a scope.
    Connections(&'a mut Vec<Connection>),
    /// The trigger events of a behavior.
    Events(&'a mut Vec<Event>),
    /// The initial value of a signal.
    Init(SignalId, &'a mut Expr),
}

/// Visits every expression holder of the module's live code: port and inner
/// signal initializers, connections, events and block statements.
pub fn visit_holders<F>(module: &mut Module, mut f: F) -> LowerResult<()>
where
    F: FnMut(&Module, Place, Holder<'_>) -> LowerResult<()>,
{
    let root = Place::Scope(module.scope);
    let ports: Vec<SignalId> = module.ports().map(|(s, _)| s).collect();
    for signal in ports {
        visit_init(module, root, signal, &mut f)?;
    }
    for scope in module.live_scopes() {
        let place = Place::Scope(scope);
        for signal in module.scopes[scope].inners.clone() {
            visit_init(module, place, signal, &mut f)?;
        }
        let mut connections = std::mem::take(&mut module.scopes[scope].connections);
        let result = f(module, place, Holder::Connections(&mut connections));
        module.scopes[scope].connections = connections;
        result?;
        for behavior in module.scopes[scope].behaviors.clone() {
            let mut events = std::mem::take(&mut module.behaviors[behavior].events);
            let result = f(module, place, Holder::Events(&mut events));
            module.behaviors[behavior].events = events;
            result?;
        }
    }
    let blocks = module.live_blocks();
    visit_block_holders(module, &blocks, f)
}

/// Visits the initializers of block inners and the statements of the given
/// blocks only.
pub fn visit_block_holders<F>(module: &mut Module, blocks: &[BlockId], mut f: F) -> LowerResult<()>
where
    F: FnMut(&Module, Place, Holder<'_>) -> LowerResult<()>,
{
    for &block in blocks {
        let place = Place::Block(block);
        for signal in module.blocks[block].inners.clone() {
            visit_init(module, place, signal, &mut f)?;
        }
        let mut stmts = std::mem::take(&mut module.blocks[block].stmts);
        let result = f(module, place, Holder::Statements(&mut stmts));
        module.blocks[block].stmts = stmts;
        result?;
    }
    Ok(())
}

fn visit_init<F>(module: &mut Module, place: Place, signal: SignalId, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&Module, Place, Holder<'_>) -> LowerResult<()>,
{
    let Some(mut init) = module.signals[signal].init.take() else {
        return Ok(());
    };
    let result = f(module, place, Holder::Init(signal, &mut init));
    module.signals[signal].init = Some(init);
    result
}

/// Visits every reference of the module's live code, outermost first, with
/// its place and access. The callback may replace the reference; the
/// replacement's sub-references are visited next.
pub fn rewrite_refs<F>(module: &mut Module, mut f: F) -> LowerResult<()>
where
    F: FnMut(&Module, Place, Access, &mut Ref) -> LowerResult<()>,
{
    visit_holders(module, |m, place, holder| {
        holder_refs_mut(holder, &mut |r, access| f(m, place, access, r))
    })
}

/// Like [`rewrite_refs`], restricted to the given blocks.
pub fn rewrite_block_refs<F>(module: &mut Module, blocks: &[BlockId], mut f: F) -> LowerResult<()>
where
    F: FnMut(&Module, Place, Access, &mut Ref) -> LowerResult<()>,
{
    visit_block_holders(module, blocks, |m, place, holder| {
        holder_refs_mut(holder, &mut |r, access| f(m, place, access, r))
    })
}

/// Visits every expression node of the module's live code, innermost first.
pub fn rewrite_exprs<F>(module: &mut Module, mut f: F) -> LowerResult<()>
where
    F: FnMut(&Module, Place, &mut Expr) -> LowerResult<()>,
{
    visit_holders(module, |m, place, holder| {
        let mut visit = |e: &mut Expr| f(m, place, e);
        match holder {
            Holder::Statements(stmts) => stmts
                .iter_mut()
                .try_for_each(|s| visit_stmt_exprs_mut(s, &mut visit)),
            Holder::Connections(connections) => connections.iter_mut().try_for_each(|c| {
                visit_ref_exprs_mut(&mut c.left, &mut visit)?;
                visit_expr_mut(&mut c.right, &mut visit)
            }),
            Holder::Events(events) => events
                .iter_mut()
                .try_for_each(|e| visit_ref_exprs_mut(&mut e.signal, &mut visit)),
            Holder::Init(_, init) => visit_expr_mut(init, &mut visit),
        }
    })
}

fn holder_refs_mut<F>(holder: Holder<'_>, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&mut Ref, Access) -> LowerResult<()>,
{
    match holder {
        Holder::Statements(stmts) => stmts.iter_mut().try_for_each(|s| visit_stmt_refs_mut(s, f)),
        Holder::Connections(connections) => connections.iter_mut().try_for_each(|c| {
            visit_ref_mut(&mut c.left, Access::Write, f)?;
            visit_expr_refs_mut(&mut c.right, f)
        }),
        Holder::Events(events) => events
            .iter_mut()
            .try_for_each(|e| visit_ref_mut(&mut e.signal, Access::Read, f)),
        Holder::Init(_, init) => visit_expr_refs_mut(init, f),
    }
}

/// Visits a reference and its sub-references, outermost first. Index
/// expressions are always read; the base of a `Name` chain is not visited
/// separately.
pub fn visit_ref_mut<F>(r: &mut Ref, access: Access, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&mut Ref, Access) -> LowerResult<()>,
{
    f(r, access)?;
    match r {
        Ref::Name { .. } | Ref::This => Ok(()),
        Ref::Index { base, index, .. } => {
            visit_ref_mut(base, access, f)?;
            visit_expr_refs_mut(index, f)
        }
        Ref::Range { base, .. } => visit_ref_mut(base, access, f),
        Ref::Concat { parts, .. } => parts.iter_mut().try_for_each(|p| visit_ref_mut(p, access, f)),
    }
}

/// Visits every reference read by an expression.
pub fn visit_expr_refs_mut<F>(e: &mut Expr, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&mut Ref, Access) -> LowerResult<()>,
{
    match e {
        Expr::Value { .. } => Ok(()),
        Expr::Ref(r) => visit_ref_mut(r, Access::Read, f),
        Expr::Unary { operand, .. } => visit_expr_refs_mut(operand, f),
        Expr::Binary { lhs, rhs, .. } => {
            visit_expr_refs_mut(lhs, f)?;
            visit_expr_refs_mut(rhs, f)
        }
        Expr::Select { index, choices, .. } => {
            visit_expr_refs_mut(index, f)?;
            choices.iter_mut().try_for_each(|c| visit_expr_refs_mut(c, f))
        }
        Expr::Concat { parts, .. } => parts.iter_mut().try_for_each(|p| visit_expr_refs_mut(p, f)),
        Expr::Cast { expr, .. } => visit_expr_refs_mut(expr, f),
    }
}

/// Visits every reference of a statement, its branches included.
pub fn visit_stmt_refs_mut<F>(stmt: &mut Statement, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&mut Ref, Access) -> LowerResult<()>,
{
    match stmt {
        Statement::Transmit { left, right } => {
            visit_ref_mut(left, Access::Write, f)?;
            visit_expr_refs_mut(right, f)
        }
        Statement::If { condition, .. } => visit_expr_refs_mut(condition, f),
        Statement::Case { subject, arms, .. } => {
            visit_expr_refs_mut(subject, f)?;
            arms.iter_mut()
                .try_for_each(|arm| visit_expr_refs_mut(&mut arm.value, f))
        }
        Statement::TimeWait { delay } => visit_expr_refs_mut(delay, f),
        Statement::Print { args } => args.iter_mut().try_for_each(|a| visit_expr_refs_mut(a, f)),
        Statement::TimeRepeat { .. } | Statement::Block(_) | Statement::Nop => Ok(()),
    }?;
    for branch in stmt.branches_mut() {
        branch.iter_mut().try_for_each(|s| visit_stmt_refs_mut(s, f))?;
    }
    Ok(())
}

/// Visits every expression node of an expression tree, innermost first,
/// including the index expressions of references.
pub fn visit_expr_mut<F>(e: &mut Expr, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&mut Expr) -> LowerResult<()>,
{
    match e {
        Expr::Value { .. } => {}
        Expr::Ref(r) => visit_ref_exprs_mut(r, f)?,
        Expr::Unary { operand, .. } => visit_expr_mut(operand, f)?,
        Expr::Binary { lhs, rhs, .. } => {
            visit_expr_mut(lhs, f)?;
            visit_expr_mut(rhs, f)?;
        }
        Expr::Select { index, choices, .. } => {
            visit_expr_mut(index, f)?;
            choices.iter_mut().try_for_each(|c| visit_expr_mut(c, f))?;
        }
        Expr::Concat { parts, .. } => parts.iter_mut().try_for_each(|p| visit_expr_mut(p, f))?,
        Expr::Cast { expr, .. } => visit_expr_mut(expr, f)?,
    }
    f(e)
}

/// Visits the expressions nested in a reference (index expressions).
pub fn visit_ref_exprs_mut<F>(r: &mut Ref, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&mut Expr) -> LowerResult<()>,
{
    match r {
        Ref::Name { base, .. } => match base {
            Some(base) => visit_ref_exprs_mut(base, f),
            None => Ok(()),
        },
        Ref::This => Ok(()),
        Ref::Index { base, index, .. } => {
            visit_ref_exprs_mut(base, f)?;
            visit_expr_mut(index, f)
        }
        Ref::Range { base, .. } => visit_ref_exprs_mut(base, f),
        Ref::Concat { parts, .. } => parts.iter_mut().try_for_each(|p| visit_ref_exprs_mut(p, f)),
    }
}

/// Visits every expression node of a statement, its branches included.
pub fn visit_stmt_exprs_mut<F>(stmt: &mut Statement, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&mut Expr) -> LowerResult<()>,
{
    visit_stmt_head_exprs_mut(stmt, f)?;
    for branch in stmt.branches_mut() {
        branch.iter_mut().try_for_each(|s| visit_stmt_exprs_mut(s, f))?;
    }
    Ok(())
}

/// Visits the expression nodes a statement holds itself, leaving its
/// branches alone.
pub fn visit_stmt_head_exprs_mut<F>(stmt: &mut Statement, f: &mut F) -> LowerResult<()>
where
    F: FnMut(&mut Expr) -> LowerResult<()>,
{
    match stmt {
        Statement::Transmit { left, right } => {
            visit_ref_exprs_mut(left, f)?;
            visit_expr_mut(right, f)
        }
        Statement::If { condition, .. } => visit_expr_mut(condition, f),
        Statement::Case { subject, arms, .. } => {
            visit_expr_mut(subject, f)?;
            arms.iter_mut().try_for_each(|arm| visit_expr_mut(&mut arm.value, f))
        }
        Statement::TimeWait { delay } => visit_expr_mut(delay, f),
        Statement::Print { args } => args.iter_mut().try_for_each(|a| visit_expr_mut(a, f)),
        Statement::TimeRepeat { .. } | Statement::Block(_) | Statement::Nop => Ok(()),
    }
}

/// Rebuilds a statement list: branches are expanded first, then each
/// statement is replaced by what `f` returns for it.
pub fn expand_statements<F>(stmts: &mut Vec<Statement>, f: &mut F) -> LowerResult<()>
where
    F: FnMut(Statement) -> LowerResult<Vec<Statement>>,
{
    for mut stmt in std::mem::take(stmts) {
        for branch in stmt.branches_mut() {
            expand_statements(branch, f)?;
        }
        stmts.extend(f(stmt)?);
    }
    Ok(())
}

/// Expands the statements of the given blocks like [`expand_statements`],
/// handing `f` the module and the block holding each statement so the
/// rewrite can allocate blocks and declare signals on the spot.
pub fn expand_block_statements<F>(module: &mut Module, blocks: &[BlockId], mut f: F) -> LowerResult<()>
where
    F: FnMut(&mut Module, BlockId, Statement) -> LowerResult<Vec<Statement>>,
{
    for &block in blocks {
        let mut stmts = std::mem::take(&mut module.blocks[block].stmts);
        let result = expand_statements(&mut stmts, &mut |stmt| f(module, block, stmt));
        module.blocks[block].stmts = stmts;
        result?;
    }
    Ok(())
}

/// Read-only reference visitors, for analyses that must not take code out of
/// the module.
pub mod read {
    use super::Access;
    use crate::expr::{Expr, Ref};
    use crate::module::{Module, Place};
    use crate::stmt::Statement;

    /// Visits every reference of the module's live code with its place and
    /// access, in the same order as [`rewrite_refs`](super::rewrite_refs).
    pub fn for_each_ref(module: &Module, mut f: impl FnMut(Place, Access, &Ref)) {
        let root = Place::Scope(module.scope);
        for (signal, _) in module.ports() {
            if let Some(init) = &module.signals[signal].init {
                expr_refs(init, &mut |r, a| f(root, a, r));
            }
        }
        for scope in module.live_scopes() {
            let place = Place::Scope(scope);
            let body = &module.scopes[scope];
            for signal in &body.inners {
                if let Some(init) = &module.signals[*signal].init {
                    expr_refs(init, &mut |r, a| f(place, a, r));
                }
            }
            for connection in &body.connections {
                ref_refs(&connection.left, Access::Write, &mut |r, a| f(place, a, r));
                expr_refs(&connection.right, &mut |r, a| f(place, a, r));
            }
            for behavior in &body.behaviors {
                for event in &module.behaviors[*behavior].events {
                    ref_refs(&event.signal, Access::Read, &mut |r, a| f(place, a, r));
                }
            }
        }
        for block in module.live_blocks() {
            let place = Place::Block(block);
            for signal in &module.blocks[block].inners {
                if let Some(init) = &module.signals[*signal].init {
                    expr_refs(init, &mut |r, a| f(place, a, r));
                }
            }
            for stmt in &module.blocks[block].stmts {
                stmt_refs(stmt, &mut |r, a| f(place, a, r));
            }
        }
    }

    /// Visits a reference and its sub-references, outermost first.
    pub fn ref_refs(r: &Ref, access: Access, f: &mut impl FnMut(&Ref, Access)) {
        f(r, access);
        match r {
            Ref::Name { .. } | Ref::This => {}
            Ref::Index { base, index, .. } => {
                ref_refs(base, access, f);
                expr_refs(index, f);
            }
            Ref::Range { base, .. } => ref_refs(base, access, f),
            Ref::Concat { parts, .. } => parts.iter().for_each(|p| ref_refs(p, access, f)),
        }
    }

    /// Visits every reference read by an expression.
    pub fn expr_refs(e: &Expr, f: &mut impl FnMut(&Ref, Access)) {
        match e {
            Expr::Value { .. } => {}
            Expr::Ref(r) => ref_refs(r, Access::Read, f),
            Expr::Unary { operand, .. } => expr_refs(operand, f),
            Expr::Binary { lhs, rhs, .. } => {
                expr_refs(lhs, f);
                expr_refs(rhs, f);
            }
            Expr::Select { index, choices, .. } => {
                expr_refs(index, f);
                choices.iter().for_each(|c| expr_refs(c, f));
            }
            Expr::Concat { parts, .. } => parts.iter().for_each(|p| expr_refs(p, f)),
            Expr::Cast { expr, .. } => expr_refs(expr, f),
        }
    }

    /// Visits every reference of a statement, its branches included.
    pub fn stmt_refs(stmt: &Statement, f: &mut impl FnMut(&Ref, Access)) {
        match stmt {
            Statement::Transmit { left, right } => {
                ref_refs(left, Access::Write, f);
                expr_refs(right, f);
            }
            Statement::If { condition, .. } => expr_refs(condition, f),
            Statement::Case { subject, arms, .. } => {
                expr_refs(subject, f);
                arms.iter().for_each(|arm| expr_refs(&arm.value, f));
            }
            Statement::TimeWait { delay } => expr_refs(delay, f),
            Statement::Print { args } => args.iter().for_each(|a| expr_refs(a, f)),
            Statement::TimeRepeat { .. } | Statement::Block(_) | Statement::Nop => {}
        }
        for branch in stmt.branches() {
            branch.iter().for_each(|s| stmt_refs(s, f));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::design::Design;
    use crate::expr::BinaryOp;
    use crate::module::{BehaviorKind, Mode};
    use crate::types::TypeDb;
    use lowr_common::Interner;

    fn design_with_logic(interner: &Interner) -> Design {
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, interner, "top");
        let a = b.read("a", TypeDb::BIT);
        b.input("a", TypeDb::BIT);
        b.output("y", TypeDb::BIT);
        let root = b.root();
        b.inner("t", TypeDb::BIT);
        let t = b.name("t", TypeDb::BIT);
        b.connect(root, t, a.clone());
        let blk = b.behavior(root, BehaviorKind::Par, vec![], Mode::Par);
        let y = b.name("y", TypeDb::BIT);
        let t_read = b.read("t", TypeDb::BIT);
        b.push(
            blk,
            Statement::If {
                condition: a,
                then_body: vec![Statement::transmit(y, t_read)],
                else_body: vec![],
            },
        );
        design
    }

    #[test]
    fn rewrite_refs_reports_access() {
        let interner = Interner::new();
        let mut design = design_with_logic(&interner);
        let top = design.top;
        let mut seen = Vec::new();
        rewrite_refs(&mut design.modules[top], |_, _, access, r| {
            if let Some(name) = r.ident() {
                seen.push((interner.resolve(name).to_string(), access));
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                ("t".to_string(), Access::Write),
                ("a".to_string(), Access::Read),
                ("a".to_string(), Access::Read),
                ("y".to_string(), Access::Write),
                ("t".to_string(), Access::Read),
            ]
        );
    }

    #[test]
    fn rewrite_refs_puts_code_back() {
        let interner = Interner::new();
        let mut design = design_with_logic(&interner);
        let top = design.top;
        let before = design.modules[top].clone();
        let renamed = interner.get_or_intern("renamed");
        rewrite_refs(&mut design.modules[top], |_, _, access, r| {
            if access == Access::Write {
                if let Ref::Name { name, .. } = r {
                    *name = renamed;
                }
            }
            Ok(())
        })
        .unwrap();
        let m = &design.modules[top];
        assert_eq!(m.scopes[m.scope].connections.len(), 1);
        assert_eq!(m.scopes[m.scope].connections[0].left.ident(), Some(renamed));
        assert_ne!(*m, before);
    }

    #[test]
    fn read_walker_matches_rewrite_order() {
        let interner = Interner::new();
        let mut design = design_with_logic(&interner);
        let top = design.top;
        let mut read_order = Vec::new();
        read::for_each_ref(&design.modules[top], |place, access, r| {
            read_order.push((place, access, r.clone()));
        });
        let mut rewrite_order = Vec::new();
        rewrite_refs(&mut design.modules[top], |_, place, access, r| {
            rewrite_order.push((place, access, r.clone()));
            Ok(())
        })
        .unwrap();
        assert_eq!(read_order, rewrite_order);
    }

    #[test]
    fn rewrite_exprs_is_innermost_first() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        b.input("a", TypeDb::BIT);
        b.output("y", TypeDb::BIT);
        let root = b.root();
        let sum = Expr::binary(
            BinaryOp::Add,
            b.read("a", TypeDb::BIT),
            Expr::int(1, TypeDb::BIT),
            TypeDb::BIT,
        );
        let y = b.name("y", TypeDb::BIT);
        b.connect(root, y, sum);
        let top = b.id();
        let mut kinds = Vec::new();
        rewrite_exprs(&mut design.modules[top], |_, _, e| {
            kinds.push(match e {
                Expr::Ref(_) => "ref",
                Expr::Value { .. } => "value",
                Expr::Binary { .. } => "binary",
                _ => "other",
            });
            Ok(())
        })
        .unwrap();
        assert_eq!(kinds, vec!["ref", "value", "binary"]);
    }

    #[test]
    fn expand_statements_splices_in_branches() {
        let interner = Interner::new();
        let x = Ref::name(interner.get_or_intern("x"), TypeDb::BIT);
        let mut stmts = vec![Statement::If {
            condition: Expr::int(1, TypeDb::BOOL),
            then_body: vec![Statement::transmit(x.clone(), Expr::int(0, TypeDb::BIT))],
            else_body: vec![],
        }];
        expand_statements(&mut stmts, &mut |stmt| {
            Ok(match stmt {
                Statement::Transmit { .. } => vec![Statement::Nop, stmt],
                other => vec![other],
            })
        })
        .unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].branches()[0].len(), 2);
        assert_eq!(stmts[0].branches()[0][0], Statement::Nop);
    }

    #[test]
    fn block_expansion_can_allocate_sub_blocks() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        b.output("y", TypeDb::BIT);
        let root = b.root();
        let blk = b.behavior(root, BehaviorKind::Par, vec![], Mode::Par);
        let y = b.name("y", TypeDb::BIT);
        b.push(blk, Statement::transmit(y, Expr::int(1, TypeDb::BIT)));

        let top = design.top;
        let module = &mut design.modules[top];
        let blocks = module.live_blocks();
        expand_block_statements(module, &blocks, |m, block, stmt| {
            Ok(m.sequenced(block, vec![Statement::Nop, stmt]).0)
        })
        .unwrap();

        let module = design.top_module();
        let Statement::Block(sub) = module.blocks[blk].stmts[0] else {
            panic!("expected a nested block");
        };
        assert_eq!(module.blocks[sub].stmts.len(), 2);
        assert_eq!(module.live_blocks(), vec![blk, sub]);
    }
}
