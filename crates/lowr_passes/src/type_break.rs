//! Type breaking.
//!
//! VHDL cannot declare anonymous nested array or record types. Every
//! composite element of a vector, tuple or struct type is given a name: a
//! fresh [`Type::Def`] declared in the module's root scope, shared by all
//! uses of the same structure within the module.

use crate::context::LoweringContext;
use crate::pipeline::{for_each_module, LoweringPass};
use lowr_common::LowerResult;
use lowr_ir::walk::{rewrite_exprs, rewrite_refs};
use lowr_ir::{Design, Expr, Module, Type, TypeDb, TypeId};
use std::collections::{HashMap, HashSet};

/// Names the composite elements of every type in use.
pub struct TypeBreakPass;

impl LoweringPass for TypeBreakPass {
    fn name(&self) -> &'static str {
        "type-break"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for_each_module(design, cx, self.name(), |module, types, _| {
            break_module(module, types, cx)
        })
    }
}

struct Breaker<'a, 'cx> {
    types: &'a mut TypeDb,
    cx: &'a LoweringContext<'cx>,
    /// Structural type to the definition naming it.
    memo: HashMap<TypeId, TypeId>,
    broken_defs: HashSet<TypeId>,
    declared: Vec<TypeId>,
}

impl Breaker<'_, '_> {
    /// Returns `ty` with every composite element named.
    fn break_type(&mut self, ty: TypeId) -> TypeId {
        if self.types.def_name(ty).is_some() {
            self.break_def(ty);
            return ty;
        }
        self.shallow(ty)
    }

    /// Rebuilds a composite type over named elements.
    fn shallow(&mut self, ty: TypeId) -> TypeId {
        let rebuilt = match self.types.get(ty).clone() {
            Type::Vector { base, high, low } => Type::Vector {
                base: self.name_composite(base),
                high,
                low,
            },
            Type::Tuple(elems) => {
                Type::Tuple(elems.into_iter().map(|t| self.name_composite(t)).collect())
            }
            Type::Struct(fields) => Type::Struct(
                fields
                    .into_iter()
                    .map(|(name, t)| (name, self.name_composite(t)))
                    .collect(),
            ),
            Type::Def { .. } => {
                self.break_def(ty);
                return ty;
            }
            _ => return ty,
        };
        self.types.intern(rebuilt)
    }

    /// Returns a type usable as an element: a leaf, or a definition.
    fn name_composite(&mut self, ty: TypeId) -> TypeId {
        if self.types.def_name(ty).is_some() {
            self.break_def(ty);
            return ty;
        }
        if self.types.is_leaf(ty) {
            return ty;
        }
        let structural = self.shallow(ty);
        if let Some(&def) = self.memo.get(&structural) {
            return def;
        }
        let name = self.cx.fresh("type");
        let def = self.types.define(name, structural);
        tracing::trace!(ty = self.cx.text(name), "named composite element");
        self.memo.insert(structural, def);
        self.declared.push(def);
        def
    }

    fn break_def(&mut self, def: TypeId) {
        if !self.broken_defs.insert(def) {
            return;
        }
        if let Type::Def { base, .. } = *self.types.get(def) {
            let base = self.break_type(base);
            self.types.redefine(def, base);
        }
    }
}

fn break_module(module: &mut Module, types: &mut TypeDb, cx: &LoweringContext<'_>) -> LowerResult<()> {
    let mut breaker = Breaker {
        types,
        cx,
        memo: HashMap::new(),
        broken_defs: HashSet::new(),
        declared: Vec::new(),
    };
    for scope in module.live_scopes() {
        for def in module.scopes[scope].typedefs.clone() {
            breaker.break_def(def);
        }
    }
    for (_, signal) in module.signals.iter_mut() {
        signal.ty = breaker.break_type(signal.ty);
    }
    rewrite_refs(module, |_, _, _, r| {
        let ty = breaker.break_type(r.ty());
        r.set_ty(ty);
        Ok(())
    })?;
    rewrite_exprs(module, |_, _, e| {
        // A reference's type was already broken above.
        if !matches!(e, Expr::Ref(_)) {
            let ty = breaker.break_type(e.ty());
            e.set_ty(ty);
        }
        Ok(())
    })?;
    let declared = breaker.declared;
    module.scopes[module.scope].typedefs.extend(declared);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowr_common::Interner;
    use lowr_diagnostics::DiagnosticSink;
    use lowr_ir::{ModuleBuilder, Ref};

    #[test]
    fn nested_vectors_share_one_definition() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let byte = b.bits(8);
        let memory = b.types().vector(byte, 4);
        let a = b.input("a", memory);
        let y = b.output("y", memory);
        let root = b.root();
        let left = b.name("y", memory);
        let right = Expr::Ref(Ref::index(b.name("a", memory), Expr::int(0, TypeDb::UNSIGNED), byte));
        b.connect(root, left, right);

        let cx = LoweringContext::with_defaults(&interner, &sink);
        TypeBreakPass.run(&mut design, &cx).unwrap();

        let m = design.top_module();
        assert_eq!(m.scopes[m.scope].typedefs.len(), 1);
        let def = m.scopes[m.scope].typedefs[0];
        assert_eq!(design.types.strip(def), byte);
        let broken = m.signals[a].ty;
        assert_eq!(broken, m.signals[y].ty);
        assert_eq!(
            design.types.get(broken),
            &Type::Vector {
                base: def,
                high: 3,
                low: 0
            }
        );
        let connection = &m.scopes[m.scope].connections[0];
        assert_eq!(connection.left.ty(), broken);
        let Expr::Ref(Ref::Index { base, .. }) = &connection.right else {
            panic!("expected the element read");
        };
        assert_eq!(base.ty(), broken);
        assert_eq!(design.types.width(broken), 32);
    }

    #[test]
    fn definitions_and_tuples_are_broken_in_place() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let nibble = b.bits(4);
        let pair = b.types().intern(Type::Tuple(vec![nibble, TypeDb::BIT]));
        let table = b.types().vector(pair, 2);
        let root = b.root();
        let alias = b.typedef(root, "table_t", table);
        b.inner("t", alias);

        let cx = LoweringContext::with_defaults(&interner, &sink);
        TypeBreakPass.run(&mut design, &cx).unwrap();

        let m = design.top_module();
        let typedefs = &m.scopes[m.scope].typedefs;
        // The alias, the tuple element, and the tuple's vector element.
        assert_eq!(typedefs.len(), 3);
        let Type::Def { base, .. } = design.types.get(alias) else {
            panic!("expected the alias");
        };
        let Type::Vector { base: element, .. } = design.types.get(*base) else {
            panic!("expected a vector");
        };
        assert!(design.types.def_name(*element).is_some());
        let Type::Tuple(parts) = design.types.get(design.types.strip(*element)) else {
            panic!("expected the tuple");
        };
        assert!(design.types.def_name(parts[0]).is_some());
        assert_eq!(parts[1], TypeDb::BIT);
    }

    #[test]
    fn flat_vectors_are_untouched() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let byte = b.bits(8);
        b.input("a", byte);
        let before = design.clone();
        let cx = LoweringContext::with_defaults(&interner, &sink);
        TypeBreakPass.run(&mut design, &cx).unwrap();
        assert_eq!(design, before);
    }
}
