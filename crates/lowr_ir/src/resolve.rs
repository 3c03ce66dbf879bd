//! Name resolution.
//!
//! [`resolve`] answers which declaration a [`Ref::Name`] denotes from a given
//! [`Place`]. A qualified name (`a.b`) resolves its base first and looks the
//! trailing name up in the base's namespace; an unqualified one walks the
//! enclosing blocks and scopes outward and finishes with the module's ports.
//! Resolution never mutates the IR and never reads block statement lists, so a
//! pass may resolve references while it holds those lists taken out.

use crate::ids::{BlockId, InstanceId, ModuleId, ScopeId, SignalId, TypeId};
use crate::expr::Ref;
use crate::module::{Block, BlockParent, Module, Place, PortDirection, Scope};
use lowr_common::{Ident, Interner, LowerError, LowerResult};
use std::collections::HashMap;

/// The declaration a name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decl {
    /// A signal of the current module (port, inner, variable or sub-signal).
    Signal(SignalId),
    /// An instance declared in the current module.
    Instance(InstanceId),
    /// A named block.
    Block(BlockId),
    /// A named sub-scope.
    Scope(ScopeId),
    /// A port of a sub-instance; `signal` lives in the instantiated module.
    Port {
        /// The instance whose port is referenced.
        instance: InstanceId,
        /// The port signal inside the instantiated module.
        signal: SignalId,
    },
}

/// A port as seen from outside its module.
#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    /// Port name.
    pub name: Ident,
    /// Port signal inside its module.
    pub signal: SignalId,
    /// Port direction.
    pub direction: PortDirection,
    /// Port type.
    pub ty: TypeId,
}

/// The externally visible part of a module definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    /// Module name.
    pub name: Ident,
    /// Ports in declaration order, inputs first.
    pub ports: Vec<PortInfo>,
}

impl Interface {
    /// Returns the port named `name`.
    pub fn port(&self, name: Ident) -> Option<&PortInfo> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Returns the port backed by `signal`.
    pub fn port_by_signal(&self, signal: SignalId) -> Option<&PortInfo> {
        self.ports.iter().find(|p| p.signal == signal)
    }
}

/// Interfaces of every module of a design, snapshotted before a pass edits
/// one module so the other definitions need not be borrowed.
pub type Interfaces = HashMap<ModuleId, Interface>;

/// What resolution needs besides the module being resolved in.
#[derive(Clone, Copy)]
pub struct ResolveEnv<'a> {
    /// Interfaces of instantiated modules.
    pub interfaces: &'a Interfaces,
    /// The interner, for error messages.
    pub interner: &'a Interner,
}

impl<'a> ResolveEnv<'a> {
    /// Creates a resolution environment.
    pub fn new(interfaces: &'a Interfaces, interner: &'a Interner) -> Self {
        Self {
            interfaces,
            interner,
        }
    }

    /// Returns the port of `instance` named `name`.
    pub fn instance_port(&self, module: &Module, instance: InstanceId, name: Ident) -> Option<&'a PortInfo> {
        self.interfaces
            .get(&module.instances[instance].module)
            .and_then(|iface| iface.port(name))
    }

    fn unresolved(&self, module: &Module, r: &Ref) -> LowerError {
        LowerError::UnresolvedReference {
            module: self.interner.resolve(module.name).to_string(),
            name: r.display(self.interner),
        }
    }
}

/// A node that owns a namespace.
pub trait Resolvable {
    /// Looks `name` up among the declarations this node owns directly.
    fn lookup(&self, module: &Module, name: Ident) -> Option<Decl>;
}

impl Resolvable for Module {
    fn lookup(&self, module: &Module, name: Ident) -> Option<Decl> {
        self.ports()
            .find(|(s, _)| module.signals[*s].name == name)
            .map(|(s, _)| Decl::Signal(s))
    }
}

impl Resolvable for Scope {
    fn lookup(&self, module: &Module, name: Ident) -> Option<Decl> {
        if let Some(s) = self.inners.iter().find(|s| module.signals[**s].name == name) {
            return Some(Decl::Signal(*s));
        }
        if let Some(i) = self
            .instances
            .iter()
            .find(|i| module.instances[**i].name == name)
        {
            return Some(Decl::Instance(*i));
        }
        if let Some(s) = self
            .scopes
            .iter()
            .find(|s| module.scopes[**s].name == Some(name))
        {
            return Some(Decl::Scope(*s));
        }
        self.behaviors
            .iter()
            .map(|b| module.behaviors[*b].block)
            .find(|b| module.blocks[*b].name == Some(name))
            .map(Decl::Block)
    }
}

impl Resolvable for Block {
    fn lookup(&self, module: &Module, name: Ident) -> Option<Decl> {
        if let Some(s) = self.inners.iter().find(|s| module.signals[**s].name == name) {
            return Some(Decl::Signal(*s));
        }
        module
            .blocks
            .iter()
            .find(|(_, b)| b.parent == BlockParent::Block(self.id) && b.name == Some(name))
            .map(|(id, _)| Decl::Block(id))
    }
}

/// Looks an unqualified name up from `place` outward.
pub fn lookup(module: &Module, place: Place, name: Ident) -> Option<Decl> {
    let mut scope = match place {
        Place::Scope(scope) => scope,
        Place::Block(start) => {
            let mut block = start;
            loop {
                if let Some(decl) = module.blocks[block].lookup(module, name) {
                    return Some(decl);
                }
                match module.blocks[block].parent {
                    BlockParent::Block(parent) => block = parent,
                    BlockParent::Behavior(behavior) => break module.behaviors[behavior].scope,
                }
            }
        }
    };
    loop {
        if let Some(decl) = module.scopes[scope].lookup(module, name) {
            return Some(decl);
        }
        match module.scopes[scope].parent {
            Some(parent) => scope = parent,
            None => return module.lookup(module, name),
        }
    }
}

/// Returns the declaration `r` denotes when seen from `place`.
///
/// `Index` and `Range` references resolve to their base.
pub fn resolve(env: ResolveEnv<'_>, module: &Module, place: Place, r: &Ref) -> LowerResult<Decl> {
    match r {
        Ref::Name {
            base: None, name, ..
        } => lookup(module, place, *name).ok_or_else(|| env.unresolved(module, r)),
        Ref::Name {
            base: Some(base),
            name,
            ..
        } => {
            if matches!(**base, Ref::This) {
                let root = &module.scopes[module.scope];
                return root
                    .lookup(module, *name)
                    .or_else(|| module.lookup(module, *name))
                    .ok_or_else(|| env.unresolved(module, r));
            }
            let found = match resolve(env, module, place, base)? {
                Decl::Signal(s) => module.signals[s]
                    .fields
                    .iter()
                    .find(|f| module.signals[**f].name == *name)
                    .map(|f| Decl::Signal(*f)),
                Decl::Instance(instance) => env
                    .instance_port(module, instance, *name)
                    .map(|port| Decl::Port {
                        instance,
                        signal: port.signal,
                    }),
                Decl::Block(block) => module.blocks[block].lookup(module, *name),
                Decl::Scope(scope) => module.scopes[scope].lookup(module, *name),
                Decl::Port { .. } => None,
            };
            found.ok_or_else(|| env.unresolved(module, r))
        }
        Ref::Index { base, .. } | Ref::Range { base, .. } => resolve(env, module, place, base),
        Ref::This => Err(LowerError::unsupported("resolve", "bare `this` reference")),
        Ref::Concat { .. } => Err(LowerError::unsupported(
            "resolve",
            format!("concatenation `{}`", r.display(env.interner)),
        )),
    }
}

/// Returns the signal `r` denotes, or `None` when it denotes something else.
pub fn resolve_signal(
    env: ResolveEnv<'_>,
    module: &Module,
    place: Place,
    r: &Ref,
) -> LowerResult<Option<SignalId>> {
    Ok(match resolve(env, module, place, r)? {
        Decl::Signal(s) => Some(s),
        _ => None,
    })
}

/// Returns `true` if `r` denotes a port of a sub-instance rather than a
/// declaration of the current module.
pub fn from_instance(env: ResolveEnv<'_>, module: &Module, place: Place, r: &Ref) -> LowerResult<bool> {
    Ok(matches!(resolve(env, module, place, r)?, Decl::Port { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::design::Design;
    use crate::module::{BehaviorKind, Mode};
    use crate::types::TypeDb;

    struct Fixture {
        design: Design,
        interner: Interner,
        top: ModuleId,
    }

    /// `child(i: in, o: out)`; `top` with port `x`, inner `x` shadowing it in
    /// sub-scope `s`, instance `u0` of `child`, and a named block `blk`
    /// holding a local `x`.
    fn fixture() -> Fixture {
        let interner = Interner::new();
        let mut design = Design::new();
        let top = {
            let mut b = ModuleBuilder::new(&mut design, &interner, "top");
            b.input("x", TypeDb::BIT);
            b.id()
        };
        let child = {
            let mut b = ModuleBuilder::new(&mut design, &interner, "child");
            b.input("i", TypeDb::BIT);
            b.output("o", TypeDb::BIT);
            b.id()
        };
        {
            let mut b = ModuleBuilder::edit(&mut design, &interner, top);
            let root = b.root();
            let s = b.scope(root, Some("s"));
            b.inner_in(Place::Scope(s), "x", TypeDb::BIT);
            b.instance(root, "u0", child);
            let blk = b.behavior(root, BehaviorKind::Par, vec![], Mode::Par);
            b.name_block(blk, "blk");
            b.inner_in(Place::Block(blk), "x", TypeDb::BIT);
        }
        Fixture {
            design,
            interner,
            top,
        }
    }

    fn name(f: &Fixture, s: &str) -> Ref {
        Ref::name(f.interner.get_or_intern(s), TypeDb::BIT)
    }

    #[test]
    fn closest_declaration_wins() {
        let f = fixture();
        let ifaces = f.design.interfaces();
        let env = ResolveEnv::new(&ifaces, &f.interner);
        let m = &f.design.modules[f.top];
        let root = m.scope;
        let s = m.scopes[root].scopes[0];
        let blk = m.behaviors[m.scopes[root].behaviors[0]].block;

        let port = m.inputs[0];
        assert_eq!(resolve(env, m, Place::Scope(root), &name(&f, "x")).unwrap(), Decl::Signal(port));
        let scoped = m.scopes[s].inners[0];
        assert_eq!(resolve(env, m, Place::Scope(s), &name(&f, "x")).unwrap(), Decl::Signal(scoped));
        let local = m.blocks[blk].inners[0];
        assert_eq!(resolve(env, m, Place::Block(blk), &name(&f, "x")).unwrap(), Decl::Signal(local));
    }

    #[test]
    fn qualified_names_enter_namespaces() {
        let f = fixture();
        let ifaces = f.design.interfaces();
        let env = ResolveEnv::new(&ifaces, &f.interner);
        let m = &f.design.modules[f.top];
        let root = m.scope;
        let s = m.scopes[root].scopes[0];
        let blk = m.behaviors[m.scopes[root].behaviors[0]].block;

        let sx = Ref::sub(name(&f, "s"), f.interner.get_or_intern("x"), TypeDb::BIT);
        assert_eq!(
            resolve(env, m, Place::Scope(root), &sx).unwrap(),
            Decl::Signal(m.scopes[s].inners[0])
        );
        let bx = Ref::sub(name(&f, "blk"), f.interner.get_or_intern("x"), TypeDb::BIT);
        assert_eq!(
            resolve(env, m, Place::Scope(root), &bx).unwrap(),
            Decl::Signal(m.blocks[blk].inners[0])
        );
        let this_x = Ref::sub(Ref::This, f.interner.get_or_intern("x"), TypeDb::BIT);
        assert_eq!(
            resolve(env, m, Place::Block(blk), &this_x).unwrap(),
            Decl::Signal(m.inputs[0])
        );
    }

    #[test]
    fn instance_ports_resolve_through_interface() {
        let f = fixture();
        let ifaces = f.design.interfaces();
        let env = ResolveEnv::new(&ifaces, &f.interner);
        let m = &f.design.modules[f.top];
        let uo = Ref::sub(name(&f, "u0"), f.interner.get_or_intern("o"), TypeDb::BIT);
        let decl = resolve(env, m, Place::Scope(m.scope), &uo).unwrap();
        assert!(matches!(decl, Decl::Port { .. }));
        assert!(from_instance(env, m, Place::Scope(m.scope), &uo).unwrap());
        assert!(!from_instance(env, m, Place::Scope(m.scope), &name(&f, "x")).unwrap());
    }

    #[test]
    fn slices_resolve_to_base() {
        let f = fixture();
        let ifaces = f.design.interfaces();
        let env = ResolveEnv::new(&ifaces, &f.interner);
        let m = &f.design.modules[f.top];
        let slice = Ref::range(name(&f, "x"), 0, 0, TypeDb::BIT);
        assert_eq!(
            resolve(env, m, Place::Scope(m.scope), &slice).unwrap(),
            Decl::Signal(m.inputs[0])
        );
    }

    #[test]
    fn unknown_name_is_unresolved() {
        let f = fixture();
        let ifaces = f.design.interfaces();
        let env = ResolveEnv::new(&ifaces, &f.interner);
        let m = &f.design.modules[f.top];
        let bad = Ref::sub(name(&f, "u0"), f.interner.get_or_intern("nope"), TypeDb::BIT);
        let err = resolve(env, m, Place::Scope(m.scope), &bad).unwrap_err();
        assert_eq!(
            err,
            LowerError::UnresolvedReference {
                module: "top".to_string(),
                name: "u0.nope".to_string()
            }
        );
    }
}
