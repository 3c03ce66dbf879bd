//! A small API for assembling modules by name.
//!
//! The front end produces designs directly; the builder exists for fixtures
//! and for tools that construct test designs without an interner at hand for
//! every name.

use crate::design::Design;
use crate::expr::{Expr, Ref};
use crate::ids::{BlockId, InstanceId, ModuleId, ScopeId, SignalId, TypeId};
use crate::module::{
    BehaviorKind, BlockParent, Connection, Edge, Event, Mode, Place, PortDirection,
};
use crate::stmt::Statement;
use crate::types::TypeDb;
use lowr_common::{Ident, Interner};

/// Builds or extends one module of a design.
pub struct ModuleBuilder<'a> {
    design: &'a mut Design,
    interner: &'a Interner,
    module: ModuleId,
}

impl<'a> ModuleBuilder<'a> {
    /// Adds a new module named `name` and builds it.
    pub fn new(design: &'a mut Design, interner: &'a Interner, name: &str) -> Self {
        let module = design.add_module(interner.get_or_intern(name));
        Self {
            design,
            interner,
            module,
        }
    }

    /// Extends an existing module.
    pub fn edit(design: &'a mut Design, interner: &'a Interner, module: ModuleId) -> Self {
        Self {
            design,
            interner,
            module,
        }
    }

    /// Returns the id of the module being built.
    pub fn id(&self) -> ModuleId {
        self.module
    }

    /// Returns the module's root scope.
    pub fn root(&self) -> ScopeId {
        self.design.modules[self.module].scope
    }

    /// Returns the design's type database.
    pub fn types(&mut self) -> &mut TypeDb {
        &mut self.design.types
    }

    /// Interns `bit[width-1..0]`.
    pub fn bits(&mut self, width: u32) -> TypeId {
        self.design.types.vector(TypeDb::BIT, width)
    }

    fn ident(&self, name: &str) -> Ident {
        self.interner.get_or_intern(name)
    }

    /// Declares an input port.
    pub fn input(&mut self, name: &str, ty: TypeId) -> SignalId {
        self.port(PortDirection::Input, name, ty)
    }

    /// Declares an output port.
    pub fn output(&mut self, name: &str, ty: TypeId) -> SignalId {
        self.port(PortDirection::Output, name, ty)
    }

    /// Declares a bidirectional port.
    pub fn inout(&mut self, name: &str, ty: TypeId) -> SignalId {
        self.port(PortDirection::InOut, name, ty)
    }

    fn port(&mut self, direction: PortDirection, name: &str, ty: TypeId) -> SignalId {
        let name = self.ident(name);
        self.design.modules[self.module].add_port(direction, name, ty)
    }

    /// Declares an inner signal of the root scope.
    pub fn inner(&mut self, name: &str, ty: TypeId) -> SignalId {
        let root = Place::Scope(self.root());
        self.inner_in(root, name, ty)
    }

    /// Declares an inner signal of a scope or block.
    pub fn inner_in(&mut self, place: Place, name: &str, ty: TypeId) -> SignalId {
        let name = self.ident(name);
        self.design.modules[self.module].declare_inner(place, name, ty)
    }

    /// Sets the initial value of a signal.
    pub fn init(&mut self, signal: SignalId, value: Expr) {
        self.design.modules[self.module].signals[signal].init = Some(value);
    }

    /// Declares a sub-signal of a hierarchical signal.
    pub fn field(&mut self, parent: SignalId, name: &str, ty: TypeId) -> SignalId {
        let name = self.ident(name);
        self.design.modules[self.module].add_field(parent, name, ty)
    }

    /// Declares a sub-scope; `None` makes it anonymous.
    pub fn scope(&mut self, parent: ScopeId, name: Option<&str>) -> ScopeId {
        let name = name.map(|n| self.ident(n));
        self.design.modules[self.module].add_scope(parent, name)
    }

    /// Declares an instance of `module`.
    pub fn instance(&mut self, scope: ScopeId, name: &str, module: ModuleId) -> InstanceId {
        let name = self.ident(name);
        self.design.modules[self.module].add_instance(scope, name, module)
    }

    /// Declares `module` as a definition nested in `scope`.
    pub fn define_module(&mut self, scope: ScopeId, module: ModuleId) {
        self.design.modules[self.module].scopes[scope]
            .modules
            .push(module);
    }

    /// Declares a named type alias in `scope`.
    pub fn typedef(&mut self, scope: ScopeId, name: &str, base: TypeId) -> TypeId {
        let name = self.ident(name);
        let def = self.design.types.define(name, base);
        self.design.modules[self.module].scopes[scope]
            .typedefs
            .push(def);
        def
    }

    /// Adds the connection `left <= right` to `scope`.
    pub fn connect(&mut self, scope: ScopeId, left: Ref, right: Expr) {
        self.design.modules[self.module].scopes[scope]
            .connections
            .push(Connection { left, right });
    }

    /// Declares a behavior and returns its top block.
    pub fn behavior(
        &mut self,
        scope: ScopeId,
        kind: BehaviorKind,
        events: Vec<Event>,
        mode: Mode,
    ) -> BlockId {
        let module = &mut self.design.modules[self.module];
        let behavior = module.add_behavior(scope, kind, events, mode);
        module.behaviors[behavior].block
    }

    /// Nests a new block at the end of `parent`.
    pub fn sub_block(&mut self, parent: BlockId, mode: Mode, name: Option<&str>) -> BlockId {
        let block = self.detached_block(parent, mode, name);
        self.push(parent, Statement::Block(block));
        block
    }

    /// Creates a block nested in `parent` without placing it; the caller puts
    /// a [`Statement::Block`] for it into a branch.
    pub fn detached_block(&mut self, parent: BlockId, mode: Mode, name: Option<&str>) -> BlockId {
        let name = name.map(|n| self.ident(n));
        self.design.modules[self.module].new_block(BlockParent::Block(parent), mode, name)
    }

    /// Names a block.
    pub fn name_block(&mut self, block: BlockId, name: &str) {
        let name = self.ident(name);
        self.design.modules[self.module].blocks[block].name = Some(name);
    }

    /// Appends a statement to a block.
    pub fn push(&mut self, block: BlockId, stmt: Statement) {
        self.design.modules[self.module].blocks[block]
            .stmts
            .push(stmt);
    }

    /// Creates the reference `name`.
    pub fn name(&self, name: &str, ty: TypeId) -> Ref {
        Ref::name(self.ident(name), ty)
    }

    /// Creates the reference `base.name`.
    pub fn sub(&self, base: Ref, name: &str, ty: TypeId) -> Ref {
        Ref::sub(base, self.ident(name), ty)
    }

    /// Creates a read of `name`.
    pub fn read(&self, name: &str, ty: TypeId) -> Expr {
        Expr::Ref(self.name(name, ty))
    }

    /// Creates a rising-edge event on `name`.
    pub fn posedge(&self, name: &str) -> Event {
        Event {
            edge: Edge::Posedge,
            signal: self.name(name, TypeDb::BIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::SignalKind;

    #[test]
    fn builds_ports_and_inners() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "counter");
        let byte = b.bits(8);
        b.input("clk", TypeDb::BIT);
        let q = b.output("q", byte);
        let count = b.inner("count", byte);
        let id = b.id();
        let m = &design.modules[id];
        assert_eq!(m.outputs, vec![q]);
        assert_eq!(m.scopes[m.scope].inners, vec![count]);
        assert_eq!(m.signals[count].kind, SignalKind::Inner);
        assert_eq!(design.types.width(byte), 8);
    }

    #[test]
    fn sub_block_is_placed() {
        let interner = Interner::new();
        let mut design = Design::new();
        let mut b = ModuleBuilder::new(&mut design, &interner, "top");
        let root = b.root();
        let clk = b.posedge("clk");
        let top = b.behavior(root, BehaviorKind::Seq, vec![clk], Mode::Par);
        let inner = b.sub_block(top, Mode::Seq, Some("inner"));
        let id = b.id();
        let m = &design.modules[id];
        assert_eq!(m.blocks[top].stmts, vec![Statement::Block(inner)]);
        assert_eq!(m.blocks[inner].parent, BlockParent::Block(top));
        assert!(m.behaviors[m.behavior_of(inner)].is_edge_triggered());
    }
}
