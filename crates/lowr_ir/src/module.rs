//! Module definitions and the nodes they own.
//!
//! A [`Module`] keeps one arena per node family. Scopes, blocks and behaviors
//! refer to each other by id; ownership is expressed by the id lists of the
//! owner, so removing an id from its owner's list deletes the node while every
//! other id stays valid.

use crate::arena::Arena;
use crate::expr::{Expr, Ref};
use crate::ids::{BehaviorId, BlockId, InstanceId, ModuleId, ScopeId, SignalId, TypeId};
use crate::stmt::Statement;
use lowr_common::{Ident, Interner};
use serde::{Deserialize, Serialize};

/// The role of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// An input port.
    Input,
    /// An output port.
    Output,
    /// A bidirectional port.
    InOut,
    /// An inner signal of a scope or block.
    Inner,
    /// A process-local variable with blocking update semantics.
    Variable,
}

/// Direction of a module port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Driven from outside the module.
    Input,
    /// Driven by the module.
    Output,
    /// Driven from either side.
    InOut,
}

/// A named, typed storage or wire declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// This signal's id.
    pub id: SignalId,
    /// The declared name.
    pub name: Ident,
    /// The declared type.
    pub ty: TypeId,
    /// Port direction, inner signal, or variable.
    pub kind: SignalKind,
    /// The initial value, if any.
    pub init: Option<Expr>,
    /// Sub-signals of a hierarchical signal, most significant first.
    pub fields: Vec<SignalId>,
}

/// A use of another module definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// This instance's id.
    pub id: InstanceId,
    /// The instance name.
    pub name: Ident,
    /// The instantiated definition.
    pub module: ModuleId,
}

/// A structural assignment living directly in a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// The driven reference.
    pub left: Ref,
    /// The driving value.
    pub right: Expr,
}

/// The lexical container of declarations, connections and behaviors.
///
/// Names declared within one scope are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// This scope's id.
    pub id: ScopeId,
    /// The scope name; `None` for the root scope and anonymous sub-scopes.
    pub name: Option<Ident>,
    /// The enclosing scope; `None` for the module's root scope.
    pub parent: Option<ScopeId>,
    /// Type definitions ([`Type::Def`](crate::types::Type::Def)) declared here.
    pub typedefs: Vec<TypeId>,
    /// Module definitions declared here.
    pub modules: Vec<ModuleId>,
    /// Inner signals.
    pub inners: Vec<SignalId>,
    /// Instances.
    pub instances: Vec<InstanceId>,
    /// Nested sub-scopes.
    pub scopes: Vec<ScopeId>,
    /// Structural assignments.
    pub connections: Vec<Connection>,
    /// Processes.
    pub behaviors: Vec<BehaviorId>,
}

impl Scope {
    fn new(id: ScopeId, name: Option<Ident>, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            name,
            parent,
            typedefs: Vec::new(),
            modules: Vec::new(),
            inners: Vec::new(),
            instances: Vec::new(),
            scopes: Vec::new(),
            connections: Vec::new(),
            behaviors: Vec::new(),
        }
    }
}

/// How a behavior is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// Combinational: re-evaluated whenever an input changes.
    Par,
    /// Clocked: triggered by its edge events.
    Seq,
    /// Simulation only, driven by delays.
    Timed,
}

/// The concurrency mode of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Statements read pre-block state and commit together (non-blocking).
    Par,
    /// Statements execute in order with visible intermediate state (blocking).
    Seq,
}

/// The kind of change an event waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    /// Rising edge.
    Posedge,
    /// Falling edge.
    Negedge,
    /// Any change.
    Change,
}

/// A behavior trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The awaited change.
    pub edge: Edge,
    /// The watched signal.
    pub signal: Ref,
}

/// A process: trigger events plus one top block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    /// This behavior's id.
    pub id: BehaviorId,
    /// Activation kind.
    pub kind: BehaviorKind,
    /// Trigger events.
    pub events: Vec<Event>,
    /// The scope the behavior is declared in.
    pub scope: ScopeId,
    /// The top block.
    pub block: BlockId,
}

impl Behavior {
    /// Returns `true` if any event waits for a clock edge.
    pub fn is_edge_triggered(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e.edge, Edge::Posedge | Edge::Negedge))
    }
}

/// What a block is nested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockParent {
    /// The top block of a behavior.
    Behavior(BehaviorId),
    /// A block nested in another block.
    Block(BlockId),
}

/// An ordered statement sequence with a concurrency mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// This block's id.
    pub id: BlockId,
    /// Concurrency mode.
    pub mode: Mode,
    /// Optional block name.
    pub name: Option<Ident>,
    /// What the block is nested in.
    pub parent: BlockParent,
    /// Block-local signals and variables.
    pub inners: Vec<SignalId>,
    /// The statements.
    pub stmts: Vec<Statement>,
}

/// A position in a module from which names are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Place {
    /// Directly inside a scope (connections, scope declarations).
    Scope(ScopeId),
    /// Inside a block.
    Block(BlockId),
}

/// A module definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// This module's id.
    pub id: ModuleId,
    /// The module name.
    pub name: Ident,
    /// Input ports in declaration order.
    pub inputs: Vec<SignalId>,
    /// Output ports in declaration order.
    pub outputs: Vec<SignalId>,
    /// Bidirectional ports in declaration order.
    pub inouts: Vec<SignalId>,
    /// The root scope.
    pub scope: ScopeId,
    /// All signals ever declared in the module.
    pub signals: Arena<SignalId, Signal>,
    /// All scopes ever declared in the module.
    pub scopes: Arena<ScopeId, Scope>,
    /// All blocks ever declared in the module.
    pub blocks: Arena<BlockId, Block>,
    /// All behaviors ever declared in the module.
    pub behaviors: Arena<BehaviorId, Behavior>,
    /// All instances ever declared in the module.
    pub instances: Arena<InstanceId, Instance>,
}

impl Module {
    /// Creates an empty module with its root scope.
    pub fn new(id: ModuleId, name: Ident) -> Self {
        let mut scopes = Arena::new();
        let scope = scopes.alloc_with(|id| Scope::new(id, None, None));
        Self {
            id,
            name,
            inputs: Vec::new(),
            outputs: Vec::new(),
            inouts: Vec::new(),
            scope,
            signals: Arena::new(),
            scopes,
            blocks: Arena::new(),
            behaviors: Arena::new(),
            instances: Arena::new(),
        }
    }

    /// Allocates a signal without attaching it to any owner list.
    pub fn new_signal(&mut self, name: Ident, ty: TypeId, kind: SignalKind) -> SignalId {
        self.signals.alloc_with(|id| Signal {
            id,
            name,
            ty,
            kind,
            init: None,
            fields: Vec::new(),
        })
    }

    /// Declares a port.
    pub fn add_port(&mut self, direction: PortDirection, name: Ident, ty: TypeId) -> SignalId {
        let kind = match direction {
            PortDirection::Input => SignalKind::Input,
            PortDirection::Output => SignalKind::Output,
            PortDirection::InOut => SignalKind::InOut,
        };
        let id = self.new_signal(name, ty, kind);
        match direction {
            PortDirection::Input => self.inputs.push(id),
            PortDirection::Output => self.outputs.push(id),
            PortDirection::InOut => self.inouts.push(id),
        }
        id
    }

    /// Declares an inner signal of a scope or block.
    pub fn declare_inner(&mut self, place: Place, name: Ident, ty: TypeId) -> SignalId {
        let id = self.new_signal(name, ty, SignalKind::Inner);
        self.attach_signal(place, id);
        id
    }

    /// Appends an existing signal to the inner list of a scope or block.
    pub fn attach_signal(&mut self, place: Place, id: SignalId) {
        match place {
            Place::Scope(scope) => self.scopes[scope].inners.push(id),
            Place::Block(block) => self.blocks[block].inners.push(id),
        }
    }

    /// Declares a sub-signal of a hierarchical signal.
    pub fn add_field(&mut self, parent: SignalId, name: Ident, ty: TypeId) -> SignalId {
        let kind = self.signals[parent].kind;
        let id = self.new_signal(name, ty, kind);
        self.signals[parent].fields.push(id);
        id
    }

    /// Declares a sub-scope of `parent`.
    pub fn add_scope(&mut self, parent: ScopeId, name: Option<Ident>) -> ScopeId {
        let id = self
            .scopes
            .alloc_with(|id| Scope::new(id, name, Some(parent)));
        self.scopes[parent].scopes.push(id);
        id
    }

    /// Declares an instance of `module` in `scope`.
    pub fn add_instance(&mut self, scope: ScopeId, name: Ident, module: ModuleId) -> InstanceId {
        let id = self
            .instances
            .alloc_with(|id| Instance { id, name, module });
        self.scopes[scope].instances.push(id);
        id
    }

    /// Declares a behavior in `scope` together with its empty top block.
    pub fn add_behavior(
        &mut self,
        scope: ScopeId,
        kind: BehaviorKind,
        events: Vec<Event>,
        mode: Mode,
    ) -> BehaviorId {
        let behavior = self.behaviors.next_id();
        let block = self.new_block(BlockParent::Behavior(behavior), mode, None);
        self.behaviors.alloc(Behavior {
            id: behavior,
            kind,
            events,
            scope,
            block,
        });
        self.scopes[scope].behaviors.push(behavior);
        behavior
    }

    /// Allocates an empty block. A nested block only becomes part of the
    /// module once a [`Statement::Block`] pointing at it is placed.
    pub fn new_block(&mut self, parent: BlockParent, mode: Mode, name: Option<Ident>) -> BlockId {
        self.blocks.alloc_with(|id| Block {
            id,
            mode,
            name,
            parent,
            inners: Vec::new(),
            stmts: Vec::new(),
        })
    }

    /// Places statements that must run in order into `block`. A sequential
    /// block takes them as they are; a parallel block gets a fresh sequential
    /// sub-block holding them. Returns the statements to put in `block` and
    /// the block the sequence ends up in, where its temporaries belong.
    pub fn sequenced(&mut self, block: BlockId, stmts: Vec<Statement>) -> (Vec<Statement>, BlockId) {
        if self.blocks[block].mode == Mode::Seq {
            return (stmts, block);
        }
        let sub = self.new_block(BlockParent::Block(block), Mode::Seq, None);
        let mut children = Vec::new();
        for stmt in &stmts {
            stmt.child_blocks(&mut children);
        }
        for child in children {
            self.blocks[child].parent = BlockParent::Block(sub);
        }
        self.blocks[sub].stmts = stmts;
        (vec![Statement::Block(sub)], sub)
    }

    /// Iterates over all ports with their directions, inputs first.
    pub fn ports(&self) -> impl Iterator<Item = (SignalId, PortDirection)> + '_ {
        self.inputs
            .iter()
            .map(|s| (*s, PortDirection::Input))
            .chain(self.outputs.iter().map(|s| (*s, PortDirection::Output)))
            .chain(self.inouts.iter().map(|s| (*s, PortDirection::InOut)))
    }

    /// Returns the direction of a port, or `None` for non-port signals.
    pub fn port_direction(&self, signal: SignalId) -> Option<PortDirection> {
        self.ports()
            .find(|(s, _)| *s == signal)
            .map(|(_, direction)| direction)
    }

    /// Returns all scopes reachable from the root, parents first.
    pub fn live_scopes(&self) -> Vec<ScopeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.scope];
        while let Some(scope) = stack.pop() {
            out.push(scope);
            stack.extend(self.scopes[scope].scopes.iter().rev());
        }
        out
    }

    /// Returns all behaviors of all live scopes.
    pub fn live_behaviors(&self) -> Vec<BehaviorId> {
        self.live_scopes()
            .into_iter()
            .flat_map(|s| self.scopes[s].behaviors.iter().copied())
            .collect()
    }

    /// Returns all blocks of all live behaviors, each behavior's blocks
    /// parents first.
    pub fn live_blocks(&self) -> Vec<BlockId> {
        self.live_behaviors()
            .into_iter()
            .flat_map(|b| self.behavior_blocks(b))
            .collect()
    }

    /// Returns the top block of a behavior followed by every block nested
    /// in it, parents first.
    pub fn behavior_blocks(&self, behavior: BehaviorId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack = vec![self.behaviors[behavior].block];
        while let Some(block) = stack.pop() {
            out.push(block);
            let mut children = Vec::new();
            for stmt in &self.blocks[block].stmts {
                stmt.child_blocks(&mut children);
            }
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Returns the behavior a block belongs to.
    pub fn behavior_of(&self, mut block: BlockId) -> BehaviorId {
        loop {
            match self.blocks[block].parent {
                BlockParent::Behavior(behavior) => return behavior,
                BlockParent::Block(parent) => block = parent,
            }
        }
    }

    /// Returns the scope a place is lexically inside.
    pub fn scope_of(&self, place: Place) -> ScopeId {
        match place {
            Place::Scope(scope) => scope,
            Place::Block(block) => self.behaviors[self.behavior_of(block)].scope,
        }
    }

    /// Returns the scope or block declaring a signal, searching live owners.
    pub fn owner_of(&self, signal: SignalId) -> Option<Place> {
        if self.ports().any(|(s, _)| s == signal) {
            return Some(Place::Scope(self.scope));
        }
        if let Some(scope) = self
            .live_scopes()
            .into_iter()
            .find(|s| self.scopes[*s].inners.contains(&signal))
        {
            return Some(Place::Scope(scope));
        }
        self.live_blocks()
            .into_iter()
            .find(|b| self.blocks[*b].inners.contains(&signal))
            .map(Place::Block)
    }

    /// Renders the IR path of a place (`top::sub::blk`) for diagnostics.
    pub fn path(&self, place: Place, interner: &Interner) -> String {
        let mut segments = Vec::new();
        let mut scope = match place {
            Place::Scope(scope) => Some(scope),
            Place::Block(block) => {
                let mut cursor = Some(block);
                while let Some(b) = cursor {
                    if let Some(name) = self.blocks[b].name {
                        segments.push(interner.resolve(name).to_string());
                    }
                    cursor = match self.blocks[b].parent {
                        BlockParent::Block(parent) => Some(parent),
                        BlockParent::Behavior(_) => None,
                    };
                }
                Some(self.scope_of(place))
            }
        };
        while let Some(s) = scope {
            if let Some(name) = self.scopes[s].name {
                segments.push(interner.resolve(name).to_string());
            }
            scope = self.scopes[s].parent;
        }
        segments.push(interner.resolve(self.name).to_string());
        segments.reverse();
        segments.join("::")
    }
}
