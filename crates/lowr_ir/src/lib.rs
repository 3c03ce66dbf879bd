//! The lowering IR: a hierarchical, fully resolved circuit description.
//!
//! Every [`Module`] definition owns arenas of signals, scopes, blocks,
//! behaviors and instances addressed by stable ids, and all modules share one
//! interned [`TypeDb`]. The [`resolve`] layer answers which declaration a
//! hierarchical name denotes; [`walk`] provides the traversal helpers the
//! lowering passes are written with.

#![warn(missing_docs)]

pub mod arena;
pub mod builder;
pub mod const_value;
pub mod design;
pub mod expr;
pub mod ids;
pub mod module;
pub mod persist;
pub mod resolve;
pub mod stmt;
pub mod types;
pub mod validate;
pub mod walk;

pub use arena::{Arena, ArenaId};
pub use builder::ModuleBuilder;
pub use const_value::ConstValue;
pub use design::Design;
pub use expr::{BinaryOp, Expr, Ref, UnaryOp};
pub use ids::*;
pub use module::{
    Behavior, BehaviorKind, Block, BlockParent, Connection, Edge, Event, Instance, Mode, Module,
    Place, PortDirection, Scope, Signal, SignalKind,
};
pub use resolve::{from_instance, resolve, Decl, Interface, Interfaces, PortInfo, ResolveEnv, Resolvable};
pub use stmt::{CaseArm, Statement};
pub use types::{Type, TypeDb};
