//! Opaque ID newtypes for all IR entities.
//!
//! Each ID is a thin `u32` wrapper handed out by an [`Arena`](crate::arena::Arena).
//! Except for [`ModuleId`] and [`TypeId`], ids are local to one module.

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub const fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub const fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// A module definition in the design.
    ModuleId
);

define_id!(
    /// A scope (root or nested) within a module.
    ScopeId
);

define_id!(
    /// A statement block within a module.
    BlockId
);

define_id!(
    /// A behavior (process) within a module.
    BehaviorId
);

define_id!(
    /// A signal (port, inner signal, variable, or sub-signal) within a module.
    SignalId
);

define_id!(
    /// An instance of another module within a module.
    InstanceId
);

define_id!(
    /// An interned type in the [`TypeDb`](crate::types::TypeDb).
    TypeId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn const_construction() {
        const ROOT: ScopeId = ScopeId::from_raw(0);
        assert_eq!(ROOT.as_raw(), 0);
    }

    #[test]
    fn ids_hash_by_index() {
        let mut set = HashSet::new();
        set.insert(InstanceId::from_raw(1));
        set.insert(InstanceId::from_raw(2));
        set.insert(InstanceId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ids_order_by_allocation() {
        assert!(BehaviorId::from_raw(3) < BehaviorId::from_raw(4));
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = BlockId::from_raw(99);
        let json = serde_json::to_string(&id).unwrap();
        let restored: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
