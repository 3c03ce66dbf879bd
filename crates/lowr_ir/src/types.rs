//! Hardware types and the design-wide type database.
//!
//! Structural types are interned, so two signals of type `bit[7..0]` share a
//! [`TypeId`] and type equality is an id comparison. [`Type::Def`] entries are
//! the exception: every definition gets a fresh id so a pass can rename or
//! rebase it in place without touching other users of the same shape.

use crate::ids::TypeId;
use lowr_common::Ident;
use serde::{Deserialize, Serialize};

/// A hardware type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// A single logic bit.
    Bit,
    /// The 1-bit boolean type produced by comparisons and logic on booleans.
    Bool,
    /// A single bit of a two's complement signed number.
    Signed,
    /// A single bit of an unsigned number.
    Unsigned,
    /// A floating-point number.
    Float,
    /// No value: the type of references naming scopes, blocks and instances.
    Void,
    /// A vector of `base` elements indexed `high..low`.
    ///
    /// The base may itself be composite (`bit[7..0][3..0]`).
    Vector {
        /// Element type.
        base: TypeId,
        /// Index of the most significant element.
        high: u32,
        /// Index of the least significant element.
        low: u32,
    },
    /// An ordered heterogeneous aggregate, first element most significant.
    Tuple(Vec<TypeId>),
    /// A named heterogeneous aggregate, first field most significant.
    Struct(Vec<(Ident, TypeId)>),
    /// A named alias.
    Def {
        /// The alias name.
        name: Ident,
        /// The aliased type.
        base: TypeId,
    },
}

impl Type {
    /// Returns `true` for the scalar leaf types.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Type::Bit | Type::Bool | Type::Signed | Type::Unsigned | Type::Float
        )
    }

    /// Returns `true` for vectors, tuples and structs.
    pub fn is_composite(&self) -> bool {
        matches!(self, Type::Vector { .. } | Type::Tuple(_) | Type::Struct(_))
    }
}

/// Central type database shared by every module of a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDb {
    types: Vec<Type>,
}

impl Default for TypeDb {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeDb {
    /// The [`Type::Bit`] leaf.
    pub const BIT: TypeId = TypeId::from_raw(0);
    /// The [`Type::Bool`] leaf.
    pub const BOOL: TypeId = TypeId::from_raw(1);
    /// The [`Type::Signed`] leaf.
    pub const SIGNED: TypeId = TypeId::from_raw(2);
    /// The [`Type::Unsigned`] leaf.
    pub const UNSIGNED: TypeId = TypeId::from_raw(3);
    /// The [`Type::Float`] leaf.
    pub const FLOAT: TypeId = TypeId::from_raw(4);
    /// The [`Type::Void`] type.
    pub const VOID: TypeId = TypeId::from_raw(5);

    /// Creates a database holding the leaf types and `Void` at their fixed ids.
    pub fn new() -> Self {
        Self {
            types: vec![
                Type::Bit,
                Type::Bool,
                Type::Signed,
                Type::Unsigned,
                Type::Float,
                Type::Void,
            ],
        }
    }

    /// Interns a structural type, returning the existing id for an identical
    /// one. A [`Type::Def`] is never deduplicated.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if !matches!(ty, Type::Def { .. }) {
            if let Some(i) = self.types.iter().position(|existing| existing == &ty) {
                return TypeId::from_raw(i as u32);
            }
        }
        let id = TypeId::from_raw(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// Creates a fresh named alias of `base`.
    pub fn define(&mut self, name: Ident, base: TypeId) -> TypeId {
        self.intern(Type::Def { name, base })
    }

    /// Renames a [`Type::Def`] in place. Other types are left untouched.
    pub fn rename(&mut self, id: TypeId, new_name: Ident) {
        if let Type::Def { name, .. } = &mut self.types[id.as_raw() as usize] {
            *name = new_name;
        }
    }

    /// Replaces the aliased type of a [`Type::Def`] in place.
    pub fn redefine(&mut self, id: TypeId, new_base: TypeId) {
        if let Type::Def { base, .. } = &mut self.types[id.as_raw() as usize] {
            *base = new_base;
        }
    }

    /// Interns `base[width-1..0]`.
    pub fn vector(&mut self, base: TypeId, width: u32) -> TypeId {
        self.intern(Type::Vector {
            base,
            high: width.saturating_sub(1),
            low: 0,
        })
    }

    /// Returns the type with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID was not handed out by this database.
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.as_raw() as usize]
    }

    /// Follows [`Type::Def`] aliases down to a structural type.
    pub fn strip(&self, mut id: TypeId) -> TypeId {
        while let Type::Def { base, .. } = self.get(id) {
            id = *base;
        }
        id
    }

    /// Returns the bit width of a type.
    pub fn width(&self, id: TypeId) -> u32 {
        match self.get(id) {
            Type::Bit | Type::Bool | Type::Signed | Type::Unsigned => 1,
            Type::Float => 64,
            Type::Void => 0,
            Type::Vector { base, high, low } => (high.abs_diff(*low) + 1) * self.width(*base),
            Type::Tuple(elems) => elems.iter().map(|t| self.width(*t)).sum(),
            Type::Struct(fields) => fields.iter().map(|(_, t)| self.width(*t)).sum(),
            Type::Def { base, .. } => self.width(*base),
        }
    }

    /// Returns the leaf type a type is ultimately built from; tuples and
    /// structs report their first element's leaf.
    pub fn leaf(&self, id: TypeId) -> TypeId {
        let id = self.strip(id);
        match self.get(id) {
            Type::Vector { base, .. } => self.leaf(*base),
            Type::Tuple(elems) => elems.first().map_or(TypeDb::BIT, |t| self.leaf(*t)),
            Type::Struct(fields) => fields.first().map_or(TypeDb::BIT, |(_, t)| self.leaf(*t)),
            _ => id,
        }
    }

    /// Returns `true` if values of the type are signed numbers.
    pub fn is_signed(&self, id: TypeId) -> bool {
        self.leaf(id) == Self::SIGNED
    }

    /// Returns `true` if values of the type are floating-point numbers.
    pub fn is_float(&self, id: TypeId) -> bool {
        self.leaf(id) == Self::FLOAT
    }

    /// Returns `true` for the boolean leaf (through aliases).
    pub fn is_bool(&self, id: TypeId) -> bool {
        self.strip(id) == Self::BOOL
    }

    /// Returns `true` if the type (through aliases) is a vector.
    pub fn is_vector(&self, id: TypeId) -> bool {
        matches!(self.get(self.strip(id)), Type::Vector { .. })
    }

    /// Returns `true` if the type (through aliases) is a scalar leaf.
    pub fn is_leaf(&self, id: TypeId) -> bool {
        self.get(self.strip(id)).is_leaf()
    }

    /// Returns the name of a [`Type::Def`].
    pub fn def_name(&self, id: TypeId) -> Option<Ident> {
        match self.get(id) {
            Type::Def { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Returns the number of types, leaves included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always `false`: the leaf types are present from construction.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
