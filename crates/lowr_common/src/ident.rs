//! Interned identifiers for IR names.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// A name of any IR declaration: module, signal, instance, block, or type.
///
/// Identifiers are interned strings stored as a `u32` index, so renaming a
/// declaration is a single word write and name comparison is O(1).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Creates an `Ident` from a raw `u32` index.
    ///
    /// Intended for deserialization and tests; names normally come from
    /// [`Interner::get_or_intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    fn try_from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Ident)
    }
}

// SAFETY: `Ident` wraps a `u32` which is always a valid `usize` on 32-bit and
// 64-bit platforms. `try_from_usize` rejects values that don't fit in `u32`.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// String interner shared by the front end and every lowering pass.
///
/// Passes mint qualified names (`parent::child`) and fresh artifact names
/// through it, so the same string always maps to the same [`Ident`].
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns a string, returning its [`Ident`].
    pub fn get_or_intern(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// Returns the identifier of an already interned string, if any.
    pub fn get(&self, s: &str) -> Option<Ident> {
        self.rodeo.get(s)
    }

    /// Resolves an [`Ident`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the `Ident` was not created by this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }

    /// Returns the number of interned strings.
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Returns `true` if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }

    /// Returns every interned string, indexed by its [`Ident`]'s raw value.
    pub fn snapshot(&self) -> Vec<String> {
        (0..self.rodeo.len())
            .filter_map(|i| Ident::try_from_index(i))
            .map(|id| self.rodeo.resolve(&id).to_string())
            .collect()
    }

    /// Rebuilds an interner from a [`snapshot`](Self::snapshot), so every
    /// persisted [`Ident`] resolves to the same string again.
    pub fn from_snapshot(names: &[String]) -> Self {
        let interner = Self::new();
        for name in names {
            interner.get_or_intern(name);
        }
        interner
    }

    /// Interns `prefix<sep>name`, the hierarchical form of a hoisted name.
    pub fn qualify(&self, prefix: Ident, name: Ident, separator: &str) -> Ident {
        let joined = format!(
            "{}{separator}{}",
            self.resolve(prefix),
            self.resolve(name)
        );
        self.get_or_intern(&joined)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
