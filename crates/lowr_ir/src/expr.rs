//! Expressions and references.
//!
//! Every node carries its [`TypeId`], so a pass can always read the type of a
//! sub-tree locally. References name a declaration (resolved on demand by
//! [`resolve`](crate::resolve::resolve)) or select bits of one.

use crate::const_value::ConstValue;
use crate::ids::TypeId;
use crate::types::TypeDb;
use lowr_common::{Ident, Interner};
use serde::{Deserialize, Serialize};

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Bitwise NOT (`~`).
    Not,
    /// Arithmetic negation (`-`).
    Neg,
    /// Logical NOT (`!`).
    LogicNot,
    /// Reduction AND.
    RedAnd,
    /// Reduction OR.
    RedOr,
    /// Reduction XOR.
    RedXor,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition (`+`).
    Add,
    /// Subtraction (`-`).
    Sub,
    /// Multiplication (`*`).
    Mul,
    /// Division (`/`).
    Div,
    /// Modulo (`%`).
    Mod,
    /// Exponentiation (`**`).
    Pow,
    /// Bitwise AND (`&`).
    And,
    /// Bitwise OR (`|`).
    Or,
    /// Bitwise XOR (`^`).
    Xor,
    /// Left shift (`<<`).
    Shl,
    /// Right shift (`>>`).
    Shr,
    /// Equality (`==`).
    Eq,
    /// Inequality (`!=`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
    /// Logical AND (`&&`).
    LogicAnd,
    /// Logical OR (`||`).
    LogicOr,
}

impl BinaryOp {
    /// Returns `true` for `==`, `!=`, `<`, `>`, `<=` and `>=`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Returns `true` for `&&` and `||`.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicAnd | BinaryOp::LogicOr)
    }

    /// Returns `true` for `&`, `|` and `^`.
    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    /// Returns `true` for `<<` and `>>`.
    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }
}

/// A reference to a declaration or to bits of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ref {
    /// A hierarchical name: `name` alone, or `base.name`.
    Name {
        /// The reference `name` is looked up in, if any.
        base: Option<Box<Ref>>,
        /// The trailing name.
        name: Ident,
        /// Type of the referenced value.
        ty: TypeId,
    },
    /// The enclosing module itself. Only appears as the base of a `Name`.
    This,
    /// A single element of a vector.
    Index {
        /// The indexed reference.
        base: Box<Ref>,
        /// The element index.
        index: Box<Expr>,
        /// Element type.
        ty: TypeId,
    },
    /// The constant slice `high..low` of a vector.
    Range {
        /// The sliced reference.
        base: Box<Ref>,
        /// Most significant index of the slice.
        high: u32,
        /// Least significant index of the slice.
        low: u32,
        /// Type of the slice.
        ty: TypeId,
    },
    /// A concatenation used as an assignment target, most significant first.
    Concat {
        /// The concatenated references.
        parts: Vec<Ref>,
        /// Type of the whole concatenation.
        ty: TypeId,
    },
}

impl Ref {
    /// Creates an unqualified name reference.
    pub fn name(name: Ident, ty: TypeId) -> Self {
        Ref::Name {
            base: None,
            name,
            ty,
        }
    }

    /// Creates the qualified reference `base.name`.
    pub fn sub(base: Ref, name: Ident, ty: TypeId) -> Self {
        Ref::Name {
            base: Some(Box::new(base)),
            name,
            ty,
        }
    }

    /// Creates the single-element reference `base[index]`.
    pub fn index(base: Ref, index: Expr, ty: TypeId) -> Self {
        Ref::Index {
            base: Box::new(base),
            index: Box::new(index),
            ty,
        }
    }

    /// Creates the slice reference `base[high..low]`.
    pub fn range(base: Ref, high: u32, low: u32, ty: TypeId) -> Self {
        Ref::Range {
            base: Box::new(base),
            high,
            low,
            ty,
        }
    }

    /// Returns the type of the referenced value.
    ///
    /// `This` has no value; it reports [`TypeDb::VOID`].
    pub fn ty(&self) -> TypeId {
        match self {
            Ref::Name { ty, .. }
            | Ref::Index { ty, .. }
            | Ref::Range { ty, .. }
            | Ref::Concat { ty, .. } => *ty,
            Ref::This => TypeDb::VOID,
        }
    }

    /// Replaces the type of the referenced value.
    pub fn set_ty(&mut self, new_ty: TypeId) {
        match self {
            Ref::Name { ty, .. }
            | Ref::Index { ty, .. }
            | Ref::Range { ty, .. }
            | Ref::Concat { ty, .. } => *ty = new_ty,
            Ref::This => {}
        }
    }

    /// Returns the trailing name of a `Name` reference.
    pub fn ident(&self) -> Option<Ident> {
        match self {
            Ref::Name { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Collects every name this reference mentions along its name chains,
    /// through bit selections and concatenation parts.
    pub fn names(&self, out: &mut Vec<Ident>) {
        match self {
            Ref::Name { base, name, .. } => {
                out.push(*name);
                if let Some(base) = base {
                    base.names(out);
                }
            }
            Ref::This => {}
            Ref::Index { base, .. } | Ref::Range { base, .. } => base.names(out),
            Ref::Concat { parts, .. } => parts.iter().for_each(|p| p.names(out)),
        }
    }

    /// Returns whether an index expression of the reference holds a
    /// [`Expr::Select`].
    pub fn contains_select(&self) -> bool {
        match self {
            Ref::Name { base, .. } => base.as_deref().is_some_and(Ref::contains_select),
            Ref::This => false,
            Ref::Index { base, index, .. } => base.contains_select() || index.contains_select(),
            Ref::Range { base, .. } => base.contains_select(),
            Ref::Concat { parts, .. } => parts.iter().any(Ref::contains_select),
        }
    }

    /// Renders the reference as written, for error messages.
    pub fn display(&self, interner: &Interner) -> String {
        match self {
            Ref::Name {
                base: Some(base),
                name,
                ..
            } => format!("{}.{}", base.display(interner), interner.resolve(*name)),
            Ref::Name { base: None, name, .. } => interner.resolve(*name).to_string(),
            Ref::This => "this".to_string(),
            Ref::Index { base, .. } => format!("{}[..]", base.display(interner)),
            Ref::Range {
                base, high, low, ..
            } => format!("{}[{high}..{low}]", base.display(interner)),
            Ref::Concat { parts, .. } => {
                let parts: Vec<String> = parts.iter().map(|p| p.display(interner)).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A literal.
    Value {
        /// The constant.
        value: ConstValue,
        /// The literal's type.
        ty: TypeId,
    },
    /// A read of a reference.
    Ref(Ref),
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
        /// The result type.
        ty: TypeId,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
        /// The result type.
        ty: TypeId,
    },
    /// A multiplexer: choice `i` is taken when `index` equals `i`.
    Select {
        /// The selecting expression.
        index: Box<Expr>,
        /// The choices in index order.
        choices: Vec<Expr>,
        /// The result type.
        ty: TypeId,
    },
    /// A concatenation, most significant part first.
    Concat {
        /// The concatenated values.
        parts: Vec<Expr>,
        /// The result type.
        ty: TypeId,
    },
    /// An explicit conversion.
    Cast {
        /// The target type.
        ty: TypeId,
        /// The converted expression.
        expr: Box<Expr>,
    },
}

impl Expr {
    /// Creates an integer literal.
    pub fn int(value: i64, ty: TypeId) -> Self {
        Expr::Value {
            value: ConstValue::Int(value),
            ty,
        }
    }

    /// Creates a unary operation.
    pub fn unary(op: UnaryOp, operand: Expr, ty: TypeId) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
            ty,
        }
    }

    /// Creates a binary operation.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: TypeId) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            ty,
        }
    }

    /// Creates a multiplexer.
    pub fn select(index: Expr, choices: Vec<Expr>, ty: TypeId) -> Self {
        Expr::Select {
            index: Box::new(index),
            choices,
            ty,
        }
    }

    /// Creates a cast to `ty`.
    pub fn cast(ty: TypeId, expr: Expr) -> Self {
        Expr::Cast {
            ty,
            expr: Box::new(expr),
        }
    }

    /// Returns the expression's type.
    pub fn ty(&self) -> TypeId {
        match self {
            Expr::Value { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Select { ty, .. }
            | Expr::Concat { ty, .. }
            | Expr::Cast { ty, .. } => *ty,
            Expr::Ref(r) => r.ty(),
        }
    }

    /// Replaces the expression's type.
    pub fn set_ty(&mut self, new_ty: TypeId) {
        match self {
            Expr::Value { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Select { ty, .. }
            | Expr::Concat { ty, .. }
            | Expr::Cast { ty, .. } => *ty = new_ty,
            Expr::Ref(r) => r.set_ty(new_ty),
        }
    }

    /// Returns `true` for literals.
    pub fn is_value(&self) -> bool {
        matches!(self, Expr::Value { .. })
    }

    /// Returns `true` if no reference occurs anywhere in the expression.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Value { .. } => true,
            Expr::Ref(_) => false,
            Expr::Unary { operand, .. } => operand.is_constant(),
            Expr::Binary { lhs, rhs, .. } => lhs.is_constant() && rhs.is_constant(),
            Expr::Select { index, choices, .. } => {
                index.is_constant() && choices.iter().all(Expr::is_constant)
            }
            Expr::Concat { parts, .. } => parts.iter().all(Expr::is_constant),
            Expr::Cast { expr, .. } => expr.is_constant(),
        }
    }

    /// Returns `true` if a `Select` occurs anywhere in the expression.
    pub fn contains_select(&self) -> bool {
        match self {
            Expr::Select { .. } => true,
            Expr::Value { .. } => false,
            Expr::Ref(r) => r.contains_select(),
            Expr::Unary { operand, .. } => operand.contains_select(),
            Expr::Binary { lhs, rhs, .. } => lhs.contains_select() || rhs.contains_select(),
            Expr::Concat { parts, .. } => parts.iter().any(Expr::contains_select),
            Expr::Cast { expr, .. } => expr.contains_select(),
        }
    }
}
