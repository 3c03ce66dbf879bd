//! Statements of behavior blocks.

use crate::expr::{Expr, Ref};
use crate::ids::BlockId;
use serde::{Deserialize, Serialize};

/// A statement inside a [`Block`](crate::module::Block).
///
/// Branch bodies are plain statement lists that execute in the mode of the
/// block holding the statement; a nested block with its own mode appears as
/// [`Statement::Block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Assigns `right` to `left`.
    Transmit {
        /// The assigned reference.
        left: Ref,
        /// The assigned value.
        right: Expr,
    },
    /// A two-way branch; an empty `else_body` means no else part.
    If {
        /// The tested condition.
        condition: Expr,
        /// Taken when the condition holds.
        then_body: Vec<Statement>,
        /// Taken otherwise.
        else_body: Vec<Statement>,
    },
    /// A multi-way branch on `subject`.
    Case {
        /// The tested value.
        subject: Expr,
        /// The `when` arms in order.
        arms: Vec<CaseArm>,
        /// The statements run when no arm matches.
        default: Option<Vec<Statement>>,
    },
    /// Waits for a delay (simulation only).
    TimeWait {
        /// The delay.
        delay: Expr,
    },
    /// Repeats a body a fixed number of times (simulation only).
    TimeRepeat {
        /// Number of iterations.
        count: i64,
        /// The repeated statements.
        body: Vec<Statement>,
    },
    /// Prints its arguments (simulation only).
    Print {
        /// The printed values.
        args: Vec<Expr>,
    },
    /// A nested block.
    Block(BlockId),
    /// An empty statement standing in for an emptied branch.
    Nop,
}

/// One `when` arm of a [`Statement::Case`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseArm {
    /// The matched value.
    pub value: Expr,
    /// The statements run on a match.
    pub body: Vec<Statement>,
}

impl Statement {
    /// Creates `left <= right`.
    pub fn transmit(left: Ref, right: Expr) -> Self {
        Statement::Transmit { left, right }
    }

    /// Returns the statement lists nested directly in this statement.
    pub fn branches(&self) -> Vec<&Vec<Statement>> {
        match self {
            Statement::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Statement::Case { arms, default, .. } => arms
                .iter()
                .map(|arm| &arm.body)
                .chain(default.iter())
                .collect(),
            Statement::TimeRepeat { body, .. } => vec![body],
            _ => Vec::new(),
        }
    }

    /// Returns the statement lists nested directly in this statement, mutably.
    pub fn branches_mut(&mut self) -> Vec<&mut Vec<Statement>> {
        match self {
            Statement::If {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            Statement::Case { arms, default, .. } => arms
                .iter_mut()
                .map(|arm| &mut arm.body)
                .chain(default.iter_mut())
                .collect(),
            Statement::TimeRepeat { body, .. } => vec![body],
            _ => Vec::new(),
        }
    }

    /// Collects the ids of blocks nested in this statement, through branches
    /// but not through the nested blocks themselves.
    pub fn child_blocks(&self, out: &mut Vec<BlockId>) {
        if let Statement::Block(id) = self {
            out.push(*id);
        }
        for branch in self.branches() {
            for stmt in branch {
                stmt.child_blocks(out);
            }
        }
    }

    /// Returns `true` for statements with no effect: `Nop`, and branches or
    /// loops whose bodies hold only such statements.
    pub fn is_empty(&self) -> bool {
        match self {
            Statement::Nop => true,
            Statement::If { .. } | Statement::Case { .. } | Statement::TimeRepeat { .. } => self
                .branches()
                .iter()
                .all(|branch| branch.iter().all(Statement::is_empty)),
            _ => false,
        }
    }
}
