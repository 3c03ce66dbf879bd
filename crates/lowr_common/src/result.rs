//! The error taxonomy of the lowering pipeline.

/// The standard result type of resolution queries and lowering passes.
pub type LowerResult<T> = Result<T, LowerError>;

/// A fatal lowering failure.
///
/// Both variants abort the pipeline: the pass that raised them is the last
/// one to run and the partially lowered design must not reach a generator.
/// Recoverable findings (such as structurally ambiguous connections) are
/// reported as diagnostics instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    /// A name reference could not be traced to any declaration.
    #[error("unresolved reference `{name}` in module `{module}`")]
    UnresolvedReference {
        /// The module whose body holds the reference.
        module: String,
        /// The reference as written (`a.b.c`).
        name: String,
    },
    /// A pass met a node kind it has no rule for.
    ///
    /// This points at a pipeline-ordering bug, not at malformed input.
    #[error("unsupported construct in {pass}: {what}")]
    UnsupportedConstruct {
        /// The pass that rejected the node.
        pass: &'static str,
        /// Description of the offending node.
        what: String,
    },
}

impl LowerError {
    /// Creates an [`UnsupportedConstruct`](LowerError::UnsupportedConstruct) error.
    pub fn unsupported(pass: &'static str, what: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            pass,
            what: what.into(),
        }
    }
}
