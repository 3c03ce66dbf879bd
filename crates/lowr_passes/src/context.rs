//! State shared by every pass of one pipeline run.

use lowr_common::{Ident, Interner};
use lowr_config::NamingConfig;
use lowr_diagnostics::DiagnosticSink;
use lowr_ir::{Expr, Ref, TypeDb};
use std::cell::Cell;

/// The interner, the diagnostic sink and the naming conventions of a
/// pipeline run, together with the counter behind [`fresh`](Self::fresh).
pub struct LoweringContext<'a> {
    /// Interner holding every name of the design.
    pub interner: &'a Interner,
    /// Sink for recoverable findings.
    pub sink: &'a DiagnosticSink,
    separator: String,
    fresh_prefix: String,
    counter: Cell<u32>,
}

impl<'a> LoweringContext<'a> {
    /// Creates a context with the given naming conventions.
    pub fn new(interner: &'a Interner, sink: &'a DiagnosticSink, naming: &NamingConfig) -> Self {
        Self {
            interner,
            sink,
            separator: naming.separator.clone(),
            fresh_prefix: naming.fresh_prefix.clone(),
            counter: Cell::new(0),
        }
    }

    /// Creates a context with the default naming conventions.
    pub fn with_defaults(interner: &'a Interner, sink: &'a DiagnosticSink) -> Self {
        Self::new(interner, sink, &NamingConfig::default())
    }

    /// Returns a name that no declaration of the design uses yet, built as
    /// `{prefix}{hint}_{n}`.
    pub fn fresh(&self, hint: &str) -> Ident {
        loop {
            let n = self.counter.get();
            self.counter.set(n + 1);
            let candidate = format!("{}{hint}_{n}", self.fresh_prefix);
            if self.interner.get(&candidate).is_none() {
                return self.interner.get_or_intern(&candidate);
            }
        }
    }

    /// Returns a fresh name derived from `name`, hierarchy separators
    /// replaced by underscores.
    pub fn fresh_from(&self, name: Ident) -> Ident {
        let hint = self.interner.resolve(name).replace(self.separator.as_str(), "_");
        self.fresh(&hint)
    }

    /// Returns a fresh name derived from the trailing name of `r`.
    pub fn fresh_for(&self, r: &Ref, fallback: &str) -> Ident {
        match r {
            Ref::Name { name, .. } => self.fresh_from(*name),
            Ref::Index { base, .. } | Ref::Range { base, .. } => self.fresh_for(base, fallback),
            Ref::This | Ref::Concat { .. } => self.fresh(fallback),
        }
    }

    /// Interns `owner{separator}name`.
    pub fn qualify(&self, owner: Ident, name: Ident) -> Ident {
        self.interner.qualify(owner, name, &self.separator)
    }

    /// Resolves a name for log and diagnostic messages.
    pub fn text(&self, ident: Ident) -> &str {
        self.interner.resolve(ident)
    }
}

/// A constant bit position or loop bound.
pub(crate) fn position(value: u32) -> Expr {
    Expr::int(i64::from(value), TypeDb::UNSIGNED)
}
