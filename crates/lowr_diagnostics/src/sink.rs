//! Diagnostic accumulator shared by the lowering passes.

use crate::code::DiagnosticCode;
use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Ledger {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
}

/// An accumulator for the findings of a lowering run.
///
/// Passes only ever append. The driver takes a [`mark`](Self::mark) before
/// each pass and reads back what that pass emitted with
/// [`emitted_since`](Self::emitted_since). A driver may lower several
/// independent designs concurrently against one sink.
#[derive(Default)]
pub struct DiagnosticSink {
    ledger: Mutex<Ledger>,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        // A poisoned lock only means another emitter panicked mid-push.
        self.ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Emits a diagnostic into the sink.
    pub fn emit(&self, diag: Diagnostic) {
        let mut ledger = self.ledger();
        if diag.severity == Severity::Error {
            ledger.errors += 1;
        }
        ledger.diagnostics.push(diag);
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Returns the number of error-severity diagnostics emitted so far,
    /// including those already taken.
    pub fn error_count(&self) -> usize {
        self.ledger().errors
    }

    /// Returns a position to hand back to [`emitted_since`](Self::emitted_since).
    pub fn mark(&self) -> usize {
        self.ledger().diagnostics.len()
    }

    /// Returns the diagnostics emitted after `mark` was taken.
    ///
    /// Empty if the sink was drained in between.
    pub fn emitted_since(&self, mark: usize) -> Vec<Diagnostic> {
        self.ledger()
            .diagnostics
            .get(mark..)
            .map(<[Diagnostic]>::to_vec)
            .unwrap_or_default()
    }

    /// Counts the held diagnostics carrying `code`.
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.ledger()
            .diagnostics
            .iter()
            .filter(|d| d.code == code)
            .count()
    }

    /// Returns the held diagnostics located at the IR path `path` or below it.
    pub fn located_under(&self, path: &str) -> Vec<Diagnostic> {
        self.ledger()
            .diagnostics
            .iter()
            .filter(|d| {
                d.location.as_deref().is_some_and(|at| {
                    at == path
                        || at
                            .strip_prefix(path)
                            .is_some_and(|rest| rest.starts_with("::"))
                })
            })
            .cloned()
            .collect()
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.ledger().diagnostics)
    }

    /// Returns a snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.ledger().diagnostics.clone()
    }
}
