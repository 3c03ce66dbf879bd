//! Diagnostic codes the passes emit.

use lowr_diagnostics::{Category, DiagnosticCode};

/// A connection touches no port, so its direction had to be guessed.
pub const AMBIGUOUS_CONNECTION: DiagnosticCode = DiagnosticCode::new(Category::Warning, 302);

/// A hoisted declaration would shadow or duplicate an existing name.
pub const HOIST_COLLISION: DiagnosticCode = DiagnosticCode::new(Category::Warning, 303);

/// Dead-code elimination removed a signal.
pub const REMOVED_SIGNAL: DiagnosticCode = DiagnosticCode::new(Category::Info, 401);
