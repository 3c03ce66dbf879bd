//! Diagnostic creation, severity management, and terminal rendering.
//!
//! Passes report recoverable findings as structured [`Diagnostic`]s located by
//! their IR path (`top::sub::blk`) rather than by source span: the IR reaching
//! the middle-end has already left its source text behind. The
//! [`DiagnosticSink`] accumulates them for the driver.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
