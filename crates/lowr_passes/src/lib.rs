//! Lowering passes and backend pipelines.
//!
//! Every pass rewrites a [`Design`](lowr_ir::Design) in place and is total
//! over well-formed IR. [`run_pipeline`] applies the ordered pass list of the
//! configured backend, visiting each module definition exactly once per pass
//! however often it is instantiated.

#![warn(missing_docs)]

pub mod boolean;
pub mod codes;
pub mod concat;
pub mod connections;
pub mod context;
pub mod dce;
pub mod explicit;
pub mod globalize;
pub mod hierarchy;
pub mod hoist;
pub mod insulate;
pub mod mode;
pub mod output_read;
pub mod pipeline;
pub mod ports;
pub mod select_case;
pub mod timed_init;
pub mod type_break;
pub mod variables;

pub use context::LoweringContext;
pub use pipeline::{
    design_fingerprint, for_each_module, pass_for, run_passes, run_pipeline, LoweringPass,
    ModuleFingerprint, PassRun, PipelineReport,
};
