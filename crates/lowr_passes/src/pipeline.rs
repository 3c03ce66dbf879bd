//! Pass trait and backend pipeline driver.
//!
//! Provides the [`LoweringPass`] trait every pass implements and the
//! [`run_pipeline`] function that applies a backend's ordered pass list to a
//! design in place.

use crate::context::LoweringContext;
use lowr_common::{ContentHash, Interner, LowerResult};
use lowr_config::{Backend, LowerConfig, Pass};
use lowr_diagnostics::DiagnosticSink;
use lowr_ir::validate::check_resolution;
use lowr_ir::{Design, Interfaces, Module, ModuleId, TypeDb};

/// A single lowering pass.
///
/// Each pass rewrites the design in place. Most passes work on one module
/// definition at a time and implement [`run`](Self::run) with
/// [`for_each_module`].
pub trait LoweringPass {
    /// The pass name as it appears in `lowr.toml`.
    fn name(&self) -> &'static str;

    /// Runs the pass over the whole design.
    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()>;
}

/// Applies `lower` to every module definition exactly once, definitions
/// before the modules that use them.
///
/// The interfaces handed to `lower` are refreshed before each module, so a
/// module sees the port types its sub-modules were lowered to.
pub fn for_each_module<F>(
    design: &mut Design,
    cx: &LoweringContext<'_>,
    pass: &'static str,
    mut lower: F,
) -> LowerResult<()>
where
    F: FnMut(&mut Module, &mut TypeDb, &Interfaces) -> LowerResult<()>,
{
    for id in design.definition_order() {
        let interfaces = design.interfaces();
        let Design { modules, types, .. } = design;
        let module = &mut modules[id];
        tracing::debug!(pass, module = cx.text(module.name), "lowering module");
        lower(module, types, &interfaces)?;
    }
    Ok(())
}

/// Returns the implementation of a configured pass.
pub fn pass_for(pass: Pass) -> Box<dyn LoweringPass> {
    match pass {
        Pass::OutputReadElim => Box::new(crate::output_read::OutputReadPass),
        Pass::SignalFlatten => Box::new(crate::hierarchy::SignalFlattenPass),
        Pass::BooleanTyping => Box::new(crate::boolean::BooleanTypingPass),
        Pass::BooleanToSelect => Box::new(crate::boolean::BooleanToSelectPass),
        Pass::BitToVector => Box::new(crate::insulate::BitToVectorPass),
        Pass::SelectToCase => Box::new(crate::select_case::SelectToCasePass),
        Pass::ConcatBreak => Box::new(crate::concat::ConcatBreakPass { cast: false }),
        Pass::ConcatBreakCast => Box::new(crate::concat::ConcatBreakPass { cast: true }),
        Pass::UpperSpaceHoist => Box::new(crate::hoist::UpperSpaceHoistPass),
        Pass::ModuleGlobalize => Box::new(crate::globalize::ModuleGlobalizePass),
        Pass::TypeBreak => Box::new(crate::type_break::TypeBreakPass),
        Pass::PortMaterialize => Box::new(crate::ports::PortMaterializePass),
        Pass::VariableExtract => Box::new(crate::variables::VariableExtractPass),
        Pass::DeadCodeElim => Box::new(crate::dce::DeadCodePass),
        Pass::ModeHomogenize => Box::new(crate::mode::ModeHomogenizePass),
        Pass::ConcatToTimed => Box::new(crate::timed_init::ConcatToTimedPass),
        Pass::ConnectionsToBehaviors => Box::new(crate::connections::ConnectionsToBehaviorsPass),
        Pass::TypeExplicit => Box::new(crate::explicit::TypeExplicitPass),
    }
}

/// Passes after which every reference must still resolve.
fn renames_declarations(pass: Pass) -> bool {
    matches!(
        pass,
        Pass::UpperSpaceHoist | Pass::ModuleGlobalize | Pass::TypeBreak | Pass::PortMaterialize
    )
}

/// Fingerprints of one module around one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleFingerprint {
    /// The module.
    pub module: ModuleId,
    /// Fingerprint before the pass ran.
    pub before: ContentHash,
    /// Fingerprint after the pass ran.
    pub after: ContentHash,
}

impl ModuleFingerprint {
    /// Returns `true` if the pass rewrote the module.
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// What one pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRun {
    /// The pass.
    pub pass: Pass,
    /// Per-module fingerprints, in definition order.
    pub fingerprints: Vec<ModuleFingerprint>,
    /// Number of diagnostics the pass emitted.
    pub diagnostics: usize,
}

impl PassRun {
    /// Returns the modules the pass rewrote.
    pub fn changed_modules(&self) -> Vec<ModuleId> {
        self.fingerprints
            .iter()
            .filter(|f| f.changed())
            .map(|f| f.module)
            .collect()
    }
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// The backend whose pipeline ran.
    pub backend: Backend,
    /// The module definitions lowered, in definition order.
    pub modules: Vec<ModuleId>,
    /// One entry per pass, in pipeline order.
    pub runs: Vec<PassRun>,
    /// Fingerprint of the lowered design as a whole.
    pub fingerprint: ContentHash,
}

impl PipelineReport {
    /// Returns the passes that ran, in order.
    pub fn passes(&self) -> Vec<Pass> {
        self.runs.iter().map(|r| r.pass).collect()
    }
}

/// Folds the fingerprints of `modules`, in order, into one.
pub fn design_fingerprint(design: &Design, modules: &[ModuleId]) -> ContentHash {
    modules
        .iter()
        .fold(ContentHash::from_bytes(b"lowr"), |acc, &id| {
            acc.combine(design.fingerprint(id))
        })
}

/// Runs the configured backend pipeline over `design` in place.
///
/// The first failing pass stops the pipeline; the design is then partially
/// lowered and must not reach a code generator.
pub fn run_pipeline(
    design: &mut Design,
    config: &LowerConfig,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> LowerResult<PipelineReport> {
    let cx = LoweringContext::new(interner, sink, &config.naming);
    let passes = config.pipeline.resolved_passes();
    let runs = run_passes(design, &passes, &cx)?;
    let modules = design.definition_order();
    Ok(PipelineReport {
        backend: config.pipeline.backend,
        fingerprint: design_fingerprint(design, &modules),
        modules,
        runs,
    })
}

/// Runs an explicit pass list over `design` in place.
pub fn run_passes(
    design: &mut Design,
    passes: &[Pass],
    cx: &LoweringContext<'_>,
) -> LowerResult<Vec<PassRun>> {
    let mut runs = Vec::with_capacity(passes.len());
    for &pass in passes {
        let lowering = pass_for(pass);
        tracing::debug!(pass = lowering.name(), "running pass");
        let before: Vec<(ModuleId, ContentHash)> = design
            .definition_order()
            .into_iter()
            .map(|id| (id, design.fingerprint(id)))
            .collect();
        let mark = cx.sink.mark();

        lowering.run(design, cx)?;

        let emitted = cx.sink.emitted_since(mark);
        for diag in &emitted {
            tracing::debug!(pass = lowering.name(), code = %diag.code, "{}", diag.message);
        }

        if renames_declarations(pass) {
            check_resolution(design, &design.definition_order(), cx.interner)?;
        }
        let fingerprints = before
            .into_iter()
            .map(|(module, before)| ModuleFingerprint {
                module,
                before,
                after: design.fingerprint(module),
            })
            .collect();
        runs.push(PassRun {
            pass,
            fingerprints,
            diagnostics: emitted.len(),
        });
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowr_ir::ModuleBuilder;

    #[test]
    fn every_pass_reports_its_config_name() {
        for backend in [
            Backend::Vhdl,
            Backend::Vhdl08,
            Backend::Alliance,
            Backend::Verilog,
            Backend::C,
        ] {
            for &pass in backend.default_passes() {
                assert_eq!(pass_for(pass).name(), pass.name());
            }
        }
        assert_eq!(pass_for(Pass::ConcatBreakCast).name(), "concat-break-cast");
    }

    #[test]
    fn empty_module_survives_every_backend() {
        for backend in [Backend::Vhdl, Backend::Verilog, Backend::C] {
            let interner = Interner::new();
            let sink = DiagnosticSink::new();
            let mut design = Design::new();
            ModuleBuilder::new(&mut design, &interner, "top");
            let mut config = LowerConfig::default();
            config.pipeline.backend = backend;
            let report = run_pipeline(&mut design, &config, &interner, &sink).unwrap();
            assert_eq!(report.passes(), backend.default_passes().to_vec());
            assert!(report.runs.iter().all(|r| r.changed_modules().is_empty()));
        }
    }

    #[test]
    fn skipped_pass_does_not_run() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        ModuleBuilder::new(&mut design, &interner, "top");
        let mut config = LowerConfig::default();
        config.pipeline.backend = Backend::C;
        config.pipeline.skip = vec![Pass::TypeExplicit];
        let report = run_pipeline(&mut design, &config, &interner, &sink).unwrap();
        assert!(!report.passes().contains(&Pass::TypeExplicit));
        assert_eq!(report.modules, vec![design.top]);
    }

    #[test]
    fn design_fingerprint_follows_every_module() {
        let interner = Interner::new();
        let mut design = Design::new();
        let top = ModuleBuilder::new(&mut design, &interner, "top").id();
        let sub = ModuleBuilder::new(&mut design, &interner, "sub").id();
        let both = design_fingerprint(&design, &[top, sub]);
        assert_ne!(both, design_fingerprint(&design, &[sub, top]));
        assert_ne!(both, design_fingerprint(&design, &[top]));

        ModuleBuilder::edit(&mut design, &interner, sub).inner("t", TypeDb::BIT);
        assert_ne!(both, design_fingerprint(&design, &[top, sub]));
    }

    #[test]
    fn report_fingerprint_is_stable_across_identical_runs() {
        let lower = || {
            let interner = Interner::new();
            let sink = DiagnosticSink::new();
            let mut design = Design::new();
            ModuleBuilder::new(&mut design, &interner, "top");
            run_pipeline(&mut design, &LowerConfig::default(), &interner, &sink)
                .unwrap()
                .fingerprint
        };
        assert_eq!(lower(), lower());
    }
}
