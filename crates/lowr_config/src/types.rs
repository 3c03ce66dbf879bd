//! Configuration types deserialized from `lowr.toml`.

use serde::Deserialize;
use std::fmt;

/// The top-level configuration parsed from `lowr.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct LowerConfig {
    /// Backend selection and pass list adjustments.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Naming conventions for hoisted and synthesized declarations.
    #[serde(default)]
    pub naming: NamingConfig,
}

/// The `[pipeline]` section.
#[derive(Debug, Default, Deserialize)]
pub struct PipelineConfig {
    /// The code generator the design is being shaped for.
    #[serde(default)]
    pub backend: Backend,
    /// Passes of the backend list that should not run.
    #[serde(default)]
    pub skip: Vec<Pass>,
    /// A full replacement of the backend's pass list.
    #[serde(default)]
    pub passes: Option<Vec<Pass>>,
}

impl PipelineConfig {
    /// Returns the ordered list of passes to run: the override list (or the
    /// backend default) minus the skipped passes.
    pub fn resolved_passes(&self) -> Vec<Pass> {
        let base = match &self.passes {
            Some(passes) => passes.clone(),
            None => self.backend.default_passes().to_vec(),
        };
        base.into_iter()
            .filter(|pass| !self.skip.contains(pass))
            .collect()
    }
}

/// The `[naming]` section.
#[derive(Debug, Deserialize)]
pub struct NamingConfig {
    /// Separator between a hoisted declaration's owner and its own name.
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Prefix of every name the pipeline synthesizes.
    #[serde(default = "default_fresh_prefix")]
    pub fresh_prefix: String,
}

fn default_separator() -> String {
    "::".to_string()
}

fn default_fresh_prefix() -> String {
    "_".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            fresh_prefix: default_fresh_prefix(),
        }
    }
}

/// A code generation target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Legacy structural VHDL dialects.
    #[default]
    Vhdl,
    /// VHDL'08.
    Vhdl08,
    /// The Alliance VHDL subset.
    Alliance,
    /// Verilog.
    Verilog,
    /// The C simulation kernel.
    C,
}

impl Backend {
    /// Returns the ordered passes this backend requires.
    pub fn default_passes(self) -> &'static [Pass] {
        use Pass::*;
        match self {
            Backend::Vhdl => &[
                OutputReadElim,
                SignalFlatten,
                BooleanTyping,
                BooleanToSelect,
                BitToVector,
                SelectToCase,
                ConcatBreak,
                UpperSpaceHoist,
                ModuleGlobalize,
                TypeBreak,
                PortMaterialize,
                VariableExtract,
                DeadCodeElim,
            ],
            Backend::Vhdl08 | Backend::Alliance => &[
                SignalFlatten,
                BooleanTyping,
                SelectToCase,
                ConcatBreak,
                UpperSpaceHoist,
                ModuleGlobalize,
                TypeBreak,
                PortMaterialize,
                VariableExtract,
                DeadCodeElim,
            ],
            Backend::Verilog => &[
                ConcatBreakCast,
                UpperSpaceHoist,
                ModuleGlobalize,
                ModeHomogenize,
                ConcatToTimed,
                PortMaterialize,
            ],
            Backend::C => &[
                ModeHomogenize,
                ConnectionsToBehaviors,
                ConcatBreak,
                TypeExplicit,
            ],
        }
    }

    /// Returns the configuration name of this backend.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Vhdl => "vhdl",
            Backend::Vhdl08 => "vhdl08",
            Backend::Alliance => "alliance",
            Backend::Verilog => "verilog",
            Backend::C => "c",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One lowering pass, named as in `lowr.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    /// Redirects reads of output ports through shadow signals.
    OutputReadElim,
    /// Expands references to hierarchical signals into concatenations.
    SignalFlatten,
    /// Retypes comparison and boolean-operand logic to `Bool`.
    BooleanTyping,
    /// Wraps boolean values outside conditions into selects.
    BooleanToSelect,
    /// Routes bits used as vectors through 1-bit vector signals.
    BitToVector,
    /// Replaces select expressions by case statements.
    SelectToCase,
    /// Breaks assignments to concatenations.
    ConcatBreak,
    /// Breaks assignments to concatenations, casting each slice.
    ConcatBreakCast,
    /// Hoists sub-scope declarations into the module's root scope.
    UpperSpaceHoist,
    /// Promotes locally defined modules to top-level definitions.
    ModuleGlobalize,
    /// Names every nested composite type.
    TypeBreak,
    /// Replaces references to instance ports by port wires.
    PortMaterialize,
    /// Turns signals written inside sequential blocks into variables.
    VariableExtract,
    /// Removes signals and assignments nothing observes.
    DeadCodeElim,
    /// Makes every block of a process share the process mode.
    ModeHomogenize,
    /// Moves concatenation initializers into a timed process.
    ConcatToTimed,
    /// Turns connections into processes.
    ConnectionsToBehaviors,
    /// Inserts explicit casts so every expression type is local.
    TypeExplicit,
}

impl Pass {
    /// Returns the configuration name of this pass.
    pub fn name(self) -> &'static str {
        match self {
            Pass::OutputReadElim => "output-read-elim",
            Pass::SignalFlatten => "signal-flatten",
            Pass::BooleanTyping => "boolean-typing",
            Pass::BooleanToSelect => "boolean-to-select",
            Pass::BitToVector => "bit-to-vector",
            Pass::SelectToCase => "select-to-case",
            Pass::ConcatBreak => "concat-break",
            Pass::ConcatBreakCast => "concat-break-cast",
            Pass::UpperSpaceHoist => "upper-space-hoist",
            Pass::ModuleGlobalize => "module-globalize",
            Pass::TypeBreak => "type-break",
            Pass::PortMaterialize => "port-materialize",
            Pass::VariableExtract => "variable-extract",
            Pass::DeadCodeElim => "dead-code-elim",
            Pass::ModeHomogenize => "mode-homogenize",
            Pass::ConcatToTimed => "concat-to-timed",
            Pass::ConnectionsToBehaviors => "connections-to-behaviors",
            Pass::TypeExplicit => "type-explicit",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
