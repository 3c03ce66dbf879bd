//! Module globalization.
//!
//! Nested module definitions become top-level ones named `owner::name`.
//! Owners are processed before the definitions they nest, so the prefixes of
//! deeper definitions accumulate.

use crate::context::LoweringContext;
use crate::pipeline::LoweringPass;
use lowr_common::LowerResult;
use lowr_ir::{Design, ModuleId};

/// Promotes nested module definitions to the top level.
pub struct ModuleGlobalizePass;

impl LoweringPass for ModuleGlobalizePass {
    fn name(&self) -> &'static str {
        "module-globalize"
    }

    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for owner in design.definition_order().into_iter().rev() {
            let module = &mut design.modules[owner];
            let owner_name = module.name;
            let mut nested: Vec<ModuleId> = Vec::new();
            for scope in module.live_scopes() {
                nested.append(&mut module.scopes[scope].modules);
            }
            for definition in nested {
                let name = design.modules[definition].name;
                let global = cx.qualify(owner_name, name);
                tracing::trace!(module = cx.text(global), "globalizing definition");
                design.modules[definition].name = global;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowr_common::Interner;
    use lowr_diagnostics::DiagnosticSink;
    use lowr_ir::ModuleBuilder;

    #[test]
    fn nesting_accumulates_in_names() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let top = design.add_module(interner.get_or_intern("top"));
        let mid = design.add_module(interner.get_or_intern("mid"));
        let leaf = design.add_module(interner.get_or_intern("leaf"));
        let mut b = ModuleBuilder::edit(&mut design, &interner, top);
        let root = b.root();
        b.define_module(root, mid);
        let mut b = ModuleBuilder::edit(&mut design, &interner, mid);
        let root = b.root();
        b.define_module(root, leaf);

        let cx = LoweringContext::with_defaults(&interner, &sink);
        ModuleGlobalizePass.run(&mut design, &cx).unwrap();

        let name = |id: ModuleId| interner.resolve(design.modules[id].name).to_string();
        assert_eq!(name(top), "top");
        assert_eq!(name(mid), "top::mid");
        assert_eq!(name(leaf), "top::mid::leaf");
        assert!(design
            .modules
            .iter()
            .all(|(_, m)| m.live_scopes().iter().all(|s| m.scopes[*s].modules.is_empty())));
    }

    #[test]
    fn flat_design_is_untouched() {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let mut design = Design::new();
        let top = design.add_module(interner.get_or_intern("top"));
        let leaf = design.add_module(interner.get_or_intern("leaf"));
        let mut b = ModuleBuilder::edit(&mut design, &interner, top);
        let root = b.root();
        b.instance(root, "u0", leaf);
        let before = design.clone();

        let cx = LoweringContext::with_defaults(&interner, &sink);
        ModuleGlobalizePass.run(&mut design, &cx).unwrap();
        assert_eq!(design, before);
    }
}
