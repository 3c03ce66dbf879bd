//! Upper-space hoisting.
//!
//! VHDL architectures and Verilog modules have a single flat namespace. While
//! the root scope of a module still has sub-scopes, the first one is emptied
//! into the root: its declarations are renamed `sub::name`, and every
//! reference that resolved to one of them is rewritten to the new name.

use crate::codes::HOIST_COLLISION;
use crate::context::LoweringContext;
use crate::pipeline::LoweringPass;
use lowr_common::{Ident, LowerResult};
use lowr_diagnostics::Diagnostic;
use lowr_ir::resolve::{resolve, Decl, ResolveEnv};
use lowr_ir::walk::rewrite_refs;
use lowr_ir::{Design, Interfaces, Module, ModuleId, Place, Ref, ScopeId, TypeDb};
use std::collections::{HashMap, HashSet};

/// Flattens the scope tree of every module into its root scope.
pub struct UpperSpaceHoistPass;

impl LoweringPass for UpperSpaceHoistPass {
    fn name(&self) -> &'static str {
        "upper-space-hoist"
    }

    // Nested module definitions are renamed too, so this pass needs the whole
    // module arena rather than one module at a time.
    fn run(&self, design: &mut Design, cx: &LoweringContext<'_>) -> LowerResult<()> {
        for id in design.definition_order() {
            let interfaces = design.interfaces();
            let Design { modules, types, .. } = design;
            let module = &mut modules[id];
            tracing::debug!(pass = self.name(), module = cx.text(module.name), "lowering module");
            let nested = hoist_module(module, types, &interfaces, cx)?;
            for (definition, prefix) in nested {
                let name = modules[definition].name;
                modules[definition].name = cx.qualify(prefix, name);
            }
        }
        Ok(())
    }
}

/// Hoists every sub-scope of `module`, returning the nested module
/// definitions that moved with the prefix they must be renamed with.
fn hoist_module(
    module: &mut Module,
    types: &mut TypeDb,
    interfaces: &Interfaces,
    cx: &LoweringContext<'_>,
) -> LowerResult<Vec<(ModuleId, Ident)>> {
    let mut nested = Vec::new();
    while let Some(&sub) = module.scopes[module.scope].scopes.first() {
        let prefix = module.scopes[sub].name.unwrap_or_else(|| cx.fresh("scope"));
        let moved = moved_names(module, sub, prefix, cx);
        tracing::trace!(scope = cx.text(prefix), moved = moved.len(), "hoisting scope");

        let env = ResolveEnv::new(interfaces, cx.interner);
        rewrite_refs(module, |m, place, _, r| {
            rename_chain(env, m, place, r, &moved);
            Ok(())
        })?;

        for (&decl, &name) in &moved {
            match decl {
                Decl::Signal(s) => module.signals[s].name = name,
                Decl::Instance(i) => module.instances[i].name = name,
                Decl::Scope(s) => module.scopes[s].name = Some(name),
                Decl::Block(b) => module.blocks[b].name = Some(name),
                Decl::Port { .. } => {}
            }
        }
        nested.extend(move_up(module, types, sub, prefix, cx));
    }
    Ok(nested)
}

/// Names already taken in the root scope, the hoisted scope itself excluded.
fn root_names(module: &Module, sub: ScopeId) -> HashSet<Ident> {
    let root = &module.scopes[module.scope];
    let mut names: HashSet<Ident> = module.ports().map(|(s, _)| module.signals[s].name).collect();
    names.extend(root.inners.iter().map(|s| module.signals[*s].name));
    names.extend(root.instances.iter().map(|i| module.instances[*i].name));
    names.extend(
        root.scopes
            .iter()
            .filter(|s| **s != sub)
            .filter_map(|s| module.scopes[*s].name),
    );
    names.extend(
        root.behaviors
            .iter()
            .filter_map(|b| module.blocks[module.behaviors[*b].block].name),
    );
    names
}

/// Maps every declaration of `sub` that becomes visible in the root to its
/// hoisted name.
fn moved_names(
    module: &Module,
    sub: ScopeId,
    prefix: Ident,
    cx: &LoweringContext<'_>,
) -> HashMap<Decl, Ident> {
    let body = &module.scopes[sub];
    let mut declared: Vec<(Decl, Ident)> = Vec::new();
    declared.extend(body.inners.iter().map(|s| (Decl::Signal(*s), module.signals[*s].name)));
    declared.extend(
        body.instances
            .iter()
            .map(|i| (Decl::Instance(*i), module.instances[*i].name)),
    );
    declared.extend(
        body.scopes
            .iter()
            .filter_map(|s| module.scopes[*s].name.map(|n| (Decl::Scope(*s), n))),
    );
    declared.extend(body.behaviors.iter().filter_map(|b| {
        let block = module.behaviors[*b].block;
        module.blocks[block].name.map(|n| (Decl::Block(block), n))
    }));

    let mut taken = root_names(module, sub);
    let mut moved = HashMap::with_capacity(declared.len());
    for (decl, name) in declared {
        let mut hoisted = cx.qualify(prefix, name);
        if !taken.insert(hoisted) {
            let fresh = cx.fresh_from(hoisted);
            cx.sink.emit(
                Diagnostic::warning(
                    HOIST_COLLISION,
                    format!("hoisted name `{}` is already declared", cx.text(hoisted)),
                )
                .at(module.path(Place::Scope(sub), cx.interner))
                .with_note(format!("renamed to `{}`", cx.text(fresh))),
            );
            taken.insert(fresh);
            hoisted = fresh;
        }
        moved.insert(decl, hoisted);
    }
    moved
}

/// Rewrites the outermost name of `r` that resolves to a moved declaration.
fn rename_chain(
    env: ResolveEnv<'_>,
    module: &Module,
    place: Place,
    r: &mut Ref,
    moved: &HashMap<Decl, Ident>,
) {
    let Ref::Name { .. } = r else {
        return;
    };
    // Unresolvable references are reported by the resolution check that
    // follows this pass.
    if let Some(&name) = resolve(env, module, place, r).ok().and_then(|d| moved.get(&d)) {
        *r = Ref::name(name, r.ty());
        return;
    }
    if let Ref::Name {
        base: Some(base), ..
    } = r
    {
        rename_chain(env, module, place, base, moved);
    }
}

/// Moves the contents of `sub` into the root scope and unlinks `sub`.
fn move_up(
    module: &mut Module,
    types: &mut TypeDb,
    sub: ScopeId,
    prefix: Ident,
    cx: &LoweringContext<'_>,
) -> Vec<(ModuleId, Ident)> {
    let root = module.scope;
    let body = &mut module.scopes[sub];
    let typedefs = std::mem::take(&mut body.typedefs);
    let modules = std::mem::take(&mut body.modules);
    let inners = std::mem::take(&mut body.inners);
    let instances = std::mem::take(&mut body.instances);
    let scopes = std::mem::take(&mut body.scopes);
    let connections = std::mem::take(&mut body.connections);
    let behaviors = std::mem::take(&mut body.behaviors);

    for &def in &typedefs {
        if let Some(name) = types.def_name(def) {
            types.rename(def, cx.qualify(prefix, name));
        }
    }
    for &scope in &scopes {
        module.scopes[scope].parent = Some(root);
    }
    for &behavior in &behaviors {
        module.behaviors[behavior].scope = root;
    }

    let target = &mut module.scopes[root];
    match target.scopes.iter().position(|s| *s == sub) {
        Some(position) => {
            target.scopes.splice(position..=position, scopes);
        }
        None => target.scopes.extend(scopes),
    }
    target.typedefs.extend(typedefs);
    target.modules.extend(modules.iter().copied());
    target.inners.extend(inners);
    target.instances.extend(instances);
    target.behaviors.extend(behaviors);
    target.connections.extend(connections);

    modules.into_iter().map(|m| (m, prefix)).collect()
}
