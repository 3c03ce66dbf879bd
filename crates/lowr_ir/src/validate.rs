//! Structural checks of a design.
//!
//! The pipeline driver runs [`check_resolution`] after the passes that rename
//! or move declarations; tests use [`validate_design`] to assert a lowered
//! design is still well formed.

use crate::design::Design;
use crate::ids::{ModuleId, SignalId};
use crate::module::{Module, Place};
use crate::resolve::{resolve, ResolveEnv};
use crate::walk::read;
use lowr_common::{Ident, Interner, LowerError, LowerResult};
use std::collections::HashSet;

/// A well-formedness violation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    /// A reference no longer resolves.
    #[error(transparent)]
    Unresolved(#[from] LowerError),
    /// Two declarations of one scope or block share a name.
    #[error("`{name}` is declared twice in `{container}`")]
    DuplicateName {
        /// IR path of the scope or block.
        container: String,
        /// The duplicated name.
        name: String,
    },
}

/// Checks every module of the design, returning all violations found.
pub fn validate_design(design: &Design, interner: &Interner) -> Vec<Violation> {
    let interfaces = design.interfaces();
    let env = ResolveEnv::new(&interfaces, interner);
    let mut violations = Vec::new();
    for id in design.definition_order() {
        let module = &design.modules[id];
        violations.extend(unresolved_refs(env, module).into_iter().map(Violation::from));
        violations.extend(duplicate_names(module, interner));
    }
    violations
}

/// Fails with the first reference of the given modules that does not resolve.
pub fn check_resolution(design: &Design, modules: &[ModuleId], interner: &Interner) -> LowerResult<()> {
    let interfaces = design.interfaces();
    let env = ResolveEnv::new(&interfaces, interner);
    for id in modules {
        if let Some(err) = unresolved_refs(env, &design.modules[*id]).into_iter().next() {
            return Err(err);
        }
    }
    Ok(())
}

fn unresolved_refs(env: ResolveEnv<'_>, module: &Module) -> Vec<LowerError> {
    let mut errors = Vec::new();
    read::for_each_ref(module, |place, _, r| {
        if r.ident().is_some() {
            if let Err(err) = resolve(env, module, place, r) {
                errors.push(err);
            }
        }
    });
    errors
}

fn duplicate_names(module: &Module, interner: &Interner) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut check = |place: Place, names: Vec<Ident>| {
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                violations.push(Violation::DuplicateName {
                    container: module.path(place, interner),
                    name: interner.resolve(name).to_string(),
                });
            }
        }
    };
    let signal_names = |signals: &[SignalId]| -> Vec<Ident> {
        signals.iter().map(|s| module.signals[*s].name).collect()
    };
    for scope in module.live_scopes() {
        let body = &module.scopes[scope];
        let mut names = signal_names(&body.inners);
        if scope == module.scope {
            let ports: Vec<SignalId> = module.ports().map(|(s, _)| s).collect();
            names.extend(signal_names(&ports));
        }
        names.extend(body.instances.iter().map(|i| module.instances[*i].name));
        names.extend(body.scopes.iter().filter_map(|s| module.scopes[*s].name));
        check(Place::Scope(scope), names);
    }
    for block in module.live_blocks() {
        check(Place::Block(block), signal_names(&module.blocks[block].inners));
    }
    violations
}
