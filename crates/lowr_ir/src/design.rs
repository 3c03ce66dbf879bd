//! Top-level design container.
//!
//! A [`Design`] holds every module definition and the shared type database.
//! Modules form a DAG through instances and nested definitions;
//! [`Design::definition_order`] linearizes it so each definition is visited
//! exactly once however often it is instantiated.

use crate::arena::Arena;
use crate::ids::ModuleId;
use crate::module::Module;
use crate::resolve::{Interface, Interfaces, PortInfo};
use crate::types::TypeDb;
use lowr_common::{ContentHash, Ident};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A complete design handed to the lowering pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    /// All module definitions.
    pub modules: Arena<ModuleId, Module>,
    /// The top module.
    pub top: ModuleId,
    /// Types shared by all modules.
    pub types: TypeDb,
}

impl Default for Design {
    fn default() -> Self {
        Self::new()
    }
}

impl Design {
    /// Creates an empty design. The first module added becomes the top.
    pub fn new() -> Self {
        Self {
            modules: Arena::new(),
            top: ModuleId::from_raw(0),
            types: TypeDb::new(),
        }
    }

    /// Adds an empty module definition.
    pub fn add_module(&mut self, name: Ident) -> ModuleId {
        self.modules.alloc_with(|id| Module::new(id, name))
    }

    /// Returns the top module.
    pub fn top_module(&self) -> &Module {
        &self.modules[self.top]
    }

    /// Returns the number of module definitions.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Returns every module definition exactly once, each after all the
    /// definitions it instantiates or nests.
    ///
    /// The walk starts at the top module; definitions it cannot reach (for
    /// example nested modules already promoted to the top level and never
    /// instantiated) follow in allocation order.
    pub fn definition_order(&self) -> Vec<ModuleId> {
        let mut graph: DiGraph<ModuleId, ()> = DiGraph::new();
        let nodes: HashMap<ModuleId, NodeIndex> = self
            .modules
            .ids()
            .map(|id| (id, graph.add_node(id)))
            .collect();
        for (id, module) in self.modules.iter() {
            for scope in module.live_scopes() {
                let body = &module.scopes[scope];
                let used = body
                    .instances
                    .iter()
                    .map(|i| module.instances[*i].module)
                    .chain(body.modules.iter().copied());
                for target in used {
                    if let Some(&to) = nodes.get(&target) {
                        graph.update_edge(nodes[&id], to, ());
                    }
                }
            }
        }

        let mut order = Vec::with_capacity(self.modules.len());
        let mut seen = HashSet::new();
        let roots = std::iter::once(self.top).chain(self.modules.ids());
        for root in roots {
            let Some(&start) = nodes.get(&root) else {
                continue;
            };
            if seen.contains(&root) {
                continue;
            }
            let mut dfs = DfsPostOrder::new(&graph, start);
            while let Some(node) = dfs.next(&graph) {
                let id = graph[node];
                if seen.insert(id) {
                    order.push(id);
                }
            }
        }
        order
    }

    /// Snapshots the interface of every module.
    pub fn interfaces(&self) -> Interfaces {
        self.modules
            .iter()
            .map(|(id, module)| {
                let ports = module
                    .ports()
                    .map(|(signal, direction)| PortInfo {
                        name: module.signals[signal].name,
                        signal,
                        direction,
                        ty: module.signals[signal].ty,
                    })
                    .collect();
                (
                    id,
                    Interface {
                        name: module.name,
                        ports,
                    },
                )
            })
            .collect()
    }

    /// Fingerprints a module definition over its `Debug` rendering, which
    /// covers every node the module owns.
    pub fn fingerprint(&self, id: ModuleId) -> ContentHash {
        ContentHash::from_bytes(format!("{:?}", self.modules[id]).as_bytes())
    }
}
