//! Unit Orchestrator (component I, §4.I) and the `UnitRegistry`/`Unit`
//! external-collaborator contract it consumes (§6).

use crate::ast::Block;

/// A parsed DWScript unit, as produced by the external unit-file
/// loader/resolver (§1 "Out of scope", §6 "Unit registry").
#[derive(Clone)]
pub struct Unit {
    pub name: String,
    pub uses: Vec<String>,
    pub interface_decls: Vec<crate::ast::Decl>,
    pub implementation_decls: Vec<crate::ast::Decl>,
    pub init_section: Option<Block>,
    pub final_section: Option<Block>,
}

/// External collaborator that resolves, loads, and parses units by name
/// (§6). The orchestrator only calls into this trait; it never reads
/// files itself.
pub trait UnitRegistry {
    fn load_unit(&mut self, name: &str) -> Result<(), String>;
    fn get_unit(&self, name: &str) -> Option<&Unit>;
    /// The registry's own circular-dependency check; `Err` names the
    /// cycle (§4.I: "Registry handles circular-dependency detection").
    fn uses_of(&self, name: &str) -> Result<Vec<String>, String>;
}

/// Tracks load/init/finalization order across the unit graph. Holds no
/// units itself — it only sequences calls into the `UnitRegistry` and the
/// Evaluator's own `import_unit_symbols`/block-evaluation hooks.
#[derive(Default)]
pub struct UnitOrchestrator {
    loaded: Vec<String>,
    initialized: Vec<String>,
    init_order: Vec<String>,
}

impl UnitOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_units(&self) -> &[String] {
        &self.loaded
    }

    pub fn initialized_units(&self) -> &[String] {
        &self.initialized
    }

    pub fn load_unit(&mut self, registry: &mut dyn UnitRegistry, name: &str) -> Result<(), String> {
        if self.loaded.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            return Ok(());
        }
        registry.load_unit(name)?;
        self.loaded.push(name.to_string());
        let uses = registry.uses_of(name)?;
        for dep in uses {
            self.load_unit(registry, &dep)?;
        }
        Ok(())
    }

    /// Kahn's algorithm over the `uses` DAG, ties broken by each unit's
    /// declaration order in its parent's `uses` list (§5's ordering
    /// guarantee; SPEC_FULL.md §I — the registry detects cycles on load,
    /// the orchestrator still needs *some* deterministic total order for
    /// the acyclic remainder).
    pub fn compute_initialization_order(&self, registry: &dyn UnitRegistry) -> Result<Vec<String>, String> {
        let names = self.loaded.clone();
        let mut deps: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
        let mut indegree: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for n in &names {
            indegree.entry(n.clone()).or_insert(0);
        }
        for n in &names {
            let uses = registry.uses_of(n)?;
            for dep in &uses {
                deps.entry(dep.clone()).or_default().push(n.clone());
                *indegree.entry(n.clone()).or_insert(0) += 1;
            }
        }
        let mut ready: Vec<String> = names
            .iter()
            .filter(|n| indegree.get(*n).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();
        // Stable: preserve the original declaration order among ties.
        ready.sort_by_key(|n| names.iter().position(|x| x == n).unwrap_or(usize::MAX));
        let mut order = Vec::new();
        let mut indegree = indegree;
        while !ready.is_empty() {
            ready.sort_by_key(|n| names.iter().position(|x| x == n).unwrap_or(usize::MAX));
            let n = ready.remove(0);
            order.push(n.clone());
            if let Some(dependents) = deps.get(&n) {
                for d in dependents {
                    if let Some(slot) = indegree.get_mut(d) {
                        *slot -= 1;
                        if *slot == 0 {
                            ready.push(d.clone());
                        }
                    }
                }
            }
        }
        if order.len() != names.len() {
            return Err("circular unit dependency detected".to_string());
        }
        Ok(order)
    }

    pub fn mark_initialized(&mut self, name: &str) {
        self.initialized.push(name.to_string());
        self.init_order.push(name.to_string());
    }

    /// Reverse of the initialization sequence (§4.I/§5: "strict LIFO").
    pub fn finalization_order(&self) -> Vec<String> {
        self.init_order.iter().rev().cloned().collect()
    }
}
