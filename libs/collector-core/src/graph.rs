//! Dependency graph over module names and its topological order.
//!
//! Nodes are module names; an edge `a -> b` means "`a` requires `b`". The order is
//! computed with Kahn's algorithm (repeated removal of nodes with no unresolved
//! requirements). Ready nodes are consumed FIFO, seeded in declaration order, so the
//! result is deterministic and every module without requirements precedes every
//! module that has some.

use std::collections::{HashMap, VecDeque};

use crate::error::{CyclicDependencyError, ModuleNotFoundError};

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    /// `requires[i]` = indices of the modules node `i` requires (deduplicated).
    requires: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph from `(module, required modules)` declarations.
    ///
    /// # Errors
    /// Returns `ModuleNotFoundError` for the first required name (in declaration
    /// order) that is not itself declared.
    pub fn build<'a, I, R>(decls: I) -> Result<Self, ModuleNotFoundError>
    where
        I: IntoIterator<Item = (&'a str, R)>,
        R: IntoIterator<Item = &'a str>,
    {
        let decls: Vec<(&str, Vec<&str>)> = decls
            .into_iter()
            .map(|(name, reqs)| (name, reqs.into_iter().collect()))
            .collect();

        let index: HashMap<&str, usize> = decls
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (*name, i))
            .collect();

        let mut requires = Vec::with_capacity(decls.len());
        for (name, reqs) in &decls {
            let mut deps: Vec<usize> = Vec::with_capacity(reqs.len());
            for req in reqs {
                let &dep = index.get(req).ok_or_else(|| ModuleNotFoundError {
                    module: (*req).to_owned(),
                    required_by: Some((*name).to_owned()),
                })?;
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
            requires.push(deps);
        }

        Ok(Self {
            nodes: decls.iter().map(|(n, _)| (*n).to_owned()).collect(),
            requires,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Module names ordered so that every module comes after all modules it requires.
    ///
    /// # Errors
    /// Returns `CyclicDependencyError` if some modules could not be ordered.
    pub fn topological_order(&self) -> Result<Vec<&str>, CyclicDependencyError> {
        let n = self.nodes.len();
        let mut pending: Vec<usize> = self.requires.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, deps) in self.requires.iter().enumerate() {
            for &d in deps {
                dependents[d].push(i);
            }
        }

        let mut ready: VecDeque<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &dependent in &dependents[i] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }

        if order.len() < n {
            return Err(self.find_cycle(&pending));
        }

        Ok(order.into_iter().map(|i| self.nodes[i].as_str()).collect())
    }

    /// Walk unresolved requirement edges from the first unordered node until a node
    /// repeats; the repeated stretch is a cycle.
    fn find_cycle(&self, pending: &[usize]) -> CyclicDependencyError {
        let unresolved = |i: usize| pending[i] > 0;
        let Some(start) = (0..self.nodes.len()).find(|&i| unresolved(i)) else {
            return CyclicDependencyError {
                module: String::new(),
                cycle: Vec::new(),
            };
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            // Every unresolved node has at least one unresolved requirement.
            let Some(&next) = self.requires[current].iter().find(|&&d| unresolved(d)) else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|&i| self.nodes[i].clone()).collect();
                cycle.push(self.nodes[next].clone());
                return CyclicDependencyError {
                    module: self.nodes[next].clone(),
                    cycle,
                };
            }
            path.push(next);
            current = next;
        }

        CyclicDependencyError {
            module: self.nodes[start].clone(),
            cycle: vec![self.nodes[start].clone()],
        }
    }
}
