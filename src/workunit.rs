//! Handoff of finished work units to the solver.

use hashbrown::HashMap;
use std::collections::BTreeMap;

/// A work unit ready to be instantiated on PE `pe`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    pub chare: usize,
    pub pe: usize,
    /// Element connectivity of the work unit in new node ids, four per
    /// element.
    pub inpoel: Vec<u64>,
    /// New id → old id for every node of the work unit.
    pub new_to_old: HashMap<u64, u64>,
}

impl WorkUnit {
    pub fn nelem(&self) -> usize {
        self.inpoel.len() / crate::mesh::NODES_PER_TET
    }
}

/// Receives what the partitioner creates.
pub trait WorkUnitFactory {
    /// Create the compute object for a finished work unit.
    fn instantiate(&mut self, unit: WorkUnit);
    /// Row range `[lower, upper)` of the linear system PE `pe` assembles.
    fn bounds(&mut self, pe: usize, lower: u64, upper: u64);
}

/// Factory that keeps everything it receives.
#[derive(Debug, Clone, Default)]
pub struct CollectingFactory {
    pub units: Vec<WorkUnit>,
    pub bounds: BTreeMap<usize, (u64, u64)>,
}

impl CollectingFactory {
    /// Work units sorted by chare id.
    pub fn sorted_units(&self) -> Vec<&WorkUnit> {
        let mut v: Vec<_> = self.units.iter().collect();
        v.sort_by_key(|u| u.chare);
        v
    }

    /// Merge the new → old maps of all work units. Returns `None` if two work
    /// units disagree on a node.
    pub fn global_new_to_old(&self) -> Option<BTreeMap<u64, u64>> {
        let mut all = BTreeMap::new();
        for unit in &self.units {
            for (&new, &old) in &unit.new_to_old {
                if *all.entry(new).or_insert(old) != old {
                    return None;
                }
            }
        }
        Some(all)
    }
}

impl WorkUnitFactory for CollectingFactory {
    fn instantiate(&mut self, unit: WorkUnit) {
        self.units.push(unit);
    }

    fn bounds(&mut self, pe: usize, lower: u64, upper: u64) {
        self.bounds.insert(pe, (lower, upper));
    }
}

impl<F: WorkUnitFactory + ?Sized> WorkUnitFactory for &mut F {
    fn instantiate(&mut self, unit: WorkUnit) {
        (**self).instantiate(unit)
    }
    fn bounds(&mut self, pe: usize, lower: u64, upper: u64) {
        (**self).bounds(pe, lower, upper)
    }
}
