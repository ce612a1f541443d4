use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::flux_register::FluxRegister;
use crate::geometry::Geometry;
use crate::patch_set::GridPatchSet;
use crate::state::{StateContainer, StateKind, StateLayout};




/**
 * One refinement level: its geometry, its patches, a state container for
 * every state kind it carries, and (on levels above the coarsest) the flux
 * registers linking it to the next coarser level. A level exclusively owns
 * all of these; they are dropped with it.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Level {
    pub level: usize,
    pub geometry: Geometry,
    pub patches: GridPatchSet,
    pub states: BTreeMap<StateKind, StateContainer>,
    pub flux_registers: BTreeMap<StateKind, FluxRegister>,
}




// ============================================================================
impl Level {

    pub fn new(level: usize, geometry: Geometry, patches: GridPatchSet) -> Self {
        Self {
            level,
            geometry,
            patches,
            states: BTreeMap::new(),
            flux_registers: BTreeMap::new(),
        }
    }


    /**
     * Allocate a zero-valued container for the given state kind.
     */
    pub fn add_state(&mut self, kind: StateKind, num_guard: i64, num_fields: usize, time: f64) {
        let container = StateContainer::new(self.patches.boxes(), num_guard, num_fields, time);
        self.states.insert(kind, container);
    }


    pub fn has_state(&self, kind: StateKind) -> bool {
        self.states.contains_key(&kind)
    }


    /**
     * Return the container for a state kind. Panics if the level does not
     * carry that kind.
     */
    pub fn state(&self, kind: StateKind) -> &StateContainer {
        self.states.get(&kind).unwrap_or_else(|| panic!("level {} has no {} state", self.level, kind.name()))
    }


    pub fn state_mut(&mut self, kind: StateKind) -> &mut StateContainer {
        let level = self.level;
        self.states.get_mut(&kind).unwrap_or_else(|| panic!("level {} has no {} state", level, kind.name()))
    }


    pub fn kinds(&self) -> Vec<StateKind> {
        self.states.keys().copied().collect()
    }


    pub fn time(&self) -> f64 {
        self.state(StateKind::Hydro).new_time()
    }


    /**
     * Total of one hydro component over this level's valid zones, times the
     * zone volume, excluding zones covered by the given finer patch set.
     * Patch sums are folded in patch order.
     */
    pub fn volume_sum(&self, component: usize, covered_by: Option<(&GridPatchSet, i64)>) -> f64 {
        self.owned_volume_sum(component, covered_by, None)
    }


    /**
     * Same as [`Level::volume_sum`], restricted to the patches owned by
     * `rank` when one is given.
     */
    pub fn owned_volume_sum(&self, component: usize, covered_by: Option<(&GridPatchSet, i64)>, rank: Option<usize>) -> f64 {
        let footprints = covered_by.map(|(fine, ratio)| fine.coarsened(ratio)).unwrap_or_default();
        let volume = self.geometry.cell_volume();

        self.state(StateKind::Hydro)
            .new_data()
            .iter()
            .enumerate()
            .filter(|(n, _)| rank.map_or(true, |rank| self.patches.is_local(*n, rank)))
            .map(|(_, patch)| patch
                .iter_valid()
                .filter(|(index, _)| !footprints.iter().any(|b| b.contains(*index)))
                .map(|(_, u)| u[component])
                .sum::<f64>())
            .sum::<f64>() * volume
    }
}




/**
 * The stack of refinement levels, coarsest first, together with the
 * refinement ratio between each level and the next finer one.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hierarchy {
    pub levels: Vec<Level>,
    pub ref_ratio: Vec<i64>,
    pub layout: StateLayout,
}




// ============================================================================
impl Hierarchy {

    /**
     * Create a hierarchy from its levels. The ratios must have one entry
     * per level above the coarsest; fine patches are checked for alignment
     * and nesting, and flux registers are built for every conserved state
     * kind present on both levels of a pair.
     */
    pub fn new(levels: Vec<Level>, ref_ratio: Vec<i64>, layout: StateLayout) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::Config("hierarchy needs at least one level".to_string()))
        }
        if ref_ratio.len() + 1 != levels.len() {
            return Err(Error::Config(format!(
                "{} levels need {} refinement ratios, got {}", levels.len(), levels.len() - 1, ref_ratio.len())))
        }
        if let Some(r) = ref_ratio.iter().find(|&&r| r < 2) {
            return Err(Error::Config(format!("refinement ratio must be at least 2, got {}", r)))
        }
        for (n, level) in levels.iter().enumerate() {
            if level.level != n {
                return Err(Error::Config(format!("level {} is stored at position {}", level.level, n)))
            }
            if !level.patches.contained_in(&level.geometry.domain) {
                return Err(Error::Config(format!("level {} has patches outside the domain", n)))
            }
            if n > 0 {
                let parent = &levels[n - 1];
                if level.geometry != parent.geometry.refine(ref_ratio[n - 1]) {
                    return Err(Error::Config(format!("level {} geometry is not a refinement of level {}", n, n - 1)))
                }
                level.patches.validate_nesting(&parent.patches, ref_ratio[n - 1])?;
            }
        }

        let mut hierarchy = Self { levels, ref_ratio, layout };
        for n in 1..hierarchy.levels.len() {
            hierarchy.build_flux_registers(n);
        }
        Ok(hierarchy)
    }


    pub fn finest_level(&self) -> usize {
        self.levels.len() - 1
    }


    pub fn level(&self, n: usize) -> &Level {
        &self.levels[n]
    }


    pub fn level_mut(&mut self, n: usize) -> &mut Level {
        &mut self.levels[n]
    }


    /**
     * Return mutable references to level `n` and level `n + 1`.
     */
    pub fn pair_mut(&mut self, n: usize) -> (&mut Level, &mut Level) {
        let (lower, upper) = self.levels.split_at_mut(n + 1);
        (&mut lower[n], &mut upper[0])
    }


    /**
     * Return the number of substeps level `n` takes per step of level
     * `n - 1` (one for the coarsest level).
     */
    pub fn n_cycle(&self, n: usize) -> u64 {
        if n == 0 { 1 } else { self.ref_ratio[n - 1] as u64 }
    }


    /**
     * Return, for every level, the number of its substeps per coarse step:
     * the product of the refinement ratios from level 0 down to it.
     */
    pub fn cycle_counts(&self) -> Vec<u64> {
        let mut counts = Vec::with_capacity(self.levels.len());
        let mut n = 1;
        for level in 0..self.levels.len() {
            n *= self.n_cycle(level);
            counts.push(n);
        }
        counts
    }


    /**
     * Rebuild the flux registers owned by level `n`, linking it to level
     * `n - 1`.
     */
    pub fn build_flux_registers(&mut self, n: usize) {
        assert!(n > 0, "the coarsest level has no flux registers");
        let ratio = self.ref_ratio[n - 1];
        let (coarse, fine) = self.pair_mut(n - 1);

        let registers: BTreeMap<_, _> = fine
            .kinds()
            .into_iter()
            .filter(|kind| kind.is_conserved() && coarse.has_state(*kind))
            .map(|kind| {
                let num_fields = fine.state(kind).num_fields();
                (kind, FluxRegister::new(&coarse.geometry, &coarse.patches, &fine.patches, ratio, num_fields))
            })
            .collect();
        fine.flux_registers = registers;
    }


    /**
     * Total of one hydro component over the composite hierarchy: each
     * level contributes only the zones not covered by a finer level.
     */
    pub fn composite_sum(&self, component: usize) -> f64 {
        self.owned_composite_sum(component, None)
    }


    /**
     * The part of [`Hierarchy::composite_sum`] held by the patches owned by
     * `rank`, or all patches when no rank is given.
     */
    pub fn owned_composite_sum(&self, component: usize, rank: Option<usize>) -> f64 {
        (0..self.levels.len())
            .map(|n| {
                let finer = (n < self.finest_level()).then(|| (&self.levels[n + 1].patches, self.ref_ratio[n]));
                self.levels[n].owned_volume_sum(component, finer, rank)
            })
            .sum()
    }
}
