use std::collections::BTreeMap;
use crate::index_space::IndexSpace;
use crate::level::Hierarchy;
use crate::patch::Patch;
use crate::state::{StateKind, StateLayout};




/// A function which fills the guard zones of a patch lying outside the
/// physical domain. Zones inside the domain are not touched.
///
pub type FillFn = fn(&BoundaryFill, &mut Patch, &IndexSpace);




/// A physical boundary condition: the fill function together with the data
/// it needs.
///
#[derive(Clone)]
pub struct BoundaryFill {
    fill: FillFn,
    odd: [Vec<usize>; 2],
    values: Vec<f64>,
}




// ============================================================================
impl BoundaryFill {

    /// Zero-gradient boundary: outside zones copy the nearest zone inside
    /// the domain.
    ///
    pub fn outflow() -> Self {
        Self { fill: fill_outflow, odd: [Vec::new(), Vec::new()], values: Vec::new() }
    }

    /// Mirror boundary: outside zones copy their mirror image across the
    /// boundary, with the listed components (per axis) changing sign.
    ///
    pub fn reflect(odd_i: Vec<usize>, odd_j: Vec<usize>) -> Self {
        Self { fill: fill_reflect, odd: [odd_i, odd_j], values: Vec::new() }
    }

    /// Outside zones are set to fixed values.
    ///
    pub fn constant(values: Vec<f64>) -> Self {
        Self { fill: fill_constant, odd: [Vec::new(), Vec::new()], values }
    }

    pub fn apply(&self, patch: &mut Patch, domain: &IndexSpace) {
        (self.fill)(self, patch, domain)
    }
}




/// Maps each state kind to its physical boundary condition. Kinds with no
/// entry get an outflow boundary.
///
#[derive(Clone, Default)]
pub struct BoundaryRegistry {
    fills: BTreeMap<StateKind, BoundaryFill>,
}




// ============================================================================
impl BoundaryRegistry {

    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with reflecting walls for the hydro state and the
    /// gravitational acceleration, and outflow for everything else.
    ///
    pub fn reflecting() -> Self {
        Self::new()
            .with(StateKind::Hydro, BoundaryFill::reflect(vec![StateLayout::XMOM], vec![StateLayout::YMOM]))
            .with(StateKind::Source, BoundaryFill::reflect(vec![StateLayout::XMOM], vec![StateLayout::YMOM]))
            .with(StateKind::GravVector, BoundaryFill::reflect(vec![0], vec![1]))
    }

    pub fn with(mut self, kind: StateKind, fill: BoundaryFill) -> Self {
        self.fills.insert(kind, fill);
        self
    }

    pub fn get(&self, kind: StateKind) -> BoundaryFill {
        self.fills.get(&kind).cloned().unwrap_or_else(BoundaryFill::outflow)
    }
}




// ============================================================================
fn outside_zones(patch: &Patch, domain: &IndexSpace) -> Vec<(i64, i64)> {
    patch.index_space().iter().filter(|&index| !domain.contains(index)).collect()
}

fn clamp(index: (i64, i64), domain: &IndexSpace) -> (i64, i64) {
    let (i0, j0) = domain.start();
    let (i1, j1) = domain.end();
    (index.0.max(i0).min(i1 - 1), index.1.max(j0).min(j1 - 1))
}

fn mirror(k: i64, start: i64, end: i64) -> (i64, bool) {
    if k < start {
        (2 * start - 1 - k, true)
    } else if k >= end {
        (2 * end - 1 - k, true)
    } else {
        (k, false)
    }
}

fn fill_outflow(_: &BoundaryFill, patch: &mut Patch, domain: &IndexSpace) {
    for index in outside_zones(patch, domain) {
        let source = patch.get_slice(clamp(index, domain)).to_vec();
        patch.get_slice_mut(index).copy_from_slice(&source)
    }
}

fn fill_reflect(bc: &BoundaryFill, patch: &mut Patch, domain: &IndexSpace) {
    let (i0, j0) = domain.start();
    let (i1, j1) = domain.end();

    for index in outside_zones(patch, domain) {
        let (i, flip_i) = mirror(index.0, i0, i1);
        let (j, flip_j) = mirror(index.1, j0, j1);
        let mut values = patch.get_slice(clamp((i, j), domain)).to_vec();

        if flip_i {
            bc.odd[0].iter().for_each(|&n| values[n] = -values[n])
        }
        if flip_j {
            bc.odd[1].iter().for_each(|&n| values[n] = -values[n])
        }
        patch.get_slice_mut(index).copy_from_slice(&values)
    }
}

fn fill_constant(bc: &BoundaryFill, patch: &mut Patch, domain: &IndexSpace) {
    for index in outside_zones(patch, domain) {
        patch.get_slice_mut(index).copy_from_slice(&bc.values)
    }
}




/**
 * Fill the guard zones of every patch of one state kind on one level, at the
 * level's new time. Zones are taken, in order of preference, from another
 * patch on the same level, from the next coarser level (piecewise constant
 * in space, linear in time), and from the physical boundary condition.
 */
pub fn fill_ghost_cells(hierarchy: &mut Hierarchy, level: usize, kind: StateKind, registry: &BoundaryRegistry) {
    let coarse = if level > 0 {
        let time = hierarchy.level(level).state(kind).new_time();
        Some((hierarchy.level(level - 1).state(kind).data_at_time(time), hierarchy.ref_ratio[level - 1]))
    } else {
        None
    };

    let lev = hierarchy.level_mut(level);
    let domain = lev.geometry.domain.clone();
    let neighbors: Vec<Patch> = lev.state(kind).new_data().to_vec();
    let bc = registry.get(kind);

    for (n, patch) in lev.state_mut(kind).new_data_mut().iter_mut().enumerate() {
        let mut filled = vec![patch.valid_space().clone()];

        for (m, other) in neighbors.iter().enumerate() {
            if m != n && other.valid_space().overlaps(&patch.index_space()) {
                patch.copy_from(other, other.valid_space());
                filled.push(other.valid_space().clone());
            }
        }

        if let Some((coarse_patches, ratio)) = &coarse {
            let unfilled: Vec<_> = patch
                .index_space()
                .iter()
                .filter(|&index| domain.contains(index) && !filled.iter().any(|b| b.contains(index)))
                .collect();

            for index in unfilled {
                let parent = (index.0.div_euclid(*ratio), index.1.div_euclid(*ratio));
                let source = coarse_patches
                    .iter()
                    .find(|p| p.valid_space().contains(parent))
                    .or_else(|| coarse_patches.iter().find(|p| p.index_space().contains(parent)));

                if let Some(source) = source {
                    patch.get_slice_mut(index).copy_from_slice(source.get_slice(parent))
                }
            }
        }
        bc.apply(patch, &domain);
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{fill_ghost_cells, BoundaryFill, BoundaryRegistry};
    use crate::geometry::Geometry;
    use crate::index_space::range2d;
    use crate::level::{Hierarchy, Level};
    use crate::patch::Patch;
    use crate::patch_set::GridPatchSet;
    use crate::state::{StateKind, StateLayout};

    #[test]
    fn reflecting_wall_flips_normal_momentum() {
        let domain = range2d(0..4, 0..4);
        let mut patch = Patch::from_slice_function(range2d(0..4, 0..4), 2, 2, |(i, j), u| {
            u[0] = (i * 10 + j) as f64;
            u[1] = 1.0;
        });
        BoundaryFill::reflect(vec![1], vec![]).apply(&mut patch, &domain);
        assert_eq!(patch.get_slice((-1, 2)), &[2.0, -1.0]);
        assert_eq!(patch.get_slice((-2, 2)), &[12.0, -1.0]);
        assert_eq!(patch.get_slice((2, 5)), &[22.0, 1.0]);
    }

    #[test]
    fn outflow_copies_nearest_interior_zone() {
        let domain = range2d(0..4, 0..4);
        let mut patch = Patch::from_slice_function(range2d(0..4, 0..4), 1, 1, |(i, j), u| u[0] = (i * 10 + j) as f64);
        BoundaryFill::outflow().apply(&mut patch, &domain);
        assert_eq!(patch.get((4, 4), 0), 33.0);
        assert_eq!(patch.get((-1, 1), 0), 1.0);
    }

    #[test]
    fn ghost_zones_come_from_neighbors_then_coarse_level() {
        let g0 = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (8, 8));
        let mut l0 = Level::new(0, g0.clone(), GridPatchSet::new(vec![range2d(0..8, 0..8)]).unwrap());
        let mut l1 = Level::new(1, g0.refine(2), GridPatchSet::new(vec![range2d(4..8, 4..12), range2d(8..12, 4..12)]).unwrap());
        l0.add_state(StateKind::Hydro, 1, 1, 0.0);
        l1.add_state(StateKind::Hydro, 1, 1, 0.0);
        let mut h = Hierarchy::new(vec![l0, l1], vec![2], StateLayout::new(0)).unwrap();

        h.level_mut(0).state_mut(StateKind::Hydro).new_data_mut()[0].fill(1.0);
        h.level_mut(1).state_mut(StateKind::Hydro).new_data_mut()[0].fill(2.0);
        h.level_mut(1).state_mut(StateKind::Hydro).new_data_mut()[1].fill(3.0);

        fill_ghost_cells(&mut h, 1, StateKind::Hydro, &BoundaryRegistry::new());
        let fine = h.level(1).state(StateKind::Hydro).new_data();
        assert_eq!(fine[0].get((8, 6), 0), 3.0);
        assert_eq!(fine[0].get((3, 6), 0), 1.0);
        assert_eq!(fine[1].get((7, 6), 0), 2.0);
    }
}
