use rayon::prelude::*;
use crate::level::Hierarchy;
use crate::patch::Patch;
use crate::state::StateKind;




/**
 * Which state kinds an average-down applies to.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantitySelector {
    /// Every state kind present on both levels.
    All,
    Kind(StateKind),
}

impl QuantitySelector {
    fn selects(self, kind: StateKind) -> bool {
        match self {
            QuantitySelector::All => true,
            QuantitySelector::Kind(k) => k == kind,
        }
    }
}




/**
 * Replace the new-time value of every zone of `level` which is covered by
 * `level + 1` with the volume-weighted mean of the fine zones covering it,
 * for the selected state kinds. Running it twice in a row changes nothing
 * the second time. Does nothing on the finest level.
 */
pub fn average_down(hierarchy: &mut Hierarchy, level: usize, selector: QuantitySelector) {
    if level >= hierarchy.finest_level() {
        return;
    }
    let ratio = hierarchy.ref_ratio[level];
    let (coarse, fine) = hierarchy.pair_mut(level);
    let weight = fine.geometry.cell_volume() / coarse.geometry.cell_volume();

    for (kind, state) in coarse.states.iter_mut().filter(|(k, _)| selector.selects(**k)) {
        let fine_patches = match fine.states.get(kind) {
            Some(fine_state) => fine_state.new_data(),
            None => continue,
        };
        state
            .new_data_mut()
            .par_iter_mut()
            .for_each(|patch| restrict_onto(patch, fine_patches, ratio, weight));
    }
}




// ============================================================================
fn restrict_onto(coarse: &mut Patch, fine_patches: &[Patch], ratio: i64, weight: f64) {
    let nf = coarse.num_fields();
    let mut sum = vec![0.0; nf];

    for fine in fine_patches {
        let overlap = match fine.valid_space().coarsen_by(ratio).intersect(coarse.valid_space()) {
            Some(overlap) => overlap,
            None => continue,
        };
        for index in overlap.iter() {
            sum.iter_mut().for_each(|s| *s = 0.0);

            for child in crate::index_space::range2d(
                index.0 * ratio..(index.0 + 1) * ratio,
                index.1 * ratio..(index.1 + 1) * ratio).iter()
            {
                for (s, u) in sum.iter_mut().zip(fine.get_slice(child)) {
                    *s += u * weight
                }
            }
            coarse.get_slice_mut(index).copy_from_slice(&sum)
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{average_down, QuantitySelector};
    use crate::geometry::Geometry;
    use crate::index_space::range2d;
    use crate::level::{Hierarchy, Level};
    use crate::patch_set::GridPatchSet;
    use crate::state::{StateKind, StateLayout};

    fn two_level() -> Hierarchy {
        let g0 = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (8, 8));
        let mut l0 = Level::new(0, g0.clone(), GridPatchSet::new(vec![range2d(0..4, 0..8), range2d(4..8, 0..8)]).unwrap());
        let mut l1 = Level::new(1, g0.refine(2), GridPatchSet::new(vec![range2d(6..10, 4..12)]).unwrap());
        for level in [&mut l0, &mut l1] {
            level.add_state(StateKind::Hydro, 1, 2, 0.0);
            level.add_state(StateKind::PhiGrav, 1, 1, 0.0);
        }
        let mut h = Hierarchy::new(vec![l0, l1], vec![2], StateLayout::new(0)).unwrap();

        for patch in h.level_mut(1).state_mut(StateKind::Hydro).new_data_mut() {
            let space = patch.index_space();
            for index in space.iter() {
                patch.set(index, 0, (index.0 * 3 + index.1) as f64);
                patch.set(index, 1, 1.0);
            }
        }
        h
    }

    #[test]
    fn covered_zones_take_the_mean_of_their_children() {
        let mut h = two_level();
        average_down(&mut h, 0, QuantitySelector::Kind(StateKind::Hydro));
        let coarse = h.level(0).state(StateKind::Hydro).new_data();

        // children of (3, 2) are (6..8, 4..6): 22, 23, 25, 26
        assert_eq!(coarse[0].get((3, 2), 0), 24.0);
        assert_eq!(coarse[1].get((4, 5), 1), 1.0);
        assert_eq!(coarse[0].get((2, 2), 0), 0.0);
    }

    #[test]
    fn average_down_is_idempotent() {
        let mut h = two_level();
        average_down(&mut h, 0, QuantitySelector::All);
        let once = h.level(0).states.clone();
        average_down(&mut h, 0, QuantitySelector::All);
        assert_eq!(h.level(0).states, once);
    }

    #[test]
    fn selector_leaves_other_kinds_alone() {
        let mut h = two_level();
        h.level_mut(1).state_mut(StateKind::PhiGrav).new_data_mut()[0].fill(7.0);
        average_down(&mut h, 0, QuantitySelector::Kind(StateKind::Hydro));
        assert_eq!(h.level(0).state(StateKind::PhiGrav).new_data()[1].get((4, 3), 0), 0.0);
        average_down(&mut h, 0, QuantitySelector::All);
        assert_eq!(h.level(0).state(StateKind::PhiGrav).new_data()[1].get((4, 3), 0), 7.0);
    }
}
