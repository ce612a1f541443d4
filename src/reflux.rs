use crate::level::Hierarchy;
use crate::state::StateKind;




/**
 * Apply the flux registers owned by `level + 1` to the new-time state of
 * `level`, and zero them. This corrects the coarse zones just outside the
 * fine region, which average-down does not reach, so it must run before
 * averaging down in the same step.
 *
 * Returns the largest register value applied (before division by the zone
 * volume), over all state kinds.
 *
 * Panics if `level` is the finest level, or if the finer level has no flux
 * register for a conserved state kind it shares with `level`: both are
 * errors in the order of synchronization operations.
 */
pub fn reflux(hierarchy: &mut Hierarchy, level: usize) -> f64 {
    assert!(level < hierarchy.finest_level(), "reflux called on the finest level ({})", level);

    let (coarse, fine) = hierarchy.pair_mut(level);
    let mut max_correction: f64 = 0.0;

    let kinds: Vec<StateKind> = fine
        .kinds()
        .into_iter()
        .filter(|k| k.is_conserved() && coarse.has_state(*k))
        .collect();

    for kind in kinds {
        let register = fine
            .flux_registers
            .get_mut(&kind)
            .unwrap_or_else(|| panic!("level {} has no {} flux register", level + 1, kind.name()));

        if let Some(state) = coarse.states.get_mut(&kind) {
            register.apply(state.new_data_mut(), &coarse.geometry);
        }
        max_correction = max_correction.max(register.max_norm());
        register.clear();
    }
    max_correction
}




/**
 * Zero the flux registers owned by `level`, at the start of a coarse step of
 * `level - 1`. Does nothing on the coarsest level.
 */
pub fn clear_flux_registers(hierarchy: &mut Hierarchy, level: usize) {
    if level > 0 && level <= hierarchy.finest_level() {
        for register in hierarchy.level_mut(level).flux_registers.values_mut() {
            register.clear()
        }
    }
}
