use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::index_space::Axis;
use crate::level::Level;
use crate::patch::Patch;
use crate::state::{StateKind, StateLayout};




/**
 * Thermodynamic closure relating density, specific internal energy, and
 * temperature.
 */
pub trait EquationOfState: Send + Sync {
    fn temperature(&self, density: f64, specific_internal_energy: f64) -> f64;

    fn specific_internal_energy(&self, density: f64, temperature: f64) -> f64;

    fn pressure(&self, density: f64, specific_internal_energy: f64) -> f64;

    fn sound_speed(&self, density: f64, specific_internal_energy: f64) -> f64;
}




/**
 * Ideal gas with a constant adiabatic index and specific heat.
 */
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GammaLaw {
    pub gamma: f64,
    pub cv: f64,
}

impl EquationOfState for GammaLaw {
    fn temperature(&self, _density: f64, e: f64) -> f64 {
        e / self.cv
    }

    fn specific_internal_energy(&self, _density: f64, temperature: f64) -> f64 {
        self.cv * temperature
    }

    fn pressure(&self, density: f64, e: f64) -> f64 {
        (self.gamma - 1.0) * density * e
    }

    fn sound_speed(&self, density: f64, e: f64) -> f64 {
        (self.gamma * self.pressure(density, e) / density).max(0.0).sqrt()
    }
}




/**
 * Totals added to a level by the density floor, times the zone volume.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MinDensityReport {
    pub zones: usize,
    pub mass_added: f64,
    pub eint_added: f64,
    pub eden_added: f64,
}

impl MinDensityReport {
    fn combine(self, other: Self) -> Self {
        Self {
            zones: self.zones + other.zones,
            mass_added: self.mass_added + other.mass_added,
            eint_added: self.eint_added + other.eint_added,
            eden_added: self.eden_added + other.eden_added,
        }
    }
}




// ============================================================================
/**
 * Fail with the offending component and zone if any valid value of the given
 * state kind on this level is not finite.
 */
pub fn check_for_nan(level: &Level, kind: StateKind, layout: &StateLayout) -> Result<()> {
    for patch in level.state(kind).new_data() {
        if let Some((cell, n)) = patch.find_non_finite() {
            let component = if kind == StateKind::Hydro {
                layout.component_name(n)
            } else {
                format!("{}[{}]", kind.name(), n)
            };
            return Err(Error::NonFiniteState { level: level.level, component, cell });
        }
    }
    Ok(())
}




/**
 * Raise the density of every zone below `small_dens` on this level. A zone
 * takes the whole state of its densest face neighbor when that neighbor is
 * itself above the floor; otherwise it is reset to the floor density at
 * rest, with the floor temperature and unchanged mass fractions. Neighbors
 * are read from the state as it was before any zone was changed, and only
 * from the valid zones of the same patch, since guard zones may be stale.
 */
pub fn enforce_min_density(level: &mut Level, layout: &StateLayout, small_dens: f64, small_temp: f64, eos: &dyn EquationOfState) -> Result<MinDensityReport> {
    check_for_nan(level, StateKind::Hydro, layout)?;

    let volume = level.geometry.cell_volume();
    let reports: Vec<MinDensityReport> = level
        .state_mut(StateKind::Hydro)
        .new_data_mut()
        .par_iter_mut()
        .map(|patch| floor_patch(patch, layout, small_dens, small_temp, eos))
        .collect();

    let report = reports.into_iter().fold(MinDensityReport::default(), MinDensityReport::combine);

    Ok(MinDensityReport {
        zones: report.zones,
        mass_added: report.mass_added * volume,
        eint_added: report.eint_added * volume,
        eden_added: report.eden_added * volume,
    })
}

fn floor_patch(patch: &mut Patch, layout: &StateLayout, small_dens: f64, small_temp: f64, eos: &dyn EquationOfState) -> MinDensityReport {
    let snapshot = patch.clone();
    let space = snapshot.valid_space();
    let mut report = MinDensityReport::default();

    for (index, u) in snapshot.iter_valid() {
        if u[StateLayout::DENSITY] >= small_dens {
            continue
        }
        let densest = Axis::ALL
            .iter()
            .flat_map(|axis| [axis.shift(index, -1), axis.shift(index, 1)])
            .filter(|&n| space.contains(n))
            .map(|n| snapshot.get_slice(n))
            .fold(None, |best: Option<&[f64]>, v| match best {
                Some(b) if b[StateLayout::DENSITY] >= v[StateLayout::DENSITY] => Some(b),
                _ => Some(v),
            });

        let mut new = u.to_vec();

        match densest {
            Some(v) if v[StateLayout::DENSITY] >= small_dens => {
                new.copy_from_slice(v)
            }
            _ => {
                let rho = small_dens;
                let e = eos.specific_internal_energy(rho, small_temp);
                let old_rho = u[StateLayout::DENSITY];

                for n in layout.species() {
                    new[n] = if old_rho > 0.0 { u[n] / old_rho * rho } else { rho / layout.num_species as f64 };
                }
                new[StateLayout::DENSITY] = rho;
                new[StateLayout::XMOM] = 0.0;
                new[StateLayout::YMOM] = 0.0;
                new[StateLayout::ZMOM] = 0.0;
                new[StateLayout::EINT] = rho * e;
                new[StateLayout::EDEN] = rho * e;
                new[StateLayout::TEMP] = small_temp;
            }
        }
        report.zones += 1;
        report.mass_added += new[StateLayout::DENSITY] - u[StateLayout::DENSITY];
        report.eint_added += new[StateLayout::EINT] - u[StateLayout::EINT];
        report.eden_added += new[StateLayout::EDEN] - u[StateLayout::EDEN];

        patch.get_slice_mut(index).copy_from_slice(&new)
    }
    report
}




/**
 * Clamp every mass fraction on this level to `[small_x, 1]` and rescale the
 * partial densities so the fractions sum to one. Does nothing when no
 * species are carried.
 */
pub fn normalize_species(level: &mut Level, layout: &StateLayout, small_x: f64) {
    if layout.num_species == 0 {
        return;
    }
    level
        .state_mut(StateKind::Hydro)
        .new_data_mut()
        .par_iter_mut()
        .for_each(|patch| {
            let valid = patch.valid_space().clone();
            for index in valid.iter() {
                let u = patch.get_slice_mut(index);
                let rho = u[StateLayout::DENSITY];
                let mut total = 0.0;

                for n in layout.species() {
                    let x = (u[n] / rho).min(1.0).max(small_x);
                    u[n] = x;
                    total += x;
                }
                for n in layout.species() {
                    u[n] = rho * u[n] / total;
                }
            }
        });
}




/**
 * Make the internal and total energies consistent, then evaluate the
 * temperature of every valid zone on this level. When the total energy
 * exceeds the kinetic energy, the internal energy is reset from it;
 * otherwise the total energy is rebuilt from the internal energy (which is
 * itself floored at `small_temp` if not positive). Temperatures are floored
 * at `small_temp`.
 */
pub fn compute_temperature(level: &mut Level, eos: &dyn EquationOfState, small_temp: f64) -> Result<()> {
    let lev = level.level;

    level
        .state_mut(StateKind::Hydro)
        .new_data_mut()
        .par_iter_mut()
        .map(|patch| {
            let valid = patch.valid_space().clone();
            for index in valid.iter() {
                let u = patch.get_slice_mut(index);
                let rho = u[StateLayout::DENSITY];

                if !(rho > 0.0) {
                    return Err(Error::InadmissibleState {
                        level: lev,
                        cell: index,
                        reason: format!("density {} is not positive", rho),
                    });
                }
                let ke = 0.5 * (u[StateLayout::XMOM].powi(2) + u[StateLayout::YMOM].powi(2) + u[StateLayout::ZMOM].powi(2)) / rho;
                let e_total = (u[StateLayout::EDEN] - ke) / rho;

                if e_total > 0.0 {
                    u[StateLayout::EINT] = rho * e_total;
                } else {
                    if !(u[StateLayout::EINT] > 0.0) {
                        u[StateLayout::EINT] = rho * eos.specific_internal_energy(rho, small_temp);
                    }
                    u[StateLayout::EDEN] = u[StateLayout::EINT] + ke;
                }
                u[StateLayout::TEMP] = eos.temperature(rho, u[StateLayout::EINT] / rho).max(small_temp);
            }
            Ok(())
        })
        .collect::<Result<Vec<()>>>()?;
    Ok(())
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{check_for_nan, compute_temperature, enforce_min_density, normalize_species, GammaLaw};
    use crate::error::Error;
    use crate::geometry::Geometry;
    use crate::index_space::range2d;
    use crate::level::Level;
    use crate::patch_set::GridPatchSet;
    use crate::state::{StateKind, StateLayout};

    const EOS: GammaLaw = GammaLaw { gamma: 1.4, cv: 2.0 };

    fn uniform_level(layout: &StateLayout) -> Level {
        let geometry = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (4, 4));
        let mut level = Level::new(0, geometry, GridPatchSet::new(vec![range2d(0..4, 0..4)]).unwrap());
        level.add_state(StateKind::Hydro, 1, layout.num_fields(), 0.0);

        for patch in level.state_mut(StateKind::Hydro).new_data_mut() {
            let space = patch.index_space();
            for index in space.iter() {
                let u = patch.get_slice_mut(index);
                u[StateLayout::DENSITY] = 1.0;
                u[StateLayout::EINT] = 2.0;
                u[StateLayout::EDEN] = 2.0;
                for n in layout.species() {
                    u[n] = 1.0 / layout.num_species as f64;
                }
            }
        }
        level
    }

    #[test]
    fn non_finite_values_name_component_and_zone() {
        let layout = StateLayout::new(0);
        let mut level = uniform_level(&layout);
        level.state_mut(StateKind::Hydro).new_data_mut()[0].set((2, 1), StateLayout::YMOM, f64::INFINITY);

        match check_for_nan(&level, StateKind::Hydro, &layout) {
            Err(Error::NonFiniteState { level: 0, component, cell }) => {
                assert_eq!(component, "ymom");
                assert_eq!(cell, (2, 1));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn low_density_zone_copies_densest_neighbor() {
        let layout = StateLayout::new(0);
        let mut level = uniform_level(&layout);
        let patch = &mut level.state_mut(StateKind::Hydro).new_data_mut()[0];
        patch.set((1, 1), StateLayout::DENSITY, -0.5);
        patch.set((1, 2), StateLayout::DENSITY, 3.0);

        let report = enforce_min_density(&mut level, &layout, 1e-3, 1e-6, &EOS).unwrap();
        let u = level.state(StateKind::Hydro).new_data()[0].get_slice((1, 1)).to_vec();
        assert_eq!(u[StateLayout::DENSITY], 3.0);
        assert_eq!(report.zones, 1);
        assert!((report.mass_added - 3.5 / 16.0).abs() < 1e-15);
    }

    #[test]
    fn guard_zones_are_not_candidate_neighbors() {
        let layout = StateLayout::new(0);
        let mut level = uniform_level(&layout);
        let patch = &mut level.state_mut(StateKind::Hydro).new_data_mut()[0];
        patch.set((0, 0), StateLayout::DENSITY, 1e-8);
        patch.set((-1, 0), StateLayout::DENSITY, 50.0);
        patch.set((0, -1), StateLayout::DENSITY, 40.0);

        enforce_min_density(&mut level, &layout, 1e-3, 1e-6, &EOS).unwrap();
        let u = level.state(StateKind::Hydro).new_data()[0].get_slice((0, 0)).to_vec();
        assert_eq!(u[StateLayout::DENSITY], 1.0);
    }

    #[test]
    fn isolated_low_density_zone_is_floored() {
        let layout = StateLayout::new(2);
        let mut level = uniform_level(&layout);
        let patch = &mut level.state_mut(StateKind::Hydro).new_data_mut()[0];
        for index in range2d(-1..5, -1..5).iter() {
            patch.set(index, StateLayout::DENSITY, 1e-8);
        }
        patch.set((0, 0), StateLayout::XMOM, 5.0);

        enforce_min_density(&mut level, &layout, 1e-3, 0.5, &EOS).unwrap();
        let u = level.state(StateKind::Hydro).new_data()[0].get_slice((0, 0)).to_vec();
        assert_eq!(u[StateLayout::DENSITY], 1e-3);
        assert_eq!(u[StateLayout::XMOM], 0.0);
        assert_eq!(u[StateLayout::TEMP], 0.5);
        assert!((u[StateLayout::EINT] - 1e-3).abs() < 1e-18);
    }

    #[test]
    fn species_are_clamped_and_renormalized() {
        let layout = StateLayout::new(2);
        let mut level = uniform_level(&layout);
        let patch = &mut level.state_mut(StateKind::Hydro).new_data_mut()[0];
        patch.set((3, 3), StateLayout::FIRST_SPEC, -0.2);
        patch.set((3, 3), StateLayout::FIRST_SPEC + 1, 0.6);

        normalize_species(&mut level, &layout, 1e-10);
        let u = level.state(StateKind::Hydro).new_data()[0].get_slice((3, 3)).to_vec();
        assert!(u[StateLayout::FIRST_SPEC] > 0.0);
        assert!((u[StateLayout::FIRST_SPEC] + u[StateLayout::FIRST_SPEC + 1] - 1.0).abs() < 1e-14);
    }

    #[test]
    fn temperature_follows_internal_energy() {
        let layout = StateLayout::new(0);
        let mut level = uniform_level(&layout);
        let patch = &mut level.state_mut(StateKind::Hydro).new_data_mut()[0];
        patch.set((0, 0), StateLayout::XMOM, 2.0);
        patch.set((0, 0), StateLayout::EDEN, 6.0);
        patch.set((1, 0), StateLayout::EDEN, -1.0);

        compute_temperature(&mut level, &EOS, 1e-6).unwrap();
        let data = &level.state(StateKind::Hydro).new_data()[0];
        assert_eq!(data.get((0, 0), StateLayout::EINT), 4.0);
        assert_eq!(data.get((0, 0), StateLayout::TEMP), 2.0);
        assert_eq!(data.get((1, 0), StateLayout::EDEN), 2.0);
        assert_eq!(data.get((2, 2), StateLayout::TEMP), 1.0);
    }

    #[test]
    fn zero_density_is_inadmissible() {
        let layout = StateLayout::new(0);
        let mut level = uniform_level(&layout);
        level.state_mut(StateKind::Hydro).new_data_mut()[0].set((0, 3), StateLayout::DENSITY, 0.0);
        assert!(compute_temperature(&mut level, &EOS, 1e-6).is_err());
    }
}
