use crate::index_space::Axis;
use crate::level::Level;
use crate::state::{StateKind, StateLayout};
use crate::timestep::{Limiter, StableDtKernel};
use super::euler::Conserved;




/**
 * The CFL criterion of an unsplit explicit hydrodynamics scheme,
 * `1 / (a_x / dx + a_y / dy)`, with `a = |v| + c_s` the fastest signal
 * speed along each axis.
 */
pub struct HydroCfl {
    pub gamma_law_index: f64,
}




/**
 * The stability bound of explicit diffusion, `dx^2 / (2 D)`, where the
 * diffusivity is `D = kappa / (rho c)`. Thermal diffusion uses the specific
 * heat at constant volume, enthalpy diffusion the one at constant pressure.
 */
pub struct DiffusionLimit {
    pub conductivity: f64,
    pub specific_heat: f64,
}




/**
 * Bounds the fraction of the internal energy which nuclear burning may
 * release in one step. The release rate is extrapolated from the change of
 * the reactions state over the previous step.
 */
pub struct BurningLimit {
    pub dtnuc_e: f64,
}




/**
 * Bounds the relative change of the radiation energy density in one step,
 * using the rate of change over the previous step. Zones whose radiation
 * energy density is below `small_er` are not considered.
 */
pub struct RadiationLimit {
    pub max_change: f64,
    pub small_er: f64,
}




// ============================================================================
impl StableDtKernel for HydroCfl {

    fn limiter(&self) -> Limiter {
        Limiter::Hydro
    }

    fn estimate_stable_dt(&self, level: &Level, patch: usize, _previous_dt: f64) -> f64 {
        let dx = level.geometry.cell_spacing(Axis::I);
        let dy = level.geometry.cell_spacing(Axis::J);

        level.state(StateKind::Hydro).new_data()[patch]
            .iter_valid()
            .filter_map(|(_, u)| Conserved::from_slice(u).to_primitive(self.gamma_law_index).ok())
            .map(|p| {
                let si = p.max_signal_speed(Axis::I, self.gamma_law_index);
                let sj = p.max_signal_speed(Axis::J, self.gamma_law_index);
                1.0 / (si / dx + sj / dy)
            })
            .fold(f64::INFINITY, f64::min)
    }
}




// ============================================================================
impl StableDtKernel for DiffusionLimit {

    fn limiter(&self) -> Limiter {
        Limiter::Diffusion
    }

    fn estimate_stable_dt(&self, level: &Level, patch: usize, _previous_dt: f64) -> f64 {
        if self.conductivity <= 0.0 {
            return f64::INFINITY;
        }
        let dx = level.geometry.cell_spacing(Axis::I).min(level.geometry.cell_spacing(Axis::J));

        level.state(StateKind::Hydro).new_data()[patch]
            .iter_valid()
            .map(|(_, u)| u[StateLayout::DENSITY])
            .filter(|&rho| rho > 0.0)
            .map(|rho| 0.5 * dx * dx * rho * self.specific_heat / self.conductivity)
            .fold(f64::INFINITY, f64::min)
    }
}




// ============================================================================
impl StableDtKernel for BurningLimit {

    fn limiter(&self) -> Limiter {
        Limiter::Burning
    }

    fn estimate_stable_dt(&self, level: &Level, patch: usize, previous_dt: f64) -> f64 {
        if !level.has_state(StateKind::Reactions) || previous_dt <= 0.0 {
            return f64::INFINITY;
        }
        let reactions = level.state(StateKind::Reactions);

        if !reactions.has_old_data() {
            return f64::INFINITY;
        }
        let hydro = &level.state(StateKind::Hydro).new_data()[patch];
        let old = &reactions.old_data()[patch];
        let new = &reactions.new_data()[patch];

        hydro
            .iter_valid()
            .map(|(index, u)| {
                let rate = (new.get(index, 0) - old.get(index, 0)).abs() / previous_dt;
                if rate > 0.0 {
                    self.dtnuc_e * u[StateLayout::EINT] / rate
                } else {
                    f64::INFINITY
                }
            })
            .fold(f64::INFINITY, f64::min)
    }
}




// ============================================================================
impl StableDtKernel for RadiationLimit {

    fn limiter(&self) -> Limiter {
        Limiter::Radiation
    }

    fn estimate_stable_dt(&self, level: &Level, patch: usize, previous_dt: f64) -> f64 {
        if !level.has_state(StateKind::Radiation) || previous_dt <= 0.0 {
            return f64::INFINITY;
        }
        let radiation = level.state(StateKind::Radiation);

        if !radiation.has_old_data() {
            return f64::INFINITY;
        }
        let old = &radiation.old_data()[patch];

        radiation.new_data()[patch]
            .iter_valid()
            .filter(|(_, er)| er[0].abs() > self.small_er)
            .map(|(index, er)| {
                let rate = (er[0] - old.get(index, 0)).abs() / previous_dt;
                if rate > 0.0 {
                    self.max_change * er[0].abs() / rate
                } else {
                    f64::INFINITY
                }
            })
            .fold(f64::INFINITY, f64::min)
    }
}
