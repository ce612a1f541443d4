use std::fmt;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::config::{Features, SyncConfig};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::level::Level;
use crate::message::Communicator;




/**
 * Names of the physical criteria which bound the time step.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Limiter {
    /// The configured maximum time step.
    Max,
    /// A configured fixed time step, which overrides every other limiter.
    Fixed,
    Hydro,
    Diffusion,
    Burning,
    Radiation,
}

impl Limiter {
    pub fn name(self) -> &'static str {
        match self {
            Limiter::Max => "max",
            Limiter::Fixed => "fixed",
            Limiter::Hydro => "hydro",
            Limiter::Diffusion => "diffusion",
            Limiter::Burning => "burning",
            Limiter::Radiation => "radiation",
        }
    }

    /// Whether the CFL safety factor multiplies this limiter's candidate.
    pub fn uses_cfl(self) -> bool {
        matches!(self, Limiter::Hydro | Limiter::Diffusion)
    }

    /// Whether the process behind this limiter is switched on.
    pub fn is_enabled(self, features: &Features) -> bool {
        match self {
            Limiter::Max | Limiter::Fixed => true,
            Limiter::Hydro => features.hydro,
            Limiter::Diffusion => features.diffuse_temp || features.diffuse_enth,
            Limiter::Burning => features.reactions,
            Limiter::Radiation => features.radiation,
        }
    }
}

impl fmt::Display for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}




/**
 * A per-process local stability criterion. Implementations evaluate one
 * patch of a level (its new-time state, guard zones filled) and return the
 * largest stable time step for that patch, or `f64::INFINITY` when the patch
 * puts no bound on it. The CFL factor is applied by the caller.
 */
pub trait StableDtKernel: Send + Sync {
    fn limiter(&self) -> Limiter;

    fn estimate_stable_dt(&self, level: &Level, patch: usize, previous_dt: f64) -> f64;
}




/**
 * A time step together with the limiter which set it.
 */
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestepEstimate {
    pub dt: f64,
    pub limiter: Limiter,
}




/**
 * Computes the most restrictive stable time step of one level over the
 * enabled limiter kernels and the configured maximum.
 */
pub struct TimestepEstimator {
    kernels: Vec<Box<dyn StableDtKernel>>,
    features: Features,
    cfl: f64,
    max_dt: f64,
    fixed_dt: Option<f64>,
    initial_dt: Option<f64>,
    init_shrink: f64,
}




// ============================================================================
impl TimestepEstimator {

    pub fn new(config: &SyncConfig, kernels: Vec<Box<dyn StableDtKernel>>) -> Self {
        Self {
            kernels,
            features: config.features.clone(),
            cfl: config.cfl,
            max_dt: config.max_dt,
            fixed_dt: config.fixed_dt,
            initial_dt: config.initial_dt,
            init_shrink: config.init_shrink,
        }
    }


    pub fn fixed_dt(&self) -> Option<f64> {
        self.fixed_dt
    }


    /**
     * Return the stable time step of the level and the limiter responsible
     * for it. A fixed time step is returned without evaluating any kernel.
     * Otherwise each enabled kernel is reduced to a minimum over the locally
     * owned patches, and then over all workers; the configured maximum time
     * step is itself a candidate, so the result is always finite.
     * Candidates which are not positive are discarded.
     */
    pub fn estimate(&self, level: &Level, previous_dt: f64, comm: &dyn Communicator, sink: &dyn DiagnosticSink) -> TimestepEstimate {
        if let Some(dt) = self.fixed_dt {
            return TimestepEstimate { dt, limiter: Limiter::Fixed };
        }

        let rank = comm.rank();
        let mut estimate = TimestepEstimate { dt: self.max_dt, limiter: Limiter::Max };

        for kernel in self.kernels.iter().filter(|k| k.limiter().is_enabled(&self.features)) {
            let local = (0..level.patches.len())
                .into_par_iter()
                .filter(|&n| level.patches.is_local(n, rank))
                .map(|n| kernel.estimate_stable_dt(level, n, previous_dt))
                .filter(|&dt| dt > 0.0)
                .reduce(|| f64::INFINITY, f64::min);

            let raw = comm.reduce_min(local);

            if !(raw > 0.0 && raw.is_finite()) {
                continue
            }
            let dt = if kernel.limiter().uses_cfl() { self.cfl * raw } else { raw };

            sink.report(DiagnosticEvent::LimiterEstimate {
                level: level.level,
                limiter: kernel.limiter(),
                dt,
            });

            if dt < estimate.dt {
                estimate = TimestepEstimate { dt, limiter: kernel.limiter() };
            }
        }
        estimate
    }


    /**
     * Return the time step for the first step on a level: the configured
     * initial time step if there is one, and otherwise the stable estimate
     * shrunk by `init_shrink`.
     */
    pub fn initial_time_step(&self, level: &Level, comm: &dyn Communicator, sink: &dyn DiagnosticSink) -> TimestepEstimate {
        match self.initial_dt {
            Some(dt) if self.fixed_dt.is_none() => TimestepEstimate { dt, limiter: Limiter::Fixed },
            _ => {
                let estimate = self.estimate(level, 0.0, comm, sink);
                if estimate.limiter == Limiter::Fixed {
                    estimate
                } else {
                    TimestepEstimate { dt: self.init_shrink * estimate.dt, limiter: estimate.limiter }
                }
            }
        }
    }
}




// ============================================================================
#[cfg(test)]
pub(crate) mod test {

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use super::{Limiter, StableDtKernel, TimestepEstimate, TimestepEstimator};
    use crate::config::SyncConfig;
    use crate::diagnostics::RecordingSink;
    use crate::geometry::Geometry;
    use crate::hydro::euler::Primitive;
    use crate::hydro::limiters::HydroCfl;
    use crate::index_space::range2d;
    use crate::level::Level;
    use crate::message::SerialCommunicator;
    use crate::patch_set::GridPatchSet;
    use crate::state::{StateKind, StateLayout};

    /// A kernel returning a fixed value on patch 0 and twice that value
    /// elsewhere, counting its evaluations.
    pub(crate) struct ConstantKernel {
        pub limiter: Limiter,
        pub dt: f64,
        pub calls: Arc<AtomicUsize>,
    }

    impl ConstantKernel {
        pub(crate) fn boxed(limiter: Limiter, dt: f64) -> Box<dyn StableDtKernel> {
            Box::new(Self { limiter, dt, calls: Arc::new(AtomicUsize::new(0)) })
        }
    }

    impl StableDtKernel for ConstantKernel {
        fn limiter(&self) -> Limiter {
            self.limiter
        }

        fn estimate_stable_dt(&self, _level: &Level, patch: usize, _previous_dt: f64) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if patch == 0 { self.dt } else { 2.0 * self.dt }
        }
    }

    struct ZeroOnFirstPatch;

    impl StableDtKernel for ZeroOnFirstPatch {
        fn limiter(&self) -> Limiter {
            Limiter::Hydro
        }

        fn estimate_stable_dt(&self, _level: &Level, patch: usize, _previous_dt: f64) -> f64 {
            if patch == 0 { 0.0 } else { 0.25 }
        }
    }

    fn level() -> Level {
        let geometry = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (8, 8));
        let patches = GridPatchSet::new(vec![range2d(0..4, 0..8), range2d(4..8, 0..8)]).unwrap();
        Level::new(0, geometry, patches)
    }

    fn estimate(config: &SyncConfig, kernels: Vec<Box<dyn StableDtKernel>>) -> TimestepEstimate {
        TimestepEstimator::new(config, kernels).estimate(&level(), 1.0, &SerialCommunicator, &RecordingSink::new())
    }

    #[test]
    fn fixed_dt_overrides_without_evaluating_kernels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let kernel = ConstantKernel { limiter: Limiter::Hydro, dt: 0.1, calls: calls.clone() };
        let config = SyncConfig { fixed_dt: Some(0.5), ..SyncConfig::default() };
        let result = estimate(&config, vec![Box::new(kernel)]);
        assert_eq!(result, TimestepEstimate { dt: 0.5, limiter: Limiter::Fixed });
        assert_eq!(result.limiter.name(), "fixed");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cfl_multiplies_hydro_but_not_burning() {
        let mut config = SyncConfig { cfl: 0.5, ..SyncConfig::default() };
        config.features.reactions = true;
        let result = estimate(&config, vec![
            ConstantKernel::boxed(Limiter::Hydro, 1.0),
            ConstantKernel::boxed(Limiter::Burning, 0.6),
        ]);
        assert_eq!(result, TimestepEstimate { dt: 0.5, limiter: Limiter::Hydro });
    }

    #[test]
    fn disabled_processes_contribute_no_candidate() {
        let config = SyncConfig::default();
        let result = estimate(&config, vec![
            ConstantKernel::boxed(Limiter::Hydro, 1.0),
            ConstantKernel::boxed(Limiter::Burning, 1e-6),
        ]);
        assert_eq!(result.limiter, Limiter::Hydro);
    }

    #[test]
    fn max_dt_wins_when_no_limiter_is_active() {
        let mut config = SyncConfig { max_dt: 3.0, ..SyncConfig::default() };
        config.features.hydro = false;
        let result = estimate(&config, vec![ConstantKernel::boxed(Limiter::Hydro, 1.0)]);
        assert_eq!(result, TimestepEstimate { dt: 3.0, limiter: Limiter::Max });
    }

    #[test]
    fn unbounded_kernels_leave_max_dt() {
        let config = SyncConfig { max_dt: 2.0, ..SyncConfig::default() };
        let result = estimate(&config, vec![ConstantKernel::boxed(Limiter::Hydro, f64::INFINITY)]);
        assert_eq!(result, TimestepEstimate { dt: 2.0, limiter: Limiter::Max });
    }

    #[test]
    fn degenerate_candidates_are_discarded() {
        let config = SyncConfig { max_dt: 2.0, ..SyncConfig::default() };
        let result = estimate(&config, vec![
            ConstantKernel::boxed(Limiter::Hydro, 0.0),
            ConstantKernel::boxed(Limiter::Hydro, -1.0),
            ConstantKernel::boxed(Limiter::Hydro, f64::NAN),
        ]);
        assert_eq!(result, TimestepEstimate { dt: 2.0, limiter: Limiter::Max });
    }

    #[test]
    fn zero_bound_on_one_patch_leaves_the_others() {
        let config = SyncConfig { cfl: 1.0, ..SyncConfig::default() };
        let kernel = ZeroOnFirstPatch;
        let result = estimate(&config, vec![Box::new(kernel)]);
        assert_eq!(result, TimestepEstimate { dt: 0.25, limiter: Limiter::Hydro });
    }

    #[test]
    fn quiescent_gas_falls_back_to_max_dt() {
        let config = SyncConfig { max_dt: 0.7, ..SyncConfig::default() };
        let gamma = config.eos.gamma;
        let mut level = level();
        level.add_state(StateKind::Hydro, 1, StateLayout::new(0).num_fields(), 0.0);

        for patch in level.state_mut(StateKind::Hydro).new_data_mut() {
            let space = patch.index_space();
            for index in space.iter() {
                Primitive::new(1.0, 0.0, 0.0, 0.0, 0.0).to_conserved(gamma).write_to_slice(patch.get_slice_mut(index));
            }
        }
        let estimator = TimestepEstimator::new(&config, vec![Box::new(HydroCfl { gamma_law_index: gamma })]);
        let result = estimator.estimate(&level, 1.0, &SerialCommunicator, &RecordingSink::new());
        assert_eq!(result, TimestepEstimate { dt: 0.7, limiter: Limiter::Max });
    }

    #[test]
    fn initial_step_is_shrunk_estimate() {
        let config = SyncConfig { init_shrink: 0.1, cfl: 1.0, ..SyncConfig::default() };
        let estimator = TimestepEstimator::new(&config, vec![ConstantKernel::boxed(Limiter::Hydro, 1.0)]);
        let result = estimator.initial_time_step(&level(), &SerialCommunicator, &RecordingSink::new());
        assert!((result.dt - 0.1).abs() < 1e-15);

        let config = SyncConfig { initial_dt: Some(0.01), ..config };
        let estimator = TimestepEstimator::new(&config, vec![ConstantKernel::boxed(Limiter::Hydro, 1.0)]);
        assert_eq!(estimator.initial_time_step(&level(), &SerialCommunicator, &RecordingSink::new()).dt, 0.01);
    }
}
