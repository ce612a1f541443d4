use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::average_down::{average_down, QuantitySelector};
use crate::checkpoint::Checkpoint;
use crate::config::{GravityKind, SyncConfig};
use crate::derived::{self, EquationOfState, GammaLaw};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, LogSink};
use crate::error::{Error, Result};
use crate::flux_register::FaceFluxes;
use crate::geometry::Geometry;
use crate::ghost::{fill_ghost_cells, BoundaryRegistry};
use crate::gravity::{ConstantGravity, MonopoleSolver};
use crate::hydro::limiters::{BurningLimit, DiffusionLimit, HydroCfl, RadiationLimit};
use crate::hydro::{EulerKernel, FluxKernel};
use crate::level::{Hierarchy, Level};
use crate::message::{Communicator, SerialCommunicator};
use crate::patch::Patch;
use crate::patch_set::GridPatchSet;
use crate::potential::{self, install_field, EllipticSolver, FieldSource};
use crate::reflux::{clear_flux_registers, reflux};
use crate::scheduler::{self, Schedule, ScheduleRequest};
use crate::state::{StateKind, StateLayout};
use crate::timestep::{Limiter, StableDtKernel, TimestepEstimator};




/**
 * The phases of the synchronization which follows the advance of a level.
 * Each level passes through them in this order; the potential
 * synchronization is skipped when no composite correction of a
 * self-gravitating field is configured, and only the derived-quantity
 * refresh runs on the finest level.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Idle,
    Reflux,
    AverageDown,
    PotentialSync,
    DerivedQuantityRefresh,
}




/**
 * The time coordinates of the run, and the time step history which the
 * next time step selection depends on.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeBookkeeping {
    pub cum_time: f64,

    /// Number of coarse steps taken.
    pub step: u64,

    /// Number of steps taken by each level.
    pub level_steps: Vec<u64>,

    /// Each level's time step for the next coarse step.
    pub dt_level: Vec<f64>,

    /// Each level's limited estimate behind `dt_level`.
    pub dt_min: Vec<f64>,

    /// Each level's number of substeps per step of the next coarser level.
    pub n_cycle: Vec<u64>,

    /// The next time step selection is the first after a regrid.
    pub post_regrid: bool,

    /// The next coarse step ends exactly on the stop time.
    pub snap_to_stop: bool,

    pub controlling_level: usize,
    pub limiter: Limiter,
}

impl TimeBookkeeping {
    pub fn new(hierarchy: &Hierarchy, time: f64) -> Self {
        let num_levels = hierarchy.levels.len();
        Self {
            cum_time: time,
            step: 0,
            level_steps: vec![0; num_levels],
            dt_level: vec![0.0; num_levels],
            dt_min: vec![0.0; num_levels],
            n_cycle: (0..num_levels).map(|n| hierarchy.n_cycle(n)).collect(),
            post_regrid: false,
            snap_to_stop: false,
            controlling_level: 0,
            limiter: Limiter::Max,
        }
    }

    fn apply(&mut self, schedule: Schedule) {
        self.dt_level = schedule.dt_level;
        self.dt_min = schedule.dt_min;
        self.controlling_level = schedule.controlling_level;
        self.limiter = schedule.limiter;
        self.snap_to_stop = schedule.stop_time_reached;
    }
}




/**
 * The collaborators of the synchronization core, constructed once per run
 * and shared by every level.
 */
pub struct Services {
    pub flux_kernel: Box<dyn FluxKernel>,
    pub estimator: TimestepEstimator,
    pub solver: Option<Box<dyn EllipticSolver>>,
    pub eos: Box<dyn EquationOfState>,
    pub boundaries: BoundaryRegistry,
    pub sink: Arc<dyn DiagnosticSink>,
    pub comm: Box<dyn Communicator>,
}




// ============================================================================
impl Services {

    /**
     * The reference physics for a configuration: the Euler kernel, every
     * reference limiter kernel, the configured gravity, a gamma-law
     * equation of state and reflecting walls, reporting through `log` on a
     * single worker.
     */
    pub fn reference(config: &SyncConfig) -> Self {
        let gamma = config.eos.gamma;
        let layout = StateLayout::new(config.num_species);
        let mut kernels: Vec<Box<dyn StableDtKernel>> = vec![Box::new(HydroCfl { gamma_law_index: gamma })];

        if config.features.diffuse_temp {
            kernels.push(Box::new(DiffusionLimit { conductivity: config.limits.conductivity, specific_heat: config.eos.cv }));
        }
        if config.features.diffuse_enth {
            kernels.push(Box::new(DiffusionLimit { conductivity: config.limits.conductivity, specific_heat: gamma * config.eos.cv }));
        }
        kernels.push(Box::new(BurningLimit { dtnuc_e: config.limits.dtnuc_e }));
        kernels.push(Box::new(RadiationLimit { max_change: config.limits.radiation_change, small_er: config.limits.small_er }));

        let solver: Option<Box<dyn EllipticSolver>> = match config.gravity.kind {
            GravityKind::None => None,
            GravityKind::Constant => Some(Box::new(ConstantGravity { g: config.gravity.constant })),
            GravityKind::Monopole => Some(Box::new(MonopoleSolver {
                gravitational_constant: config.gravity.gravitational_constant,
                center: config.gravity.center,
                tolerance: config.gravity.tolerance,
            })),
        };

        Self {
            flux_kernel: Box::new(EulerKernel { gamma_law_index: gamma, layout }),
            estimator: TimestepEstimator::new(config, kernels),
            solver,
            eos: Box::new(GammaLaw { gamma, cv: config.eos.cv }),
            boundaries: BoundaryRegistry::reflecting(),
            sink: Arc::new(LogSink),
            comm: Box::new(SerialCommunicator),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_communicator(mut self, comm: Box<dyn Communicator>) -> Self {
        self.comm = comm;
        self
    }
}




/**
 * Create a level carrying the state kinds the configuration calls for, with
 * zero data at the given time: the hydro state always, the potential and
 * acceleration when gravity is on, and the reaction and radiation states
 * when those processes are on.
 */
pub fn new_level(level: usize, geometry: Geometry, patches: GridPatchSet, config: &SyncConfig, time: f64) -> Level {
    let layout = StateLayout::new(config.num_species);
    let mut result = Level::new(level, geometry, patches);
    result.add_state(StateKind::Hydro, config.num_ghost, layout.num_fields(), time);

    if config.gravity.kind != GravityKind::None {
        result.add_state(StateKind::PhiGrav, 0, 1, time);
        result.add_state(StateKind::GravVector, 0, 2, time);
    }
    if config.features.reactions {
        result.add_state(StateKind::Reactions, 0, 1, time);
    }
    if config.features.radiation {
        result.add_state(StateKind::Radiation, config.num_ghost, 1, time);
    }
    result
}




/**
 * The simulation context: the hierarchy, the configuration, the
 * collaborators and the time bookkeeping. Advances the hierarchy one coarse
 * step at a time with Berger-Oliger subcycling, synchronizing each level
 * with the finer ones after it is advanced.
 */
pub struct Simulation {
    config: SyncConfig,
    hierarchy: Hierarchy,
    services: Services,
    time: TimeBookkeeping,
    stop: Arc<AtomicBool>,
    trace: Vec<(usize, SyncPhase)>,
}




// ============================================================================
impl Simulation {

    /**
     * Set up a run from a hierarchy holding the initial conditions. The
     * configuration is validated here; no partial run proceeds on error.
     * Call [`Simulation::init`] before advancing.
     */
    pub fn new(config: SyncConfig, hierarchy: Hierarchy, services: Services) -> Result<Self> {
        Self::check_setup(&config, &hierarchy)?;
        let time = TimeBookkeeping::new(&hierarchy, hierarchy.level(0).time());
        Ok(Self::assemble(config, hierarchy, services, time))
    }


    /**
     * Resume a run from a checkpoint. The stored fields are used verbatim,
     * so the subsequent time steps are those the original run would have
     * taken.
     */
    pub fn restart(config: SyncConfig, checkpoint: Checkpoint, services: Services) -> Result<Self> {
        Self::check_setup(&config, &checkpoint.hierarchy)?;

        if checkpoint.bookkeeping.dt_level.len() != checkpoint.hierarchy.levels.len() {
            return Err(Error::Checkpoint("time bookkeeping does not match the number of levels".to_string()));
        }
        info!("restarting at step {} t={:.6e}", checkpoint.bookkeeping.step, checkpoint.bookkeeping.cum_time);
        Ok(Self::assemble(config, checkpoint.hierarchy, services, checkpoint.bookkeeping))
    }

    fn check_setup(config: &SyncConfig, hierarchy: &Hierarchy) -> Result<()> {
        config.validate()?;

        if hierarchy.layout != StateLayout::new(config.num_species) {
            return Err(Error::Config(format!(
                "the hierarchy carries {} fields per zone, the configuration asks for {}",
                hierarchy.layout.num_fields(),
                StateLayout::new(config.num_species).num_fields())));
        }
        if let Some(level) = hierarchy.levels.iter().find(|level| !level.has_state(StateKind::Hydro)) {
            return Err(Error::Config(format!("level {} has no hydro state", level.level)));
        }
        Ok(())
    }

    fn assemble(config: SyncConfig, hierarchy: Hierarchy, services: Services, time: TimeBookkeeping) -> Self {
        Self {
            config,
            hierarchy,
            services,
            time,
            stop: Arc::new(AtomicBool::new(false)),
            trace: Vec::new(),
        }
    }


    /**
     * Bring the initial data to a synchronized state: average down from
     * the finest level, solve the potential field, recompute the
     * temperature and select the first time step.
     */
    pub fn init(&mut self) -> Result<()> {
        let finest = self.hierarchy.finest_level();

        for level in (0..finest).rev() {
            average_down(&mut self.hierarchy, level, QuantitySelector::All);
        }

        if let Some(solver) = self.services.solver.as_deref() {
            if solver.is_self_gravitating() && self.config.gravity.no_composite {
                for level in 0..=finest {
                    let field = solver.solve_or_correct_field(&self.hierarchy, level..=level, FieldSource::Density)?;
                    install_field(&mut self.hierarchy, level..=level, &field);
                }
            } else {
                let field = solver.solve_or_correct_field(&self.hierarchy, 0..=finest, FieldSource::Density)?;
                install_field(&mut self.hierarchy, 0..=finest, &field);
            }
        }
        if self.config.gravity.test_solves {
            self.check_composite()?;
        }

        for level in 0..=finest {
            derived::compute_temperature(self.hierarchy.level_mut(level), &*self.services.eos, self.config.small_temp)?;
        }
        self.compute_initial_dt();
        Ok(())
    }


    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }

    pub fn bookkeeping(&self) -> &TimeBookkeeping {
        &self.time
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The synchronization phases entered during the last coarse step, with
    /// the level each belongs to.
    pub fn phase_trace(&self) -> &[(usize, SyncPhase)] {
        &self.trace
    }

    /// The flag which requests a stop at the top of the next coarse step.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.time.clone(), self.hierarchy.clone())
    }


    /**
     * Whether another coarse step may be taken: no stop has been requested,
     * the stop time has not been reached and the coarse time step is not
     * below the cutoff.
     */
    pub fn ok_to_continue(&self) -> bool {
        self.stop_reason().is_none()
    }

    fn stop_reason(&self) -> Option<String> {
        let requested = self.stop.load(Ordering::SeqCst);

        if requested {
            Some("stop requested".to_string())
        } else if self.config.stop_time.map_or(false, |stop| self.time.cum_time >= stop) {
            Some(format!("reached the stop time {:.6e}", self.time.cum_time))
        } else if !scheduler::ok_to_continue(self.time.dt_level[0], self.config.dt_cutoff, requested) {
            Some(format!("time step {:.3e} fell below the cutoff {:.3e}", self.time.dt_level[0], self.config.dt_cutoff))
        } else {
            None
        }
    }


    /**
     * Take coarse steps until the run stops or `max_steps` steps have been
     * taken. Returns the number of steps taken.
     */
    pub fn run(&mut self, max_steps: Option<u64>) -> Result<u64> {
        let mut steps = 0;
        while max_steps.map_or(true, |max| steps < max) && self.advance_coarse_step()? {
            steps += 1;
        }
        Ok(steps)
    }


    /**
     * Advance the whole hierarchy by one coarse time step, then select the
     * time step of the next one. Returns `false`, without advancing, if the
     * run should stop.
     */
    pub fn advance_coarse_step(&mut self) -> Result<bool> {
        if let Some(reason) = self.stop_reason() {
            self.services.sink.report(DiagnosticEvent::Stop { reason });
            return Ok(false);
        }
        self.trace.clear();

        let dt = self.time.dt_level[0];
        let dt_level = self.time.dt_level.clone();
        self.time_step(0)?;

        self.time.cum_time = match (self.time.snap_to_stop, self.config.stop_time) {
            (true, Some(stop)) => stop,
            _ => self.time.cum_time + dt,
        };
        let cum_time = self.time.cum_time;

        for level in &mut self.hierarchy.levels {
            for state in level.states.values_mut() {
                state.snap_new_time(cum_time)
            }
        }
        self.time.step += 1;

        self.services.sink.report(DiagnosticEvent::TimeStep {
            step: self.time.step,
            time: cum_time,
            dt_level,
            level: self.time.controlling_level,
            limiter: self.time.limiter,
        });
        self.compute_new_dt();
        Ok(true)
    }


    /**
     * Replace the levels above the coarsest with new patch sets, each given
     * with its refinement ratio to the level below. Zones of a new level
     * take the data of the previous level at the same place when there is
     * one, and are otherwise filled from the next coarser level, piecewise
     * constant. The time step selection which follows does not let any
     * level's time step grow.
     */
    pub fn regrid(&mut self, fine: Vec<(GridPatchSet, i64)>) -> Result<()> {
        let template = self.hierarchy.level(0);
        let time = self.time.cum_time;
        let mut levels = vec![template.clone()];
        let mut ratios = Vec::new();

        for (n, (patches, ratio)) in fine.into_iter().enumerate() {
            let lev = n + 1;
            let parent = &levels[lev - 1];
            let mut level = Level::new(lev, parent.geometry.refine(ratio), patches);
            let reuse = self.hierarchy.ref_ratio.get(n) == Some(&ratio) && ratios == self.hierarchy.ref_ratio[..n];

            for kind in template.kinds() {
                let state = template.state(kind);
                let previous = self.hierarchy.levels.get(lev).filter(|_| reuse).and_then(|l| l.states.get(&kind));
                let coarse = parent.state(kind).new_data();
                level.add_state(kind, state.num_guard(), state.num_fields(), time);

                for patch in level.state_mut(kind).new_data_mut() {
                    let valid = patch.valid_space().clone();

                    for index in valid.iter() {
                        let parent_index = (index.0.div_euclid(ratio), index.1.div_euclid(ratio));
                        let source = previous
                            .and_then(|s| s.new_data().iter().find(|p| p.valid_space().contains(index)))
                            .map(|p| p.get_slice(index))
                            .or_else(|| coarse
                                .iter()
                                .find(|p| p.valid_space().contains(parent_index))
                                .map(|p| p.get_slice(parent_index)));

                        if let Some(values) = source {
                            patch.get_slice_mut(index).copy_from_slice(values)
                        }
                    }
                }
            }
            levels.push(level);
            ratios.push(ratio);
        }

        let old_ratios = self.hierarchy.ref_ratio.clone();
        let hierarchy = Hierarchy::new(levels, ratios, self.hierarchy.layout)?;
        let finest = hierarchy.finest_level();
        let mut dt_level = vec![self.time.dt_level[0]];
        let mut dt_min = vec![self.time.dt_min[0]];

        for lev in 1..=finest {
            let same_chain = old_ratios.len() >= lev && old_ratios[..lev] == hierarchy.ref_ratio[..lev];
            if same_chain {
                dt_level.push(self.time.dt_level[lev]);
                dt_min.push(self.time.dt_min[lev]);
            } else {
                dt_level.push(dt_level[lev - 1] / hierarchy.ref_ratio[lev - 1] as f64);
                dt_min.push(dt_level[lev]);
            }
        }
        self.time.level_steps.resize(finest + 1, 0);
        self.time.n_cycle = (0..=finest).map(|n| hierarchy.n_cycle(n)).collect();
        self.time.dt_level = dt_level;
        self.time.dt_min = dt_min;
        self.time.post_regrid = true;
        self.hierarchy = hierarchy;

        info!("regrid: {} levels, patches per level {:?}", finest + 1,
            self.hierarchy.levels.iter().map(|l| l.patches.len()).collect::<Vec<_>>());

        if let Some(solver) = self.services.solver.as_deref().filter(|s| s.is_self_gravitating()) {
            if time > 0.0 {
                let field = solver.solve_or_correct_field(&self.hierarchy, 0..=finest, FieldSource::Density)?;
                install_field(&mut self.hierarchy, 0..=finest, &field);
            }
        }
        for level in 1..=finest {
            derived::compute_temperature(self.hierarchy.level_mut(level), &*self.services.eos, self.config.small_temp)?;
        }
        Ok(())
    }
}




// ============================================================================
impl Simulation {

    fn time_step(&mut self, level: usize) -> Result<()> {
        let dt = self.time.dt_level[level];

        for kind in self.hierarchy.level(level).kinds() {
            if self.hierarchy.level(level).state(kind).num_guard() > 0 {
                fill_ghost_cells(&mut self.hierarchy, level, kind, &self.services.boundaries);
            }
        }
        for state in self.hierarchy.level_mut(level).states.values_mut() {
            state.swap_time_levels(dt);
        }
        clear_flux_registers(&mut self.hierarchy, level + 1);

        if self.config.features.hydro {
            self.advance_hydro(level, dt)?;
        }
        self.time.level_steps[level] += 1;

        if level < self.hierarchy.finest_level() {
            let new_time = self.hierarchy.level(level).time();

            for _ in 0..self.hierarchy.n_cycle(level + 1) {
                self.time_step(level + 1)?;
            }
            for lev in level + 1..=self.hierarchy.finest_level() {
                for state in self.hierarchy.level_mut(lev).states.values_mut() {
                    state.snap_new_time(new_time)
                }
            }
        }
        self.post_timestep(level)
    }


    /**
     * Run the flux kernel on every patch of the level, record the fluxes in
     * the registers on both sides of the level, and refresh the level's
     * self-gravity.
     */
    fn advance_hydro(&mut self, level: usize, dt: f64) -> Result<()> {
        let finest = self.hierarchy.finest_level();
        let kernel = &*self.services.flux_kernel;
        let lev = self.hierarchy.level_mut(level);
        let geometry = lev.geometry.clone();
        let boxes = lev.patches.boxes().to_vec();
        let gravity: Option<Vec<Patch>> = lev.states.get(&StateKind::GravVector).map(|g| g.old_data().to_vec());

        let fluxes: Vec<FaceFluxes> = lev
            .state_mut(StateKind::Hydro)
            .new_data_mut()
            .par_iter_mut()
            .enumerate()
            .map(|(n, patch)| kernel.compute_fluxes_and_update(&geometry, patch, gravity.as_ref().map(|g| &g[n]), dt))
            .collect::<Result<_>>()?;

        if self.config.reflux_enabled() {
            if level < finest {
                if let Some(register) = self.hierarchy.level_mut(level + 1).flux_registers.get_mut(&StateKind::Hydro) {
                    for (valid, fluxes) in boxes.iter().zip(&fluxes) {
                        register.crse_add(valid, fluxes, dt, &geometry)
                    }
                }
            }
            if level > 0 {
                if let Some(register) = self.hierarchy.level_mut(level).flux_registers.get_mut(&StateKind::Hydro) {
                    for fluxes in &fluxes {
                        register.fine_add(fluxes, dt, &geometry)
                    }
                }
            }
        }

        if let Some(solver) = self.services.solver.as_deref().filter(|s| s.is_self_gravitating()) {
            let field = solver.solve_or_correct_field(&self.hierarchy, level..=level, FieldSource::Density)?;
            install_field(&mut self.hierarchy, level..=level, &field);
        }
        Ok(())
    }


    fn enter(&mut self, level: usize, phase: SyncPhase) {
        debug!("level {}: {:?}", level, phase);
        self.trace.push((level, phase));
    }

    fn potential_sync_active(&self) -> bool {
        self.config.reflux_enabled() && self.config.potential_sync_enabled() && self
            .services
            .solver
            .as_deref()
            .map_or(false, |s| s.is_self_gravitating() && s.composite_corrections())
    }


    /**
     * Synchronize `level` with the finer levels after it has been advanced
     * (and they have caught up with it), then refresh its derived
     * quantities.
     */
    fn post_timestep(&mut self, level: usize) -> Result<()> {
        let finest = self.hierarchy.finest_level();
        let sync = self.potential_sync_active();

        if level < finest {
            if level == 0 && sync && self.config.gravity.test_solves {
                self.check_composite()?;
            }
            self.enter(level, SyncPhase::Reflux);
            let pre = sync.then(|| potential::density_and_momenta(&self.hierarchy, level));

            if self.config.reflux_enabled() {
                let max_correction = reflux(&mut self.hierarchy, level);
                self.services.sink.report(DiagnosticEvent::Reflux { level, max_correction });
            }

            self.enter(level, SyncPhase::AverageDown);
            average_down(&mut self.hierarchy, level, QuantitySelector::All);

            if let (Some(pre), Some(solver)) = (pre, self.services.solver.as_deref()) {
                self.trace.push((level, SyncPhase::PotentialSync));
                debug!("level {}: {:?}", level, SyncPhase::PotentialSync);

                let delta: Vec<Patch> = potential::density_and_momenta(&self.hierarchy, level)
                    .into_iter()
                    .zip(&pre)
                    .map(|(mut post, pre)| {
                        for (x, y) in post.data_mut().iter_mut().zip(pre.data()) {
                            *x -= y
                        }
                        post
                    })
                    .collect();

                let mass_change = potential::sync(&mut self.hierarchy, level, &delta, solver, &self.time.dt_level)?;
                self.services.sink.report(DiagnosticEvent::PotentialSync { level, finest, mass_change });

                if level == 0 && self.config.gravity.test_solves {
                    self.check_composite()?;
                }
                average_down(&mut self.hierarchy, level, QuantitySelector::All);
            }
        }

        self.enter(level, SyncPhase::DerivedQuantityRefresh);
        let layout = self.hierarchy.layout;
        let eos = &*self.services.eos;
        let lev = self.hierarchy.level_mut(level);

        derived::check_for_nan(lev, StateKind::Hydro, &layout)?;
        let floor = derived::enforce_min_density(lev, &layout, self.config.small_dens, self.config.small_temp, eos)?;
        derived::normalize_species(lev, &layout, self.config.small_x);
        derived::compute_temperature(lev, eos, self.config.small_temp)?;

        if floor.zones > 0 {
            self.services.sink.report(DiagnosticEvent::MinimumDensity {
                level,
                zones: floor.zones,
                mass_added: floor.mass_added,
                eint_added: floor.eint_added,
                eden_added: floor.eden_added,
            });
        }

        if level == 0 && self.config.sum_interval > 0 && self.time.level_steps[0] % self.config.sum_interval == 0 {
            self.report_integrated_sums();
        }
        self.enter(level, SyncPhase::Idle);
        Ok(())
    }


    fn check_composite(&self) -> Result<()> {
        if let Some(solver) = self.services.solver.as_deref() {
            let check = solver.test_composite_solve(&self.hierarchy)?;
            self.services.sink.report(DiagnosticEvent::SolverCheck {
                residual: check.residual,
                tolerance: check.tolerance,
            });
        }
        Ok(())
    }


    /**
     * Report the volume integrals of the conserved quantities over the
     * composite hierarchy, summed over the patches each worker owns and then
     * over the workers.
     */
    fn report_integrated_sums(&self) {
        let rank = Some(self.services.comm.rank());
        let sum = |component| self.services.comm.reduce_sum(self.hierarchy.owned_composite_sum(component, rank));

        self.services.sink.report(DiagnosticEvent::IntegratedSums {
            step: self.time.level_steps[0],
            time: self.time.cum_time + self.time.dt_level[0],
            mass: sum(StateLayout::DENSITY),
            xmom: sum(StateLayout::XMOM),
            ymom: sum(StateLayout::YMOM),
            energy: sum(StateLayout::EDEN),
        });
    }


    fn compute_initial_dt(&mut self) {
        let estimates: Vec<_> = self.hierarchy
            .levels
            .iter()
            .map(|level| self.services.estimator.initial_time_step(level, &*self.services.comm, &*self.services.sink))
            .collect();
        let cycle_counts = self.hierarchy.cycle_counts();

        if let Some(schedule) = scheduler::compute_initial_dt(0, &estimates, &cycle_counts, self.time.cum_time, self.config.stop_time) {
            self.time.apply(schedule);
        }
    }

    fn compute_new_dt(&mut self) {
        let estimates: Vec<_> = self.hierarchy
            .levels
            .iter()
            .enumerate()
            .map(|(n, level)| self.services.estimator.estimate(level, self.time.dt_level[n], &*self.services.comm, &*self.services.sink))
            .collect();
        let cycle_counts = self.hierarchy.cycle_counts();

        let request = ScheduleRequest {
            estimates: &estimates,
            previous_dt: &self.time.dt_level,
            cycle_counts: &cycle_counts,
            change_max: self.config.change_max,
            fixed_dt: self.services.estimator.fixed_dt().is_some(),
            cur_time: self.time.cum_time,
            stop_time: self.config.stop_time,
            post_regrid: self.time.post_regrid,
        };

        if let Some(schedule) = scheduler::compute_new_dt(0, &request) {
            self.time.apply(schedule);
        }
        self.time.post_regrid = false;
    }
}
