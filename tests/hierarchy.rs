use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use gridsync::checkpoint::CheckpointFormat;
use gridsync::config::{GravityKind, SyncConfig};
use gridsync::diagnostics::LogSink;
use gridsync::driver::{new_level, Services, Simulation};
use gridsync::geometry::Geometry;
use gridsync::hydro::euler::Primitive;
use gridsync::index_space::{range2d, Axis};
use gridsync::level::{Hierarchy, Level};
use gridsync::message::SerialCommunicator;
use gridsync::patch_set::GridPatchSet;
use gridsync::reflux::reflux;
use gridsync::scheduler::{compute_new_dt, ScheduleRequest};
use gridsync::state::{StateKind, StateLayout};
use gridsync::timestep::{Limiter, StableDtKernel, TimestepEstimate, TimestepEstimator};




// ============================================================================
fn blast(config: &SyncConfig) -> Hierarchy {
    let layout = StateLayout::new(config.num_species);
    let g0 = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (16, 16));
    let coarse = GridPatchSet::new(vec![range2d(0..8, 0..16), range2d(8..16, 0..16)]).unwrap();
    let fine = GridPatchSet::new(vec![range2d(8..16, 8..24), range2d(16..24, 8..24)]).unwrap();
    let l0 = new_level(0, g0.clone(), coarse, config, 0.0);
    let l1 = new_level(1, g0.refine(2), fine, config, 0.0);
    let mut h = Hierarchy::new(vec![l0, l1], vec![2], layout).unwrap();

    for level in &mut h.levels {
        let geometry = level.geometry.clone();
        for patch in level.state_mut(StateKind::Hydro).new_data_mut() {
            for index in patch.index_space().iter() {
                let (x, y) = geometry.cell_center(index);
                let r2 = (x - 0.45).powi(2) + (y - 0.55).powi(2);
                let p = if r2 < 0.02 { 10.0 } else { 0.1 };
                let prim = Primitive::new(1.0 + 0.5 * x, 0.0, 0.0, 0.0, p);
                prim.to_conserved(config.eos.gamma).write_to_slice(patch.get_slice_mut(index));
                patch.set(index, StateLayout::EINT, prim.mass_density() * prim.specific_internal_energy(config.eos.gamma));
                patch.set(index, StateLayout::FIRST_SPEC, prim.mass_density());
            }
        }
    }
    h
}

fn simulation(config: SyncConfig) -> Simulation {
    let services = Services::reference(&config).with_sink(Arc::new(LogSink));
    let hierarchy = blast(&config);
    let mut sim = Simulation::new(config, hierarchy, services).unwrap();
    sim.init().unwrap();
    sim
}

fn config(gravity: GravityKind) -> SyncConfig {
    let mut config = SyncConfig { num_species: 1, ..SyncConfig::default() };
    config.gravity.kind = gravity;
    config.gravity.gravitational_constant = 0.1;
    config.gravity.center = (0.5, 0.5);
    config
}

fn relative_change(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(b.abs())
}




// ============================================================================
#[test]
fn composite_mass_and_energy_are_conserved_with_reflecting_walls() {
    let mut sim = simulation(config(GravityKind::None));
    let mass = sim.hierarchy().composite_sum(StateLayout::DENSITY);
    let energy = sim.hierarchy().composite_sum(StateLayout::EDEN);
    let species = sim.hierarchy().composite_sum(StateLayout::FIRST_SPEC);

    sim.run(Some(4)).unwrap();

    let h = sim.hierarchy();
    assert!(relative_change(mass, h.composite_sum(StateLayout::DENSITY)) < 1e-12);
    assert!(relative_change(energy, h.composite_sum(StateLayout::EDEN)) < 1e-12);
    assert!(relative_change(species, h.composite_sum(StateLayout::FIRST_SPEC)) < 1e-12);
}

#[test]
fn composite_mass_is_conserved_under_self_gravity() {
    let mut sim = simulation(config(GravityKind::Monopole));
    let mass = sim.hierarchy().composite_sum(StateLayout::DENSITY);
    sim.run(Some(3)).unwrap();
    assert!(relative_change(mass, sim.hierarchy().composite_sum(StateLayout::DENSITY)) < 1e-12);
}

#[test]
fn coarse_zones_under_the_fine_level_equal_the_fine_average() {
    let mut sim = simulation(config(GravityKind::Monopole));
    sim.run(Some(2)).unwrap();

    let h = sim.hierarchy();
    let fine = &h.level(1).state(StateKind::Hydro).new_data()[1];
    let coarse = &h.level(0).state(StateKind::Hydro).new_data()[1];

    for (i, j) in range2d(8..12, 4..12).iter() {
        let children = [(2 * i, 2 * j), (2 * i + 1, 2 * j), (2 * i, 2 * j + 1), (2 * i + 1, 2 * j + 1)];
        let mean = children.iter().map(|&c| fine.get(c, StateLayout::DENSITY)).sum::<f64>() / 4.0;
        assert!((coarse.get((i, j), StateLayout::DENSITY) - mean).abs() < 1e-13);
    }
}




// ============================================================================
fn hydro(dt: f64) -> TimestepEstimate {
    TimestepEstimate { dt, limiter: Limiter::Hydro }
}

fn request<'a>(estimates: &'a [TimestepEstimate], previous_dt: &'a [f64], cycle_counts: &'a [u64]) -> ScheduleRequest<'a> {
    ScheduleRequest {
        estimates,
        previous_dt,
        cycle_counts,
        change_max: 1.1,
        fixed_dt: false,
        cur_time: 0.0,
        stop_time: None,
        post_regrid: false,
    }
}

#[test]
fn single_level_growth_is_limited_by_change_max() {
    let schedule = compute_new_dt(0, &request(&[hydro(2.0)], &[1.0], &[1])).unwrap();
    assert!((schedule.dt_level[0] - 1.1).abs() < 1e-15);
    assert_eq!(schedule.limiter, Limiter::Hydro);
}

#[test]
fn fine_level_with_ratio_two_controls_the_coarse_step() {
    let schedule = compute_new_dt(0, &request(&[hydro(1.0), hydro(0.3)], &[10.0, 10.0], &[1, 2])).unwrap();
    assert!((schedule.dt_level[0] - 0.6).abs() < 1e-15);
    assert!((schedule.dt_level[1] - 0.3).abs() < 1e-15);
}

#[test]
fn final_step_is_truncated_to_land_on_the_stop_time() {
    let (estimates, previous, counts) = ([hydro(1.2)], [1.2], [1]);
    let r = ScheduleRequest { cur_time: 9.0, stop_time: Some(9.95), change_max: 2.0, ..request(&estimates, &previous, &counts) };
    let schedule = compute_new_dt(0, &r).unwrap();
    assert!((schedule.dt_level[0] - 0.95).abs() < 1e-12);
    assert!(schedule.stop_time_reached);
}

#[test]
fn reflux_adds_the_register_over_the_zone_volume() {
    let g0 = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (8, 8));
    let layout = StateLayout::new(0);
    let mut l0 = Level::new(0, g0.clone(), GridPatchSet::new(vec![range2d(0..8, 0..8)]).unwrap());
    let mut l1 = Level::new(1, g0.refine(2), GridPatchSet::new(vec![range2d(4..12, 4..12)]).unwrap());
    l0.add_state(StateKind::Hydro, 2, layout.num_fields(), 0.0);
    l1.add_state(StateKind::Hydro, 2, layout.num_fields(), 0.0);
    let mut h = Hierarchy::new(vec![l0, l1], vec![2], layout).unwrap();

    let mut delta = vec![0.0; layout.num_fields()];
    delta[StateLayout::DENSITY] = 0.5;

    h.level_mut(1)
        .flux_registers
        .get_mut(&StateKind::Hydro)
        .unwrap()
        .add_to_face(Axis::J, (3, 6), &delta);

    reflux(&mut h, 0);

    let volume = h.level(0).geometry.cell_volume();
    let rho = h.level(0).state(StateKind::Hydro).new_data()[0].get((3, 6), StateLayout::DENSITY);
    assert_eq!(rho, 0.5 / volume);
}




// ============================================================================
struct CountingKernel {
    calls: Arc<AtomicUsize>,
}

impl StableDtKernel for CountingKernel {
    fn limiter(&self) -> Limiter {
        Limiter::Hydro
    }

    fn estimate_stable_dt(&self, _level: &Level, _patch: usize, _previous_dt: f64) -> f64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        0.1
    }
}

#[test]
fn fixed_time_step_bypasses_the_limiter_kernels() {
    let config = SyncConfig { fixed_dt: Some(0.5), ..SyncConfig::default() };
    let calls = Arc::new(AtomicUsize::new(0));
    let estimator = TimestepEstimator::new(&config, vec![Box::new(CountingKernel { calls: calls.clone() })]);

    let mut level = Level::new(0, Geometry::uniform((0.0, 0.0), (1.0, 1.0), (8, 8)), GridPatchSet::new(vec![range2d(0..8, 0..8)]).unwrap());
    level.add_state(StateKind::Hydro, 2, StateLayout::new(0).num_fields(), 0.0);

    let estimate = estimator.estimate(&level, 1.0, &SerialCommunicator, &LogSink);
    assert_eq!(estimate.dt, 0.5);
    assert_eq!(estimate.limiter, Limiter::Fixed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}




// ============================================================================
fn restart_reproduces_time_steps(format: CheckpointFormat) {
    let config = config(GravityKind::Monopole);
    let mut sim = simulation(config.clone());
    sim.run(Some(2)).unwrap();

    let mut bytes = Vec::new();
    sim.checkpoint().write_to(&mut bytes, format).unwrap();

    let mut continued = Vec::new();
    for _ in 0..3 {
        sim.advance_coarse_step().unwrap();
        continued.push(sim.bookkeeping().dt_level.clone());
    }

    let checkpoint = gridsync::checkpoint::Checkpoint::read_from(bytes.as_slice(), format).unwrap();
    let services = Services::reference(&config).with_sink(Arc::new(LogSink));
    let mut restarted = Simulation::restart(config, checkpoint, services).unwrap();

    let mut replayed = Vec::new();
    for _ in 0..3 {
        restarted.advance_coarse_step().unwrap();
        replayed.push(restarted.bookkeeping().dt_level.clone());
    }

    assert_eq!(continued, replayed);
    assert_eq!(sim.bookkeeping().cum_time, restarted.bookkeeping().cum_time);
    assert_eq!(
        sim.hierarchy().composite_sum(StateLayout::EDEN),
        restarted.hierarchy().composite_sum(StateLayout::EDEN));
}

#[test]
fn restart_from_cbor_reproduces_time_steps() {
    restart_reproduces_time_steps(CheckpointFormat::Cbor);
}

#[test]
fn restart_from_msgpack_reproduces_time_steps() {
    restart_reproduces_time_steps(CheckpointFormat::MessagePack);
}
