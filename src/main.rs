use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use log::{info, LevelFilter};
use gridsync::checkpoint::{Checkpoint, CheckpointFormat};
use gridsync::config::{GravityKind, SyncConfig};
use gridsync::driver::{new_level, Services, Simulation};
use gridsync::geometry::Geometry;
use gridsync::hydro::euler::Primitive;
use gridsync::index_space::range2d;
use gridsync::level::Hierarchy;
use gridsync::patch_set::GridPatchSet;
use gridsync::state::{StateKind, StateLayout};
use gridsync::{Error, Result};




#[derive(Debug, Parser)]
#[clap(version = "0.1", about = "Two-level blast wave with self-gravity")]
struct Opts {
    /// JSON run configuration; a self-gravitating blast wave by default
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(long)]
    stop_time: Option<f64>,

    #[clap(short = 'n', long)]
    max_steps: Option<u64>,

    #[clap(short = 't', long, default_value = "1")]
    threads: usize,

    /// Write a checkpoint here when the run ends
    #[clap(long)]
    checkpoint: Option<PathBuf>,

    /// Resume from this checkpoint
    #[clap(long)]
    restart: Option<PathBuf>,

    #[clap(long, default_value = "cbor")]
    format: CheckpointFormat,

    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u64,
}




// ============================================================================
fn default_config() -> SyncConfig {
    let mut config = SyncConfig {
        stop_time: Some(0.1),
        sum_interval: 10,
        ..SyncConfig::default()
    };
    config.gravity.kind = GravityKind::Monopole;
    config.gravity.gravitational_constant = 0.1;
    config
}

fn blast_wave(config: &SyncConfig) -> Result<Hierarchy> {
    let layout = StateLayout::new(config.num_species);
    let gamma = config.eos.gamma;
    let g0 = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (64, 64));
    let coarse = GridPatchSet::new(vec![range2d(0..32, 0..64), range2d(32..64, 0..64)])?;
    let fine = GridPatchSet::new(vec![range2d(32..64, 32..96), range2d(64..96, 32..96)])?;

    let levels = vec![
        new_level(0, g0.clone(), coarse, config, 0.0),
        new_level(1, g0.refine(2), fine, config, 0.0),
    ];
    let mut hierarchy = Hierarchy::new(levels, vec![2], layout)?;

    for level in &mut hierarchy.levels {
        let geometry = level.geometry.clone();

        for patch in level.state_mut(StateKind::Hydro).new_data_mut() {
            let space = patch.index_space();

            for index in space.iter() {
                let (x, y) = geometry.cell_center(index);
                let r = ((x - 0.5).powi(2) + (y - 0.5).powi(2)).sqrt();
                let p = Primitive::new(1.0, 0.0, 0.0, 0.0, if r < 0.1 { 10.0 } else { 0.1 });
                let u = patch.get_slice_mut(index);

                p.to_conserved(gamma).write_to_slice(u);
                u[StateLayout::EINT] = p.mass_density() * p.specific_internal_energy(gamma);

                for s in layout.species() {
                    u[s] = p.mass_density() / config.num_species as f64;
                }
            }
        }
    }
    Ok(hierarchy)
}




// ============================================================================
fn main() -> Result<()> {
    let opts = Opts::parse();

    let level = match opts.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .map_err(|e| Error::Config(e.to_string()))?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(opts.threads)
        .build_global()
        .map_err(|e| Error::Config(e.to_string()))?;

    let mut config = match &opts.config {
        Some(path) => SyncConfig::from_json_file(path)?,
        None => default_config(),
    };
    if let Some(stop_time) = opts.stop_time {
        config.stop_time = Some(stop_time);
    }
    config.validate()?;

    let services = Services::reference(&config);

    let mut simulation = match &opts.restart {
        Some(path) => Simulation::restart(config.clone(), Checkpoint::read_file(path, opts.format)?, services)?,
        None => {
            let mut simulation = Simulation::new(config.clone(), blast_wave(&config)?, services)?;
            simulation.init()?;
            simulation
        }
    };

    let stop = simulation.stop_handle();
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))?;

    let steps = simulation.run(opts.max_steps)?;
    info!("took {} coarse steps, t={:.6e}", steps, simulation.bookkeeping().cum_time);

    if let Some(path) = &opts.checkpoint {
        simulation.checkpoint().write_file(path, opts.format)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}
