//! Run-time configuration for the synchronization core. Optional physics is
//! switched on and off here with plain flags; every optional component has
//! a no-op behavior when its flag is off.

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};




/// Top-level configuration, deserialized from JSON. Every field has a
/// default, so `{}` is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Safety factor applied to the hydro and diffusion limiters.
    #[serde(default = "default_cfl")]
    pub cfl: f64,

    /// Largest time step allowed on any level; it is itself a limiter.
    #[serde(default = "default_max_dt")]
    pub max_dt: f64,

    /// A fixed time step which overrides every limiter.
    #[serde(default)]
    pub fixed_dt: Option<f64>,

    /// Time step for the first coarse step; estimated when absent.
    #[serde(default)]
    pub initial_dt: Option<f64>,

    /// Factor applied to the estimated initial time step.
    #[serde(default = "default_init_shrink")]
    pub init_shrink: f64,

    /// Largest allowed growth factor of a level's time step between steps.
    #[serde(default = "default_change_max")]
    pub change_max: f64,

    #[serde(default)]
    pub stop_time: Option<f64>,

    /// The run stops when the coarse time step falls below this value.
    #[serde(default)]
    pub dt_cutoff: f64,

    #[serde(default = "default_true")]
    pub do_reflux: bool,

    #[serde(default = "default_small_dens")]
    pub small_dens: f64,

    #[serde(default = "default_small_temp")]
    pub small_temp: f64,

    #[serde(default = "default_small_x")]
    pub small_x: f64,

    /// Number of species carried as partial densities in the hydro state.
    #[serde(default)]
    pub num_species: usize,

    /// Ghost zone width of the hydro state.
    #[serde(default = "default_num_ghost")]
    pub num_ghost: i64,

    /// Integrated quantities are summed every `sum_interval` coarse steps
    /// (never when zero).
    #[serde(default)]
    pub sum_interval: u64,

    #[serde(default)]
    pub features: Features,

    #[serde(default)]
    pub limits: LimiterParams,

    #[serde(default)]
    pub gravity: GravityConfig,

    #[serde(default)]
    pub eos: EosConfig,
}

fn default_cfl() -> f64 { 0.8 }
fn default_max_dt() -> f64 { 1.0e200 }
fn default_init_shrink() -> f64 { 1.0 }
fn default_change_max() -> f64 { 1.1 }
fn default_true() -> bool { true }
fn default_small_dens() -> f64 { 1.0e-12 }
fn default_small_temp() -> f64 { 1.0e-8 }
fn default_small_x() -> f64 { 1.0e-30 }
fn default_num_ghost() -> i64 { 2 }




/// Physical processes enabled for the run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Features {
    #[serde(default = "default_true")]
    pub hydro: bool,

    #[serde(default)]
    pub diffuse_temp: bool,

    #[serde(default)]
    pub diffuse_enth: bool,

    #[serde(default)]
    pub reactions: bool,

    #[serde(default)]
    pub radiation: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            hydro: true,
            diffuse_temp: false,
            diffuse_enth: false,
            reactions: false,
            radiation: false,
        }
    }
}




/// Parameters of the reference limiter kernels.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimiterParams {
    /// Thermal conductivity used by the diffusion limiters.
    #[serde(default)]
    pub conductivity: f64,

    /// Largest fraction of the internal energy which burning may release
    /// in one step.
    #[serde(default = "default_dtnuc_e")]
    pub dtnuc_e: f64,

    /// Largest relative change of the radiation energy in one step.
    #[serde(default = "default_rad_change")]
    pub radiation_change: f64,

    /// Radiation energy density below which a zone places no bound on the
    /// time step.
    #[serde(default = "default_small_er")]
    pub small_er: f64,
}

fn default_dtnuc_e() -> f64 { 0.5 }
fn default_rad_change() -> f64 { 0.1 }
fn default_small_er() -> f64 { 1.0e-30 }

impl Default for LimiterParams {
    fn default() -> Self {
        Self {
            conductivity: 0.0,
            dtnuc_e: default_dtnuc_e(),
            radiation_change: default_rad_change(),
            small_er: default_small_er(),
        }
    }
}




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GravityKind {
    None,
    /// A uniform, analytic field. Never re-synchronized.
    Constant,
    /// Self-gravity solved from the density distribution.
    Monopole,
}

impl Default for GravityKind {
    fn default() -> Self {
        GravityKind::None
    }
}




#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GravityConfig {
    #[serde(default)]
    pub kind: GravityKind,

    /// Skip the cross-level potential correction after refluxing.
    #[serde(default)]
    pub no_sync: bool,

    /// Solve levels independently rather than as a composite hierarchy;
    /// composite corrections are then unavailable.
    #[serde(default)]
    pub no_composite: bool,

    /// Check the composite solve before and after each synchronization.
    #[serde(default)]
    pub test_solves: bool,

    /// Relative residual above which the composite check reports failure.
    #[serde(default = "default_solver_tolerance")]
    pub tolerance: f64,

    #[serde(default = "default_constant_gravity")]
    pub constant: (f64, f64),

    #[serde(default = "default_gravitational_constant")]
    pub gravitational_constant: f64,

    #[serde(default = "default_center")]
    pub center: (f64, f64),
}

fn default_solver_tolerance() -> f64 { 1.0e-10 }
fn default_constant_gravity() -> (f64, f64) { (0.0, -1.0) }
fn default_gravitational_constant() -> f64 { 1.0 }
fn default_center() -> (f64, f64) { (0.5, 0.5) }

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            kind: GravityKind::None,
            no_sync: false,
            no_composite: false,
            test_solves: false,
            tolerance: default_solver_tolerance(),
            constant: default_constant_gravity(),
            gravitational_constant: default_gravitational_constant(),
            center: default_center(),
        }
    }
}




#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EosConfig {
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    /// Specific heat at constant volume.
    #[serde(default = "default_cv")]
    pub cv: f64,
}

fn default_gamma() -> f64 { 5.0 / 3.0 }
fn default_cv() -> f64 { 1.0 }

impl Default for EosConfig {
    fn default() -> Self {
        Self {
            gamma: default_gamma(),
            cv: default_cv(),
        }
    }
}




// ============================================================================
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cfl: default_cfl(),
            max_dt: default_max_dt(),
            fixed_dt: None,
            initial_dt: None,
            init_shrink: default_init_shrink(),
            change_max: default_change_max(),
            stop_time: None,
            dt_cutoff: 0.0,
            do_reflux: true,
            small_dens: default_small_dens(),
            small_temp: default_small_temp(),
            small_x: default_small_x(),
            num_species: 0,
            num_ghost: default_num_ghost(),
            sum_interval: 0,
            features: Features::default(),
            limits: LimiterParams::default(),
            gravity: GravityConfig::default(),
            eos: EosConfig::default(),
        }
    }
}

impl SyncConfig {

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Check the configuration for values and combinations which cannot
    /// run. This happens once at setup; no partial run proceeds on error.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(Error::Config(message));

        if !(self.cfl > 0.0 && self.cfl <= 1.0) {
            return fail(format!("cfl must be in (0, 1], got {}", self.cfl));
        }
        if !(self.change_max >= 1.0) {
            return fail(format!("change_max must be at least 1, got {}", self.change_max));
        }
        if !(self.max_dt > 0.0) {
            return fail(format!("max_dt must be positive, got {}", self.max_dt));
        }
        if let Some(fixed_dt) = self.fixed_dt {
            if !(fixed_dt > 0.0) {
                return fail(format!("fixed_dt must be positive, got {}", fixed_dt));
            }
            if self.max_dt < fixed_dt {
                return fail("cannot have max_dt < fixed_dt".to_string());
            }
        }
        if let Some(initial_dt) = self.initial_dt {
            if !(initial_dt > 0.0) {
                return fail(format!("initial_dt must be positive, got {}", initial_dt));
            }
        }
        if !(self.init_shrink > 0.0 && self.init_shrink <= 1.0) {
            return fail(format!("init_shrink must be in (0, 1], got {}", self.init_shrink));
        }
        if !(self.dt_cutoff >= 0.0) {
            return fail(format!("dt_cutoff must be non-negative, got {}", self.dt_cutoff));
        }
        if !(self.small_dens > 0.0) {
            return fail(format!("small_dens must be positive, got {}", self.small_dens));
        }
        if !(self.small_temp > 0.0) {
            return fail(format!("small_temp must be positive, got {}", self.small_temp));
        }
        if self.num_ghost < 1 {
            return fail(format!("num_ghost must be at least 1, got {}", self.num_ghost));
        }
        if self.features.radiation && !self.features.hydro {
            return fail("the radiation limiter requires hydro to be enabled".to_string());
        }
        if (self.features.diffuse_temp || self.features.diffuse_enth) && !(self.limits.conductivity > 0.0) {
            return fail("diffusion is enabled but the conductivity is not positive".to_string());
        }
        if self.eos.gamma <= 1.0 || self.eos.cv <= 0.0 {
            return fail("the gamma-law index must exceed one and cv must be positive".to_string());
        }
        if self.gravity.kind == GravityKind::Monopole && !(self.gravity.gravitational_constant > 0.0) {
            return fail("self-gravity requires a positive gravitational constant".to_string());
        }
        if self.gravity.test_solves && self.gravity.kind != GravityKind::Monopole {
            return fail("composite solve checks need a solver for the density field".to_string());
        }
        Ok(())
    }

    /// Refluxing is pointless, and therefore switched off, without hydro.
    pub fn reflux_enabled(&self) -> bool {
        self.do_reflux && self.features.hydro
    }

    /// Whether a cross-level potential correction follows refluxing.
    pub fn potential_sync_enabled(&self) -> bool {
        self.gravity.kind == GravityKind::Monopole && !self.gravity.no_sync && !self.gravity.no_composite
    }
}
