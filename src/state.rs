use serde::{Deserialize, Serialize};
use crate::index_space::IndexSpace;
use crate::patch::Patch;




/**
 * The kinds of state carried by a level. Each has its own container, ghost
 * width, and boundary fill rule.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// Conserved hydrodynamic variables, laid out by [`StateLayout`].
    Hydro,
    /// Gravitational potential.
    PhiGrav,
    /// Gravitational acceleration, two components.
    GravVector,
    /// Auxiliary source accumulator, same layout as `Hydro`.
    Source,
    /// Specific energy release rate from the reaction network.
    Reactions,
    /// Radiation energy density.
    Radiation,
}

impl StateKind {
    pub fn name(self) -> &'static str {
        match self {
            StateKind::Hydro => "hydro",
            StateKind::PhiGrav => "phi_grav",
            StateKind::GravVector => "grav_vector",
            StateKind::Source => "source",
            StateKind::Reactions => "reactions",
            StateKind::Radiation => "radiation",
        }
    }

    /// Whether this kind holds conserved quantities which are refluxed.
    pub fn is_conserved(self) -> bool {
        matches!(self, StateKind::Hydro | StateKind::Radiation)
    }
}




/**
 * Component layout of the hydrodynamic state: density, three momenta,
 * total and internal energy densities, temperature, then the partial
 * densities of each species.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLayout {
    pub num_species: usize,
}

impl StateLayout {
    pub const DENSITY: usize = 0;
    pub const XMOM: usize = 1;
    pub const YMOM: usize = 2;
    pub const ZMOM: usize = 3;
    pub const EDEN: usize = 4;
    pub const EINT: usize = 5;
    pub const TEMP: usize = 6;
    pub const FIRST_SPEC: usize = 7;

    pub fn new(num_species: usize) -> Self {
        Self { num_species }
    }

    pub fn num_fields(&self) -> usize {
        Self::FIRST_SPEC + self.num_species
    }

    pub fn species(&self) -> std::ops::Range<usize> {
        Self::FIRST_SPEC..Self::FIRST_SPEC + self.num_species
    }

    pub fn momentum(axis: usize) -> usize {
        Self::XMOM + axis
    }

    pub fn component_name(&self, n: usize) -> String {
        match n {
            Self::DENSITY => "density".to_string(),
            Self::XMOM => "xmom".to_string(),
            Self::YMOM => "ymom".to_string(),
            Self::ZMOM => "zmom".to_string(),
            Self::EDEN => "rho_E".to_string(),
            Self::EINT => "rho_e".to_string(),
            Self::TEMP => "Temp".to_string(),
            n if n < self.num_fields() => format!("species_{}", n - Self::FIRST_SPEC),
            n => format!("component_{}", n),
        }
    }
}




/**
 * The storage of one state kind on one level: a patch per box of the
 * level's patch set, at an old and a new time. Both snapshots carry the
 * same ghost width.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateContainer {
    num_fields: usize,
    num_guard: i64,
    old_time: f64,
    new_time: f64,
    old: Option<Vec<Patch>>,
    new: Vec<Patch>,
}




// ============================================================================
impl StateContainer {

    /**
     * Allocate a container of zeros for the given boxes, with no old data.
     */
    pub fn new(boxes: &[IndexSpace], num_guard: i64, num_fields: usize, time: f64) -> Self {
        Self {
            num_fields,
            num_guard,
            old_time: time,
            new_time: time,
            old: None,
            new: boxes.iter().map(|b| Patch::zeros(b.clone(), num_guard, num_fields)).collect(),
        }
    }


    pub fn num_fields(&self) -> usize {
        self.num_fields
    }


    pub fn num_guard(&self) -> i64 {
        self.num_guard
    }


    pub fn old_time(&self) -> f64 {
        self.old_time
    }


    pub fn new_time(&self) -> f64 {
        self.new_time
    }


    pub fn has_old_data(&self) -> bool {
        self.old.is_some()
    }


    pub fn new_data(&self) -> &[Patch] {
        &self.new
    }


    pub fn new_data_mut(&mut self) -> &mut [Patch] {
        &mut self.new
    }


    /**
     * Return the old-time patches. Panics if the container has never been
     * advanced.
     */
    pub fn old_data(&self) -> &[Patch] {
        self.old.as_deref().expect("state container has no old data")
    }


    /**
     * Copy the new data into the old slot, and advance the new time stamp by
     * `dt`. The new data is left in place as the starting point for the
     * update.
     */
    pub fn swap_time_levels(&mut self, dt: f64) {
        assert!(dt >= 0.0, "time step must be non-negative");
        self.old = Some(self.new.clone());
        self.old_time = self.new_time;
        self.new_time = self.old_time + dt;
    }


    /**
     * Place the new time stamp exactly on `time`, which must not precede the
     * old time stamp.
     */
    pub fn snap_new_time(&mut self, time: f64) {
        assert!(time >= self.old_time, "new time stamp would precede old time stamp");
        self.new_time = time;
    }


    /**
     * Return the patch data at time `t`, linearly interpolated between the
     * old and new snapshots. Falls back to the new data when there is no old
     * data or the two stamps coincide.
     */
    pub fn data_at_time(&self, t: f64) -> Vec<Patch> {
        match &self.old {
            Some(old) if self.new_time > self.old_time => {
                let a = ((t - self.old_time) / (self.new_time - self.old_time)).max(0.0).min(1.0);
                old.iter().zip(&self.new).map(|(p0, p1)| {
                    let mut p = p0.clone();
                    for (x, y) in p.data_mut().iter_mut().zip(p1.data()) {
                        *x = (1.0 - a) * *x + a * y;
                    }
                    p
                }).collect()
            }
            _ => self.new.clone(),
        }
    }
}
