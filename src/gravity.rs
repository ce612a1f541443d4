use std::ops::RangeInclusive;
use crate::error::Result;
use crate::level::Hierarchy;
use crate::patch::Patch;
use crate::potential::{EllipticSolver, FieldSolution, FieldSource, SolverCheck};
use crate::state::{StateKind, StateLayout};




/**
 * Self-gravity of a mass distribution which is treated as symmetric about a
 * center (in two dimensions, an infinitely long cylinder). The acceleration
 * at radius `r` is `-2 G λ(<r) / r`, directed toward the center, where
 * `λ(<r)` is the mass per unit length enclosed. Mass is binned on the
 * composite hierarchy (each level's zones not covered by a finer level) into
 * shells half as wide as the finest zones.
 */
#[derive(Clone, Debug)]
pub struct MonopoleSolver {
    pub gravitational_constant: f64,
    pub center: (f64, f64),
    pub tolerance: f64,
}




/**
 * A uniform, analytic acceleration. It does not depend on the density, so
 * it is never re-synchronized.
 */
#[derive(Clone, Debug)]
pub struct ConstantGravity {
    pub g: (f64, f64),
}




// ============================================================================
struct RadialProfile {
    dr: f64,
    enclosed: Vec<f64>,
    phi: Vec<f64>,
}

impl RadialProfile {
    fn bin(&self, r: f64) -> usize {
        ((r / self.dr) as usize).min(self.enclosed.len() - 1)
    }
}




// ============================================================================
impl MonopoleSolver {

    fn radius(&self, x: (f64, f64)) -> (f64, f64, f64) {
        let dx = x.0 - self.center.0;
        let dy = x.1 - self.center.1;
        ((dx * dx + dy * dy).sqrt(), dx, dy)
    }

    /**
     * Bin the mass given by `density(level, patch, index)` over the
     * uncovered zones of the given levels, and integrate the enclosed mass
     * and the potential.
     */
    fn profile<F>(&self, hierarchy: &Hierarchy, levels: RangeInclusive<usize>, density: F) -> RadialProfile
    where
        F: Fn(usize, usize, (i64, i64)) -> f64
    {
        let finest = hierarchy.level(hierarchy.finest_level()).geometry.cell_size;
        let dr = 0.5 * finest.0.min(finest.1);
        let domain = &hierarchy.level(0).geometry;
        let (i1, j1) = domain.domain.end();
        let corner = (domain.lower.0 + domain.cell_size.0 * i1 as f64, domain.lower.1 + domain.cell_size.1 * j1 as f64);
        let r_max = [domain.lower, corner, (domain.lower.0, corner.1), (corner.0, domain.lower.1)]
            .iter()
            .map(|&x| self.radius(x).0)
            .fold(0.0, f64::max);

        let num_bins = (r_max / dr) as usize + 2;
        let mut mass = vec![0.0; num_bins];

        for lev in levels {
            let level = hierarchy.level(lev);
            let volume = level.geometry.cell_volume();
            let footprints = if lev < hierarchy.finest_level() {
                hierarchy.level(lev + 1).patches.coarsened(hierarchy.ref_ratio[lev])
            } else {
                Vec::new()
            };
            for (n, b) in level.patches.boxes().iter().enumerate() {
                for index in b.iter().filter(|index| !footprints.iter().any(|f| f.contains(*index))) {
                    let r = self.radius(level.geometry.cell_center(index)).0;
                    let k = ((r / dr) as usize).min(num_bins - 1);
                    mass[k] += density(lev, n, index) * volume;
                }
            }
        }

        // enclosed mass at the center of each shell counts half of that shell
        let mut enclosed = vec![0.0; num_bins];
        let mut below = 0.0;
        for k in 0..num_bins {
            enclosed[k] = below + 0.5 * mass[k];
            below += mass[k];
        }

        let two_g = 2.0 * self.gravitational_constant;
        let mut phi = vec![0.0; num_bins];
        let r_outer = (num_bins as f64 - 0.5) * dr;
        phi[num_bins - 1] = two_g * below * r_outer.ln();

        for k in (0..num_bins - 1).rev() {
            let r = (k as f64 + 1.0) * dr;
            let lambda = 0.5 * (enclosed[k] + enclosed[k + 1]);
            phi[k] = phi[k + 1] - two_g * lambda / r * dr;
        }
        RadialProfile { dr, enclosed, phi }
    }

    fn evaluate(&self, hierarchy: &Hierarchy, levels: RangeInclusive<usize>, profile: &RadialProfile) -> FieldSolution {
        let two_g = 2.0 * self.gravitational_constant;
        let mut solution = FieldSolution { phi: Vec::new(), grav: Vec::new() };

        for lev in levels {
            let level = hierarchy.level(lev);
            let mut phi = Vec::new();
            let mut grav = Vec::new();

            for b in level.patches.boxes() {
                phi.push(Patch::from_slice_function(b.clone(), 0, 1, |index, p| {
                    let (r, _, _) = self.radius(level.geometry.cell_center(index));
                    p[0] = profile.phi[profile.bin(r)];
                }));
                grav.push(Patch::from_slice_function(b.clone(), 0, 2, |index, g| {
                    let (r, dx, dy) = self.radius(level.geometry.cell_center(index));
                    if r > 0.0 {
                        let magnitude = -two_g * profile.enclosed[profile.bin(r)] / r;
                        g[0] = magnitude * dx / r;
                        g[1] = magnitude * dy / r;
                    } else {
                        g[0] = 0.0;
                        g[1] = 0.0;
                    }
                }));
            }
            solution.phi.push(phi);
            solution.grav.push(grav);
        }
        solution
    }
}




// ============================================================================
impl EllipticSolver for MonopoleSolver {

    fn is_self_gravitating(&self) -> bool {
        true
    }

    fn composite_corrections(&self) -> bool {
        true
    }

    fn solve_or_correct_field(&self, hierarchy: &Hierarchy, levels: RangeInclusive<usize>, source: FieldSource) -> Result<FieldSolution> {
        let profile = match source {
            FieldSource::Density => {
                self.profile(hierarchy, 0..=hierarchy.finest_level(), |lev, n, index| {
                    hierarchy.level(lev).state(StateKind::Hydro).new_data()[n].get(index, StateLayout::DENSITY)
                })
            }
            FieldSource::DensityDelta { level, delta } => {
                self.profile(hierarchy, level..=level, |_, n, index| delta[n].get(index, 0))
            }
        };
        Ok(self.evaluate(hierarchy, levels, &profile))
    }

    fn test_composite_solve(&self, hierarchy: &Hierarchy) -> Result<SolverCheck> {
        let finest = hierarchy.finest_level();
        let fresh = self.solve_or_correct_field(hierarchy, 0..=finest, FieldSource::Density)?;
        let mut max_diff: f64 = 0.0;
        let mut max_norm: f64 = 0.0;

        for (lev, solved) in fresh.grav.iter().enumerate() {
            if let Some(state) = hierarchy.level(lev).states.get(&StateKind::GravVector) {
                for (stored, solved) in state.new_data().iter().zip(solved) {
                    for (index, g) in solved.iter_valid() {
                        let s = stored.get_slice(index);
                        max_diff = max_diff.max((s[0] - g[0]).abs()).max((s[1] - g[1]).abs());
                        max_norm = max_norm.max(g[0].abs()).max(g[1].abs());
                    }
                }
            }
        }
        let residual = if max_norm > 0.0 { max_diff / max_norm } else { max_diff };
        Ok(SolverCheck { residual, tolerance: self.tolerance })
    }
}




// ============================================================================
impl EllipticSolver for ConstantGravity {

    fn is_self_gravitating(&self) -> bool {
        false
    }

    fn composite_corrections(&self) -> bool {
        false
    }

    fn solve_or_correct_field(&self, hierarchy: &Hierarchy, levels: RangeInclusive<usize>, source: FieldSource) -> Result<FieldSolution> {
        let scale = match source {
            FieldSource::Density => 1.0,
            FieldSource::DensityDelta { .. } => 0.0,
        };
        let mut solution = FieldSolution { phi: Vec::new(), grav: Vec::new() };

        for lev in levels {
            let level = hierarchy.level(lev);
            solution.phi.push(level.patches.boxes().iter().map(|b| {
                Patch::from_slice_function(b.clone(), 0, 1, |index, p| {
                    let x = level.geometry.cell_center(index);
                    p[0] = -scale * (self.g.0 * x.0 + self.g.1 * x.1);
                })
            }).collect());
            solution.grav.push(level.patches.boxes().iter().map(|b| {
                Patch::from_slice_function(b.clone(), 0, 2, |_, g| {
                    g[0] = scale * self.g.0;
                    g[1] = scale * self.g.1;
                })
            }).collect());
        }
        Ok(solution)
    }

    fn test_composite_solve(&self, _: &Hierarchy) -> Result<SolverCheck> {
        Ok(SolverCheck { residual: 0.0, tolerance: 0.0 })
    }
}
