use crate::error::Result;
use crate::flux_register::FaceFluxes;
use crate::geometry::Geometry;
use crate::index_space::Axis;
use crate::patch::Patch;
use crate::state::StateLayout;
use super::euler::{self, Conserved, Primitive};




/**
 * The hydrodynamics update of one patch over one time step. The kernel
 * receives the conserved state at the start of the step with its guard
 * zones filled, overwrites the valid zones with the state at the end of the
 * step, and returns the fluxes it used on every face of the valid region.
 * The flux registers are built from the returned fluxes, so they must be
 * exactly the fluxes which were differenced.
 */
pub trait FluxKernel: Send + Sync {
    fn compute_fluxes_and_update(&self, geometry: &Geometry, state: &mut Patch, gravity: Option<&Patch>, dt: f64) -> Result<FaceFluxes>;
}




/**
 * First-order Godunov scheme for the 2D Euler equations, with HLLE fluxes.
 * The internal energy and the species partial densities are advected with
 * the mass flux, upwinded; the temperature has no flux. A gravitational
 * acceleration, when given, is applied as an explicit source term
 * evaluated from the state at the start of the step.
 */
#[derive(Clone, Debug)]
pub struct EulerKernel {
    pub gamma_law_index: f64,
    pub layout: StateLayout,
}




// ============================================================================
impl EulerKernel {

    fn primitive(&self, state: &Patch) -> Result<Patch> {
        let valid = state.valid_space();
        let space = valid.extend_all(1);
        let mut prim = Patch::zeros(space.clone(), 0, 5);

        // corner zones are not read by the face fluxes
        let is_corner = |(i, j): (i64, i64)| !valid.range(Axis::I).contains(&i) && !valid.range(Axis::J).contains(&j);

        for index in space.iter().filter(|&index| !is_corner(index)) {
            let p = Conserved::from_slice(state.get_slice(index)).to_primitive(self.gamma_law_index)?;
            let slot = prim.get_slice_mut(index);
            slot[0] = p.mass_density();
            slot[1] = p.velocity(Axis::I);
            slot[2] = p.velocity(Axis::J);
            slot[3] = 0.0;
            slot[4] = p.gas_pressure();
        }
        Ok(prim)
    }

    fn compute_flux(&self, state: &Patch, prim: &Patch, axis: Axis, flux: &mut Patch) {
        let faces = flux.valid_space().clone();
        let at = |index| {
            let p = prim.get_slice(index);
            Primitive::new(p[0], p[1], p[2], p[3], p[4])
        };

        for index in faces.iter() {
            let l = axis.shift(index, -1);
            let r = index;
            let f = euler::riemann_hlle(at(l), at(r), axis, self.gamma_law_index);
            let mass_flux = f.mass_density();
            let upwind = state.get_slice(if mass_flux >= 0.0 { l } else { r });
            let slice = flux.get_slice_mut(index);

            f.write_to_slice(slice);
            slice[StateLayout::EINT] = mass_flux * upwind[StateLayout::EINT] / upwind[StateLayout::DENSITY];
            slice[StateLayout::TEMP] = 0.0;

            for s in self.layout.species() {
                slice[s] = mass_flux * upwind[s] / upwind[StateLayout::DENSITY];
            }
        }
    }
}




// ============================================================================
impl FluxKernel for EulerKernel {

    fn compute_fluxes_and_update(&self, geometry: &Geometry, state: &mut Patch, gravity: Option<&Patch>, dt: f64) -> Result<FaceFluxes> {
        assert!(state.num_guard() >= 1, "the Euler kernel needs one guard zone");

        let valid = state.valid_space().clone();
        let prim = self.primitive(state)?;
        let mut fluxes = FaceFluxes::zeros(&valid, state.num_fields());

        for axis in Axis::ALL {
            self.compute_flux(state, &prim, axis, fluxes.along_mut(axis));
        }

        let dx = geometry.cell_spacing(Axis::I);
        let dy = geometry.cell_spacing(Axis::J);

        for index in valid.iter() {
            let fim = fluxes.flux_i.get_slice(index);
            let fip = fluxes.flux_i.get_slice(Axis::I.shift(index, 1));
            let fjm = fluxes.flux_j.get_slice(index);
            let fjp = fluxes.flux_j.get_slice(Axis::J.shift(index, 1));
            let u = state.get_slice_mut(index);

            let rho = u[StateLayout::DENSITY];
            let mom = (u[StateLayout::XMOM], u[StateLayout::YMOM]);

            for (n, u) in u.iter_mut().enumerate() {
                *u -= (fip[n] - fim[n]) * dt / dx + (fjp[n] - fjm[n]) * dt / dy;
            }

            if let Some(g) = gravity.map(|g| g.get_slice(index)) {
                u[StateLayout::XMOM] += dt * rho * g[0];
                u[StateLayout::YMOM] += dt * rho * g[1];
                u[StateLayout::EDEN] += dt * (mom.0 * g[0] + mom.1 * g[1]);
            }
        }
        Ok(fluxes)
    }
}
