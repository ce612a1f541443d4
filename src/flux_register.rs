use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use crate::geometry::Geometry;
use crate::index_space::{Axis, IndexSpace};
use crate::patch::Patch;
use crate::patch_set::GridPatchSet;




/**
 * The face-centered fluxes computed by a flux kernel for one patch: one
 * guard-free patch per axis, over the faces normal to that axis. Face
 * `(i, j)` sits on the lower side of cell `(i, j)`.
 */
#[derive(Clone, Debug)]
pub struct FaceFluxes {
    pub flux_i: Patch,
    pub flux_j: Patch,
}

impl FaceFluxes {

    /// Allocate zero fluxes over the faces of the given cell space.
    pub fn zeros(space: &IndexSpace, num_fields: usize) -> Self {
        Self {
            flux_i: Patch::zeros(space.extend_upper(1, Axis::I), 0, num_fields),
            flux_j: Patch::zeros(space.extend_upper(1, Axis::J), 0, num_fields),
        }
    }

    pub fn along(&self, axis: Axis) -> &Patch {
        match axis {
            Axis::I => &self.flux_i,
            Axis::J => &self.flux_j,
        }
    }

    pub fn along_mut(&mut self, axis: Axis) -> &mut Patch {
        match axis {
            Axis::I => &mut self.flux_i,
            Axis::J => &mut self.flux_j,
        }
    }
}




/**
 * A coarse face on the boundary between a fine level and the coarse cells
 * outside it. `cell` is the uncovered coarse cell which the face bounds,
 * and `sign` is +1 if the face is that cell's lower face (the fine region
 * is below it), or -1 if it is the cell's upper face.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceFace {
    pub axis: Axis,
    pub face: (i64, i64),
    pub cell: (i64, i64),
    pub sign: i8,
}




/**
 * Accumulates, at each coarse-fine interface face, the difference between
 * the fine fluxes and the coarse flux integrated over one coarse step:
 *
 * `value = sign * (Σ F_fine dt_fine A_fine - F_coarse dt_coarse A_coarse)`
 *
 * so that adding `value / cell_volume` to the outside coarse cell restores
 * conservation. The register belongs to the fine level and is keyed in the
 * coarse level's index space.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "FluxRegisterRecord", into = "FluxRegisterRecord")]
pub struct FluxRegister {
    ratio: i64,
    num_fields: usize,
    faces: Vec<InterfaceFace>,
    values: Vec<f64>,
    lookup: HashMap<(Axis, (i64, i64)), usize>,
}

#[derive(Serialize, Deserialize)]
struct FluxRegisterRecord {
    ratio: i64,
    num_fields: usize,
    faces: Vec<InterfaceFace>,
    values: Vec<f64>,
}




// ============================================================================
impl FluxRegister {

    /**
     * Build the register for a fine patch set sitting on the given coarse
     * level. A face is registered only when the coarse cell outside the
     * fine region lies in the physical domain, is covered by the coarse
     * patches, and is not itself covered by the fine level.
     */
    pub fn new(coarse_geometry: &Geometry, coarse: &GridPatchSet, fine: &GridPatchSet, ratio: i64, num_fields: usize) -> Self {
        let footprints = fine.coarsened(ratio);
        let covered = |cell: (i64, i64)| footprints.iter().any(|b| b.contains(cell));
        let mut faces = Vec::new();

        for footprint in &footprints {
            for axis in Axis::ALL {
                let across = footprint.range(axis);

                for index in footprint.iter().filter(|&index| {
                    let k = axis.component(index);
                    k == across.start || k == across.end - 1
                }) {
                    let k = axis.component(index);
                    let mut candidates = Vec::with_capacity(2);

                    if k == across.start {
                        candidates.push((index, axis.shift(index, -1), -1));
                    }
                    if k == across.end - 1 {
                        candidates.push((axis.shift(index, 1), axis.shift(index, 1), 1));
                    }
                    for (face, cell, sign) in candidates {
                        if coarse_geometry.domain.contains(cell) && coarse.covers(cell) && !covered(cell) {
                            faces.push(InterfaceFace { axis, face, cell, sign })
                        }
                    }
                }
            }
        }
        Self::from_faces(ratio, num_fields, faces)
    }


    fn from_faces(ratio: i64, num_fields: usize, faces: Vec<InterfaceFace>) -> Self {
        let values = vec![0.0; faces.len() * num_fields];
        Self::from(FluxRegisterRecord { ratio, num_fields, faces, values })
    }


    pub fn ratio(&self) -> i64 {
        self.ratio
    }


    pub fn num_fields(&self) -> usize {
        self.num_fields
    }


    pub fn faces(&self) -> &[InterfaceFace] {
        &self.faces
    }


    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }


    /**
     * Return the accumulated values at a registered coarse face, if any.
     */
    pub fn get(&self, axis: Axis, face: (i64, i64)) -> Option<&[f64]> {
        let nf = self.num_fields;
        self.lookup.get(&(axis, face)).map(|&n| &self.values[n * nf..(n + 1) * nf])
    }


    /**
     * Add to the accumulated values at a registered coarse face. Panics if
     * the face is not registered.
     */
    pub fn add_to_face(&mut self, axis: Axis, face: (i64, i64), delta: &[f64]) {
        let n = *self.lookup.get(&(axis, face)).expect("face is not on the coarse-fine interface");
        let nf = self.num_fields;
        for (v, d) in self.values[n * nf..(n + 1) * nf].iter_mut().zip(delta) {
            *v += d
        }
    }


    /**
     * Record the coarse fluxes computed by the coarse patch with the given
     * valid space. Only faces whose outside cell belongs to that patch are
     * counted, so a face shared by two coarse patches enters once.
     */
    pub fn crse_add(&mut self, valid: &IndexSpace, fluxes: &FaceFluxes, dt: f64, geometry: &Geometry) {
        let nf = self.num_fields;
        for (n, face) in self.faces.iter().enumerate() {
            if !valid.contains(face.cell) {
                continue
            }
            let scale = -(face.sign as f64) * dt * geometry.face_area(face.axis);
            let flux = fluxes.along(face.axis).get_slice(face.face);

            for (v, f) in self.values[n * nf..(n + 1) * nf].iter_mut().zip(flux) {
                *v += scale * f
            }
        }
    }


    /**
     * Record the fine fluxes computed by one fine patch over one fine
     * substep. Every fine face lying on a registered coarse face
     * contributes its flux times its own area and time step.
     */
    pub fn fine_add(&mut self, fluxes: &FaceFluxes, dt: f64, geometry: &Geometry) {
        let r = self.ratio;
        let nf = self.num_fields;

        for axis in Axis::ALL {
            let flux = fluxes.along(axis);
            let area = geometry.face_area(axis);

            for (index, f) in flux.iter_valid() {
                if axis.component(index).rem_euclid(r) != 0 {
                    continue
                }
                let coarse_face = (index.0.div_euclid(r), index.1.div_euclid(r));

                if let Some(&n) = self.lookup.get(&(axis, coarse_face)) {
                    let scale = self.faces[n].sign as f64 * dt * area;
                    for (v, f) in self.values[n * nf..(n + 1) * nf].iter_mut().zip(f) {
                        *v += scale * f
                    }
                }
            }
        }
    }


    /**
     * Add the accumulated correction, divided by the coarse cell volume, to
     * the coarse state patches. The register is left unchanged.
     */
    pub fn apply(&self, coarse: &mut [Patch], geometry: &Geometry) {
        let nf = self.num_fields;
        let volume = geometry.cell_volume();

        for (n, face) in self.faces.iter().enumerate() {
            if let Some(patch) = coarse.iter_mut().find(|p| p.valid_space().contains(face.cell)) {
                let u = patch.get_slice_mut(face.cell);
                for (u, v) in u.iter_mut().zip(&self.values[n * nf..(n + 1) * nf]) {
                    *u += v / volume
                }
            }
        }
    }


    pub fn clear(&mut self) {
        for v in &mut self.values {
            *v = 0.0
        }
    }


    /**
     * Return the largest absolute accumulated value, over all faces and
     * fields.
     */
    pub fn max_norm(&self) -> f64 {
        self.values.iter().fold(0.0, |a: f64, b| a.max(b.abs()))
    }
}




// ============================================================================
impl From<FluxRegisterRecord> for FluxRegister {
    fn from(record: FluxRegisterRecord) -> Self {
        let lookup = record.faces
            .iter()
            .enumerate()
            .map(|(n, face)| ((face.axis, face.face), n))
            .collect();
        Self {
            ratio: record.ratio,
            num_fields: record.num_fields,
            faces: record.faces,
            values: record.values,
            lookup,
        }
    }
}

impl From<FluxRegister> for FluxRegisterRecord {
    fn from(register: FluxRegister) -> Self {
        Self {
            ratio: register.ratio,
            num_fields: register.num_fields,
            faces: register.faces,
            values: register.values,
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{FaceFluxes, FluxRegister};
    use crate::geometry::Geometry;
    use crate::index_space::{range2d, Axis};
    use crate::patch_set::GridPatchSet;

    fn setup() -> (Geometry, GridPatchSet, GridPatchSet) {
        let geometry = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (8, 8));
        let coarse = GridPatchSet::new(vec![range2d(0..8, 0..8)]).unwrap();
        let fine = GridPatchSet::new(vec![range2d(4..12, 4..12)]).unwrap();
        (geometry, coarse, fine)
    }

    #[test]
    fn register_surrounds_the_fine_footprint() {
        let (geometry, coarse, fine) = setup();
        let register = FluxRegister::new(&geometry, &coarse, &fine, 2, 1);
        assert_eq!(register.faces().len(), 16);
        assert!(register.get(Axis::I, (2, 3)).is_some());
        assert!(register.get(Axis::I, (6, 5)).is_some());
        assert!(register.get(Axis::I, (4, 3)).is_none());
        assert!(register.faces().iter().filter(|f| f.axis == Axis::J && f.face.1 == 6).all(|f| f.sign == 1));
    }

    #[test]
    fn faces_on_the_domain_boundary_are_not_registered() {
        let geometry = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (8, 8));
        let coarse = GridPatchSet::new(vec![range2d(0..8, 0..8)]).unwrap();
        let fine = GridPatchSet::new(vec![range2d(0..4, 0..4)]).unwrap();
        let register = FluxRegister::new(&geometry, &coarse, &fine, 2, 1);
        assert_eq!(register.faces().len(), 4);
    }

    #[test]
    fn adjacent_fine_boxes_share_no_interior_faces() {
        let geometry = Geometry::uniform((0.0, 0.0), (1.0, 1.0), (8, 8));
        let coarse = GridPatchSet::new(vec![range2d(0..8, 0..8)]).unwrap();
        let fine = GridPatchSet::new(vec![range2d(4..8, 4..12), range2d(8..12, 4..12)]).unwrap();
        let register = FluxRegister::new(&geometry, &coarse, &fine, 2, 1);
        assert_eq!(register.faces().len(), 16);
    }

    #[test]
    fn matching_coarse_and_fine_fluxes_cancel() {
        let (geometry, coarse, fine) = setup();
        let fine_geometry = geometry.refine(2);
        let mut register = FluxRegister::new(&geometry, &coarse, &fine, 2, 1);

        let mut coarse_fluxes = FaceFluxes::zeros(&range2d(0..8, 0..8), 1);
        coarse_fluxes.flux_i.fill(3.0);
        coarse_fluxes.flux_j.fill(-1.0);
        let mut fine_fluxes = FaceFluxes::zeros(&range2d(4..12, 4..12), 1);
        fine_fluxes.flux_i.fill(3.0);
        fine_fluxes.flux_j.fill(-1.0);

        register.crse_add(&range2d(0..8, 0..8), &coarse_fluxes, 0.2, &geometry);
        register.fine_add(&fine_fluxes, 0.1, &fine_geometry);
        register.fine_add(&fine_fluxes, 0.1, &fine_geometry);
        assert!(register.max_norm() < 1e-14);

        register.fine_add(&fine_fluxes, 0.1, &fine_geometry);
        assert!(register.max_norm() > 0.0);
        register.clear();
        assert_eq!(register.max_norm(), 0.0);
    }

    #[test]
    fn register_survives_serialization() {
        let (geometry, coarse, fine) = setup();
        let mut register = FluxRegister::new(&geometry, &coarse, &fine, 2, 2);
        register.add_to_face(Axis::J, (3, 2), &[1.0, 2.0]);
        let bytes = rmp_serde::to_vec(&register).unwrap();
        let restored: FluxRegister = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(restored.get(Axis::J, (3, 2)), Some(&[1.0, 2.0][..]));
    }
}
