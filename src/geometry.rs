use serde::{Deserialize, Serialize};
use crate::index_space::{Axis, IndexSpace};




/**
 * A uniform rectilinear description of one refinement level: the index
 * space of the whole problem domain at that level's resolution, the
 * physical coordinates of the domain's lower corner, and the cell spacing.
 * In two dimensions a cell "volume" is its area per unit depth.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub domain: IndexSpace,
    pub lower: (f64, f64),
    pub cell_size: (f64, f64),
}




// ============================================================================
impl Geometry {

    /**
     * Build the coarsest-level geometry for a rectangular physical area
     * divided into the given number of zones on each axis.
     */
    pub fn uniform(lower: (f64, f64), upper: (f64, f64), zones: (i64, i64)) -> Self {
        assert!(zones.0 > 0 && zones.1 > 0, "geometry needs at least one zone per axis");
        Self {
            domain: IndexSpace::new(0..zones.0, 0..zones.1),
            lower,
            cell_size: (
                (upper.0 - lower.0) / zones.0 as f64,
                (upper.1 - lower.1) / zones.1 as f64),
        }
    }


    /**
     * Return the geometry of a level `ratio` times finer than this one.
     */
    pub fn refine(&self, ratio: i64) -> Self {
        Self {
            domain: self.domain.refine_by(ratio),
            lower: self.lower,
            cell_size: (self.cell_size.0 / ratio as f64, self.cell_size.1 / ratio as f64),
        }
    }


    pub fn cell_volume(&self) -> f64 {
        self.cell_size.0 * self.cell_size.1
    }


    /**
     * Return the area of a face normal to the given axis.
     */
    pub fn face_area(&self, axis: Axis) -> f64 {
        match axis {
            Axis::I => self.cell_size.1,
            Axis::J => self.cell_size.0,
        }
    }


    pub fn cell_spacing(&self, axis: Axis) -> f64 {
        match axis {
            Axis::I => self.cell_size.0,
            Axis::J => self.cell_size.1,
        }
    }


    pub fn cell_center(&self, index: (i64, i64)) -> (f64, f64) {
        (self.lower.0 + self.cell_size.0 * (index.0 as f64 + 0.5),
         self.lower.1 + self.cell_size.1 * (index.1 as f64 + 0.5))
    }


    pub fn total_zones(&self) -> usize {
        self.domain.len()
    }
}
