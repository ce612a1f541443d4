use serde::{Deserialize, Serialize};
use crate::index_space::IndexSpace;




/**
 * A patch is a mapping from a rectangular subset of one level's index space
 * to field values. The valid region is surrounded by a halo of guard (ghost)
 * zones of fixed width; both are held in a single row-major buffer, with
 * `num_fields` contiguous values per zone.
 *
 * Patches with zero guard zones are also used to hold face-centered data,
 * such as the fluxes through the faces normal to one axis.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    valid: IndexSpace,
    num_guard: i64,
    num_fields: usize,
    data: Vec<f64>,
}




// ============================================================================
impl Patch {

    /**
     * Generate a patch of zeros over the given valid space, with the given
     * number of guard zones and fields per zone.
     */
    pub fn zeros(valid: IndexSpace, num_guard: i64, num_fields: usize) -> Self {
        let len = valid.extend_all(num_guard).len() * num_fields;
        Self {
            valid,
            num_guard,
            num_fields,
            data: vec![0.0; len],
        }
    }


    /**
     * Generate a patch with values defined from a closure, which writes the
     * fields of one zone (guard zones included) into a mutable slice.
     */
    pub fn from_slice_function<F>(valid: IndexSpace, num_guard: i64, num_fields: usize, f: F) -> Self
    where
        F: Fn((i64, i64), &mut [f64])
    {
        let mut patch = Self::zeros(valid, num_guard, num_fields);
        let space = patch.index_space();

        for (index, slice) in space.iter().zip(patch.data.chunks_exact_mut(num_fields)) {
            f(index, slice)
        }
        patch
    }


    /**
     * Return the index space of the zones which this patch is responsible
     * for updating.
     */
    pub fn valid_space(&self) -> &IndexSpace {
        &self.valid
    }


    /**
     * Return the index space of the backing array: the valid space extended
     * by the guard zones.
     */
    pub fn index_space(&self) -> IndexSpace {
        self.valid.extend_all(self.num_guard)
    }


    pub fn num_guard(&self) -> i64 {
        self.num_guard
    }


    pub fn num_fields(&self) -> usize {
        self.num_fields
    }


    pub fn data(&self) -> &[f64] {
        &self.data
    }


    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }


    /**
     * Return the fields at the given index as a slice. Panics if the index is
     * not within the index space (guard zones included).
     */
    pub fn get_slice(&self, index: (i64, i64)) -> &[f64] {
        let n = self.offset(index);
        &self.data[n * self.num_fields .. (n + 1) * self.num_fields]
    }


    pub fn get_slice_mut(&mut self, index: (i64, i64)) -> &mut [f64] {
        let n = self.offset(index);
        &mut self.data[n * self.num_fields .. (n + 1) * self.num_fields]
    }


    pub fn get(&self, index: (i64, i64), field: usize) -> f64 {
        self.get_slice(index)[field]
    }


    pub fn set(&mut self, index: (i64, i64), field: usize, value: f64) {
        self.get_slice_mut(index)[field] = value
    }


    /**
     * Set every value in the patch (guard zones included) to `value`.
     */
    pub fn fill(&mut self, value: f64) {
        for x in &mut self.data {
            *x = value
        }
    }


    /**
     * Copy field values from another patch with the same number of fields,
     * over the intersection of the two backing index spaces restricted to
     * `region`.
     */
    pub fn copy_from(&mut self, other: &Patch, region: &IndexSpace) {
        assert_eq!(self.num_fields, other.num_fields, "cannot copy between patches with different field counts");

        let overlap = self
            .index_space()
            .intersect(&other.index_space())
            .and_then(|space| space.intersect(region));

        if let Some(overlap) = overlap {
            for index in overlap.iter() {
                self.get_slice_mut(index).copy_from_slice(other.get_slice(index))
            }
        }
    }


    /**
     * Return an iterator over the valid indexes of this patch, together with
     * the field slice at each index.
     */
    pub fn iter_valid(&self) -> impl Iterator<Item = ((i64, i64), &[f64])> + '_ {
        self.valid.iter().map(move |index| (index, self.get_slice(index)))
    }


    /**
     * Return the first valid index where any field is not finite, together
     * with the offending field index.
     */
    pub fn find_non_finite(&self) -> Option<((i64, i64), usize)> {
        self.iter_valid().find_map(|(index, slice)| {
            slice.iter().position(|x| !x.is_finite()).map(|n| (index, n))
        })
    }


    fn offset(&self, index: (i64, i64)) -> usize {
        let space = self.index_space();
        if !space.contains(index) {
            panic!("index ({} {}) out of range on patch ({:?} {:?})",
                index.0,
                index.1,
                space.start(),
                space.end());
        }
        space.row_major_offset(index)
    }
}
