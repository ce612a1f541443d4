use core::ops::Range;
use serde::{Deserialize, Serialize};




/// One of the two index directions of a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    I,
    J,
}




// ============================================================================
impl Axis {

    pub const ALL: [Axis; 2] = [Axis::I, Axis::J];

    /// Return the index displaced by `delta` along this axis.
    pub fn shift(self, index: (i64, i64), delta: i64) -> (i64, i64) {
        match self {
            Axis::I => (index.0 + delta, index.1),
            Axis::J => (index.0, index.1 + delta),
        }
    }

    /// Return the component of the index along this axis.
    pub fn component(self, index: (i64, i64)) -> i64 {
        match self {
            Axis::I => index.0,
            Axis::J => index.1,
        }
    }
}




/**
 * Represents a rectangular region in a discrete index space. The index type
 * is signed 64-bit integer, and the region is half-open on both axes.
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
}




// ============================================================================
impl IndexSpace {

    pub fn new(di: Range<i64>, dj: Range<i64>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end,
            "index space has negative volume");

        Self { di, dj }
    }


    /// Extent of the space along the I and J axes.
    pub fn dim(&self) -> (usize, usize) {
        ((self.di.end - self.di.start) as usize,
         (self.dj.end - self.dj.start) as usize)
    }


    pub fn len(&self) -> usize {
        let (l, m) = self.dim();
        l * m
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /// The lower corner, inclusive.
    pub fn start(&self) -> (i64, i64) {
        (self.di.start, self.dj.start)
    }


    /// The upper corner, exclusive.
    pub fn end(&self) -> (i64, i64) {
        (self.di.end, self.dj.end)
    }


    /**
     * Return the range covered on the given axis.
     */
    pub fn range(&self, axis: Axis) -> Range<i64> {
        match axis {
            Axis::I => self.di.clone(),
            Axis::J => self.dj.clone(),
        }
    }


    pub fn contains(&self, index: (i64, i64)) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1)
    }


    /// True if every index of `other` lies in this space.
    pub fn contains_space(&self, other: &Self) -> bool {
        other.di.start >= self.di.start && other.di.end <= self.di.end &&
        other.dj.start >= self.dj.start && other.dj.end <= self.dj.end
    }


    /**
     * Return the overlapping region of two index spaces, or `None` if they
     * do not share any index.
     */
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let i0 = self.di.start.max(other.di.start);
        let i1 = self.di.end.min(other.di.end);
        let j0 = self.dj.start.max(other.dj.start);
        let j1 = self.dj.end.min(other.dj.end);

        if i0 < i1 && j0 < j1 {
            Some(Self::new(i0..i1, j0..j1))
        } else {
            None
        }
    }


    pub fn overlaps(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }


    /**
     * Grow the space by `delta` zones on every side. This is how a patch's
     * valid region is extended to include its guard zones.
     */
    pub fn extend_all(&self, delta: i64) -> Self {
        Self::new(
            self.di.start - delta .. self.di.end + delta,
            self.dj.start - delta .. self.dj.end + delta)
    }


    /**
     * Extend just the upper elements of this index space on the given axis.
     * With `delta = 1` this is the space of faces normal to `axis`, where
     * face `(i, j)` sits on the lower side of cell `(i, j)`.
     */
    pub fn extend_upper(&self, delta: i64, axis: Axis) -> Self {
        match axis {
            Axis::I => Self::new(self.di.start .. self.di.end + delta, self.dj.clone()),
            Axis::J => Self::new(self.di.clone(), self.dj.start .. self.dj.end + delta),
        }
    }


    /**
     * Return the index space covering the same region at a resolution
     * `ratio` times finer.
     */
    pub fn refine_by(&self, ratio: i64) -> Self {
        Self::new(
            self.di.start * ratio .. self.di.end * ratio,
            self.dj.start * ratio .. self.dj.end * ratio)
    }


    /**
     * Return the smallest index space at a resolution `ratio` times coarser
     * which covers this one.
     */
    pub fn coarsen_by(&self, ratio: i64) -> Self {
        Self::new(
            self.di.start.div_euclid(ratio) .. (self.di.end + ratio - 1).div_euclid(ratio),
            self.dj.start.div_euclid(ratio) .. (self.dj.end + ratio - 1).div_euclid(ratio))
    }


    /**
     * Determine whether this index space coarsens exactly by the given
     * ratio, i.e. whether `self.coarsen_by(ratio).refine_by(ratio) == self`.
     */
    pub fn is_aligned(&self, ratio: i64) -> bool {
        self.di.start.rem_euclid(ratio) == 0 && self.di.end.rem_euclid(ratio) == 0 &&
        self.dj.start.rem_euclid(ratio) == 0 && self.dj.end.rem_euclid(ratio) == 0
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: (i64, i64)) -> usize {
        let i = (index.0 - self.di.start) as usize;
        let j = (index.1 - self.dj.start) as usize;
        let m = (self.dj.end - self.dj.start) as usize;
        i * m + j
    }


    /**
     * Return an iterator which traverses the index space in row-major order
     * (C-like; the final index increases fastest).
     */
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.di.clone().flat_map(move |i| self.dj.clone().map(move |j| (i, j)))
    }
}




// ============================================================================
impl From<(Range<i64>, Range<i64>)> for IndexSpace {
    fn from(range: (Range<i64>, Range<i64>)) -> Self {
        Self::new(range.0, range.1)
    }
}

impl From<IndexSpace> for (Range<i64>, Range<i64>) {
    fn from(space: IndexSpace) -> Self {
        (space.di, space.dj)
    }
}




/**
 * Less imposing factory function to construct an IndexSpace object.
 */
pub fn range2d(di: Range<i64>, dj: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj)
}
