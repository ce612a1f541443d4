use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::index_space::IndexSpace;




/**
 * The rectangular valid regions which make up one refinement level, paired
 * with the rank of the worker which owns each. The set is immutable for the
 * duration of a step; regridding replaces it wholesale.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridPatchSet {
    boxes: Vec<IndexSpace>,
    owners: Vec<usize>,
}




// ============================================================================
impl GridPatchSet {

    /**
     * Create a patch set where every box belongs to worker 0.
     */
    pub fn new(boxes: Vec<IndexSpace>) -> Result<Self> {
        let owners = vec![0; boxes.len()];
        Self::with_owners(boxes, owners)
    }


    /**
     * Create a patch set with an explicit distribution map. Boxes must be
     * non-empty and mutually disjoint.
     */
    pub fn with_owners(boxes: Vec<IndexSpace>, owners: Vec<usize>) -> Result<Self> {
        if boxes.len() != owners.len() {
            return Err(Error::Config(format!(
                "{} boxes but {} owners in patch set", boxes.len(), owners.len())))
        }
        for (n, a) in boxes.iter().enumerate() {
            if a.is_empty() {
                return Err(Error::Config(format!("patch box {:?} is empty", a)))
            }
            if let Some(b) = boxes[..n].iter().find(|b| b.overlaps(a)) {
                return Err(Error::Config(format!("patch boxes {:?} and {:?} overlap", a, b)))
            }
        }
        Ok(Self { boxes, owners })
    }


    /**
     * Distribute the boxes round-robin over `size` workers.
     */
    pub fn distribute(mut self, size: usize) -> Self {
        for (n, owner) in self.owners.iter_mut().enumerate() {
            *owner = n % size.max(1);
        }
        self
    }


    pub fn boxes(&self) -> &[IndexSpace] {
        &self.boxes
    }


    pub fn len(&self) -> usize {
        self.boxes.len()
    }


    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }


    pub fn owner(&self, n: usize) -> usize {
        self.owners[n]
    }


    pub fn is_local(&self, n: usize, rank: usize) -> bool {
        self.owners[n] == rank
    }


    /**
     * Return the boxes of this set at a resolution `ratio` times coarser.
     */
    pub fn coarsened(&self, ratio: i64) -> Vec<IndexSpace> {
        self.boxes.iter().map(|b| b.coarsen_by(ratio)).collect()
    }


    /**
     * Determine whether any box covers the given index.
     */
    pub fn covers(&self, index: (i64, i64)) -> bool {
        self.boxes.iter().any(|b| b.contains(index))
    }


    pub fn contained_in(&self, domain: &IndexSpace) -> bool {
        self.boxes.iter().all(|b| domain.contains_space(b))
    }


    /**
     * Return the number of indexes in `space` covered by this set.
     */
    pub fn covered_count(&self, space: &IndexSpace) -> usize {
        self.boxes.iter().filter_map(|b| b.intersect(space)).map(|o| o.len()).sum()
    }


    /**
     * Check that this (fine) set can sit on top of a coarse set: every box
     * coarsens exactly by `ratio`, and its coarsened footprint is entirely
     * covered by the coarse boxes.
     */
    pub fn validate_nesting(&self, coarse: &GridPatchSet, ratio: i64) -> Result<()> {
        for b in &self.boxes {
            if !b.is_aligned(ratio) {
                return Err(Error::Config(format!(
                    "fine patch {:?} is not aligned to refinement ratio {}", b, ratio)))
            }
            let footprint = b.coarsen_by(ratio);
            if coarse.covered_count(&footprint) != footprint.len() {
                return Err(Error::Config(format!(
                    "fine patch {:?} is not contained in the coarse level", b)))
            }
        }
        Ok(())
    }
}
