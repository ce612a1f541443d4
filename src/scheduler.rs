//! Selection of the coarse time step and the per-level substep sizes.
//!
//! Every level's step size divides the coarse step exactly: for each level
//! `dt_level[l] * cycle_count[l] == dt_level[0]` holds in floating point, not
//! just approximately, so the levels' time coordinates never drift apart.

use serde::{Deserialize, Serialize};
use crate::timestep::{Limiter, TimestepEstimate};




/**
 * The inputs to the time step selection at the coarsest level.
 */
#[derive(Clone, Debug)]
pub struct ScheduleRequest<'a> {
    /// The raw stable estimate of each level.
    pub estimates: &'a [TimestepEstimate],

    /// Each level's time step from the previous coarse step.
    pub previous_dt: &'a [f64],

    /// Each level's number of substeps per coarse step.
    pub cycle_counts: &'a [u64],

    pub change_max: f64,

    /// A fixed time step is in effect; no growth limiting is applied.
    pub fixed_dt: bool,

    pub cur_time: f64,

    pub stop_time: Option<f64>,

    /// This is the first step after a regrid.
    pub post_regrid: bool,
}




/**
 * The time step of every level for one coarse step.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub dt_level: Vec<f64>,

    /// The limited estimate of each level, before division of the coarse
    /// step.
    pub dt_min: Vec<f64>,

    /// The level whose estimate determined the coarse step.
    pub controlling_level: usize,

    /// The limiter which set the controlling level's estimate.
    pub limiter: Limiter,

    /// The coarse step was shortened to land on the stop time.
    pub stop_time_reached: bool,
}




// ============================================================================
/**
 * Compute the new time step of every level, from the coarsest level. Finer
 * levels are driven by the coarse result, so for `level > 0` this returns
 * `None` and does nothing.
 *
 * Each level's estimate is first limited to `change_max` times its previous
 * time step, or, right after a regrid, to its previous time step. The coarse
 * step is the smallest over levels of `cycle_count * limited_estimate`,
 * shortened if needed to land on the stop time, and each level's step is
 * the coarse step divided by its cycle count.
 */
pub fn compute_new_dt(level: usize, request: &ScheduleRequest) -> Option<Schedule> {
    if level > 0 {
        return None;
    }
    let num_levels = request.estimates.len();

    assert_eq!(request.previous_dt.len(), num_levels, "one previous time step per level is required");
    assert_eq!(request.cycle_counts.len(), num_levels, "one cycle count per level is required");

    let dt_min: Vec<f64> = request.estimates
        .iter()
        .zip(request.previous_dt)
        .map(|(estimate, &previous)| {
            if request.fixed_dt {
                estimate.dt
            } else if request.post_regrid {
                estimate.dt.min(previous)
            } else {
                estimate.dt.min(request.change_max * previous)
            }
        })
        .collect();

    Some(build_schedule(request.estimates, dt_min, request.cycle_counts, request.cur_time, request.stop_time))
}




/**
 * Compute the time step of every level for the first coarse step, from each
 * level's initial estimate. There is no previous step to limit growth
 * against; the stop time is still honored.
 */
pub fn compute_initial_dt(level: usize, estimates: &[TimestepEstimate], cycle_counts: &[u64], cur_time: f64, stop_time: Option<f64>) -> Option<Schedule> {
    if level > 0 {
        return None;
    }
    assert_eq!(estimates.len(), cycle_counts.len(), "one cycle count per level is required");

    let dt_min = estimates.iter().map(|e| e.dt).collect();
    Some(build_schedule(estimates, dt_min, cycle_counts, cur_time, stop_time))
}




/**
 * Return whether the run may take another coarse step: it may not once a
 * stop has been requested, or when the coarse step has fallen below the
 * cutoff.
 */
pub fn ok_to_continue(dt_coarse: f64, dt_cutoff: f64, stop_requested: bool) -> bool {
    !stop_requested && !(dt_coarse < dt_cutoff)
}




// ============================================================================
fn build_schedule(estimates: &[TimestepEstimate], dt_min: Vec<f64>, cycle_counts: &[u64], cur_time: f64, stop_time: Option<f64>) -> Schedule {
    assert!(!dt_min.is_empty(), "cannot schedule an empty hierarchy");

    let mut dt_0 = f64::INFINITY;
    let mut controlling_level = 0;

    for (l, (dt, &n)) in dt_min.iter().zip(cycle_counts).enumerate() {
        let candidate = n as f64 * dt;
        if candidate < dt_0 {
            dt_0 = candidate;
            controlling_level = l;
        }
    }

    let mut stop_time_reached = false;

    if let Some(stop_time) = stop_time {
        let eps = 0.001 * dt_0;
        if stop_time > cur_time && cur_time + dt_0 > stop_time - eps {
            dt_0 = stop_time - cur_time;
            stop_time_reached = true;
        }
    }

    let mut dt_0 = exactly_divisible(dt_0, cycle_counts);

    if !stop_time_reached {
        let exceeds = |dt_0: f64| cycle_counts.iter().zip(&dt_min).any(|(&n, &limit)| dt_0 / n as f64 > limit);

        while dt_0 > 0.0 && exceeds(dt_0) {
            dt_0 = step_down(dt_0, cycle_counts);
        }
    }
    let dt_level = cycle_counts.iter().map(|&n| dt_0 / n as f64).collect();

    Schedule {
        dt_level,
        dt_min,
        controlling_level,
        limiter: estimates[controlling_level].limiter,
        stop_time_reached,
    }
}




/**
 * Return the largest value not exceeding `dt` which every cycle count
 * divides exactly in floating point. Plain division is already exact when
 * the counts are powers of two; otherwise the finest quantum `dt / n_max` is
 * rounded toward zero to a mantissa short enough that its product with any
 * count up to `n_max` is representable.
 */
fn exactly_divisible(dt: f64, cycle_counts: &[u64]) -> f64 {
    let exact = |dt: f64| cycle_counts.iter().all(|&n| (dt / n as f64) * n as f64 == dt);

    if exact(dt) {
        return dt;
    }
    let n_max = cycle_counts.iter().copied().max().unwrap_or(1);
    let quantum = short_mantissa((dt / n_max as f64).to_bits(), n_max);

    quantum * n_max as f64
}




/**
 * Return the next exactly divisible value strictly below `dt`.
 */
fn step_down(dt: f64, cycle_counts: &[u64]) -> f64 {
    let n_max = cycle_counts.iter().copied().max().unwrap_or(1);
    let below = (dt / n_max as f64).to_bits().saturating_sub(1);

    short_mantissa(below, n_max) * n_max as f64
}




/**
 * Truncate a positive float, given by its bits, to a mantissa whose product
 * with any count up to `n_max` is representable.
 */
fn short_mantissa(bits: u64, n_max: u64) -> f64 {
    let width = 64 - n_max.leading_zeros();
    let mask = !((1u64 << width) - 1);
    f64::from_bits(bits & mask)
}
