use std::sync::{Arc, Mutex};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use crate::timestep::Limiter;




/**
 * Structured events reported by the synchronization core. The exact
 * presentation is up to the sink.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticEvent {
    /// The time step chosen for a coarse step, with the limiter which set it.
    TimeStep {
        step: u64,
        time: f64,
        dt_level: Vec<f64>,
        level: usize,
        limiter: Limiter,
    },

    /// One limiter's candidate on one level.
    LimiterEstimate {
        level: usize,
        limiter: Limiter,
        dt: f64,
    },

    /// The largest correction applied by a reflux.
    Reflux {
        level: usize,
        max_correction: f64,
    },

    /// A potential correction applied to levels `level..=finest`.
    PotentialSync {
        level: usize,
        finest: usize,
        mass_change: f64,
    },

    /// Quantities added on one level by the density floor.
    MinimumDensity {
        level: usize,
        zones: usize,
        mass_added: f64,
        eint_added: f64,
        eden_added: f64,
    },

    /// A composite solve check: passed when `residual <= tolerance`.
    SolverCheck {
        residual: f64,
        tolerance: f64,
    },

    /// Volume integrals over the composite hierarchy.
    IntegratedSums {
        step: u64,
        time: f64,
        mass: f64,
        xmom: f64,
        ymom: f64,
        energy: f64,
    },

    /// The run is stopping.
    Stop {
        reason: String,
    },
}




/// Receives diagnostic events from the driver and the engines it calls.
///
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, event: DiagnosticEvent);
}




/// Writes events through the `log` facade: per-step summaries at info level,
/// per-limiter detail at debug level, and failed checks as warnings.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, event: DiagnosticEvent) {
        use DiagnosticEvent::*;

        match event {
            TimeStep { step, time, dt_level, level, limiter } => {
                info!("[{:06}] t={:.6e} dt={:.6e} ({} on level {})", step, time, dt_level[0], limiter, level)
            }
            LimiterEstimate { level, limiter, dt } => {
                debug!("level {} {} limiter dt={:.6e}", level, limiter, dt)
            }
            Reflux { level, max_correction } => {
                debug!("reflux level {} max correction {:.3e}", level, max_correction)
            }
            PotentialSync { level, finest, mass_change } => {
                debug!("potential sync on levels {}..={} after mass change {:.3e}", level, finest, mass_change)
            }
            MinimumDensity { level, zones, mass_added, eint_added, eden_added } => {
                if zones > 0 {
                    info!("level {}: density floor applied to {} zones, added mass {:.3e} eint {:.3e} eden {:.3e}",
                        level, zones, mass_added, eint_added, eden_added)
                }
            }
            SolverCheck { residual, tolerance } => {
                if residual > tolerance {
                    warn!("composite solve check failed: residual {:.3e} exceeds {:.3e}", residual, tolerance)
                } else {
                    debug!("composite solve check passed: residual {:.3e}", residual)
                }
            }
            IntegratedSums { step, time, mass, xmom, ymom, energy } => {
                info!("[{:06}] t={:.6e} mass={:.12e} xmom={:.12e} ymom={:.12e} energy={:.12e}",
                    step, time, mass, xmom, ymom, energy)
            }
            Stop { reason } => {
                info!("stopping: {}", reason)
            }
        }
    }
}




/// Keeps every event in memory. Clones share the same record.
///
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event)
    }
}
