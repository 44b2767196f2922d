use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures that stop a projection run from being built or advanced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("anchor date {date} is not in the summary table")]
    AnchorNotFound { date: NaiveDate },

    #[error("invalid parameter `{field}` = {value}: {reason}")]
    InvalidParameters {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("horizon {end} is before the last projected date {last}")]
    InvalidHorizon { end: NaiveDate, last: NaiveDate },

    #[error("{steps} more steps from {last} run past the end of the calendar")]
    HorizonOutOfRange { steps: u32, last: NaiveDate },

    #[error("projection run halted at step {step}; no further ticks accepted")]
    RunHalted { step: u32 },
}

/// Modeling-domain violations recorded against the step that produced them.
/// Ticking continues past a warning.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionWarning {
    NegativeSusceptiblePopulation {
        step: u32,
        date: NaiveDate,
        value: f64,
    },
}

impl ProjectionWarning {
    pub fn step(&self) -> u32 {
        match self {
            ProjectionWarning::NegativeSusceptiblePopulation { step, .. } => *step,
        }
    }
}

impl fmt::Display for ProjectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionWarning::NegativeSusceptiblePopulation { step, date, value } => write!(
                f,
                "step {step} ({date}): susceptible population is negative ({value:.1})"
            ),
        }
    }
}
