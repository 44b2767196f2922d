use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;

/// Fixed epidemiological parameters for one projection run.
///
/// Population and quarantine period are signed so a misconfigured value is
/// reported as given rather than rejected by the deserializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub total_population: i64,
    #[serde(default)]
    pub seroprevalence: f64,
    pub r0: f64,
    pub quarantine_factor: f64,
    #[serde(default)]
    pub quarantine_success: f64,
    /// Days until a quarantined case is released.
    pub quarantine_period: i64,
    #[serde(default)]
    pub pct_long_covid: f64,
    #[serde(default)]
    pub pct_severe: f64,
    #[serde(default)]
    pub pct_death: f64,
}

impl ModelParameters {
    pub fn validate(&self) -> Result<(), ProjectionError> {
        if self.total_population <= 0 {
            return Err(invalid(
                "total_population",
                self.total_population,
                "must be positive",
            ));
        }
        if self.quarantine_period <= 0 {
            return Err(invalid(
                "quarantine_period",
                self.quarantine_period,
                "must be a positive number of days",
            ));
        }
        if !(0.0..1.0).contains(&self.seroprevalence) {
            return Err(invalid(
                "seroprevalence",
                self.seroprevalence,
                "must be in [0, 1)",
            ));
        }
        if !(self.r0.is_finite() && self.r0 > 0.0) {
            return Err(invalid("r0", self.r0, "must be positive"));
        }
        for (field, value) in [
            ("quarantine_factor", self.quarantine_factor),
            ("quarantine_success", self.quarantine_success),
            ("pct_long_covid", self.pct_long_covid),
            ("pct_severe", self.pct_severe),
            ("pct_death", self.pct_death),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, value, "must be in [0, 1]"));
            }
        }
        Ok(())
    }

    pub fn population(&self) -> f64 {
        self.total_population as f64
    }

    /// Population not already immune before any observed case.
    pub fn eligible_population(&self) -> f64 {
        self.population() * (1.0 - self.seroprevalence)
    }
}

/// Calendar days covered by one projection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepLength {
    #[default]
    Daily,
    Weekly,
}

impl StepLength {
    pub fn days(self) -> u32 {
        match self {
            StepLength::Daily => 1,
            StepLength::Weekly => 7,
        }
    }

    /// Share of the previous active pool released per step; `1 / period` for
    /// daily steps.
    pub fn release_fraction(self, quarantine_period: i64) -> f64 {
        (f64::from(self.days()) / quarantine_period as f64).min(1.0)
    }
}

fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> ProjectionError {
    ProjectionError::InvalidParameters {
        field,
        value: value.to_string(),
        reason,
    }
}
