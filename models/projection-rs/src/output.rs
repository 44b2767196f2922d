use crate::parameters::ModelParameters;
use crate::projection::ProjectionRecord;

pub const HEADERS: [&str; 17] = [
    "step",
    "date",
    "susceptible_remaining",
    "pct_susceptible_remaining",
    "relative_density",
    "effective_r",
    "contact_suppressed",
    "new_cases",
    "in_school_cases",
    "quarantine_pool_cases",
    "active_cases",
    "total_cases",
    "new_quarantined",
    "quarantined",
    "long_covid",
    "severe",
    "deaths",
];

/// Downstream outcome estimates for a cumulative case count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcomes {
    pub long_covid: f64,
    pub severe: f64,
    pub deaths: f64,
}

impl Outcomes {
    pub fn estimate(total_cases: f64, parameters: &ModelParameters) -> Outcomes {
        Outcomes {
            long_covid: total_cases * parameters.pct_long_covid,
            severe: total_cases * parameters.pct_severe,
            deaths: total_cases * parameters.pct_death,
        }
    }
}

pub fn rows(records: &[ProjectionRecord], parameters: &ModelParameters) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|r| {
            let outcomes = Outcomes::estimate(r.total_cases, parameters);
            vec![
                r.step_index.to_string(),
                r.date.to_string(),
                r.susceptible_remaining.to_string(),
                r.pct_susceptible_remaining.to_string(),
                r.relative_density.to_string(),
                r.effective_r.to_string(),
                r.contact_suppressed.to_string(),
                r.new_cases.to_string(),
                r.in_school_cases.to_string(),
                r.quarantine_pool_cases.to_string(),
                r.active_cases.to_string(),
                r.total_cases.to_string(),
                r.new_quarantined.to_string(),
                r.quarantined.to_string(),
                outcomes.long_covid.to_string(),
                outcomes.severe.to_string(),
                outcomes.deaths.to_string(),
            ]
        })
        .collect()
}
