use cases::{SummaryRecord, SummaryTable};
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{ProjectionError, ProjectionWarning};
use crate::parameters::{ModelParameters, StepLength};
use crate::policy::{TickContext, TickPolicy};

/// One simulated step. Step 0 is the observed anchor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionRecord {
    pub step_index: u32,
    pub date: NaiveDate,
    pub susceptible_remaining: f64,
    pub pct_susceptible_remaining: f64,
    pub relative_density: f64,
    pub effective_r: f64,
    pub contact_suppressed: bool,
    pub new_cases: f64,
    pub in_school_cases: f64,
    pub quarantine_pool_cases: f64,
    pub active_cases: f64,
    pub total_cases: f64,
    pub resolved_cases: f64,
    pub new_quarantined: f64,
    pub quarantined: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Constructed,
    Seeded,
    Advancing,
    Halted,
}

/// A single projection from one anchor date. Records are append-only.
#[derive(Debug)]
pub struct ProjectionRun {
    parameters: ModelParameters,
    step_length: StepLength,
    policy: Box<dyn TickPolicy>,
    records: Vec<ProjectionRecord>,
    warnings: Vec<ProjectionWarning>,
    state: RunState,
}

impl ProjectionRun {
    pub fn new(
        table: &SummaryTable,
        anchor_date: NaiveDate,
        parameters: ModelParameters,
        step_length: StepLength,
        policy: Box<dyn TickPolicy>,
    ) -> Result<ProjectionRun, ProjectionError> {
        parameters.validate()?;
        let anchor = table
            .get(anchor_date)
            .ok_or(ProjectionError::AnchorNotFound { date: anchor_date })?;

        let mut run = ProjectionRun {
            parameters,
            step_length,
            policy,
            records: Vec::new(),
            warnings: Vec::new(),
            state: RunState::Constructed,
        };
        run.seed(anchor);
        Ok(run)
    }

    fn seed(&mut self, anchor: &SummaryRecord) {
        let p = &self.parameters;
        let active_cases = f64::from(anchor.active_student_cases);
        let total_cases = f64::from(anchor.total_student_cases);
        let new_cases = f64::from(anchor.new_student_cases);
        let quarantined = match anchor.quarantined_students {
            Some(q) => f64::from(q),
            None => {
                info!(
                    "no quarantine count reported on {}; seeding with active cases x quarantine factor",
                    anchor.date
                );
                active_cases * p.quarantine_factor
            }
        };
        let new_quarantined = anchor
            .change_in_students_quarantined
            .map_or(new_cases * p.quarantine_factor, |q| q as f64);

        let resolved_cases = f64::from(anchor.student_cases_resolved);
        let susceptible_remaining = p.eligible_population() - quarantined - resolved_cases;
        let relative_density = 1.0;

        let record = ProjectionRecord {
            step_index: 0,
            date: anchor.date,
            susceptible_remaining,
            pct_susceptible_remaining: susceptible_remaining / p.population(),
            relative_density,
            effective_r: p.r0 * relative_density,
            contact_suppressed: false,
            new_cases,
            in_school_cases: new_cases,
            quarantine_pool_cases: 0.0,
            active_cases,
            total_cases,
            resolved_cases,
            new_quarantined,
            quarantined,
        };
        info!(
            "seeded {} projection at {} with {} active cases",
            self.policy.name(),
            anchor.date,
            active_cases
        );
        self.append(record);
        self.state = RunState::Seeded;
    }

    /// Advances one step and returns the appended record.
    pub fn tick(&mut self) -> Result<&ProjectionRecord, ProjectionError> {
        if self.state == RunState::Halted {
            return Err(ProjectionError::RunHalted {
                step: self.latest().step_index,
            });
        }
        let record = self.next_record()?;
        self.append(record);
        self.state = RunState::Advancing;
        Ok(self.latest())
    }

    /// Applies `steps` ticks and halts the run. Returns the new records.
    pub fn run_for(&mut self, steps: u32) -> Result<&[ProjectionRecord], ProjectionError> {
        self.parameters.validate()?;
        if self.state == RunState::Halted {
            return Err(ProjectionError::RunHalted {
                step: self.latest().step_index,
            });
        }
        let last = self.latest();
        let in_range = last
            .step_index
            .checked_add(steps)
            .and_then(|step| self.date_of(step))
            .is_some();
        if !in_range {
            return Err(ProjectionError::HorizonOutOfRange {
                steps,
                last: last.date,
            });
        }
        let start = self.records.len();
        for _ in 0..steps {
            self.tick()?;
        }
        self.state = RunState::Halted;
        debug!(
            "projection halted after {} steps, last date {}",
            self.latest().step_index,
            self.latest().date
        );
        Ok(&self.records[start..])
    }

    /// Ticks until the latest record reaches or passes `end`, then halts.
    pub fn run_until(&mut self, end: NaiveDate) -> Result<&[ProjectionRecord], ProjectionError> {
        let last = self.latest().date;
        if end < last {
            return Err(ProjectionError::InvalidHorizon { end, last });
        }
        let days = (end - last).num_days() as u32;
        let steps = days.div_ceil(self.step_length.days());
        self.run_for(steps)
    }

    fn next_record(&self) -> Result<ProjectionRecord, ProjectionError> {
        let p = &self.parameters;
        let seed = self.seed_record();
        let prev = self.latest();
        let step_index = prev.step_index + 1;
        let date = self
            .date_of(step_index)
            .ok_or(ProjectionError::HorizonOutOfRange {
                steps: 1,
                last: prev.date,
            })?;

        let delta = self.policy.next_cases(&TickContext {
            history: &self.records,
            parameters: p,
            date,
        });
        let new_cases = delta.total();

        let release = self.step_length.release_fraction(p.quarantine_period);
        let active_cases = (1.0 - release) * prev.active_cases + new_cases;
        let total_cases = prev.total_cases + new_cases;
        let new_quarantined = new_cases * p.quarantine_factor;
        let quarantined = active_cases * p.quarantine_factor;
        let resolved_cases = total_cases - active_cases;

        let susceptible_remaining = p.eligible_population() - resolved_cases - quarantined;
        let pct_susceptible_remaining = susceptible_remaining / p.population();
        let relative_density = if seed.pct_susceptible_remaining > 0.0 {
            pct_susceptible_remaining / seed.pct_susceptible_remaining
        } else {
            0.0
        };

        let contact_suppressed = self.policy.contact_suppressed(date);
        let effective_r = if contact_suppressed {
            0.0
        } else {
            // An exhausted pool yields no growth rather than negative R.
            relative_density.max(0.0) * seed.effective_r
        };

        Ok(ProjectionRecord {
            step_index,
            date,
            susceptible_remaining,
            pct_susceptible_remaining,
            relative_density,
            effective_r,
            contact_suppressed,
            new_cases,
            in_school_cases: delta.in_school,
            quarantine_pool_cases: delta.quarantine_pool,
            active_cases,
            total_cases,
            resolved_cases,
            new_quarantined,
            quarantined,
        })
    }

    fn append(&mut self, record: ProjectionRecord) {
        if record.susceptible_remaining < 0.0 {
            let warning = ProjectionWarning::NegativeSusceptiblePopulation {
                step: record.step_index,
                date: record.date,
                value: record.susceptible_remaining,
            };
            warn!("{warning}");
            self.warnings.push(warning);
        }
        self.records.push(record);
    }

    /// Calendar date of a step, or `None` past the end of the calendar.
    fn date_of(&self, step_index: u32) -> Option<NaiveDate> {
        let offset = u64::from(step_index) * u64::from(self.step_length.days());
        self.anchor_date().checked_add_days(Days::new(offset))
    }

    pub fn anchor_date(&self) -> NaiveDate {
        self.seed_record().date
    }

    pub fn seed_record(&self) -> &ProjectionRecord {
        &self.records[0]
    }

    pub fn latest(&self) -> &ProjectionRecord {
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[ProjectionRecord] {
        &self.records
    }

    pub fn record(&self, step_index: u32) -> Option<&ProjectionRecord> {
        self.records.get(step_index as usize)
    }

    /// Record for a calendar date, if a step falls on it.
    pub fn record_on(&self, date: NaiveDate) -> Option<&ProjectionRecord> {
        let offset = (date - self.anchor_date()).num_days();
        let step_days = i64::from(self.step_length.days());
        if offset < 0 || offset % step_days != 0 {
            return None;
        }
        self.records.get((offset / step_days) as usize)
    }

    pub fn warnings(&self) -> &[ProjectionWarning] {
        &self.warnings
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }
}
