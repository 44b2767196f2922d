//! Tick policies: how a projection step sources its new cases.
//!
//! The engine owns the shared recurrence (release, totals, quarantine,
//! susceptible pool, density). A policy only decides how many new cases the
//! next step sees and where they arise, and may mark calendar days on which
//! in-school contact does not happen.

use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;
use crate::parameters::ModelParameters;
use crate::projection::ProjectionRecord;

pub const DEFAULT_WINDOW: usize = 5;

/// New cases for one step, by where they arise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaseDelta {
    /// Cases from contact in school.
    pub in_school: f64,
    /// Cases among contacts already placed in quarantine.
    pub quarantine_pool: f64,
}

impl CaseDelta {
    pub fn single(new_cases: f64) -> Self {
        CaseDelta {
            in_school: new_cases,
            quarantine_pool: 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.in_school + self.quarantine_pool
    }
}

/// What a policy sees when producing the next step.
pub struct TickContext<'a> {
    /// Every record so far, seed first. Never empty.
    pub history: &'a [ProjectionRecord],
    pub parameters: &'a ModelParameters,
    /// Calendar date of the step being produced.
    pub date: NaiveDate,
}

impl TickContext<'_> {
    pub fn previous(&self) -> &ProjectionRecord {
        &self.history[self.history.len() - 1]
    }
}

pub trait TickPolicy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn next_cases(&self, ctx: &TickContext<'_>) -> CaseDelta;

    /// Days with no in-school contact get an effective R of zero.
    fn contact_suppressed(&self, _date: NaiveDate) -> bool {
        false
    }
}

/// Mean of `new_cases` over the last `window` records, or over all of them
/// while the history is shorter than the window.
pub fn trailing_mean(history: &[ProjectionRecord], window: usize) -> f64 {
    let start = history.len().saturating_sub(window);
    let tail = &history[start..];
    if tail.is_empty() {
        return 0.0;
    }
    tail.iter().map(|r| r.new_cases).sum::<f64>() / tail.len() as f64
}

/// New cases grow from the previous step's new cases alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviousStep;

impl TickPolicy for PreviousStep {
    fn name(&self) -> &'static str {
        "previous_step"
    }

    fn next_cases(&self, ctx: &TickContext<'_>) -> CaseDelta {
        let prev = ctx.previous();
        CaseDelta::single(prev.effective_r * prev.new_cases)
    }
}

/// New cases grow from a trailing mean of recent new cases.
#[derive(Debug, Clone, Copy)]
pub struct Smoothed {
    pub window: usize,
}

impl Default for Smoothed {
    fn default() -> Self {
        Smoothed {
            window: DEFAULT_WINDOW,
        }
    }
}

impl TickPolicy for Smoothed {
    fn name(&self) -> &'static str {
        "smoothed"
    }

    fn next_cases(&self, ctx: &TickContext<'_>) -> CaseDelta {
        CaseDelta::single(ctx.previous().effective_r * trailing_mean(ctx.history, self.window))
    }
}

/// Smoothed growth split between in-school contact and the quarantined
/// pool, with no in-school contact on the configured weekdays.
#[derive(Debug, Clone)]
pub struct SchoolWeek {
    pub window: usize,
    pub no_contact_days: Vec<Weekday>,
}

impl Default for SchoolWeek {
    fn default() -> Self {
        SchoolWeek {
            window: DEFAULT_WINDOW,
            no_contact_days: default_no_contact_days(),
        }
    }
}

impl TickPolicy for SchoolWeek {
    fn name(&self) -> &'static str {
        "school_week"
    }

    fn next_cases(&self, ctx: &TickContext<'_>) -> CaseDelta {
        let new_cases = ctx.previous().effective_r * trailing_mean(ctx.history, self.window);
        let success = ctx.parameters.quarantine_success;
        CaseDelta {
            in_school: new_cases * (1.0 - success),
            quarantine_pool: new_cases * success,
        }
    }

    fn contact_suppressed(&self, date: NaiveDate) -> bool {
        self.no_contact_days.contains(&date.weekday())
    }
}

/// Policy selection as it appears in a run description, e.g.
/// `{"kind": "smoothed", "window": 7}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    PreviousStep,
    Smoothed {
        #[serde(default = "default_window")]
        window: usize,
    },
    SchoolWeek {
        #[serde(default = "default_window")]
        window: usize,
        #[serde(default = "default_no_contact_days")]
        no_contact_days: Vec<Weekday>,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::SchoolWeek {
            window: DEFAULT_WINDOW,
            no_contact_days: default_no_contact_days(),
        }
    }
}

impl PolicyConfig {
    pub fn build(&self) -> Result<Box<dyn TickPolicy>, ProjectionError> {
        match self {
            PolicyConfig::PreviousStep => Ok(Box::new(PreviousStep)),
            PolicyConfig::Smoothed { window } => {
                check_window(*window)?;
                Ok(Box::new(Smoothed { window: *window }))
            }
            PolicyConfig::SchoolWeek {
                window,
                no_contact_days,
            } => {
                check_window(*window)?;
                Ok(Box::new(SchoolWeek {
                    window: *window,
                    no_contact_days: no_contact_days.clone(),
                }))
            }
        }
    }
}

fn check_window(window: usize) -> Result<(), ProjectionError> {
    if window == 0 {
        return Err(ProjectionError::InvalidParameters {
            field: "window",
            value: window.to_string(),
            reason: "smoothing window must cover at least one step",
        });
    }
    Ok(())
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

/// School is closed Saturday and Sunday, so no contact happens the evening
/// before and no growth is attributed to those days.
fn default_no_contact_days() -> Vec<Weekday> {
    vec![Weekday::Sat, Weekday::Sun]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parameters::test::parameters;
    use crate::projection::test::record;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 9, d).unwrap()
    }

    #[test]
    fn test_trailing_mean() {
        let history: Vec<_> = [2.0, 4.0, 6.0, 8.0]
            .iter()
            .enumerate()
            .map(|(i, n)| record(i as u32, *n, 1.0))
            .collect();
        assert_eq!(trailing_mean(&history, 2), 7.0);
        assert_eq!(trailing_mean(&history, 5), 5.0);
        assert_eq!(trailing_mean(&history[..1], 5), 2.0);
        assert_eq!(trailing_mean(&[], 5), 0.0);
    }

    #[test]
    fn test_previous_step_uses_last_record() {
        let history = vec![record(0, 10.0, 1.2), record(1, 12.0, 1.5)];
        let params = parameters();
        let ctx = TickContext {
            history: &history,
            parameters: &params,
            date: day(16),
        };
        assert_eq!(PreviousStep.next_cases(&ctx), CaseDelta::single(18.0));
    }

    #[test]
    fn test_school_week_split() {
        let history = vec![record(0, 8.0, 1.0), record(1, 12.0, 2.0)];
        let params = ModelParameters {
            quarantine_success: 0.25,
            ..parameters()
        };
        let ctx = TickContext {
            history: &history,
            parameters: &params,
            date: day(16),
        };
        let delta = SchoolWeek::default().next_cases(&ctx);
        assert_eq!(delta.total(), 20.0);
        assert_eq!(delta.in_school, 15.0);
        assert_eq!(delta.quarantine_pool, 5.0);
    }

    #[test]
    fn test_school_week_weekends() {
        let policy = SchoolWeek::default();
        // 2021-09-17 is a Friday.
        assert!(!policy.contact_suppressed(day(17)));
        assert!(policy.contact_suppressed(day(18)));
        assert!(policy.contact_suppressed(day(19)));
        assert!(!policy.contact_suppressed(day(20)));
        assert!(!Smoothed::default().contact_suppressed(day(18)));
    }

    #[test]
    fn test_config_from_json() {
        let config: PolicyConfig =
            serde_json::from_value(serde_json::json!({"kind": "smoothed", "window": 7})).unwrap();
        assert_eq!(config, PolicyConfig::Smoothed { window: 7 });

        let config: PolicyConfig = serde_json::from_value(serde_json::json!({
            "kind": "school_week",
            "no_contact_days": ["Sun", "Mon"]
        }))
        .unwrap();
        assert_eq!(
            config,
            PolicyConfig::SchoolWeek {
                window: DEFAULT_WINDOW,
                no_contact_days: vec![Weekday::Sun, Weekday::Mon],
            }
        );
        assert_eq!(config.build().unwrap().name(), "school_week");
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = PolicyConfig::Smoothed { window: 0 }.build().unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::InvalidParameters { field: "window", .. }
        ));
    }
}
