//! District-wide summary table: one row per reporting date with the
//! day-over-day columns derived from it.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Days, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{CasesError, Result};
use crate::report::DailyReport;

/// Last date on which the district published quarantine counts.
pub fn default_quarantine_cutoff() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2022, 1, 10)
}

/// Observed district totals for one date, before any derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedDay {
    pub date: NaiveDate,
    pub active_student_cases: u32,
    pub total_student_cases: u32,
    pub active_staff_cases: u32,
    pub total_staff_cases: u32,
    pub quarantined_students: Option<u32>,
    pub quarantined_staff: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub date: NaiveDate,
    pub active_student_cases: u32,
    pub total_student_cases: u32,
    pub active_staff_cases: u32,
    pub total_staff_cases: u32,
    pub quarantined_students: Option<u32>,
    pub quarantined_staff: Option<u32>,

    pub change_in_active_student_cases: i64,
    pub pct_change_in_active_student_cases: Option<f64>,
    pub change_in_total_student_cases: i64,
    pub pct_change_in_total_student_cases: Option<f64>,
    pub change_in_students_quarantined: Option<i64>,
    pub pct_change_in_students_quarantined: Option<f64>,
    pub student_cases_resolved: u32,
    pub student_cases_newly_resolved: i64,
    pub student_quarantine_factor: Option<f64>,

    pub change_in_active_staff_cases: i64,
    pub pct_change_in_active_staff_cases: Option<f64>,
    pub change_in_total_staff_cases: i64,
    pub pct_change_in_total_staff_cases: Option<f64>,
    pub change_in_staff_quarantined: Option<i64>,
    pub pct_change_in_staff_quarantined: Option<f64>,
    pub staff_cases_resolved: u32,
    pub staff_cases_newly_resolved: i64,
    pub staff_quarantine_factor: Option<f64>,

    /// Newly reported student infections since the previous row.
    pub new_student_cases: u32,
}

impl SummaryRecord {
    /// Derives a row from its observation and the previous row, if any. The
    /// first row of a table is differenced against zero.
    fn derive(day: &ObservedDay, prev: Option<&SummaryRecord>) -> SummaryRecord {
        let prev_active_student = prev.map_or(0, |p| p.active_student_cases);
        let prev_total_student = prev.map_or(0, |p| p.total_student_cases);
        let prev_active_staff = prev.map_or(0, |p| p.active_staff_cases);
        let prev_total_staff = prev.map_or(0, |p| p.total_staff_cases);
        let prev_quarantined_students = match prev {
            Some(p) => p.quarantined_students,
            None => Some(0),
        };
        let prev_quarantined_staff = match prev {
            Some(p) => p.quarantined_staff,
            None => Some(0),
        };

        let student_cases_resolved = day.total_student_cases - day.active_student_cases;
        let staff_cases_resolved = day.total_staff_cases - day.active_staff_cases;
        let change_in_total_student_cases = delta(day.total_student_cases, prev_total_student);

        SummaryRecord {
            date: day.date,
            active_student_cases: day.active_student_cases,
            total_student_cases: day.total_student_cases,
            active_staff_cases: day.active_staff_cases,
            total_staff_cases: day.total_staff_cases,
            quarantined_students: day.quarantined_students,
            quarantined_staff: day.quarantined_staff,

            change_in_active_student_cases: delta(day.active_student_cases, prev_active_student),
            pct_change_in_active_student_cases: pct_change(
                day.active_student_cases,
                prev_active_student,
            ),
            change_in_total_student_cases,
            pct_change_in_total_student_cases: pct_change(
                day.total_student_cases,
                prev_total_student,
            ),
            change_in_students_quarantined: day
                .quarantined_students
                .zip(prev_quarantined_students)
                .map(|(cur, prev)| delta(cur, prev)),
            pct_change_in_students_quarantined: day
                .quarantined_students
                .zip(prev_quarantined_students)
                .and_then(|(cur, prev)| pct_change(cur, prev)),
            student_cases_resolved,
            student_cases_newly_resolved: delta(
                student_cases_resolved,
                prev.map_or(0, |p| p.student_cases_resolved),
            ),
            student_quarantine_factor: ratio(day.quarantined_students, day.active_student_cases),

            change_in_active_staff_cases: delta(day.active_staff_cases, prev_active_staff),
            pct_change_in_active_staff_cases: pct_change(day.active_staff_cases, prev_active_staff),
            change_in_total_staff_cases: delta(day.total_staff_cases, prev_total_staff),
            pct_change_in_total_staff_cases: pct_change(day.total_staff_cases, prev_total_staff),
            change_in_staff_quarantined: day
                .quarantined_staff
                .zip(prev_quarantined_staff)
                .map(|(cur, prev)| delta(cur, prev)),
            pct_change_in_staff_quarantined: day
                .quarantined_staff
                .zip(prev_quarantined_staff)
                .and_then(|(cur, prev)| pct_change(cur, prev)),
            staff_cases_resolved,
            staff_cases_newly_resolved: delta(
                staff_cases_resolved,
                prev.map_or(0, |p| p.staff_cases_resolved),
            ),
            staff_quarantine_factor: ratio(day.quarantined_staff, day.active_staff_cases),

            new_student_cases: change_in_total_student_cases.max(0) as u32,
        }
    }

    pub fn pct_students_quarantined(&self, total_students: u32) -> Option<f64> {
        self.quarantined_students
            .map(|q| percent_of(q, total_students))
    }

    pub fn pct_students_with_active_cases(&self, total_students: u32) -> f64 {
        percent_of(self.active_student_cases, total_students)
    }

    pub fn pct_students_in_total_cases(&self, total_students: u32) -> f64 {
        percent_of(self.total_student_cases, total_students)
    }
}

/// Date-ordered summary rows. Dates are unique and strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    records: Vec<SummaryRecord>,
}

impl SummaryTable {
    pub fn from_observed(mut days: Vec<ObservedDay>) -> Result<SummaryTable> {
        days.sort_by_key(|d| d.date);

        let mut records: Vec<SummaryRecord> = Vec::with_capacity(days.len());
        for day in &days {
            if records.last().is_some_and(|r| r.date == day.date) {
                return Err(CasesError::DuplicateDate(day.date));
            }
            check_counts(day)?;
            let record = SummaryRecord::derive(day, records.last());
            records.push(record);
        }
        Ok(SummaryTable { records })
    }

    /// Sums per-school counts by date. Quarantine counts dated after
    /// `quarantine_cutoff` are dropped.
    pub fn from_reports(
        reports: &[DailyReport],
        quarantine_cutoff: Option<NaiveDate>,
    ) -> Result<SummaryTable> {
        let mut by_date: BTreeMap<NaiveDate, ObservedDay> = BTreeMap::new();
        for report in reports {
            if by_date.contains_key(&report.date) {
                return Err(CasesError::DuplicateDate(report.date));
            }
            let reports_quarantine = quarantine_cutoff.is_none_or(|cutoff| report.date <= cutoff);
            let mut day = ObservedDay {
                date: report.date,
                active_student_cases: 0,
                total_student_cases: 0,
                active_staff_cases: 0,
                total_staff_cases: 0,
                quarantined_students: report.students_quarantined.filter(|_| reports_quarantine),
                quarantined_staff: report.staff_quarantined.filter(|_| reports_quarantine),
            };
            for school in &report.schools {
                day.active_student_cases += school.active_student;
                day.total_student_cases += school.total_student;
                day.active_staff_cases += school.active_staff;
                day.total_staff_cases += school.total_staff;
            }
            by_date.insert(report.date, day);
        }

        let table = Self::from_observed(by_date.into_values().collect())?;
        info!("built summary table with {} dates", table.len());
        Ok(table)
    }

    pub fn read_csv(path: &Path) -> Result<SummaryTable> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut days = Vec::new();
        for row in reader.deserialize::<ObservedDay>() {
            days.push(row?);
        }
        Self::from_observed(days)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn get(&self, date: NaiveDate) -> Option<&SummaryRecord> {
        self.position(date).map(|i| &self.records[i])
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.records.binary_search_by_key(&date, |r| r.date).ok()
    }

    pub fn records(&self) -> &[SummaryRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SummaryRecord> {
        self.records.iter()
    }

    pub fn first(&self) -> Option<&SummaryRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&SummaryRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Calendar days between the first and last rows that have no row.
    pub fn gaps(&self) -> Vec<NaiveDate> {
        let mut missing = Vec::new();
        for pair in self.records.windows(2) {
            let mut date = pair[0].date;
            while let Some(next) = date.checked_add_days(Days::new(1)) {
                if next >= pair[1].date {
                    break;
                }
                missing.push(next);
                date = next;
            }
        }
        missing
    }
}

impl<'a> IntoIterator for &'a SummaryTable {
    type Item = &'a SummaryRecord;
    type IntoIter = std::slice::Iter<'a, SummaryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn check_counts(day: &ObservedDay) -> Result<()> {
    for (column, total, active) in [
        ("student", day.total_student_cases, day.active_student_cases),
        ("staff", day.total_staff_cases, day.active_staff_cases),
    ] {
        if total < active {
            return Err(CasesError::InconsistentCounts {
                date: day.date,
                column,
                total,
                active,
            });
        }
    }
    Ok(())
}

fn delta(current: u32, previous: u32) -> i64 {
    i64::from(current) - i64::from(previous)
}

fn pct_change(current: u32, previous: u32) -> Option<f64> {
    (previous != 0).then(|| delta(current, previous) as f64 / f64::from(previous) * 100.0)
}

fn ratio(numerator: Option<u32>, denominator: u32) -> Option<f64> {
    numerator
        .filter(|_| denominator != 0)
        .map(|n| f64::from(n) / f64::from(denominator))
}

fn percent_of(count: u32, population: u32) -> f64 {
    if population == 0 {
        return 0.0;
    }
    f64::from(count) / f64::from(population) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SchoolCases;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, d).unwrap()
    }

    fn observed(date: NaiveDate, active: u32, total: u32, quarantined: Option<u32>) -> ObservedDay {
        ObservedDay {
            date,
            active_student_cases: active,
            total_student_cases: total,
            active_staff_cases: 1,
            total_staff_cases: 2,
            quarantined_students: quarantined,
            quarantined_staff: quarantined.map(|_| 3),
        }
    }

    fn school(name: &str, active: u32, total: u32) -> SchoolCases {
        SchoolCases {
            school: name.to_string(),
            active_student: active,
            total_student: total,
            active_staff: 0,
            total_staff: 1,
        }
    }

    #[test]
    fn test_derived_columns() {
        let table = SummaryTable::from_observed(vec![
            observed(day(9, 15), 12, 30, Some(60)),
            observed(day(9, 14), 10, 20, Some(40)),
        ])
        .unwrap();

        let first = table.first().unwrap();
        assert_eq!(first.date, day(9, 14));
        assert_eq!(first.change_in_active_student_cases, 10);
        assert_eq!(first.pct_change_in_active_student_cases, None);
        assert_eq!(first.student_cases_resolved, 10);
        assert_eq!(first.new_student_cases, 20);
        assert_eq!(first.student_quarantine_factor, Some(4.0));

        let second = table.get(day(9, 15)).unwrap();
        assert_eq!(second.change_in_active_student_cases, 2);
        assert_eq!(second.pct_change_in_active_student_cases, Some(20.0));
        assert_eq!(second.change_in_total_student_cases, 10);
        assert_eq!(second.new_student_cases, 10);
        assert_eq!(second.student_cases_resolved, 18);
        assert_eq!(second.student_cases_newly_resolved, 8);
        assert_eq!(second.change_in_students_quarantined, Some(20));
        assert_eq!(second.pct_change_in_students_quarantined, Some(50.0));
        assert_eq!(second.staff_cases_resolved, 1);
        assert_eq!(second.staff_cases_newly_resolved, 0);
    }

    #[test]
    fn test_missing_quarantine_propagates() {
        let table = SummaryTable::from_observed(vec![
            observed(day(9, 14), 10, 20, Some(40)),
            observed(day(9, 15), 10, 21, None),
            observed(day(9, 16), 11, 22, Some(30)),
        ])
        .unwrap();
        let rows = table.records();
        assert_eq!(rows[1].change_in_students_quarantined, None);
        assert_eq!(rows[1].student_quarantine_factor, None);
        assert_eq!(rows[2].change_in_students_quarantined, None);
    }

    #[test]
    fn test_population_ratios() {
        let table =
            SummaryTable::from_observed(vec![observed(day(9, 14), 10, 20, Some(40))]).unwrap();
        let row = table.first().unwrap();
        assert_eq!(row.pct_students_quarantined(1000), Some(4.0));
        assert_eq!(row.pct_students_with_active_cases(1000), 1.0);
        assert_eq!(row.pct_students_in_total_cases(1000), 2.0);
        assert_eq!(row.pct_students_in_total_cases(0), 0.0);
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let err = SummaryTable::from_observed(vec![
            observed(day(9, 14), 10, 20, None),
            observed(day(9, 14), 11, 21, None),
        ])
        .unwrap_err();
        assert!(matches!(err, CasesError::DuplicateDate(d) if d == day(9, 14)));
    }

    #[test]
    fn test_total_below_active_rejected() {
        let err = SummaryTable::from_observed(vec![observed(day(9, 14), 30, 20, None)]).unwrap_err();
        assert!(matches!(
            err,
            CasesError::InconsistentCounts { column: "student", total: 20, active: 30, .. }
        ));
    }

    #[test]
    fn test_from_reports_sums_schools_and_applies_cutoff() {
        let reports = vec![
            DailyReport {
                date: day(9, 14),
                students_quarantined: Some(50),
                staff_quarantined: Some(5),
                schools: vec![school("Lincoln High", 4, 10), school("Bus", 1, 2)],
            },
            DailyReport {
                date: day(9, 15),
                students_quarantined: Some(55),
                staff_quarantined: Some(6),
                schools: vec![school("Lincoln High", 5, 12)],
            },
        ];

        let table = SummaryTable::from_reports(&reports, Some(day(9, 14))).unwrap();
        let first = table.first().unwrap();
        assert_eq!(first.active_student_cases, 5);
        assert_eq!(first.total_student_cases, 12);
        assert_eq!(first.total_staff_cases, 2);
        assert_eq!(first.quarantined_students, Some(50));
        assert_eq!(table.last().unwrap().quarantined_students, None);

        let uncut = SummaryTable::from_reports(&reports, None).unwrap();
        assert_eq!(uncut.last().unwrap().quarantined_students, Some(55));
    }

    #[test]
    fn test_gaps_and_lookup() {
        let table = SummaryTable::from_observed(vec![
            observed(day(9, 14), 1, 1, None),
            observed(day(9, 17), 1, 2, None),
            observed(day(9, 18), 1, 3, None),
        ])
        .unwrap();
        assert_eq!(table.gaps(), vec![day(9, 15), day(9, 16)]);
        assert_eq!(table.position(day(9, 17)), Some(1));
        assert!(table.get(day(9, 16)).is_none());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let table = SummaryTable::from_observed(vec![
            observed(day(9, 14), 10, 20, Some(40)),
            observed(day(9, 15), 12, 30, None),
        ])
        .unwrap();

        table.write_csv(&path).unwrap();
        let loaded = SummaryTable::read_csv(&path).unwrap();
        assert_eq!(loaded, table);
    }
}
