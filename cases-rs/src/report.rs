//! Raw daily reports as published by the district.
//!
//! A report is a plain-text file named `data_YYYY-MM-DD`. The first line holds
//! the district-wide quarantine counts as `students,staff`; every following
//! block of five lines describes one school:
//!
//! ```text
//! 412,37
//! Lincoln High
//! 4
//! 19
//! 1
//! 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{CasesError, Result};

const REPORT_PREFIX: &str = "data_";
const LINES_PER_SCHOOL: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolCases {
    pub school: String,
    pub active_student: u32,
    pub total_student: u32,
    pub active_staff: u32,
    pub total_staff: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub students_quarantined: Option<u32>,
    pub staff_quarantined: Option<u32>,
    pub schools: Vec<SchoolCases>,
}

impl DailyReport {
    pub fn parse(date: NaiveDate, text: &str) -> Result<DailyReport> {
        Self::parse_named(&report_path(date), date, text)
    }

    /// Reads a report whose date comes from its `data_YYYY-MM-DD` file name.
    pub fn read(path: &Path) -> Result<DailyReport> {
        let date = report_date(path)?;
        let text = fs::read_to_string(path)?;
        Self::parse_named(path, date, &text)
    }

    fn parse_named(path: &Path, date: NaiveDate, text: &str) -> Result<DailyReport> {
        let mut lines: Vec<&str> = text.lines().map(str::trim).collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        let header = lines
            .first()
            .ok_or_else(|| CasesError::report(path, 1, "empty report"))?;
        let (students, staff) = header
            .split_once(',')
            .ok_or_else(|| CasesError::report(path, 1, "expected `students,staff`"))?;
        let students_quarantined = parse_optional(path, 1, students)?;
        let staff_quarantined = parse_optional(path, 1, staff)?;

        let body = &lines[1..];
        if body.len() % LINES_PER_SCHOOL != 0 {
            let start = body.len() - body.len() % LINES_PER_SCHOOL;
            return Err(CasesError::report(
                path,
                start + 2,
                format!(
                    "truncated school block: {} of {LINES_PER_SCHOOL} lines",
                    body.len() % LINES_PER_SCHOOL
                ),
            ));
        }

        let mut schools = Vec::with_capacity(body.len() / LINES_PER_SCHOOL);
        for (i, block) in body.chunks(LINES_PER_SCHOOL).enumerate() {
            // Line numbers are 1-based and the header occupies line 1.
            let first_line = 2 + i * LINES_PER_SCHOOL;
            schools.push(SchoolCases {
                school: block[0].to_string(),
                active_student: parse_count(path, first_line + 1, block[1])?,
                total_student: parse_count(path, first_line + 2, block[2])?,
                active_staff: parse_count(path, first_line + 3, block[3])?,
                total_staff: parse_count(path, first_line + 4, block[4])?,
            });
        }

        debug!(
            "parsed report {} with {} schools",
            path.display(),
            schools.len()
        );

        Ok(DailyReport {
            date,
            students_quarantined,
            staff_quarantined,
            schools,
        })
    }
}

/// Reads every `data_*` report in `dir`, ordered by date.
pub fn read_report_dir(dir: &Path) -> Result<Vec<DailyReport>> {
    let mut reports = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_report = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(REPORT_PREFIX));
        if path.is_file() && is_report {
            reports.push(DailyReport::read(&path)?);
        }
    }
    reports.sort_by_key(|r| r.date);
    Ok(reports)
}

pub fn report_date(path: &Path) -> Result<NaiveDate> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name.strip_prefix(REPORT_PREFIX)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| CasesError::InvalidReportName(name.to_string()))
}

fn report_path(date: NaiveDate) -> PathBuf {
    PathBuf::from(format!("{REPORT_PREFIX}{}", date.format("%Y-%m-%d")))
}

fn parse_count(path: &Path, line: usize, field: &str) -> Result<u32> {
    field
        .trim()
        .parse()
        .map_err(|_| CasesError::report(path, line, format!("`{field}` is not a count")))
}

fn parse_optional(path: &Path, line: usize, field: &str) -> Result<Option<u32>> {
    if field.trim().is_empty() {
        return Ok(None);
    }
    parse_count(path, line, field).map(Some)
}
