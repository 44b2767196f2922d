//! The district school list (`school_list_geo`), one school per line:
//!
//! ```text
//! Lincoln High,High,1850,41.2565,-95.9345
//! Transportation,Bus,,,
//! ```
//!
//! Blank student counts and coordinates are unknown. The first line for a
//! school wins when a name repeats.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{CasesError, Result};
use crate::report::DailyReport;

pub const ROSTER_FILE: &str = "school_list_geo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchoolLevel {
    High,
    Middle,
    Elementary,
    #[serde(rename = "Specialty Centers")]
    SpecialtyCenters,
    #[serde(rename = "Charter/Contract")]
    CharterContract,
    Bus,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub school: String,
    pub level: SchoolLevel,
    pub students: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SchoolRoster {
    schools: BTreeMap<String, RosterEntry>,
}

impl SchoolRoster {
    pub fn parse(text: &str) -> Result<SchoolRoster> {
        Self::parse_named(Path::new(ROSTER_FILE), text)
    }

    pub fn read(path: &Path) -> Result<SchoolRoster> {
        let text = fs::read_to_string(path)?;
        Self::parse_named(path, &text)
    }

    fn parse_named(path: &Path, text: &str) -> Result<SchoolRoster> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut schools = BTreeMap::new();
        for row in reader.deserialize::<RosterEntry>() {
            let entry = row.map_err(|e| {
                let line = e.position().map_or(0, |p| p.line() as usize);
                CasesError::report(path, line, e.to_string())
            })?;
            schools.entry(entry.school.clone()).or_insert(entry);
        }

        debug!("read {} schools from {}", schools.len(), path.display());
        Ok(SchoolRoster { schools })
    }

    pub fn get(&self, school: &str) -> Option<&RosterEntry> {
        self.schools.get(school)
    }

    pub fn contains(&self, school: &str) -> bool {
        self.schools.contains_key(school)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.schools.values()
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }

    /// Schools that report cases but are missing from the roster, by name.
    pub fn unaccounted<'a>(&self, reports: &'a [DailyReport]) -> Vec<&'a str> {
        let names: BTreeSet<&str> = reports
            .iter()
            .flat_map(|r| &r.schools)
            .map(|s| s.school.as_str())
            .filter(|name| !self.contains(name))
            .collect();
        names.into_iter().collect()
    }
}
