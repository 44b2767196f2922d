use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while loading run descriptions, reports and summary tables.
#[derive(Error, Debug)]
pub enum CasesError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{}:{line}: {message}", .path.display())]
    ReportParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Report files are named `data_YYYY-MM-DD`.
    #[error("report file name `{0}` does not match data_YYYY-MM-DD")]
    InvalidReportName(String),

    #[error("summary table has more than one row for {0}")]
    DuplicateDate(NaiveDate),

    #[error("{date}: {column} total {total} is below active {active}")]
    InconsistentCounts {
        date: NaiveDate,
        column: &'static str,
        total: u32,
        active: u32,
    },

    #[error("missing input: {0}")]
    MissingInput(String),
}

impl CasesError {
    pub(crate) fn report(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        CasesError::ReportParse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CasesError>;
