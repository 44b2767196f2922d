pub mod error;
pub mod report;
pub mod roster;
pub mod summary;

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{CasesError, Result};
pub use report::{DailyReport, SchoolCases, read_report_dir};
pub use roster::{ROSTER_FILE, RosterEntry, SchoolLevel, SchoolRoster};
pub use summary::{ObservedDay, SummaryRecord, SummaryTable, default_quarantine_cutoff};

/// A run description: model input, named input files and where output goes.
pub struct Environment<I = ()> {
    input_json: serde_json::Map<String, Value>,
    pub input: Option<I>,
    pub files: HashMap<String, PathBuf>,
    output: Value,
}

impl Environment {
    pub fn from_json(data: Value) -> Self {
        let input_json = data
            .get("input")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let files = data
            .get("model")
            .and_then(|m| m.get("files"))
            .and_then(|f| f.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), PathBuf::from(s))))
                    .collect()
            })
            .unwrap_or_default();

        let output = data.get("output").cloned().unwrap_or(Value::Null);

        Self {
            input_json,
            input: None,
            files,
            output,
        }
    }

    pub fn from_stdin() -> Result<Self> {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        if raw.trim().is_empty() {
            return Err(CasesError::MissingInput("no run description on stdin".into()));
        }
        let data: Value = serde_json::from_str(&raw)?;
        Ok(Self::from_json(data))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let data: Value = toml::from_str(raw)?;
        Ok(Self::from_json(data))
    }

    /// Reads a run description file; `.toml` files are TOML, anything else JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        debug!("loading run description from {}", path.display());
        if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml_str(&raw)
        } else {
            Ok(Self::from_json(serde_json::from_str(&raw)?))
        }
    }

    pub fn with_input_type<I: DeserializeOwned>(self) -> Result<Environment<I>> {
        let input_value = Value::Object(self.input_json.clone());
        let input = serde_json::from_value(input_value)?;
        Ok(Environment {
            input_json: self.input_json,
            input: Some(input),
            files: self.files,
            output: self.output,
        })
    }
}

impl<I> Environment<I> {
    pub fn input_json(&self) -> &serde_json::Map<String, Value> {
        &self.input_json
    }

    pub fn file(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        let output = &self.output;

        if output.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            return output
                .get("dir")
                .and_then(|v| v.as_str())
                .map(PathBuf::from);
        }

        // Profiled output: prefer the default profile.
        let profiles = output.get("profile").and_then(|v| v.as_object())?;
        let profile = profiles
            .get("default")
            .or_else(|| profiles.values().next())?;
        if profile.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            return profile
                .get("dir")
                .and_then(|v| v.as_str())
                .map(PathBuf::from);
        }

        None
    }

    pub fn write_csv(&self, filename: &str, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
        if let Some(dir) = self.output_dir() {
            fs::create_dir_all(&dir)?;
            let file = fs::File::create(dir.join(filename))?;
            write_rows(csv::Writer::from_writer(file), headers, rows)
        } else {
            write_rows(csv::Writer::from_writer(io::stdout()), headers, rows)
        }
    }
}

fn write_rows<W: Write>(
    mut wtr: csv::Writer<W>,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<()> {
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_from_json_basic() {
        let data = json!({
            "input": {
                "anchor_date": "2021-09-14",
                "r0": 1.2
            },
            "model": {
                "files": {
                    "summary": "/tmp/summary.csv"
                }
            },
            "output": {
                "spec": "filesystem",
                "dir": "/tmp/output"
            }
        });
        let env = Environment::from_json(data);
        assert_eq!(env.input_json().get("r0").unwrap().as_f64().unwrap(), 1.2);
        assert_eq!(env.file("summary"), Some(Path::new("/tmp/summary.csv")));
        assert_eq!(env.file("reports"), None);
        assert_eq!(env.output_dir(), Some(PathBuf::from("/tmp/output")));
    }

    #[test]
    fn test_with_input_type() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Params {
            r0: f64,
        }
        let data = json!({
            "input": {
                "r0": 2.5
            }
        });
        let env = Environment::from_json(data)
            .with_input_type::<Params>()
            .unwrap();
        assert_eq!(env.input, Some(Params { r0: 2.5 }));
    }

    #[test]
    fn test_with_input_type_rejects_bad_input() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Params {
            r0: f64,
        }
        let env = Environment::from_json(json!({ "input": { "r0": "high" } }));
        assert!(matches!(
            env.with_input_type::<Params>(),
            Err(CasesError::Json(_))
        ));
    }

    #[test]
    fn test_from_toml() {
        let raw = r#"
            [input]
            anchor_date = "2021-09-14"
            r0 = 1.2

            [model.files]
            reports = "reports"

            [output]
            spec = "filesystem"
            dir = "out"
        "#;
        let env = Environment::from_toml_str(raw).unwrap();
        assert_eq!(
            env.input_json().get("anchor_date").unwrap().as_str(),
            Some("2021-09-14")
        );
        assert_eq!(env.file("reports"), Some(Path::new("reports")));
        assert_eq!(env.output_dir(), Some(PathBuf::from("out")));
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("run.toml");
        fs::write(&toml_path, "[input]\nr0 = 2.0\n").unwrap();
        let json_path = dir.path().join("run.json");
        fs::write(&json_path, r#"{"input": {"r0": 3.0}}"#).unwrap();

        let from_toml = Environment::from_path(&toml_path).unwrap();
        let from_json = Environment::from_path(&json_path).unwrap();
        assert_eq!(from_toml.input_json().get("r0").unwrap().as_f64(), Some(2.0));
        assert_eq!(from_json.input_json().get("r0").unwrap().as_f64(), Some(3.0));
    }

    #[test]
    fn test_output_dir_profiled() {
        let data = json!({
            "input": {},
            "output": {
                "profile": {
                    "default": {
                        "spec": "filesystem",
                        "dir": "/tmp/profiled"
                    }
                }
            }
        });
        let env = Environment::from_json(data);
        assert_eq!(env.output_dir(), Some(PathBuf::from("/tmp/profiled")));
    }

    #[test]
    fn test_output_dir_none() {
        let data = json!({
            "input": {},
            "output": {
                "spec": "stdout"
            }
        });
        let env = Environment::from_json(data);
        assert_eq!(env.output_dir(), None);
    }

    #[test]
    fn test_write_csv_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let env = Environment::from_json(json!({
            "output": { "spec": "filesystem", "dir": out.to_str().unwrap() }
        }));
        env.write_csv(
            "projection_output.csv",
            &["step", "new_cases"],
            &[vec!["0".to_string(), "10".to_string()]],
        )
        .unwrap();
        let written = fs::read_to_string(out.join("projection_output.csv")).unwrap();
        assert_eq!(written, "step,new_cases\n0,10\n");
    }

    #[test]
    fn test_defaults() {
        let env = Environment::from_json(json!({}));
        assert!(env.input_json().is_empty());
        assert!(env.files.is_empty());
        assert_eq!(env.output_dir(), None);
    }
}
