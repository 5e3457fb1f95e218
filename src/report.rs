//! Machine-readable run reports and the one-line console summary.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub command: String,
    pub timestamp: String,
    pub passed: bool,
    pub errors: usize,
    pub warnings: usize,
    pub details: Value,
}

impl RunReport {
    pub fn new(command: &str, passed: bool, details: impl Serialize) -> Result<Self> {
        Ok(Self {
            command: command.to_string(),
            timestamp: now_rfc3339(),
            passed,
            errors: 0,
            warnings: 0,
            details: serde_json::to_value(details)?,
        })
    }

    pub fn with_counts(mut self, errors: usize, warnings: usize) -> Self {
        self.errors = errors;
        self.warnings = warnings;
        self
    }

    pub fn file_name(&self) -> String {
        format!("{}-report.json", self.command.replace(' ', "-"))
    }

    /// Writes `<dir>/<command>-report.json` and returns its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        crate::store::write_json_atomic(self, &path)?;
        Ok(path)
    }

    pub fn summary(&self) -> String {
        let status = if self.passed { "✅" } else { "❌" };
        let mut line = format!("{status} {}", self.command);
        if self.errors > 0 || self.warnings > 0 {
            line.push_str(&format!(": {} error(s), {} warning(s)", self.errors, self.warnings));
        }
        line
    }
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
