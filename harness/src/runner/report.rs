//! Report documents handed back by pytest plugins
//!
//! Reports are owned by third-party tools, so the raw JSON is kept verbatim
//! and the typed view is read leniently: missing counts are zero and unknown
//! outcome tags are preserved.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Per-test result tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    Error,
    /// Tags such as `xfailed` or `xpassed`.
    Other(String),
}

impl Outcome {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "passed" => Outcome::Passed,
            "failed" => Outcome::Failed,
            "skipped" => Outcome::Skipped,
            "error" => Outcome::Error,
            other => Outcome::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::Error => "error",
            Outcome::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: u64,
    pub failed: u64,
    pub errors: u64,
    pub skipped: u64,
    pub total: u64,
}

impl Summary {
    fn from_object(summary: &Map<String, Value>) -> Self {
        let count = |key: &str| summary.get(key).and_then(Value::as_u64);
        Self {
            passed: count("passed").unwrap_or(0),
            failed: count("failed").unwrap_or(0),
            // pytest-json-report keys by outcome name ("error"); older
            // reports used the plural.
            errors: count("error").or_else(|| count("errors")).unwrap_or(0),
            skipped: count("skipped").unwrap_or(0),
            total: count("total").unwrap_or(0),
        }
    }

    /// Human-readable block printed after a test run.
    pub fn render(&self) -> String {
        format!(
            "Test Results Summary:\n  Passed: {}\n  Failed: {}\n  Errors: {}\n  Skipped: {}\n  Total: {}",
            self.passed, self.failed, self.errors, self.skipped, self.total
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub nodeid: String,
    pub outcome: Outcome,
    pub crash_message: Option<String>,
    pub crash_path: Option<String>,
    pub crash_line: Option<usize>,
}

impl TestCase {
    /// Typed view of one `tests[]` entry; `None` when it has no string
    /// `nodeid` or `outcome`.
    fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let nodeid = entry.get("nodeid").and_then(Value::as_str)?;
        let outcome = entry
            .get("outcome")
            .and_then(Value::as_str)
            .map(Outcome::parse)?;

        // A failure may be recorded in any phase; the call phase wins.
        let crash = ["call", "setup", "teardown"]
            .iter()
            .find_map(|phase| entry.get(*phase)?.get("crash"));

        Some(Self {
            nodeid: nodeid.to_string(),
            outcome,
            crash_message: crash
                .and_then(|c| c.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string),
            crash_path: crash
                .and_then(|c| c.get("path"))
                .and_then(Value::as_str)
                .map(str::to_string),
            crash_line: crash
                .and_then(|c| c.get("lineno"))
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok()),
        })
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// A parsed pytest-json-report document.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    raw: Value,
    summary: Summary,
    tests: Vec<TestCase>,
}

impl TestReport {
    /// Parse report text. Only text that is not JSON is rejected.
    pub fn from_json(text: &str) -> Result<Self, String> {
        let raw: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        Ok(Self::from_value(raw))
    }

    /// Wrap a report document. Parts of the typed view that are missing or
    /// have an unexpected shape are left empty; `raw` is kept as given.
    pub fn from_value(raw: Value) -> Self {
        let summary = raw
            .get("summary")
            .and_then(Value::as_object)
            .map(Summary::from_object)
            .unwrap_or_default();

        let tests: Vec<TestCase> = raw
            .get("tests")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(TestCase::from_value).collect())
            .unwrap_or_default();

        Self {
            raw,
            summary,
            tests,
        }
    }

    /// The document exactly as the tool wrote it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    pub fn failed_tests(&self) -> impl Iterator<Item = &TestCase> {
        self.tests.iter().filter(|t| t.is_failed())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoverageTotals {
    pub covered_lines: u64,
    pub num_statements: u64,
    pub missing_lines: u64,
    pub percent_covered: f64,
}

/// A coverage.py JSON document as written by `--cov-report=json:PATH`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageReport {
    raw: Value,
    totals: CoverageTotals,
}

impl CoverageReport {
    pub fn from_json(text: &str) -> Result<Self, String> {
        let raw: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let totals = raw
            .get("totals")
            .and_then(Value::as_object)
            .ok_or_else(|| "coverage report has no 'totals' object".to_string())?;

        let count = |key: &str| totals.get(key).and_then(Value::as_u64).unwrap_or(0);
        let totals = CoverageTotals {
            covered_lines: count("covered_lines"),
            num_statements: count("num_statements"),
            missing_lines: count("missing_lines"),
            percent_covered: totals
                .get("percent_covered")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        };

        Ok(Self { raw, totals })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn totals(&self) -> &CoverageTotals {
        &self.totals
    }

    /// `(file, percent covered)` pairs, sorted by file name.
    pub fn file_percentages(&self) -> Vec<(String, f64)> {
        let mut files: Vec<(String, f64)> = self
            .raw
            .get("files")
            .and_then(Value::as_object)
            .map(|files| {
                files
                    .iter()
                    .map(|(name, data)| {
                        let percent = data
                            .pointer("/summary/percent_covered")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0);
                        (name.clone(), percent)
                    })
                    .collect()
            })
            .unwrap_or_default();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Coverage Summary:\n  Statements: {}\n  Covered: {}\n  Missing: {}\n  Percent: {:.1}%",
            self.totals.num_statements,
            self.totals.covered_lines,
            self.totals.missing_lines,
            self.totals.percent_covered
        );
        for (file, percent) in self.file_percentages() {
            out.push_str(&format!("\n    {:>5.1}%  {}", percent, file));
        }
        out
    }
}
