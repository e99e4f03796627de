use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeStruct;
use serde_json::Value;

use crate::diff::DiffEntry;

/// Machine readable result of a whole run. Serializes with a `summary`
/// computed from the cases.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub tests: Vec<TestReport>,
    /// Set when the run was cancelled before every case ran
    pub interrupted: bool,
}

#[derive(Debug, Serialize)]
pub struct TestReport {
    pub name: String,
    pub cases: Vec<CaseReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: CaseOutcome,
    /// Normalized bodies, only kept when printing was asked for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bodies: Option<Bodies>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaseOutcome {
    Pass,
    Fail { diffs: Vec<DiffEntry> },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Bodies {
    pub a: Value,
    pub b: Value,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored
    }
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Pass)
    }
}

impl SuiteReport {
    pub fn tally(&self) -> Tally {
        self.tests
            .iter()
            .flat_map(|test| test.cases.iter())
            .fold(Tally::default(), |mut tally, case| {
                match case.outcome {
                    CaseOutcome::Pass => tally.passed += 1,
                    CaseOutcome::Fail { .. } => tally.failed += 1,
                    CaseOutcome::Error { .. } => tally.errored += 1,
                }
                tally
            })
    }

    /// True only when every case ran and passed.
    pub fn passed(&self) -> bool {
        !self.interrupted && self.tests.iter().flat_map(|t| t.cases.iter()).all(CaseReport::passed)
    }
}

impl Serialize for SuiteReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut report = serializer.serialize_struct("SuiteReport", 3)?;
        report.serialize_field("summary", &self.tally())?;
        report.serialize_field("tests", &self.tests)?;
        report.serialize_field("interrupted", &self.interrupted)?;
        report.end()
    }
}
