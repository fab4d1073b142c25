//! Test run reports

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::common::Error;
use crate::control::Outcome;

use super::plan::{TestCase, Tier};

/// Why a case failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The engine answered and reported failure
    Remote,
    /// The engine answered with something that is not a response
    Malformed,
    /// No answer, even after reconnecting
    Transport,
    /// The session was already down when the case started
    NotConnected,
    /// The request could not be issued
    Client,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Remote => "remote error",
            Self::Malformed => "malformed response",
            Self::Transport => "transport error",
            Self::NotConnected => "not connected",
            Self::Client => "client error",
        };
        f.write_str(name)
    }
}

/// Verdict for one case
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed { kind: FailureKind, error: String },
}

impl CaseStatus {
    /// Judge the result of a request
    ///
    /// Transport-level success is not enough: the engine's own `success`
    /// flag must be true as well.
    pub fn judge(result: &Result<Outcome, Error>) -> Self {
        let (kind, error) = match result {
            Ok(Outcome::Success { response, .. }) if response.success => return Self::Passed,
            Ok(Outcome::Success { response, .. }) => {
                (FailureKind::Remote, response.error_message().to_string())
            }
            Ok(Outcome::Failure { raw, .. }) => (FailureKind::Malformed, raw.clone()),
            Ok(Outcome::TransportFailure { error }) => (FailureKind::Transport, error.clone()),
            Err(Error::NotConnected) => (FailureKind::NotConnected, Error::NotConnected.to_string()),
            Err(e) => (FailureKind::Client, e.to_string()),
        };
        Self::Failed { kind, error }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Result of one executed case
#[derive(Debug, Clone, Serialize)]
pub struct CaseRecord {
    /// 1-based position in the run
    pub index: usize,
    pub label: String,
    pub tier: Tier,
    pub target: String,
    pub method: String,
    #[serde(flatten)]
    pub status: CaseStatus,
    /// Raw response line, if one arrived
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl CaseRecord {
    pub fn new(
        index: usize,
        tier: Tier,
        case: &TestCase,
        result: &Result<Outcome, Error>,
        elapsed: Duration,
    ) -> Self {
        Self {
            index,
            label: case.label.clone(),
            tier,
            target: case.target.clone(),
            method: case.method.clone(),
            status: CaseStatus::judge(result),
            response: result
                .as_ref()
                .ok()
                .and_then(|outcome| outcome.raw())
                .map(str::to_string),
            elapsed,
        }
    }

    pub fn passed(&self) -> bool {
        self.status.passed()
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Summary of a finished run
///
/// Only the executor builds reports; once returned they are read-only.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    tier: Tier,
    plan: Option<String>,
    records: Vec<CaseRecord>,
    passed: usize,
    failed: usize,
    total: usize,
    planned: usize,
    cancelled: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    elapsed: Duration,
}

impl Report {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Cases actually executed
    pub fn total(&self) -> usize {
        self.total
    }

    /// Cases the tier resolved to
    pub fn planned(&self) -> usize {
        self.planned
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    /// Percentage of executed cases that passed
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 * 100.0 / self.total as f64
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(48);

        match &self.plan {
            Some(plan) => writeln!(f, "Test report: {} tier of '{}' plan", self.tier, plan)?,
            None => writeln!(f, "Test report: {} tier", self.tier)?,
        }
        writeln!(f, "{}", rule)?;

        for record in &self.records {
            let marker = if record.passed() { "PASS" } else { "FAIL" };
            writeln!(
                f,
                "[{}] {:>2}. {} ({}.{}, {}, {} ms)",
                marker,
                record.index,
                record.label,
                record.target,
                record.method,
                record.tier,
                record.elapsed.as_millis()
            )?;
            if let CaseStatus::Failed { kind, error } = &record.status {
                writeln!(f, "         {}: {}", kind, error)?;
            }
        }

        writeln!(f, "{}", rule)?;
        if self.cancelled {
            writeln!(f, "Cancelled after {} of {} cases", self.total, self.planned)?;
        }
        write!(f, "{}/{} ({:.1}%)", self.passed, self.total, self.pass_rate())
    }
}

/// Accumulates records while a run is in progress
pub(crate) struct ReportBuilder {
    tier: Tier,
    plan: Option<String>,
    planned: usize,
    records: Vec<CaseRecord>,
    cancelled: bool,
}

impl ReportBuilder {
    pub(crate) fn new(tier: Tier, plan: Option<String>, planned: usize) -> Self {
        Self {
            tier,
            plan,
            planned,
            records: Vec::with_capacity(planned),
            cancelled: false,
        }
    }

    pub(crate) fn push(&mut self, record: CaseRecord) {
        self.records.push(record);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub(crate) fn finish(self, elapsed: Duration) -> Report {
        let passed = self.records.iter().filter(|r| r.passed()).count();
        let total = self.records.len();
        Report {
            tier: self.tier,
            plan: self.plan,
            records: self.records,
            passed,
            failed: total - passed,
            total,
            planned: self.planned,
            cancelled: self.cancelled,
            elapsed,
        }
    }
}
