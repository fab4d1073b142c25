//! Test executor
//!
//! Runs a tier of a plan against a connected session, one case at a time.
//! A failing case never stops the run; only cancellation does.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::common::{Error, Result};
use crate::control::Session;

use super::plan::{TestPlan, Tier};
use super::report::{CaseRecord, CaseStatus, Report, ReportBuilder};

/// Pause between consecutive cases
pub const DEFAULT_CASE_DELAY: Duration = Duration::from_millis(200);

/// Runs test plans against a session
pub struct Executor {
    plan: TestPlan,
    case_delay: Duration,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(plan: TestPlan) -> Self {
        Self {
            plan,
            case_delay: DEFAULT_CASE_DELAY,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the pause between cases
    pub fn with_case_delay(mut self, delay: Duration) -> Self {
        self.case_delay = delay;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run between cases when cancelled
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn plan(&self) -> &TestPlan {
        &self.plan
    }

    /// Run every case of `tier` (and the tiers below it) in order
    ///
    /// Refuses to start on a disconnected session. Once started, each case
    /// gets a record; a case that finds the session down records a
    /// not-connected failure and the run moves on.
    pub async fn run(&self, tier: Tier, session: &Session) -> Result<Report> {
        if !session.is_connected() {
            return Err(Error::NotConnected);
        }

        let cases = self.plan.resolve(tier);
        let planned = cases.len();
        let mut builder = ReportBuilder::new(tier, self.plan.name.clone(), planned);
        let started = Instant::now();

        tracing::info!("Running {} tier: {} cases", tier, planned);

        for (i, (case_tier, case)) in cases.into_iter().enumerate() {
            if i > 0 && !self.case_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.case_delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
            if self.cancel.is_cancelled() {
                tracing::warn!("Test run cancelled after {} of {} cases", i, planned);
                builder.mark_cancelled();
                break;
            }

            let case_started = Instant::now();
            let result = session.send(&case.request()).await;
            let record = CaseRecord::new(i + 1, case_tier, case, &result, case_started.elapsed());

            match &record.status {
                CaseStatus::Passed => {
                    tracing::info!("[{}/{}] {} passed", i + 1, planned, case.label)
                }
                CaseStatus::Failed { kind, error } => {
                    tracing::warn!("[{}/{}] {} failed: {}: {}", i + 1, planned, case.label, kind, error)
                }
            }

            builder.push(record);
        }

        let report = builder.finish(started.elapsed());
        tracing::info!(
            "Test run finished: {}/{} passed",
            report.passed(),
            report.total()
        );
        Ok(report)
    }
}
