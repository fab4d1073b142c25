//! Tiered capability testing
//!
//! A [`TestPlan`] groups cases into cumulative tiers, the [`Executor`] runs a
//! tier against a live session, and the resulting [`Report`] records a verdict
//! per case. Failing cases never abort a run.

mod plan;
mod report;
mod runner;

pub use plan::{TestCase, TestPlan, Tier};
pub use report::{CaseRecord, CaseStatus, FailureKind, Report};
pub use runner::{Executor, DEFAULT_CASE_DELAY};
