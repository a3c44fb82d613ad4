//! Step bookkeeping for multi-call workflows that have no transaction.
//!
//! Each step declares up front whether a failure aborts the workflow or is
//! recorded and skipped. Nothing is retried or compensated.

use std::fmt::Display;

use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Stop the workflow and surface the error.
    Abort,
    /// Record the failure and move on to the next step.
    Continue,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

impl Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.step, self.error)
    }
}

#[derive(Debug)]
pub struct Saga {
    workflow: &'static str,
    failures: Vec<StepFailure>,
}

impl Saga {
    pub fn new(workflow: &'static str) -> Self {
        Self {
            workflow,
            failures: Vec::new(),
        }
    }

    /// Applies `policy` to the outcome of `step`.
    ///
    /// `Ok(Some(_))` on success, `Ok(None)` on a tolerated failure and
    /// `Err(_)` when the failure aborts the workflow.
    pub fn step<T, E: Display>(
        &mut self,
        step: impl Into<String>,
        policy: StepPolicy,
        outcome: Result<T, E>,
    ) -> Result<Option<T>, StepFailure> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                let failure = self.record(step.into(), policy, err);
                match policy {
                    StepPolicy::Abort => Err(failure),
                    StepPolicy::Continue => Ok(None),
                }
            }
        }
    }

    /// A step under [`StepPolicy::Abort`].
    pub fn require<T, E: Display>(
        &mut self,
        step: impl Into<String>,
        outcome: Result<T, E>,
    ) -> Result<T, StepFailure> {
        outcome.map_err(|err| self.record(step.into(), StepPolicy::Abort, err))
    }

    /// A step under [`StepPolicy::Continue`].
    pub fn tolerate<T, E: Display>(
        &mut self,
        step: impl Into<String>,
        outcome: Result<T, E>,
    ) -> Option<T> {
        match outcome {
            Ok(value) => Some(value),
            Err(err) => {
                self.record(step.into(), StepPolicy::Continue, err);
                None
            }
        }
    }

    fn record<E: Display>(&mut self, step: String, policy: StepPolicy, err: E) -> StepFailure {
        let failure = StepFailure {
            step,
            error: format!("{err:#}"),
        };
        match policy {
            StepPolicy::Abort => {
                error!(
                    workflow = self.workflow,
                    step = %failure.step,
                    error = %failure.error,
                    "workflow step failed, aborting"
                );
            }
            StepPolicy::Continue => {
                warn!(
                    workflow = self.workflow,
                    step = %failure.step,
                    error = %failure.error,
                    "workflow step failed, continuing"
                );
                self.failures.push(failure.clone());
            }
        }
        failure
    }

    pub fn failures(&self) -> &[StepFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<StepFailure> {
        self.failures
    }
}
