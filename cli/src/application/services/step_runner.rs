//! Application service — uniform wrapper around every pipeline step.
//!
//! Imports only from `crate::domain`, `hoist_common` and
//! `crate::application::ports`.

use std::future::Future;

use anyhow::Result;
use hoist_common::{Step, StepOutcome, StepRecord};

use crate::application::ports::{HookContext, Hooks, ProgressReporter};

/// Runs steps one at a time and keeps the record of the run.
pub struct StepRunner<'a, H: Hooks, R: ProgressReporter> {
    hooks: &'a H,
    reporter: &'a R,
    ctx: HookContext<'a>,
    records: Vec<StepRecord>,
}

impl<'a, H: Hooks, R: ProgressReporter> StepRunner<'a, H, R> {
    pub fn new(hooks: &'a H, reporter: &'a R, ctx: HookContext<'a>) -> Self {
        Self {
            hooks,
            reporter,
            ctx,
            records: Vec::new(),
        }
    }

    /// Await `body`, notify `on_step`, record the outcome and return it.
    ///
    /// An `Err` from `body` becomes a failed outcome carrying the error chain.
    /// `on_step` runs whatever the outcome and cannot change it.
    pub async fn run(
        &mut self,
        step: Step,
        body: impl Future<Output = Result<StepOutcome>>,
    ) -> StepOutcome {
        self.reporter.step(&format!("{}...", step.description()));
        tracing::info!(step = %step, release = self.ctx.release_id, "step started");

        let outcome = match body.await {
            Ok(outcome) => outcome,
            Err(e) => StepOutcome::failed(1, format!("{e:#}")),
        };

        if outcome.is_success() {
            self.reporter.success(step.as_str());
            tracing::info!(step = %step, "step succeeded");
        } else {
            let message = outcome.message.as_deref().unwrap_or("failed");
            self.reporter.warn(&format!("{step}: {message}"));
            tracing::warn!(step = %step, code = outcome.code, message, "step failed");
        }

        self.hooks.on_step(&self.ctx, step, &outcome).await;
        self.records.push(StepRecord {
            step,
            outcome: outcome.clone(),
        });
        outcome
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}
