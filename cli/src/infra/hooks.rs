//! Infrastructure implementation of the `Hooks` port: configured shell commands.

use std::time::Duration;

use anyhow::{Context, Result};
use hoist_common::{Step, StepOutcome};

use crate::application::ports::{CommandRunner, HookContext, Hooks, Invocation};
use crate::domain::HooksConfig;

/// Runs the `hooks.*` commands from `hoist.yaml` with `sh -c`.
///
/// Pre/post hooks run inside the release directory. Every hook sees
/// `HOIST_APP`, `HOIST_RELEASE_ID`, `HOIST_RELEASE_DIR` and
/// `HOIST_DEPLOY_PATH`; `on_step` additionally gets `HOIST_STEP` and
/// `HOIST_STEP_CODE`.
pub struct ShellHooks<'a, R: CommandRunner> {
    runner: &'a R,
    config: HooksConfig,
}

impl<'a, R: CommandRunner> ShellHooks<'a, R> {
    pub fn new(runner: &'a R, config: HooksConfig) -> Self {
        Self { runner, config }
    }

    fn invocation(&self, command: &str, ctx: &HookContext<'_>) -> Invocation {
        Invocation::shell(command)
            .cwd(ctx.release_dir)
            .env("HOIST_APP", ctx.app)
            .env("HOIST_RELEASE_ID", ctx.release_id)
            .env("HOIST_RELEASE_DIR", ctx.release_dir.display().to_string())
            .env("HOIST_DEPLOY_PATH", ctx.deploy_path.display().to_string())
            .timeout(Duration::from_secs(self.config.timeout_secs))
    }

    async fn run_hook(
        &self,
        name: &str,
        command: Option<&str>,
        ctx: &HookContext<'_>,
    ) -> Result<StepOutcome> {
        let Some(command) = command else {
            return Ok(StepOutcome::ok_with(format!("no {name} hook")));
        };
        let output = self
            .runner
            .execute(&self.invocation(command, ctx))
            .await
            .with_context(|| format!("running {name} hook `{command}`"))?;
        if output.status.success() {
            return Ok(StepOutcome::ok());
        }
        let code = output.status.code().unwrap_or(1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(StepOutcome::failed(
            code,
            format!("{name} hook exited with {code}: {}", stderr.trim()),
        ))
    }
}

impl<R: CommandRunner> Hooks for ShellHooks<'_, R> {
    async fn pre_deploy(&self, ctx: &HookContext<'_>) -> Result<StepOutcome> {
        self.run_hook("pre_deploy", self.config.pre_deploy.as_deref(), ctx)
            .await
    }

    async fn post_deploy(&self, ctx: &HookContext<'_>) -> Result<StepOutcome> {
        self.run_hook("post_deploy", self.config.post_deploy.as_deref(), ctx)
            .await
    }

    async fn on_step(&self, ctx: &HookContext<'_>, step: Step, outcome: &StepOutcome) {
        let Some(command) = self.config.on_step.as_deref() else {
            return;
        };
        let invocation = self
            .invocation(command, ctx)
            .cwd(ctx.deploy_path)
            .env("HOIST_STEP", step.as_str())
            .env("HOIST_STEP_CODE", outcome.code.to_string());
        match self.runner.execute(&invocation).await {
            Ok(out) if out.status.success() => {}
            Ok(out) => tracing::warn!(step = %step, code = ?out.status.code(), "on_step hook failed"),
            Err(e) => tracing::warn!(step = %step, error = %format!("{e:#}"), "on_step hook failed"),
        }
    }
}
