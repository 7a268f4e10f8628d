use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of the single stdout line that carries the serialized [`PipelineReport`].
pub const REPORT_PREFIX: &str = "HOIST_REPORT ";

/// One stage of the remote deployment pipeline, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Verify,
    Extract,
    PreDeploy,
    Link,
    Activate,
    Ping,
    PostDeploy,
}

impl Step {
    /// Every step, in the order the pipeline runs them.
    pub const ALL: [Step; 7] = [
        Step::Verify,
        Step::Extract,
        Step::PreDeploy,
        Step::Link,
        Step::Activate,
        Step::Ping,
        Step::PostDeploy,
    ];

    /// Zero-based position in [`Step::ALL`].
    #[must_use]
    pub fn position(self) -> usize {
        match self {
            Step::Verify => 0,
            Step::Extract => 1,
            Step::PreDeploy => 2,
            Step::Link => 3,
            Step::Activate => 4,
            Step::Ping => 5,
            Step::PostDeploy => 6,
        }
    }

    /// Stable machine name, identical to the serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Verify => "verify",
            Step::Extract => "extract",
            Step::PreDeploy => "pre_deploy",
            Step::Link => "link",
            Step::Activate => "activate",
            Step::Ping => "ping",
            Step::PostDeploy => "post_deploy",
        }
    }

    /// Human-readable progress text.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Step::Verify => "verifying archive checksum",
            Step::Extract => "extracting release",
            Step::PreDeploy => "running pre-deploy hook",
            Step::Link => "activating release",
            Step::Activate => "starting application server",
            Step::Ping => "checking server health",
            Step::PostDeploy => "running post-deploy hook",
        }
    }

    /// `true` for steps that run after `current` has been repointed.
    #[must_use]
    pub fn is_post_activation(self) -> bool {
        self.position() > Step::Link.position()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single step: `code == 0` means success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StepOutcome {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: None,
        }
    }

    #[must_use]
    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: Some(message.into()),
        }
    }

    /// A failed outcome. A zero `code` is coerced to 1 so failure can never read as success.
    #[must_use]
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: if code == 0 { 1 } else { code },
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// A step outcome as recorded in the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// What the pipeline did to undo a failed activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRecord {
    /// Release id `current` was re-linked to; `None` when `current` was removed.
    #[serde(default)]
    pub restored: Option<String>,
    /// Whether the running server was signalled to pick up the restored release.
    #[serde(default)]
    pub signalled: bool,
    /// Set when the rollback itself failed part-way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    /// A step failed; no later step ran.
    Aborted {
        step: Step,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rollback: Option<RollbackRecord>,
    },
    /// The run never reached its first step (bad arguments, lock held, ...).
    Rejected { message: String },
}

/// Structured result of one remote pipeline run, sent back to the local side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub app: String,
    pub release_id: String,
    pub steps: Vec<StepRecord>,
    #[serde(flatten)]
    pub status: RunStatus,
}

impl PipelineReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded)
    }

    /// The step the run aborted at, if it aborted.
    #[must_use]
    pub fn failed_step(&self) -> Option<Step> {
        match self.status {
            RunStatus::Aborted { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Process exit code for this report.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }
}
