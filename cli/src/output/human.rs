//! Human-readable terminal renderer.

use crate::application::services::deploy::DeployOutcome;
use crate::output::OutputContext;

/// Renders deploy results as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        self.ctx.info(&format!("hoist v{version}"));
    }

    /// Summary printed after a successful deployment.
    pub fn render_deploy(&self, outcome: &DeployOutcome, deploy_path: &str) {
        let release = &outcome.release;
        self.ctx.line("");
        self.ctx.header(&format!("{} v{}", release.app, release.version));
        self.ctx.kv("Release: ", &release.id);
        self.ctx.kv("Path:    ", &format!("{deploy_path}/current"));
        self.ctx.kv("SHA-1:   ", &release.checksum);
        if let Some(tag) = &outcome.tag {
            self.ctx.kv("Tag:     ", tag);
        }
    }
}
