//! `hoist deploy` — package the project, ship it and run the remote pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use crate::application::ports::ConfigStore;
use crate::application::services::deploy::{DeployOptions, DeployPorts, deploy};
use crate::domain::ConfigOverrides;
use crate::infra::archive::TarGzArchiver;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::fs::LocalFs;
use crate::infra::ssh::SshTransport;
use crate::output::human::HumanRenderer;
use crate::output::json::{self, DeployJson};
use crate::output::reporter::TerminalReporter;
use crate::output::OutputContext;

/// Arguments for the deploy command.
#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Config file (default: $HOIST_CONFIG, then ./hoist.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target host
    #[arg(short = 'H', long, env = "HOIST_HOST")]
    pub host: Option<String>,

    /// SSH port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Remote user
    #[arg(short, long)]
    pub user: Option<String>,

    /// SSH private key
    #[arg(short, long)]
    pub identity: Option<PathBuf>,

    /// Branch to check out before packaging
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Deploy base directory on the host (default: /var/www/<app>)
    #[arg(short = 'd', long = "path")]
    pub deploy_path: Option<String>,

    /// Do not tag the release in git
    #[arg(long)]
    pub no_tag: bool,
}

impl DeployArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            identity: self.identity.clone(),
            branch: self.branch.clone(),
            deploy_path: self.deploy_path.clone(),
            no_tag: self.no_tag,
        }
    }
}

/// Entry point for `hoist deploy`.
///
/// # Errors
///
/// Returns the first config, packaging, transfer or pipeline failure.
pub async fn run(ctx: &OutputContext, args: &DeployArgs, json: bool) -> Result<()> {
    let store = YamlConfigStore::new(args.config.clone());
    let config = store.load()?.with_overrides(&args.overrides());
    tracing::debug!(config = %store.path().display(), "loaded config");
    config.validate_local()?;

    let project_dir = std::env::current_dir().context("cannot determine project directory")?;
    let executable = std::env::current_exe().context("cannot locate the hoist executable")?;
    let work_dir = tempfile::tempdir().context("creating scratch directory")?;

    let runner = TokioCommandRunner::default();
    let transport = SshTransport::new(TokioCommandRunner::default(), &config)?;
    let ports = DeployPorts {
        fs: &LocalFs,
        runner: &runner,
        archiver: &TarGzArchiver,
        hasher: &LocalFs,
        transport: &transport,
    };
    let opts = DeployOptions {
        project_dir: &project_dir,
        work_dir: work_dir.path(),
        executable: &executable,
        now: Utc::now(),
    };

    // Keep stdout clean for the JSON document.
    let progress_ctx = OutputContext::new(true, ctx.quiet || json);
    let reporter = TerminalReporter::new(if json { &progress_ctx } else { ctx });
    let outcome = deploy(&config, &opts, &ports, &reporter).await?;
    drop(reporter);

    let deploy_path = config.deploy_path_for(&outcome.release.app);
    if json {
        let doc = DeployJson {
            app: &outcome.release.app,
            version: &outcome.release.version,
            release_id: &outcome.release.id,
            checksum: &outcome.release.checksum,
            tag: outcome.tag.as_deref(),
            tag_error: outcome.tag_error.as_ref().map(ToString::to_string),
            report: &outcome.report,
        };
        println!("{}", json::format_pretty(&doc)?);
    } else {
        HumanRenderer::new(ctx).render_deploy(&outcome, &deploy_path);
    }
    Ok(())
}
