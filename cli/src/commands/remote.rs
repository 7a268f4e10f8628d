//! `hoist _remote` — the pipeline half that runs on the target host.
//!
//! Invoked over SSH by `hoist deploy`. Progress goes to stderr; stdout carries
//! exactly one report line for the local side to parse.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use hoist_common::{PipelineReport, ReleaseArgs, RunStatus};

use crate::application::ports::ConfigStore;
use crate::application::services::pipeline::{PipelinePorts, run_pipeline};
use crate::domain::release::format_report_line;
use crate::infra::archive::TarGzArchiver;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::fs::LocalFs;
use crate::infra::hooks::ShellHooks;
use crate::infra::http::UreqHealthProbe;
use crate::output::OutputContext;
use crate::output::reporter::TerminalReporter;

/// Arguments passed by the local orchestrator.
#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Effective config uploaded alongside the archive
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Archive file name inside the staging directory
    pub archive: String,
    /// Deploy base directory
    pub deploy_path: String,
    /// Application name
    pub app: String,
    /// Release id (YYYYMMDDHHMM)
    pub release_id: String,
    /// Expected SHA-1 of the archive
    pub checksum: String,
}

impl RemoteArgs {
    fn release(&self) -> ReleaseArgs {
        ReleaseArgs {
            archive: self.archive.clone(),
            deploy_path: self.deploy_path.clone(),
            app: self.app.clone(),
            release_id: self.release_id.clone(),
            checksum: self.checksum.clone(),
        }
    }
}

/// Run the pipeline and print its report.
///
/// Returns the process exit code: 0 when the release went live.
///
/// # Errors
///
/// Returns an error only if the report cannot be serialized. A config that
/// cannot be read still produces a rejected report.
pub async fn run(args: &RemoteArgs, no_color: bool, quiet: bool) -> Result<i32> {
    let ctx = OutputContext::for_stderr(no_color, quiet);
    let reporter = TerminalReporter::new(&ctx);
    let release = args.release();

    let store = YamlConfigStore::new(args.config.clone());
    let report = match store.load() {
        Ok(config) => {
            let runner = TokioCommandRunner::default();
            let hooks = ShellHooks::new(&runner, config.hooks.clone());
            let ports = PipelinePorts {
                fs: &LocalFs,
                archiver: &TarGzArchiver,
                hasher: &LocalFs,
                runner: &runner,
                probe: &UreqHealthProbe,
                hooks: &hooks,
            };
            run_pipeline(&config, &release, &ports, &reporter).await
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "cannot load remote config");
            PipelineReport {
                app: release.app.clone(),
                release_id: release.release_id.clone(),
                steps: Vec::new(),
                status: RunStatus::Rejected {
                    message: format!("{e:#}"),
                },
            }
        }
    };
    drop(reporter);

    println!("{}", format_report_line(&report)?);
    Ok(report.exit_code())
}
