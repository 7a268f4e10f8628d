//! SSH infrastructure — implements the `Transport` port with `ssh` and `scp`.
//!
//! Both binaries run through a `CommandRunner`, so every transfer and the
//! remote invocation are bounded by a timeout and killed when it fires.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, Invocation, Transport};
use crate::domain::DeployConfig;
use crate::domain::layout::STAGING_DIR;

/// Grace added to the connect timeout for short remote commands.
const SHORT_COMMAND_GRACE: Duration = Duration::from_secs(30);

/// Creates `$1` and a unique `$1/$2.XXXXXX` directory, printing the latter.
const MAKE_RUN_DIR: &str = r#"mkdir -p "$1" && mktemp -d "$1/$2.XXXXXX""#;

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub identity: Option<PathBuf>,
    pub connect_timeout: Duration,
}

impl SshTarget {
    /// Build the target from a validated config.
    ///
    /// # Errors
    ///
    /// Returns an error if no host is configured.
    pub fn from_config(config: &DeployConfig) -> Result<Self> {
        Ok(Self {
            host: config.require_host()?.to_string(),
            port: config.port,
            user: config.user.clone(),
            identity: config.identity.clone(),
            connect_timeout: Duration::from_secs(config.transport.connect_timeout_secs),
        })
    }

    /// `user@host`.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Options shared by `ssh` and `scp`; `port_flag` is `-p` or `-P`.
    fn common_args(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
            port_flag.to_string(),
            self.port.to_string(),
        ];
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }
}

/// Production `Transport` over OpenSSH.
pub struct SshTransport<R: CommandRunner> {
    runner: R,
    target: SshTarget,
    upload_timeout: Duration,
    invoke_timeout: Duration,
}

impl<R: CommandRunner> SshTransport<R> {
    /// # Errors
    ///
    /// Returns an error if no host is configured.
    pub fn new(runner: R, config: &DeployConfig) -> Result<Self> {
        Ok(Self {
            runner,
            target: SshTarget::from_config(config)?,
            upload_timeout: Duration::from_secs(config.transport.upload_timeout_secs),
            invoke_timeout: Duration::from_secs(config.transport.invoke_timeout_secs),
        })
    }

    fn ssh(&self, remote_args: &[&str], timeout: Duration) -> Invocation {
        let command = remote_args
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ");
        Invocation::new("ssh")
            .args(self.target.common_args("-p"))
            .args([self.target.destination(), "--".to_string(), command])
            .timeout(timeout)
    }
}

impl<R: CommandRunner> Transport for SshTransport<R> {
    async fn prepare(&self, deploy_path: &str, release_id: &str) -> Result<String> {
        let staging = format!("{deploy_path}/{STAGING_DIR}");
        let timeout = self.target.connect_timeout + SHORT_COMMAND_GRACE;
        let output = self
            .runner
            .execute(&self.ssh(&["sh", "-c", MAKE_RUN_DIR, "sh", &staging, release_id], timeout))
            .await
            .with_context(|| format!("connecting to {}", self.target.destination()))?;
        if !output.status.success() {
            anyhow::bail!(
                "creating upload directory under {staging} on {} failed: {}",
                self.target.host,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let run_dir = stdout.lines().last().unwrap_or_default().trim();
        if !run_dir.starts_with(&format!("{staging}/")) {
            anyhow::bail!("unexpected upload directory from {}: '{run_dir}'", self.target.host);
        }
        tracing::debug!(run_dir, "upload directory created");
        Ok(run_dir.to_string())
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let invocation = Invocation::new("scp")
            .args(["-q", "-p"])
            .args(self.target.common_args("-P"))
            .args([
                local.display().to_string(),
                format!("{}:{remote}", self.target.destination()),
            ])
            .timeout(self.upload_timeout);
        let output = self
            .runner
            .execute(&invocation)
            .await
            .with_context(|| format!("uploading {}", local.display()))?;
        if !output.status.success() {
            anyhow::bail!(
                "scp {} failed: {}",
                local.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    async fn invoke(&self, args: &[&str]) -> Result<Output> {
        self.runner
            .execute(&self.ssh(args, self.invoke_timeout))
            .await
            .with_context(|| format!("running remote command on {}", self.target.host))
    }
}

/// Quote one word for the remote POSIX shell.
#[must_use]
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
