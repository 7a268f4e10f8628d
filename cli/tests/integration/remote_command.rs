//! End-to-end tests for `hoist _remote` on a local deploy directory.
//!
//! The binary runs the real pipeline: real archive, real symlinks, real shell
//! hooks and a real HTTP probe against a throwaway server.

#![allow(clippy::expect_used)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use hoist_cli::domain::IgnoreSet;
use hoist_cli::domain::release::parse_report;
use hoist_cli::infra::archive::build_archive;
use hoist_cli::infra::fs::sha1_file;
use hoist_common::{PipelineReport, RunStatus, Step};

const RELEASE_ID: &str = "202601021530";

struct Remote {
    _dir: tempfile::TempDir,
    deploy: PathBuf,
    archive: String,
    checksum: String,
    config: PathBuf,
}

impl Remote {
    fn new(config_yaml: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("app");
        std::fs::create_dir_all(&src).expect("mkdir");
        std::fs::write(src.join("index.html"), "<h1>v2</h1>\n").expect("write");

        let deploy = dir.path().join("deploy");
        let staging = deploy.join(".hoist");
        std::fs::create_dir_all(&staging).expect("mkdir");
        let archive = format!("site-v2.0.0.{RELEASE_ID}.tar.gz");
        build_archive(&src, &IgnoreSet::builtin(), &staging.join(&archive)).expect("archive");
        let checksum = sha1_file(&staging.join(&archive)).expect("hash");

        let config = staging.join("hoist.yaml");
        std::fs::write(&config, config_yaml).expect("write config");
        Self {
            _dir: dir,
            deploy,
            archive,
            checksum,
            config,
        }
    }

    fn run(&self, checksum: &str) -> (i32, PipelineReport, String) {
        let output = Command::new(assert_cmd::cargo::cargo_bin!("hoist"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .arg("_remote")
            .arg("--config")
            .arg(&self.config)
            .arg(&self.archive)
            .arg(&self.deploy)
            .args(["site", RELEASE_ID, checksum])
            .output()
            .expect("run hoist _remote");
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let report_lines = stdout
            .lines()
            .filter(|l| l.starts_with("HOIST_REPORT "))
            .count();
        assert_eq!(report_lines, 1, "exactly one report line, got:\n{stdout}");
        let report = parse_report(&stdout).expect("report on stdout");
        (
            output.status.code().unwrap_or(-1),
            report,
            String::from_utf8_lossy(&output.stderr).into_owned(),
        )
    }

    /// Stage the uploads in a per-run directory, as `hoist deploy` does.
    fn in_run_dir(mut self, name: &str) -> Self {
        let run_dir = self.deploy.join(".hoist").join(name);
        std::fs::create_dir_all(&run_dir).expect("mkdir");
        let archive = run_dir.join(&self.archive);
        std::fs::rename(self.deploy.join(".hoist").join(&self.archive), &archive).expect("move");
        let config = run_dir.join("hoist.yaml");
        std::fs::rename(&self.config, &config).expect("move");
        self.archive = archive.display().to_string();
        self.config = config;
        self
    }

    fn current_target(&self) -> Option<PathBuf> {
        std::fs::read_link(self.deploy.join("current")).ok()
    }

    fn release_dir(&self, id: &str) -> PathBuf {
        self.deploy.join("releases").join(id)
    }
}

/// Serve `status` to every request until the test process exits.
fn serve(status: u16) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let _ = write!(
                stream,
                "HTTP/1.1 {status} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
        }
    });
    port
}

fn config(health_port: u16, extra: &str) -> String {
    server_config("true", health_port, extra)
}

fn server_config(command: &str, health_port: u16, extra: &str) -> String {
    format!(
        "host: site.example.com\n\
         process:\n  command: '{command}'\n  pid_path: run/server.pid\n  settle_secs: 1\n\
         health:\n  port: {health_port}\n  path: /\n  grace_secs: 0\n  timeout_secs: 2\n\
         {extra}"
    )
}

fn make_previous(remote: &Remote, id: &str) -> PathBuf {
    let prev = remote.release_dir(id);
    std::fs::create_dir_all(&prev).expect("mkdir");
    #[cfg(unix)]
    std::os::unix::fs::symlink(&prev, remote.deploy.join("current")).expect("symlink");
    prev
}

#[test]
fn successful_run_links_current_and_runs_hooks() {
    let port = serve(200);
    let remote = Remote::new(&config(
        port,
        "hooks:\n  post_deploy: echo \"$HOIST_APP $HOIST_RELEASE_ID\" > \"$HOIST_DEPLOY_PATH/post.out\"\n",
    ));

    let (code, report, _) = remote.run(&remote.checksum);

    assert_eq!(code, 0, "{report:?}");
    assert!(report.succeeded());
    assert_eq!(report.steps.len(), Step::ALL.len());
    assert_eq!(remote.current_target(), Some(remote.release_dir(RELEASE_ID)));
    assert!(remote.deploy.join("current/index.html").exists());
    let hook = std::fs::read_to_string(remote.deploy.join("post.out")).expect("hook output");
    assert_eq!(hook.trim(), format!("site {RELEASE_ID}"));
    assert!(!remote.deploy.join(".hoist/deploy.lock").exists());
}

#[test]
fn long_running_server_is_started_and_left_running() {
    let port = serve(200);
    // Like a real server: write a PID file, then keep running in the foreground.
    let command = "mkdir -p ../../run && echo $$ > ../../run/server.pid && exec sleep 30";
    let remote = Remote::new(&server_config(command, port, ""));
    let started = Instant::now();

    let (code, report, _) = remote.run(&remote.checksum);

    assert_eq!(code, 0, "{report:?}");
    assert!(
        started.elapsed() < Duration::from_secs(20),
        "the pipeline must not wait for the server to exit"
    );
    let activate = &report.steps[Step::Activate.position()];
    assert!(
        activate.outcome.message.as_deref().is_some_and(|m| m.contains("as process")),
        "{activate:?}"
    );
    let pid = std::fs::read_to_string(remote.deploy.join("run/server.pid")).expect("pid file");
    let pid = pid.trim();
    let alive = std::process::Command::new("kill")
        .args(["-0", pid])
        .status()
        .expect("kill -0");
    assert!(alive.success(), "server must outlive hoist _remote");
    let _ = std::process::Command::new("kill").arg(pid).status();
}

#[test]
fn upload_directory_is_removed_after_the_run() {
    let port = serve(200);
    let remote = Remote::new(&config(port, "")).in_run_dir(&format!("{RELEASE_ID}.k3J9qz"));
    let run_dir = remote.deploy.join(format!(".hoist/{RELEASE_ID}.k3J9qz"));
    assert!(run_dir.is_dir());

    let (code, report, _) = remote.run(&remote.checksum);

    assert_eq!(code, 0, "{report:?}");
    assert_eq!(remote.current_target(), Some(remote.release_dir(RELEASE_ID)));
    assert!(!run_dir.exists());
}

#[test]
fn bad_checksum_exits_one_and_leaves_current_unchanged() {
    let port = serve(200);
    let remote = Remote::new(&config(port, ""));
    let previous = make_previous(&remote, "202601011200");

    let (code, report, stderr) = remote.run(&"0".repeat(40));

    assert_eq!(code, 1);
    assert_eq!(report.failed_step(), Some(Step::Verify));
    assert_eq!(remote.current_target(), Some(previous));
    assert!(!remote.release_dir(RELEASE_ID).exists());
    assert!(stderr.contains("verifying archive checksum"), "progress goes to stderr: {stderr}");
}

#[test]
fn unhealthy_server_rolls_back() {
    let port = serve(500);
    let remote = Remote::new(&config(port, ""));
    let previous = make_previous(&remote, "202601011200");

    let (code, report, _) = remote.run(&remote.checksum);

    assert_eq!(code, 1);
    match &report.status {
        RunStatus::Aborted { step, rollback, .. } => {
            assert_eq!(*step, Step::Ping);
            let rollback = rollback.as_ref().expect("rollback record");
            assert_eq!(rollback.restored.as_deref(), Some("202601011200"));
        }
        other => panic!("expected abort at ping, got {other:?}"),
    }
    assert_eq!(remote.current_target(), Some(previous));
}

#[test]
fn failing_pre_deploy_hook_stops_before_link() {
    let port = serve(200);
    let remote = Remote::new(&config(port, "hooks:\n  pre_deploy: exit 7\n"));

    let (code, report, _) = remote.run(&remote.checksum);

    assert_eq!(code, 1);
    assert_eq!(report.failed_step(), Some(Step::PreDeploy));
    assert_eq!(report.steps.last().map(|s| s.outcome.code), Some(7));
    assert!(remote.current_target().is_none());
    assert!(!remote.release_dir(RELEASE_ID).exists());
}

#[test]
fn held_lock_is_reported_as_rejected() {
    let remote = Remote::new(&config(1, ""));
    std::fs::write(remote.deploy.join(".hoist/deploy.lock"), "other run\n").expect("lock");

    let (code, report, _) = remote.run(&remote.checksum);

    assert_eq!(code, 1);
    assert!(matches!(report.status, RunStatus::Rejected { .. }));
    assert!(report.steps.is_empty());
}
