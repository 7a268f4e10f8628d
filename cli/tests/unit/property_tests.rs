//! Property-based tests for checksum integrity, release ids and report parsing.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use hoist_cli::application::services::pipeline::{PipelinePorts, run_pipeline};
use hoist_cli::domain::release::{format_report_line, parse_report};
use hoist_cli::infra::archive::TarGzArchiver;
use hoist_cli::infra::fs::LocalFs;
use hoist_common::{PipelineReport, RunStatus, Step, release_id_at, validate_release_id};

use crate::helpers::{RELEASE_ID, Target, test_config};
use crate::mocks::{RecordingHooks, RecordingReporter, ScriptedRunner, StaticProbe};

// ============================================================================
// Checksum verification
// ============================================================================

/// Run the pipeline for `target` on a fresh single-threaded runtime.
fn run_blocking(target: &Target) -> PipelineReport {
    let runner = ScriptedRunner::default();
    let probe = StaticProbe::healthy();
    let hooks = RecordingHooks::default();
    let ports = PipelinePorts {
        fs: &LocalFs,
        archiver: &TarGzArchiver,
        hasher: &LocalFs,
        runner: &runner,
        probe: &probe,
        hooks: &hooks,
    };
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    rt.block_on(run_pipeline(
        &test_config(),
        &target.args,
        &ports,
        &RecordingReporter::default(),
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Changing any single hex digit of the expected checksum aborts at verify
    /// before anything is extracted.
    #[test]
    fn prop_mutated_checksum_never_passes_verify(pos in 0usize..40, delta in 1u8..16) {
        let mut target = Target::staged(RELEASE_ID);
        let original = target.args.checksum.clone();
        let digit = u8::from_str_radix(&original[pos..=pos], 16).expect("hex digit");
        let replaced = format!("{:x}", (digit + delta) % 16);
        target.args.checksum.replace_range(pos..=pos, &replaced);
        prop_assume!(target.args.checksum != original);

        let report = run_blocking(&target);

        prop_assert_eq!(report.failed_step(), Some(Step::Verify));
        prop_assert!(!target.release_dir(RELEASE_ID).exists());
        prop_assert!(target.current_target().is_none());
    }

    /// Flipping bits in any single byte of the shipped archive aborts at
    /// verify: the expected checksum still describes the original bytes.
    #[test]
    fn prop_corrupted_archive_byte_never_passes_verify(
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let target = Target::staged(RELEASE_ID);
        let archive = target.archive_path();
        let mut bytes = std::fs::read(&archive).expect("read archive");
        let pos = index.index(bytes.len());
        bytes[pos] ^= flip;
        std::fs::write(&archive, &bytes).expect("write archive");

        let report = run_blocking(&target);

        prop_assert_eq!(report.failed_step(), Some(Step::Verify));
        prop_assert_eq!(report.steps.len(), 1);
        prop_assert!(!target.release_dir(RELEASE_ID).exists());
        prop_assert!(target.current_target().is_none());
    }
}

// ============================================================================
// Release ids
// ============================================================================

proptest! {
    /// Every timestamp yields a valid, path-safe 12-digit id.
    #[test]
    fn prop_release_id_is_always_valid(secs in 0i64..4_102_444_800) {
        let at = Utc.timestamp_opt(secs, 0).single().expect("in range");
        let id = release_id_at(at);
        prop_assert_eq!(id.len(), 12);
        prop_assert!(validate_release_id(&id).is_ok(), "rejected: {}", id);
    }

    /// Lexical order of ids follows chronological order at minute granularity.
    #[test]
    fn prop_release_ids_sort_chronologically(a in 0i64..4_102_444_800, b in 0i64..4_102_444_800) {
        let id = |s: i64| release_id_at(Utc.timestamp_opt(s, 0).single().expect("in range"));
        if a / 60 < b / 60 {
            prop_assert!(id(a) < id(b));
        }
    }
}

// ============================================================================
// Report line
// ============================================================================

proptest! {
    /// The report is found no matter what the remote printed before it.
    #[test]
    fn prop_report_survives_stdout_noise(noise in proptest::collection::vec("[a-zA-Z0-9 {}:\"]{0,40}", 0..8)) {
        let report = PipelineReport {
            app: "shop".to_string(),
            release_id: RELEASE_ID.to_string(),
            steps: Vec::new(),
            status: RunStatus::Rejected { message: "lock held".to_string() },
        };
        let mut stdout = noise.join("\n");
        stdout.push('\n');
        stdout.push_str(&format_report_line(&report).expect("serialize"));
        stdout.push('\n');

        prop_assert_eq!(parse_report(&stdout), Some(report));
    }
}
