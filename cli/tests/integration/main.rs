//! Integration tests for hoist
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! They are slower and should be run separately from unit tests.

mod cli_tests;
#[cfg(unix)]
mod remote_command;
