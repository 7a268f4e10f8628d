//! Unit tests for hoist
//!
//! Services run against mocked processes, transports and probes; filesystem
//! and archive work happens in temporary directories.

mod architecture;
mod property_tests;
