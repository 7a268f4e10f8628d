//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod health;
pub mod ignore;
pub mod layout;
pub mod release;

pub use config::{
    ConfigOverrides, DeployConfig, HealthConfig, HooksConfig, PackageConfig, ProcessConfig,
    RollbackPolicy, TagConfig, TransportConfig, normalize_signal,
};
pub use error::{ConfigError, DeployError, PackageError, StoreError};
pub use health::HealthStatus;
pub use ignore::IgnoreSet;
pub use layout::ReleaseLayout;
pub use release::{Release, VersionMarker};
