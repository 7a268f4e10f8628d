//! Command implementations

pub mod deploy;
pub mod remote;
pub mod version;
