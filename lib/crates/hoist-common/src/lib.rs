//! Types shared by the local orchestrator and the remote pipeline.

pub mod release;
pub mod types;

pub use release::{
    ReleaseArgs, ReleaseError, archive_file_name, release_id_at, validate_checksum,
    validate_release_id,
};
pub use types::*;
