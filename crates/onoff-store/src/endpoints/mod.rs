//! Read-only client for the forge REST API, split by resource.

pub mod profiles;
pub mod projects;
pub mod releases;
pub mod setup;

pub use releases::{ReleaseSource, pick_asset};
pub use setup::ForgeClient;

use serde::Serialize;

/// JSON envelope printed by the CLI.
#[derive(Serialize)]
pub struct PrintOutput<T>
where
    T: Serialize,
{
    pub status: String,
    pub output: T,
}
