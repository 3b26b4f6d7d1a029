/*!
Persistent state of the generator, kept in two embedded key-value
databases.

The contents store maps package ids to their file listings (with icon and
locale projections used for cross-package lookups), the data store maps
global content-ids to serialized component data and hints and keeps the
pkid → GCID join used at publish time. Both databases follow a strict
single-writer, many-reader discipline: workers open short-lived read
transactions while the commit thread is the only writer. redb's MVCC
snapshots give readers a consistent view throughout.
*/

mod contents;
mod data;

pub use contents::ContentsStore;
pub use data::{ComponentUpdate, DataStore, PackageUpdate, SCHEMA_VERSION};

use std::path::PathBuf;

mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("unable to open database {}: {source}", path.display()))]
        Open {
            path: PathBuf,
            source: redb::DatabaseError,
        },

        #[snafu(display("unable to create database directory {}: {source}", path.display()))]
        CreateDir {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("database operation failed: {source}"))]
        Storage { source: redb::Error },

        #[snafu(display(
            "cache schema version mismatch: found {found}, expected {expected}; \
             remove the workspace db directory to re-create it"
        ))]
        SchemaVersion { found: u32, expected: u32 },

        #[snafu(display("stored value for '{key}' is not valid JSON: {source}"))]
        BadStoredJson {
            key: String,
            source: serde_json::Error,
        },
    }
}
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Adapt any redb error into the store error type.
pub(crate) fn db<T, E: Into<redb::Error>>(result: std::result::Result<T, E>) -> Result<T> {
    result.map_err(|e| Error::Storage { source: e.into() })
}

pub(crate) fn ensure_parent_dir(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
