/*!
Backend contracts and the bundled backends.

A backend knows how to enumerate the packages of a (suite, section, arch)
triple and hand out `Package` handles for file-by-file reads. The core
pipeline only ever talks to these traits; distribution-specific index
formats live behind them. Bundled here: the `plain` filesystem backend
(a JSON index plus tar.gz archives, used by tests and small setups) and
the synthetic fake-package machinery that feeds maintainer-provided
extra metainfo through the normal pipeline.
*/

pub mod archive;
pub mod fake;
pub mod injected;
pub mod plain;

use asgen_store::DataStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub enum Error {
        #[snafu(display("unable to open archive {}: {source}", path.display()))]
        ArchiveOpen {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("unable to read archive {}: {source}", path.display()))]
        ArchiveRead {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("file '{name}' not found in archive {}", path.display()))]
        FileNotInArchive { path: PathBuf, name: String },

        #[snafu(display("unable to read package index {}: {source}", path.display()))]
        IndexRead {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("unable to parse package index {}: {source}", path.display()))]
        IndexParse {
            path: PathBuf,
            source: serde_json::Error,
        },

        #[snafu(display("package '{pkid}' has no local file"))]
        NoLocalFile { pkid: String },

        #[snafu(display("unable to scan directory {}: {source}", path.display()))]
        DirScan {
            path: PathBuf,
            source: walkdir::Error,
        },

        #[snafu(display("unable to read {}: {source}", path.display()))]
        FileRead {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(context(false), display("store error: {source}"))]
        Store { source: asgen_store::Error },

        #[snafu(display("unknown backend '{name}'"))]
        UnknownBackend { name: String },
    }
}
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// A real archive in the repository pool.
    Physical,
    /// Synthesized in memory, e.g. injected extra metainfo.
    Fake,
    Unknown,
}

/// GStreamer capabilities a backend may report for a multimedia package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GstreamerInfo {
    pub decoders: Vec<String>,
    pub encoders: Vec<String>,
    pub element_names: Vec<String>,
    pub uri_sources: Vec<String>,
    pub uri_sinks: Vec<String>,
}

impl GstreamerInfo {
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
            && self.encoders.is_empty()
            && self.element_names.is_empty()
            && self.uri_sources.is_empty()
            && self.uri_sinks.is_empty()
    }
}

/// A single package of the repository. Implementations own their archive
/// handles and release them in `finish()`; the processor guarantees a
/// `finish()` call on every exit path.
pub trait Package: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn arch(&self) -> &str;
    fn kind(&self) -> PackageKind;

    fn maintainer(&self) -> &str {
        ""
    }

    /// Locale → short summary.
    fn summary(&self) -> &BTreeMap<String, String>;

    /// Locale → long description.
    fn description(&self) -> &BTreeMap<String, String>;

    /// Local path of the package archive. May trigger a download; must be
    /// idempotent and thread-safe. Fake packages have none.
    fn filename(&self) -> Result<PathBuf>;

    /// All file paths shipped by the package, absolute.
    fn contents(&self) -> Result<Vec<String>>;

    /// Read one file out of the package.
    fn file_data(&self, path: &str) -> Result<Vec<u8>>;

    /// Release cached archive state.
    fn finish(&self);

    fn gst(&self) -> Option<&GstreamerInfo> {
        None
    }

    /// Translations shipped outside the package (e.g. language packs):
    /// keyfile name and original text → locale → translated text.
    fn desktop_file_translations(
        &self,
        _keyfile_name: &str,
        _text: &str,
    ) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// The unique package identifier `name/version/arch`.
    fn id(&self) -> String {
        format!("{}/{}/{}", self.name(), self.version(), self.arch())
    }
}

/// A repository reader.
pub trait Backend: Send + Sync {
    /// All packages of the given triple. Uniqueness per (name, arch) is
    /// the caller's concern; backends return what the index lists.
    fn packages_for(
        &self,
        suite: &str,
        section: &str,
        arch: &str,
        with_long_descs: bool,
    ) -> Result<Vec<Arc<dyn Package>>>;

    /// Resolve a single package file to a handle, if the backend can.
    fn package_for_file(
        &self,
        path: &Path,
        suite: Option<&str>,
        section: Option<&str>,
    ) -> Result<Option<Arc<dyn Package>>>;

    /// Whether the index changed since the last recorded state. A `true`
    /// result records the new state.
    fn has_changes(
        &self,
        dstore: &DataStore,
        suite: &str,
        section: &str,
        arch: &str,
    ) -> Result<bool>;

    /// Drop internal caches.
    fn release(&self);
}

/// Instantiate the backend selected by the configuration.
pub fn backend_by_name(name: &str, archive_root: &str) -> Result<Arc<dyn Backend>> {
    match name {
        "plain" | "dummy" => Ok(Arc::new(plain::PlainBackend::new(Path::new(archive_root)))),
        other => error::UnknownBackendSnafu { name: other }.fail(),
    }
}
