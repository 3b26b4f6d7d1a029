/*!
Configuration for the generator, read from `asgen-config.json`.

The file selects a backend and metadata flavor, describes the suites to
process, sets the icon policy, and toggles feature flags. Loading
normalizes everything: suite base references are validated as a DAG, the
icon policy is repaired to always cache 64×64, and unknown feature keys
are warned about rather than rejected.
*/

mod icons;
mod suites;

pub use icons::{IconPolicy, IconPolicyEntry, IconSize};
pub use suites::Suite;

use log::warn;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("unable to read config file {}: {source}", path.display()))]
        ReadConfig {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("unable to parse config file {}: {source}", path.display()))]
        ParseConfig {
            path: PathBuf,
            source: serde_json::Error,
        },

        #[snafu(display("unknown metadata type '{value}', expected XML or YAML"))]
        BadMetadataType { value: String },

        #[snafu(display("no suites are configured"))]
        NoSuites,

        #[snafu(display("suite '{suite}' references unknown base suite '{base}'"))]
        UnknownBaseSuite { suite: String, base: String },

        #[snafu(display("base-suite references form a cycle involving '{suite}'"))]
        BaseSuiteCycle { suite: String },
    }
}
pub use error::Error;

type Result<T> = std::result::Result<T, Error>;

/// Serialization flavor for catalog output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataType {
    Xml,
    Yaml,
}

/// Feature toggles. Field defaults match the documented defaults of the
/// generator; the config's `Features` object overrides individual flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    pub validate_metainfo: bool,
    pub process_desktop: bool,
    pub no_downloads: bool,
    pub store_screenshots: bool,
    pub screenshot_videos: bool,
    pub propagate_metainfo_artifacts: bool,
    pub optimize_png_size: bool,
    pub metadata_timestamps: bool,
    pub immutable_suites: bool,
    pub process_fonts: bool,
    pub allow_icon_upscaling: bool,
    pub process_gstreamer: bool,
    pub process_locale: bool,
    pub process_mime_types: bool,
}

impl Default for Features {
    fn default() -> Features {
        Features {
            validate_metainfo: true,
            process_desktop: true,
            no_downloads: false,
            store_screenshots: true,
            screenshot_videos: false,
            propagate_metainfo_artifacts: false,
            optimize_png_size: true,
            metadata_timestamps: true,
            immutable_suites: true,
            process_fonts: true,
            allow_icon_upscaling: true,
            process_gstreamer: true,
            process_locale: true,
            process_mime_types: true,
        }
    }
}

impl Features {
    fn apply(&mut self, key: &str, value: bool) -> bool {
        match key {
            "validateMetainfo" => self.validate_metainfo = value,
            "processDesktop" => self.process_desktop = value,
            "noDownloads" => self.no_downloads = value,
            "createScreenshotsStore" => self.store_screenshots = value,
            "screenshotVideos" => self.screenshot_videos = value,
            "propagateMetaInfoArtifacts" => self.propagate_metainfo_artifacts = value,
            "optimizePNGSize" => self.optimize_png_size = value,
            "metadataTimestamps" => self.metadata_timestamps = value,
            "immutableSuites" => self.immutable_suites = value,
            "processFonts" => self.process_fonts = value,
            "allowIconUpscaling" => self.allow_icon_upscaling = value,
            "processGStreamer" => self.process_gstreamer = value,
            "processLocale" => self.process_locale = value,
            "processAppStreamMimeTypes" => self.process_mime_types = value,
            _ => return false,
        }
        true
    }

    /// A stable fingerprint of all flags, recorded per repository triple
    /// so that changing the feature set defeats the fast-path skip.
    pub fn fingerprint(&self) -> String {
        [
            self.validate_metainfo,
            self.process_desktop,
            self.no_downloads,
            self.store_screenshots,
            self.screenshot_videos,
            self.propagate_metainfo_artifacts,
            self.optimize_png_size,
            self.metadata_timestamps,
            self.immutable_suites,
            self.process_fonts,
            self.allow_icon_upscaling,
            self.process_gstreamer,
            self.process_locale,
            self.process_mime_types,
        ]
        .iter()
        .map(|f| if *f { '1' } else { '0' })
        .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawExportDirs {
    #[serde(rename = "Media")]
    media: Option<PathBuf>,
    #[serde(rename = "Data")]
    data: Option<PathBuf>,
    #[serde(rename = "Hints")]
    hints: Option<PathBuf>,
    #[serde(rename = "Html")]
    html: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawIconFlags {
    #[serde(default)]
    cached: bool,
    #[serde(default)]
    remote: bool,
}

#[derive(Debug, Deserialize)]
struct RawSuite {
    #[serde(default)]
    sections: Vec<String>,
    #[serde(default)]
    architectures: Vec<String>,
    #[serde(rename = "baseSuite")]
    base_suite: Option<String>,
    #[serde(rename = "dataPriority")]
    data_priority: Option<i32>,
    #[serde(rename = "useIconTheme")]
    icon_theme: Option<String>,
    #[serde(default)]
    immutable: bool,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "ProjectName")]
    project_name: Option<String>,
    #[serde(rename = "Backend")]
    backend: Option<String>,
    #[serde(rename = "MetadataType")]
    metadata_type: Option<String>,
    #[serde(rename = "ArchiveRoot")]
    archive_root: Option<String>,
    #[serde(rename = "MediaBaseUrl")]
    media_base_url: Option<String>,
    #[serde(rename = "HtmlBaseUrl")]
    html_base_url: Option<String>,
    #[serde(rename = "CAInfo")]
    ca_info: Option<PathBuf>,
    #[serde(rename = "AllowedCustomKeys", default)]
    allowed_custom_keys: Vec<String>,
    #[serde(rename = "ExportDirs", default)]
    export_dirs: RawExportDirs,
    #[serde(rename = "ExtraMetainfoDir")]
    extra_metainfo_dir: Option<PathBuf>,
    #[serde(rename = "WorkspaceDir")]
    workspace_dir: Option<PathBuf>,
    #[serde(rename = "Icons", default)]
    icons: BTreeMap<String, RawIconFlags>,
    #[serde(rename = "Suites", default)]
    suites: BTreeMap<String, RawSuite>,
    #[serde(rename = "Features", default)]
    features: BTreeMap<String, bool>,
    #[serde(rename = "Oldsuites", default)]
    oldsuites: Vec<String>,
}

/// Per-kind export locations, all resolved to absolute-ish paths at load.
#[derive(Debug, Clone)]
pub struct ExportDirs {
    pub media: PathBuf,
    pub data: PathBuf,
    pub hints: PathBuf,
    pub html: PathBuf,
}

/// The validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_name: String,
    pub backend: String,
    pub metadata_type: MetadataType,
    pub archive_root: String,
    pub media_base_url: Option<String>,
    pub html_base_url: Option<String>,
    pub ca_info: Option<PathBuf>,
    pub allowed_custom_keys: Vec<String>,
    pub workspace_dir: PathBuf,
    pub export_dirs: ExportDirs,
    pub extra_metainfo_dir: Option<PathBuf>,
    pub icons: IconPolicy,
    pub suites: Vec<Suite>,
    pub features: Features,
    pub oldsuites: Vec<String>,
    /// Set from `--force`: defeats change detection and fast-path skips.
    pub force: bool,
}

impl Config {
    /// Load and validate a config file. `workspace_override` comes from
    /// the `-w` command line flag and wins over the config's entry.
    pub fn load(path: &Path, workspace_override: Option<&Path>) -> Result<Config> {
        let data = fs::read_to_string(path).context(error::ReadConfigSnafu { path })?;
        let raw: RawConfig =
            serde_json::from_str(&data).context(error::ParseConfigSnafu { path })?;

        let metadata_type = match raw.metadata_type.as_deref() {
            None | Some("XML") => MetadataType::Xml,
            Some("YAML") => MetadataType::Yaml,
            Some(other) => {
                return error::BadMetadataTypeSnafu { value: other }.fail();
            }
        };

        let workspace_dir = workspace_override
            .map(Path::to_path_buf)
            .or_else(|| raw.workspace_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        let export_root = workspace_dir.join("export");
        let export_dirs = ExportDirs {
            media: raw
                .export_dirs
                .media
                .unwrap_or_else(|| export_root.join("media")),
            data: raw
                .export_dirs
                .data
                .unwrap_or_else(|| export_root.join("data")),
            hints: raw
                .export_dirs
                .hints
                .unwrap_or_else(|| export_root.join("hints")),
            html: raw
                .export_dirs
                .html
                .unwrap_or_else(|| export_root.join("html")),
        };

        let mut features = Features::default();
        for (key, value) in &raw.features {
            if !features.apply(key, *value) {
                warn!("Ignoring unknown feature flag '{}'", key);
            }
        }

        let icons = IconPolicy::from_raw(
            raw.icons
                .iter()
                .map(|(size, flags)| (size.as_str(), flags.cached, flags.remote)),
        );

        let suites: Vec<Suite> = raw
            .suites
            .iter()
            .map(|(name, s)| Suite {
                name: name.clone(),
                sections: s.sections.clone(),
                architectures: s.architectures.clone(),
                base_suite: s.base_suite.clone(),
                data_priority: s.data_priority.unwrap_or(0),
                icon_theme: s.icon_theme.clone(),
                immutable: s.immutable,
            })
            .collect();
        if suites.is_empty() {
            return error::NoSuitesSnafu.fail();
        }
        suites::validate_base_dag(&suites)?;

        Ok(Config {
            project_name: raw
                .project_name
                .unwrap_or_else(|| "AppStream".to_string()),
            backend: raw.backend.unwrap_or_else(|| "plain".to_string()),
            metadata_type,
            archive_root: raw.archive_root.unwrap_or_default(),
            media_base_url: raw.media_base_url,
            html_base_url: raw.html_base_url,
            ca_info: raw.ca_info,
            allowed_custom_keys: raw.allowed_custom_keys,
            workspace_dir,
            export_dirs,
            extra_metainfo_dir: raw.extra_metainfo_dir,
            icons,
            suites,
            features,
            oldsuites: raw.oldsuites,
            force: false,
        })
    }

    pub fn suite(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.name == name)
    }

    /// Directory holding the embedded databases.
    pub fn database_dir(&self) -> PathBuf {
        self.workspace_dir.join("db")
    }

    /// Scratch space for per-package temporary directories.
    pub fn temp_dir(&self) -> PathBuf {
        self.workspace_dir.join("tmp")
    }

    /// Catalog origin string for a suite/section pair.
    pub fn origin(&self, suite: &str, section: &str) -> String {
        format!(
            "{}-{}-{}",
            self.project_name.to_lowercase(),
            suite,
            section
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"{
        "ProjectName": "Tanglu",
        "ArchiveRoot": "/srv/archive",
        "Backend": "plain",
        "Suites": {
            "chromodoris": {
                "sections": ["main"],
                "architectures": ["amd64"]
            }
        }
    }"#;

    #[test]
    fn minimal_config_loads_with_defaults() {
        let file = write_config(MINIMAL);
        let config = Config::load(file.path(), None).unwrap();
        assert_eq!(config.project_name, "Tanglu");
        assert_eq!(config.metadata_type, MetadataType::Xml);
        assert!(config.features.validate_metainfo);
        assert!(!config.features.no_downloads);
        assert!(config.icons.entry(IconSize::new(64, 1)).unwrap().cached);
        assert_eq!(config.origin("chromodoris", "main"), "tanglu-chromodoris-main");
    }

    #[test]
    fn feature_overrides_apply() {
        let file = write_config(
            r#"{
            "Suites": {"s": {"sections": ["main"], "architectures": ["amd64"]}},
            "Features": {"noDownloads": true, "processFonts": false}
        }"#,
        );
        let config = Config::load(file.path(), None).unwrap();
        assert!(config.features.no_downloads);
        assert!(!config.features.process_fonts);
        assert!(config.features.process_desktop);
    }

    #[test]
    fn fingerprint_tracks_flags() {
        let a = Features::default();
        let mut b = Features::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.no_downloads = true;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn base_suite_cycle_is_rejected() {
        let file = write_config(
            r#"{
            "Suites": {
                "a": {"sections": ["main"], "architectures": ["amd64"], "baseSuite": "b"},
                "b": {"sections": ["main"], "architectures": ["amd64"], "baseSuite": "a"}
            }
        }"#,
        );
        assert!(matches!(
            Config::load(file.path(), None),
            Err(Error::BaseSuiteCycle { .. })
        ));
    }

    #[test]
    fn unknown_base_suite_is_rejected() {
        let file = write_config(
            r#"{
            "Suites": {
                "a": {"sections": ["main"], "architectures": ["amd64"], "baseSuite": "ghost"}
            }
        }"#,
        );
        assert!(matches!(
            Config::load(file.path(), None),
            Err(Error::UnknownBaseSuite { .. })
        ));
    }

    #[test]
    fn missing_suites_is_an_error() {
        let file = write_config(r#"{"ProjectName": "x"}"#);
        assert!(matches!(
            Config::load(file.path(), None),
            Err(Error::NoSuites)
        ));
    }

    #[test]
    fn workspace_override_wins() {
        let file = write_config(MINIMAL);
        let config = Config::load(file.path(), Some(Path::new("/tmp/ws"))).unwrap();
        assert_eq!(config.workspace_dir, PathBuf::from("/tmp/ws"));
        assert_eq!(config.database_dir(), PathBuf::from("/tmp/ws/db"));
    }
}
