//! The AppStream component entity.
//!
//! Field shapes mirror the catalog metadata format. All localized fields
//! are ordered maps keyed by locale (`C` is the untranslated fallback) so
//! that serialization is deterministic.

use std::collections::{BTreeMap, BTreeSet};

/// Localized text: locale → value. Locale `C` is the untranslated form.
pub type TranslatedString = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentKind {
    #[default]
    Generic,
    DesktopApplication,
    ConsoleApplication,
    WebApplication,
    Addon,
    Font,
    Codec,
    Driver,
    Firmware,
    OperatingSystem,
    Runtime,
    Unknown,
}

impl ComponentKind {
    pub fn from_str(s: &str) -> ComponentKind {
        match s {
            "generic" => ComponentKind::Generic,
            // Legacy metainfo used "desktop" for desktop applications.
            "desktop-application" | "desktop" => ComponentKind::DesktopApplication,
            "console-application" => ComponentKind::ConsoleApplication,
            "web-application" => ComponentKind::WebApplication,
            "addon" => ComponentKind::Addon,
            "font" => ComponentKind::Font,
            "codec" => ComponentKind::Codec,
            "driver" => ComponentKind::Driver,
            "firmware" => ComponentKind::Firmware,
            "operating-system" => ComponentKind::OperatingSystem,
            "runtime" => ComponentKind::Runtime,
            _ => ComponentKind::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Generic => "generic",
            ComponentKind::DesktopApplication => "desktop-application",
            ComponentKind::ConsoleApplication => "console-application",
            ComponentKind::WebApplication => "web-application",
            ComponentKind::Addon => "addon",
            ComponentKind::Font => "font",
            ComponentKind::Codec => "codec",
            ComponentKind::Driver => "driver",
            ComponentKind::Firmware => "firmware",
            ComponentKind::OperatingSystem => "operating-system",
            ComponentKind::Runtime => "runtime",
            ComponentKind::Unknown => "unknown",
        }
    }
}

/// Icon reference. Cached icons point into the per-component media pool,
/// remote icons carry a public URL, stock icons name a theme entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icon {
    Stock {
        name: String,
    },
    Cached {
        name: String,
        width: u32,
        height: u32,
        scale: u32,
    },
    Remote {
        url: String,
        width: u32,
        height: u32,
        scale: u32,
    },
    Local {
        path: String,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Source,
    Thumbnail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub kind: ImageKind,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub url: String,
    pub codec: Option<String>,
    pub container: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Screenshot {
    pub default: bool,
    pub captions: TranslatedString,
    pub images: Vec<Image>,
    pub videos: Vec<Video>,
}

impl Screenshot {
    /// The remote source image, if any.
    pub fn source_image(&self) -> Option<&Image> {
        self.images.iter().find(|i| i.kind == ImageKind::Source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Release {
    pub version: String,
    pub timestamp: Option<i64>,
    pub kind: Option<String>,
    pub urgency: Option<String>,
    pub description: TranslatedString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LaunchableKind {
    DesktopId,
    Service,
    CockpitManifest,
    Url,
}

impl LaunchableKind {
    pub fn from_str(s: &str) -> Option<LaunchableKind> {
        match s {
            "desktop-id" => Some(LaunchableKind::DesktopId),
            "service" => Some(LaunchableKind::Service),
            "cockpit-manifest" => Some(LaunchableKind::CockpitManifest),
            "url" => Some(LaunchableKind::Url),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LaunchableKind::DesktopId => "desktop-id",
            LaunchableKind::Service => "service",
            LaunchableKind::CockpitManifest => "cockpit-manifest",
            LaunchableKind::Url => "url",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launchable {
    pub kind: LaunchableKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvidedKind {
    MediaType,
    Library,
    Binary,
    Font,
    Modalias,
    DBus,
    Firmware,
}

impl ProvidedKind {
    pub fn element_name(self) -> &'static str {
        match self {
            ProvidedKind::MediaType => "mediatype",
            ProvidedKind::Library => "library",
            ProvidedKind::Binary => "binary",
            ProvidedKind::Font => "font",
            ProvidedKind::Modalias => "modalias",
            ProvidedKind::DBus => "dbus",
            ProvidedKind::Firmware => "firmware",
        }
    }

    pub fn from_element_name(name: &str) -> Option<ProvidedKind> {
        match name {
            "mediatype" | "mimetype" => Some(ProvidedKind::MediaType),
            "library" => Some(ProvidedKind::Library),
            "binary" => Some(ProvidedKind::Binary),
            "font" => Some(ProvidedKind::Font),
            "modalias" => Some(ProvidedKind::Modalias),
            "dbus" => Some(ProvidedKind::DBus),
            "firmware" => Some(ProvidedKind::Firmware),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provided {
    pub kind: ProvidedKind,
    pub value: String,
}

/// The component entity assembled from metainfo, desktop data, and the
/// enrichment passes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Component {
    pub kind: ComponentKind,
    pub id: String,
    pub pkgname: Option<String>,
    pub source_pkgname: Option<String>,
    pub name: TranslatedString,
    pub summary: TranslatedString,
    /// Markup (paragraphs and lists) per locale.
    pub description: TranslatedString,
    pub developer_name: TranslatedString,
    pub project_license: Option<String>,
    pub metadata_license: Option<String>,
    pub project_group: Option<String>,
    pub categories: Vec<String>,
    /// Keywords per locale.
    pub keywords: BTreeMap<String, Vec<String>>,
    /// URL type → URL.
    pub urls: BTreeMap<String, String>,
    pub icons: Vec<Icon>,
    pub screenshots: Vec<Screenshot>,
    pub launchables: Vec<Launchable>,
    pub provides: Vec<Provided>,
    pub extends: Vec<String>,
    pub compulsory_for_desktops: Vec<String>,
    pub releases: Vec<Release>,
    /// Translation domains declared in the metainfo (kind, domain).
    pub translations: Vec<(String, String)>,
    /// Locale → completion percentage.
    pub languages: BTreeMap<String, u8>,
    /// `<custom/>` entries surviving the allow-list.
    pub custom: BTreeMap<String, String>,
}

impl Component {
    pub fn new(id: &str, kind: ComponentKind) -> Component {
        Component {
            id: id.to_string(),
            kind,
            ..Component::default()
        }
    }

    pub fn untranslated_name(&self) -> Option<&str> {
        self.name.get("C").map(String::as_str)
    }

    /// The desktop-id launchable, if one is declared.
    pub fn desktop_launchable(&self) -> Option<&str> {
        self.launchables
            .iter()
            .find(|l| l.kind == LaunchableKind::DesktopId)
            .map(|l| l.value.as_str())
    }

    /// The stock icon name requested by metainfo or desktop data.
    pub fn stock_icon_name(&self) -> Option<&str> {
        self.icons.iter().find_map(|icon| match icon {
            Icon::Stock { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// All cached icon sizes present on the component.
    pub fn cached_icon_sizes(&self) -> BTreeSet<(u32, u32)> {
        self.icons
            .iter()
            .filter_map(|icon| match icon {
                Icon::Cached { width, scale, .. } => Some((*width, *scale)),
                _ => None,
            })
            .collect()
    }

    /// Drop custom entries whose keys are not allow-listed.
    pub fn filter_custom(&mut self, allowed_keys: &[String]) {
        self.custom.retain(|key, _| allowed_keys.iter().any(|a| a == key));
    }

    /// Cap the release list to the `max` newest entries. Releases are
    /// expected newest-first, as serialized by upstream tooling.
    pub fn truncate_releases(&mut self, max: usize) {
        if self.releases.len() > max {
            self.releases.truncate(max);
        }
    }

    /// True when the component carries everything a catalog entry needs.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && self.kind != ComponentKind::Unknown
            && self.name.contains_key("C")
    }
}
