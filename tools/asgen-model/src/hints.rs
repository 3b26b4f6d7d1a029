//! Issue hints and the global tag registry.
//!
//! Every problem encountered while processing a package is recorded as a
//! hint: a tag, variable substitutions for the explanation template, and
//! optionally the component it belongs to. Severities live in a global
//! registry seeded with the built-in tag table; validator adapters may
//! register additional tags at startup. Emitting a hint with a tag the
//! registry does not know rewrites it to `internal-unknown-tag` so the
//! mistake surfaces as an error instead of vanishing.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

/// How severe an issue is. `Error` makes the affected component invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintSeverity {
    Pedantic,
    Info,
    Warning,
    Error,
}

impl HintSeverity {
    pub fn is_error(self) -> bool {
        self == HintSeverity::Error
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HintSeverity::Pedantic => "pedantic",
            HintSeverity::Info => "info",
            HintSeverity::Warning => "warning",
            HintSeverity::Error => "error",
        }
    }
}

impl fmt::Display for HintSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HintSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pedantic" => Ok(HintSeverity::Pedantic),
            "info" => Ok(HintSeverity::Info),
            "warning" => Ok(HintSeverity::Warning),
            "error" => Ok(HintSeverity::Error),
            other => Err(format!("unknown hint severity '{}'", other)),
        }
    }
}

/// One recorded issue. The severity is not stored here; it is looked up
/// from the registry so that a registry update re-grades old hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
}

impl Hint {
    pub fn new(tag: &str, vars: &[(&str, &str)]) -> Self {
        Hint {
            tag: tag.to_string(),
            vars: vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn severity(&self) -> HintSeverity {
        severity_of(&self.tag).unwrap_or(HintSeverity::Error)
    }
}

struct TagInfo {
    severity: HintSeverity,
    explanation: String,
}

/// Built-in tag table: (tag, severity, explanation template). Templates
/// use `{var}` placeholders filled from the hint's variables when reports
/// are rendered.
const BUILTIN_TAGS: &[(&str, HintSeverity, &str)] = &[
    (
        "internal-error",
        HintSeverity::Error,
        "A generator-internal error occurred: {msg}",
    ),
    (
        "internal-unknown-tag",
        HintSeverity::Error,
        "The tag '{tag}' was emitted but is not registered. This is a bug in the generator.",
    ),
    (
        "pkg-extract-error",
        HintSeverity::Error,
        "Could not read the package archive: {msg}",
    ),
    (
        "backend-unavailable",
        HintSeverity::Error,
        "The repository index for {suite}/{section} [{arch}] could not be read: {msg}",
    ),
    (
        "processing-cancelled",
        HintSeverity::Warning,
        "Processing of this package was cancelled before it completed.",
    ),
    (
        "ancient-metadata",
        HintSeverity::Warning,
        "The metainfo file was found in the legacy appdata location '{fname}'. Move it to /usr/share/metainfo.",
    ),
    (
        "metainfo-parsing-error",
        HintSeverity::Error,
        "Unable to parse '{fname}': {msg}",
    ),
    (
        "metainfo-no-id",
        HintSeverity::Error,
        "The component in '{fname}' has no id. Components without an id are not addressable.",
    ),
    (
        "metainfo-unknown-type",
        HintSeverity::Error,
        "The component type '{kind}' is not known to this generator.",
    ),
    (
        "metainfo-license-invalid",
        HintSeverity::Error,
        "The metadata license '{license}' does not permit catalog redistribution.",
    ),
    (
        "missing-desktop-file",
        HintSeverity::Warning,
        "The component declares the launchable '{desktop_id}' but the package ships no such .desktop file.",
    ),
    (
        "desktop-file-error",
        HintSeverity::Warning,
        "Could not parse the desktop file '{fname}': {msg}",
    ),
    (
        "desktop-app-ignored-nodisplay",
        HintSeverity::Info,
        "The desktop entry for this component sets NoDisplay=true, so it was dropped from the catalog.",
    ),
    (
        "desktop-app-ignored-x-appstream",
        HintSeverity::Info,
        "The desktop entry for this component sets X-AppStream-Ignore=true, so it was dropped from the catalog.",
    ),
    (
        "desktop-app-hidden-onlyshowin",
        HintSeverity::Info,
        "The desktop entry restricts OnlyShowIn to '{desktops}' and no configured desktop matches, so the component was dropped.",
    ),
    (
        "desktop-app-without-category",
        HintSeverity::Error,
        "A desktop application must have at least one valid category.",
    ),
    (
        "description-missing",
        HintSeverity::Pedantic,
        "The component has no long description. Software centers show an empty page for it.",
    ),
    (
        "icon-not-found",
        HintSeverity::Error,
        "The icon '{icon_name}' was not found in the archive or any icon-theme package.",
    ),
    (
        "icon-format-unsupported",
        HintSeverity::Warning,
        "The icon '{fname}' has a format that can not be published ({format}).",
    ),
    (
        "icon-scaled-up",
        HintSeverity::Info,
        "The icon '{icon_name}' was only available at 48x48 and has been upscaled to 64x64.",
    ),
    (
        "screenshot-download-error",
        HintSeverity::Warning,
        "Could not download the screenshot '{url}': {msg}",
    ),
    (
        "screenshot-download-insecure",
        HintSeverity::Warning,
        "Refused to follow an HTTPS-to-HTTP downgrade while fetching '{url}'.",
    ),
    (
        "screenshot-save-error",
        HintSeverity::Warning,
        "Could not store the screenshot from '{url}': {msg}",
    ),
    (
        "screenshot-no-thumbnails",
        HintSeverity::Info,
        "No thumbnails could be derived from '{url}'; the source image is smaller than every thumbnail size.",
    ),
    (
        "font-load-error",
        HintSeverity::Warning,
        "Could not open the font file '{fname}': {msg}",
    ),
    (
        "font-metainfo-but-no-font",
        HintSeverity::Warning,
        "The component is of type 'font' but the package ships no usable TTF or OTF files.",
    ),
    (
        "no-translation-statistics",
        HintSeverity::Info,
        "No translation data was found for the domain '{domain}'.",
    ),
];

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, TagInfo>> = {
        let mut map = HashMap::new();
        for (tag, severity, explanation) in BUILTIN_TAGS {
            map.insert(
                (*tag).to_string(),
                TagInfo {
                    severity: *severity,
                    explanation: (*explanation).to_string(),
                },
            );
        }
        RwLock::new(map)
    };
}

/// Look up the severity for a tag. `None` for unregistered tags.
pub fn severity_of(tag: &str) -> Option<HintSeverity> {
    REGISTRY
        .read()
        .expect("hint registry poisoned")
        .get(tag)
        .map(|info| info.severity)
}

/// Look up the explanation template for a tag.
pub fn explanation_of(tag: &str) -> Option<String> {
    REGISTRY
        .read()
        .expect("hint registry poisoned")
        .get(tag)
        .map(|info| info.explanation.clone())
}

/// Register an additional tag, e.g. for validator-provided issues. An
/// existing entry for the same tag is left untouched.
pub fn register_tag(tag: &str, severity: HintSeverity, explanation: &str) {
    let mut registry = REGISTRY.write().expect("hint registry poisoned");
    registry.entry(tag.to_string()).or_insert(TagInfo {
        severity,
        explanation: explanation.to_string(),
    });
}

/// True when the registry knows the tag.
pub fn tag_known(tag: &str) -> bool {
    REGISTRY
        .read()
        .expect("hint registry poisoned")
        .contains_key(tag)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn severity_ordering_matches_escalation() {
        assert!(HintSeverity::Pedantic < HintSeverity::Info);
        assert!(HintSeverity::Info < HintSeverity::Warning);
        assert!(HintSeverity::Warning < HintSeverity::Error);
    }

    #[test]
    fn builtin_tags_resolve() {
        assert_eq!(severity_of("icon-not-found"), Some(HintSeverity::Error));
        assert_eq!(
            severity_of("screenshot-no-thumbnails"),
            Some(HintSeverity::Info)
        );
        assert_eq!(severity_of("no-such-tag"), None);
    }

    #[test]
    fn dynamic_registration_does_not_override() {
        register_tag("asv-test-tag", HintSeverity::Warning, "test: {msg}");
        assert_eq!(severity_of("asv-test-tag"), Some(HintSeverity::Warning));
        register_tag("asv-test-tag", HintSeverity::Error, "changed");
        assert_eq!(severity_of("asv-test-tag"), Some(HintSeverity::Warning));
    }

    #[test]
    fn hint_roundtrips_through_json() {
        let hint = Hint::new("icon-not-found", &[("icon_name", "foo")]);
        let json = serde_json::to_string(&hint).unwrap();
        let back: Hint = serde_json::from_str(&json).unwrap();
        assert_eq!(hint, back);
    }
}
