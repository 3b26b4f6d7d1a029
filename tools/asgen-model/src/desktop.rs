//! Desktop-entry parsing and fusion into components.
//!
//! Desktop files supply launcher data (name, summary, categories,
//! keywords, icon) that metainfo files frequently omit. Fusion only fills
//! fields the metainfo left empty; metainfo always wins when both declare
//! a value.

use crate::component::{Component, Icon, TranslatedString};
use configparser::ini::Ini;
use std::collections::BTreeMap;

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("invalid keyfile: {msg}"))]
        KeyfileParse { msg: String },

        #[snafu(display("no [Desktop Entry] group present"))]
        NoDesktopGroup,
    }
}
pub use error::Error;

type Result<T> = std::result::Result<T, Error>;

/// The freedesktop main category registry. Anything outside this list is
/// dropped from catalog output; auxiliary tags like toolkit names do not
/// help users browse a software center.
const PRIMARY_CATEGORIES: &[&str] = &[
    "AudioVideo",
    "Audio",
    "Video",
    "Development",
    "Education",
    "Game",
    "Graphics",
    "Network",
    "Office",
    "Science",
    "Settings",
    "System",
    "Utility",
];

/// Parsed subset of a desktop entry.
#[derive(Debug, Default, Clone)]
pub struct DesktopEntry {
    pub name: TranslatedString,
    pub summary: TranslatedString,
    pub categories: Vec<String>,
    pub keywords: BTreeMap<String, Vec<String>>,
    pub icon: Option<String>,
    pub no_display: bool,
    pub hidden: bool,
    pub only_show_in: Vec<String>,
    pub appstream_ignore: bool,
}

/// Why a desktop entry removes its component from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopRejection {
    NoDisplay,
    AppStreamIgnore,
    OnlyShowIn(Vec<String>),
}

impl DesktopEntry {
    /// Whether this entry hides the component. `OnlyShowIn` with any
    /// non-empty list rejects, since the generator configures no desktop
    /// environment of its own.
    pub fn rejection(&self) -> Option<DesktopRejection> {
        if self.appstream_ignore {
            return Some(DesktopRejection::AppStreamIgnore);
        }
        if self.no_display || self.hidden {
            return Some(DesktopRejection::NoDisplay);
        }
        if !self.only_show_in.is_empty() {
            return Some(DesktopRejection::OnlyShowIn(self.only_show_in.clone()));
        }
        None
    }
}

/// Parse desktop-entry data.
pub fn parse_desktop_data(data: &str) -> Result<DesktopEntry> {
    let mut ini = Ini::new_cs();
    ini.set_inline_comment_symbols(Some(&[]));
    let map = ini
        .read(data.to_string())
        .map_err(|msg| error::KeyfileParseSnafu { msg }.build())?;
    let group = map.get("Desktop Entry").ok_or_else(|| error::NoDesktopGroupSnafu.build())?;

    let mut entry = DesktopEntry::default();
    for (raw_key, value) in group {
        let value = match value {
            Some(v) => v.trim(),
            None => continue,
        };
        let (k, locale) = split_locale_key(raw_key);
        match k {
            "Name" => {
                entry.name.insert(locale, value.to_string());
            }
            "Comment" => {
                entry.summary.insert(locale, value.to_string());
            }
            "Categories" if locale == "C" => entry.categories = split_list(value),
            "Keywords" => {
                entry.keywords.insert(locale, split_list(value));
            }
            "Icon" if locale == "C" => entry.icon = Some(value.to_string()),
            "NoDisplay" if locale == "C" => entry.no_display = value.eq_ignore_ascii_case("true"),
            "Hidden" if locale == "C" => entry.hidden = value.eq_ignore_ascii_case("true"),
            "OnlyShowIn" if locale == "C" => entry.only_show_in = split_list(value),
            "X-AppStream-Ignore" if locale == "C" => {
                entry.appstream_ignore = value.eq_ignore_ascii_case("true")
            }
            _ => {}
        }
    }
    Ok(entry)
}

/// Merge launcher data into a component, filling only what is missing.
pub fn fuse_desktop_entry(cpt: &mut Component, entry: &DesktopEntry) {
    if cpt.name.is_empty() {
        cpt.name = entry.name.clone();
    }
    if cpt.summary.is_empty() {
        cpt.summary = entry.summary.clone();
    }
    if cpt.categories.is_empty() {
        cpt.categories = filter_categories(&entry.categories);
    } else {
        cpt.categories = filter_categories(&cpt.categories);
    }
    if cpt.keywords.is_empty() {
        cpt.keywords = entry.keywords.clone();
    }
    if cpt.stock_icon_name().is_none() {
        if let Some(icon) = &entry.icon {
            // An absolute path in Icon= is a local file reference, not a
            // theme lookup name.
            if icon.starts_with('/') {
                cpt.icons.push(Icon::Local {
                    path: icon.clone(),
                    width: 64,
                    height: 64,
                });
            } else {
                cpt.icons.push(Icon::Stock { name: icon.clone() });
            }
        }
    }
}

/// Keep only categories from the primary registry.
pub fn filter_categories(categories: &[String]) -> Vec<String> {
    categories
        .iter()
        .filter(|c| PRIMARY_CATEGORIES.contains(&c.as_str()))
        .cloned()
        .collect()
}

/// Split `Name[de_DE.UTF-8@mod]` into key and normalized locale.
fn split_locale_key(raw: &str) -> (&str, String) {
    match raw.find('[') {
        Some(open) if raw.ends_with(']') => {
            let key = &raw[..open];
            let locale = &raw[open + 1..raw.len() - 1];
            (key, normalize_locale(locale))
        }
        _ => (raw, "C".to_string()),
    }
}

/// Strip the encoding part of a locale; `de_DE.UTF-8@euro` → `de_DE@euro`.
fn normalize_locale(locale: &str) -> String {
    match locale.find('.') {
        Some(dot) => {
            let modifier = locale[dot..].find('@').map(|at| &locale[dot + at..]);
            let mut out = locale[..dot].to_string();
            if let Some(modifier) = modifier {
                out.push_str(modifier);
            }
            out
        }
        None => locale.to_string(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::component::ComponentKind;

    const SAMPLE: &str = "[Desktop Entry]\n\
Type=Application\n\
Name=Foo\n\
Name[de]=Fu\n\
Name[sr@latin]=Fuu\n\
Comment=Do things\n\
Comment[de_DE.UTF-8]=Dinge tun\n\
Categories=GTK;Utility;Development;\n\
Keywords=alpha;beta;\n\
Icon=foo\n";

    #[test]
    fn parses_localized_keys() {
        let entry = parse_desktop_data(SAMPLE).unwrap();
        assert_eq!(entry.name.get("C").unwrap(), "Foo");
        assert_eq!(entry.name.get("de").unwrap(), "Fu");
        assert_eq!(entry.name.get("sr@latin").unwrap(), "Fuu");
        assert_eq!(entry.summary.get("de_DE").unwrap(), "Dinge tun");
        assert_eq!(entry.icon.as_deref(), Some("foo"));
        assert_eq!(entry.categories, vec!["GTK", "Utility", "Development"]);
    }

    #[test]
    fn fusion_fills_missing_fields_only() {
        let entry = parse_desktop_data(SAMPLE).unwrap();
        let mut cpt = Component::new("org.example.Foo", ComponentKind::DesktopApplication);
        cpt.name.insert("C".to_string(), "Metainfo Foo".to_string());
        fuse_desktop_entry(&mut cpt, &entry);
        // Metainfo name wins, the rest comes from the launcher.
        assert_eq!(cpt.name.get("C").unwrap(), "Metainfo Foo");
        assert_eq!(cpt.summary.get("C").unwrap(), "Do things");
        assert_eq!(cpt.categories, vec!["Utility", "Development"]);
        assert_eq!(cpt.stock_icon_name(), Some("foo"));
    }

    #[test]
    fn toolkit_categories_are_filtered() {
        let cats = vec!["GTK".to_string(), "KDE".to_string(), "Game".to_string()];
        assert_eq!(filter_categories(&cats), vec!["Game"]);
    }

    #[test]
    fn rejection_rules() {
        let mut entry = parse_desktop_data(SAMPLE).unwrap();
        assert_eq!(entry.rejection(), None);
        entry.only_show_in = vec!["GNOME".to_string()];
        assert!(matches!(
            entry.rejection(),
            Some(DesktopRejection::OnlyShowIn(_))
        ));
        entry.no_display = true;
        assert_eq!(entry.rejection(), Some(DesktopRejection::NoDisplay));
        entry.appstream_ignore = true;
        assert_eq!(entry.rejection(), Some(DesktopRejection::AppStreamIgnore));
    }

    #[test]
    fn missing_group_is_an_error() {
        assert!(parse_desktop_data("[Other]\nName=x\n").is_err());
    }
}
