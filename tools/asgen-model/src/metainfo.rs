//! Metainfo and catalog XML parsing.
//!
//! One parser handles both upstream metainfo files and our own catalog
//! component serialization; the two formats share their element
//! vocabulary and differ only in icon flavors and description layout.

use crate::catalog;
use crate::component::{
    Component, ComponentKind, Icon, Image, ImageKind, Launchable, LaunchableKind, Provided,
    ProvidedKind, Release, Screenshot, Video,
};
use chrono::NaiveDate;
use std::io::Cursor;
use xmltree::{Element, XMLNode};

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("invalid XML: {source}"))]
        XmlParse { source: xmltree::ParseError },

        #[snafu(display("unexpected root element <{root}>"))]
        BadRoot { root: String },
    }
}
pub use error::Error;
use snafu::ResultExt;

type Result<T> = std::result::Result<T, Error>;

/// Upper bound on the release entries kept per component; the newest
/// entries win since upstream serializes newest-first.
pub const MAX_RELEASES: usize = 6;

/// A parsed metainfo file. `ancient` is set when the data used the legacy
/// `<application>` root element.
#[derive(Debug)]
pub struct ParsedMetainfo {
    pub component: Component,
    pub ancient: bool,
}

/// Parse an upstream metainfo (or legacy appdata) document.
pub fn parse_metainfo(data: &[u8]) -> Result<ParsedMetainfo> {
    let root = Element::parse(Cursor::new(data)).context(error::XmlParseSnafu)?;
    let ancient = root.name == "application";
    if root.name != "component" && !ancient {
        return error::BadRootSnafu { root: root.name }.fail();
    }
    let mut component = parse_component_element(&root);
    if ancient && component.kind == ComponentKind::Generic {
        component.kind = ComponentKind::DesktopApplication;
    }
    Ok(ParsedMetainfo { component, ancient })
}

/// Parse a single `<component>` element in either format.
pub fn parse_component_element(el: &Element) -> Component {
    let mut cpt = Component::default();
    cpt.kind = match el.attributes.get("type") {
        Some(kind) => ComponentKind::from_str(kind),
        None => ComponentKind::Generic,
    };

    for child in child_elements(el) {
        match child.name.as_str() {
            "id" => cpt.id = text_of(child),
            "pkgname" => cpt.pkgname = Some(text_of(child)),
            "source_pkgname" => cpt.source_pkgname = Some(text_of(child)),
            "name" => insert_localized(&mut cpt.name, child),
            "summary" => insert_localized(&mut cpt.summary, child),
            "developer_name" => insert_localized(&mut cpt.developer_name, child),
            "developer" => {
                if let Some(name) = child.get_child("name") {
                    insert_localized(&mut cpt.developer_name, name);
                }
            }
            "description" => parse_description(&mut cpt, child),
            "metadata_license" => cpt.metadata_license = Some(text_of(child)),
            "project_license" => cpt.project_license = Some(text_of(child)),
            "project_group" => cpt.project_group = Some(text_of(child)),
            "categories" => {
                for cat in named_children(child, "category") {
                    let value = text_of(cat);
                    if !value.is_empty() {
                        cpt.categories.push(value);
                    }
                }
            }
            "keywords" => {
                for kw in named_children(child, "keyword") {
                    let locale = locale_of(kw);
                    let value = text_of(kw);
                    if !value.is_empty() {
                        cpt.keywords.entry(locale).or_default().push(value);
                    }
                }
            }
            "url" => {
                let kind = child
                    .attributes
                    .get("type")
                    .cloned()
                    .unwrap_or_else(|| "homepage".to_string());
                cpt.urls.insert(kind, text_of(child));
            }
            "icon" => {
                if let Some(icon) = parse_icon(child) {
                    cpt.icons.push(icon);
                }
            }
            "launchable" => {
                let kind = child
                    .attributes
                    .get("type")
                    .and_then(|t| LaunchableKind::from_str(t));
                if let Some(kind) = kind {
                    cpt.launchables.push(Launchable {
                        kind,
                        value: text_of(child),
                    });
                }
            }
            "provides" => parse_provides(&mut cpt, child),
            // Legacy location for media types, folded into provides.
            "mimetypes" => {
                for mt in named_children(child, "mimetype") {
                    cpt.provides.push(Provided {
                        kind: ProvidedKind::MediaType,
                        value: text_of(mt),
                    });
                }
            }
            "extends" => cpt.extends.push(text_of(child)),
            "compulsory_for_desktop" => cpt.compulsory_for_desktops.push(text_of(child)),
            "screenshots" => {
                for shot in named_children(child, "screenshot") {
                    cpt.screenshots.push(parse_screenshot(shot));
                }
            }
            "releases" => {
                for rel in named_children(child, "release") {
                    cpt.releases.push(parse_release(rel));
                    if cpt.releases.len() == MAX_RELEASES {
                        break;
                    }
                }
            }
            "translation" => {
                let kind = child
                    .attributes
                    .get("type")
                    .cloned()
                    .unwrap_or_else(|| "gettext".to_string());
                let domain = text_of(child);
                if !domain.is_empty() {
                    cpt.translations.push((kind, domain));
                }
            }
            "languages" => {
                for lang in named_children(child, "lang") {
                    let pct = lang
                        .attributes
                        .get("percentage")
                        .and_then(|p| p.parse::<u8>().ok())
                        .unwrap_or(100);
                    cpt.languages.insert(text_of(lang), pct);
                }
            }
            "custom" => {
                for value in named_children(child, "value") {
                    if let Some(key) = value.attributes.get("key") {
                        cpt.custom.insert(key.clone(), text_of(value));
                    }
                }
            }
            _ => {}
        }
    }

    cpt
}

fn parse_provides(cpt: &mut Component, el: &Element) {
    for child in child_elements(el) {
        if let Some(kind) = ProvidedKind::from_element_name(&child.name) {
            let value = text_of(child);
            if !value.is_empty() {
                cpt.provides.push(Provided { kind, value });
            }
        }
    }
}

fn parse_icon(el: &Element) -> Option<Icon> {
    let kind = el.attributes.get("type").map(String::as_str).unwrap_or("stock");
    let width = attr_u32(el, "width");
    let height = attr_u32(el, "height");
    let scale = attr_u32(el, "scale").unwrap_or(1);
    let value = text_of(el);
    if value.is_empty() {
        return None;
    }
    match kind {
        "stock" => Some(Icon::Stock { name: value }),
        "cached" => Some(Icon::Cached {
            name: value,
            width: width.unwrap_or(64),
            height: height.unwrap_or(64),
            scale,
        }),
        "remote" => Some(Icon::Remote {
            url: value,
            width: width.unwrap_or(64),
            height: height.unwrap_or(64),
            scale,
        }),
        "local" => Some(Icon::Local {
            path: value,
            width: width.unwrap_or(64),
            height: height.unwrap_or(64),
        }),
        _ => None,
    }
}

fn parse_screenshot(el: &Element) -> Screenshot {
    let mut shot = Screenshot {
        default: el.attributes.get("type").map(String::as_str) == Some("default"),
        ..Screenshot::default()
    };
    for child in child_elements(el) {
        match child.name.as_str() {
            "caption" => insert_localized(&mut shot.captions, child),
            "image" => {
                let kind = match child.attributes.get("type").map(String::as_str) {
                    Some("thumbnail") => ImageKind::Thumbnail,
                    _ => ImageKind::Source,
                };
                shot.images.push(Image {
                    kind,
                    url: text_of(child),
                    width: attr_u32(child, "width"),
                    height: attr_u32(child, "height"),
                });
            }
            "video" => shot.videos.push(Video {
                url: text_of(child),
                codec: child.attributes.get("codec").cloned(),
                container: child.attributes.get("container").cloned(),
            }),
            _ => {}
        }
    }
    shot
}

fn parse_release(el: &Element) -> Release {
    let mut release = Release {
        version: el.attributes.get("version").cloned().unwrap_or_default(),
        kind: el.attributes.get("type").cloned(),
        urgency: el.attributes.get("urgency").cloned(),
        ..Release::default()
    };
    release.timestamp = el
        .attributes
        .get("timestamp")
        .and_then(|t| t.parse::<i64>().ok())
        .or_else(|| {
            let date = el.attributes.get("date")?;
            let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            Some(parsed.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
        });
    if let Some(desc) = el.get_child("description") {
        let mut tmp = Component::default();
        parse_description(&mut tmp, desc);
        release.description = tmp.description;
    }
    release
}

/// Fold a `<description>` element into per-locale markup strings. The
/// metainfo format tags individual paragraphs with `xml:lang`; the catalog
/// format repeats the whole element per locale.
fn parse_description(cpt: &mut Component, el: &Element) {
    if let Some(locale) = el.attributes.get("lang") {
        let markup = children_markup(el);
        if !markup.is_empty() {
            cpt.description.insert(locale.clone(), markup);
        }
        return;
    }

    for child in child_elements(el) {
        let locale = locale_of(child);
        let markup = catalog::element_to_string(child);
        if markup.is_empty() {
            continue;
        }
        let entry = cpt.description.entry(locale).or_default();
        if !entry.is_empty() {
            entry.push('\n');
        }
        entry.push_str(&markup);
    }
}

fn children_markup(el: &Element) -> String {
    let mut out = String::new();
    for child in child_elements(el) {
        let markup = catalog::element_to_string(child);
        if markup.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&markup);
    }
    out
}

pub(crate) fn child_elements(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

fn named_children<'a>(el: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    child_elements(el).filter(move |child| child.name == name)
}

fn text_of(el: &Element) -> String {
    el.get_text().map(|t| t.trim().to_string()).unwrap_or_default()
}

/// The `xml:lang` of an element; xmltree strips the namespace prefix.
fn locale_of(el: &Element) -> String {
    el.attributes
        .get("lang")
        .cloned()
        .unwrap_or_else(|| "C".to_string())
}

fn insert_localized(map: &mut std::collections::BTreeMap<String, String>, el: &Element) {
    let value = text_of(el);
    if !value.is_empty() {
        map.insert(locale_of(el), value);
    }
}

fn attr_u32(el: &Element, name: &str) -> Option<u32> {
    el.attributes.get(name).and_then(|v| v.parse::<u32>().ok())
}
