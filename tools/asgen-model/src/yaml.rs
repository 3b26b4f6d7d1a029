//! DEP-11 YAML catalog emission.
//!
//! Each suite/section/arch catalog is a multi-document YAML stream: one
//! header document followed by one document per component. Documents are
//! built as `serde_yaml` values; ordered maps in the component keep the
//! output stable.

use crate::component::{Component, Icon, ImageKind, ProvidedKind};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// The DEP-11 header document.
pub fn catalog_header(
    origin: &str,
    media_baseurl: Option<&str>,
    arch: &str,
    priority: i32,
    time: Option<&str>,
) -> Value {
    let mut map = Mapping::new();
    map.insert(key("File"), Value::from("DEP-11"));
    map.insert(key("Version"), Value::from(crate::catalog::FORMAT_VERSION));
    map.insert(key("Origin"), Value::from(origin));
    if let Some(url) = media_baseurl {
        map.insert(key("MediaBaseUrl"), Value::from(url));
    }
    map.insert(key("Architecture"), Value::from(arch));
    if priority != 0 {
        map.insert(key("Priority"), Value::from(priority));
    }
    if let Some(time) = time {
        map.insert(key("Time"), Value::from(time));
    }
    Value::Mapping(map)
}

/// One component document.
pub fn component_to_yaml(cpt: &Component) -> Value {
    let mut map = Mapping::new();
    map.insert(key("Type"), Value::from(cpt.kind.as_str()));
    map.insert(key("ID"), Value::from(cpt.id.as_str()));
    if let Some(pkgname) = &cpt.pkgname {
        map.insert(key("Package"), Value::from(pkgname.as_str()));
    }
    if let Some(source) = &cpt.source_pkgname {
        map.insert(key("SourcePackage"), Value::from(source.as_str()));
    }
    insert_translated(&mut map, "Name", &cpt.name);
    insert_translated(&mut map, "Summary", &cpt.summary);
    insert_translated(&mut map, "Description", &cpt.description);
    insert_translated(&mut map, "DeveloperName", &cpt.developer_name);
    if let Some(license) = &cpt.project_license {
        map.insert(key("ProjectLicense"), Value::from(license.as_str()));
    }
    if let Some(group) = &cpt.project_group {
        map.insert(key("ProjectGroup"), Value::from(group.as_str()));
    }
    if !cpt.categories.is_empty() {
        map.insert(key("Categories"), str_seq(&cpt.categories));
    }
    if !cpt.keywords.is_empty() {
        let mut kw = Mapping::new();
        for (locale, words) in &cpt.keywords {
            kw.insert(key(locale), str_seq(words));
        }
        map.insert(key("Keywords"), Value::Mapping(kw));
    }
    if !cpt.urls.is_empty() {
        let mut urls = Mapping::new();
        for (kind, url) in &cpt.urls {
            urls.insert(key(kind), Value::from(url.as_str()));
        }
        map.insert(key("Url"), Value::Mapping(urls));
    }
    insert_icons(&mut map, cpt);
    insert_launchables(&mut map, cpt);
    insert_provides(&mut map, cpt);
    if !cpt.extends.is_empty() {
        map.insert(key("Extends"), str_seq(&cpt.extends));
    }
    if !cpt.compulsory_for_desktops.is_empty() {
        map.insert(
            key("CompulsoryForDesktops"),
            str_seq(&cpt.compulsory_for_desktops),
        );
    }
    insert_screenshots(&mut map, cpt);
    insert_releases(&mut map, cpt);
    if !cpt.languages.is_empty() {
        let langs: Vec<Value> = cpt
            .languages
            .iter()
            .map(|(locale, pct)| {
                let mut entry = Mapping::new();
                entry.insert(key("locale"), Value::from(locale.as_str()));
                entry.insert(key("percentage"), Value::from(*pct as u64));
                Value::Mapping(entry)
            })
            .collect();
        map.insert(key("Languages"), Value::Sequence(langs));
    }
    if !cpt.custom.is_empty() {
        let mut custom = Mapping::new();
        for (k, v) in &cpt.custom {
            custom.insert(key(k), Value::from(v.as_str()));
        }
        map.insert(key("Custom"), Value::Mapping(custom));
    }
    Value::Mapping(map)
}

/// A removal stub document for the merge overlay.
pub fn removal_stub_yaml(cid: &str) -> Value {
    let mut map = Mapping::new();
    map.insert(key("Type"), Value::from("generic"));
    map.insert(key("ID"), Value::from(cid));
    map.insert(key("Merge"), Value::from("remove-component"));
    Value::Mapping(map)
}

fn insert_icons(map: &mut Mapping, cpt: &Component) {
    if cpt.icons.is_empty() {
        return;
    }
    let mut cached = Vec::new();
    let mut remote = Vec::new();
    let mut stock: Option<&str> = None;
    for icon in &cpt.icons {
        match icon {
            Icon::Stock { name } => stock = Some(name),
            Icon::Cached {
                name,
                width,
                height,
                scale,
            } => {
                let mut entry = Mapping::new();
                entry.insert(key("name"), Value::from(name.as_str()));
                entry.insert(key("width"), Value::from(*width as u64));
                entry.insert(key("height"), Value::from(*height as u64));
                if *scale > 1 {
                    entry.insert(key("scale"), Value::from(*scale as u64));
                }
                cached.push(Value::Mapping(entry));
            }
            Icon::Remote {
                url,
                width,
                height,
                scale,
            } => {
                let mut entry = Mapping::new();
                entry.insert(key("url"), Value::from(url.as_str()));
                entry.insert(key("width"), Value::from(*width as u64));
                entry.insert(key("height"), Value::from(*height as u64));
                if *scale > 1 {
                    entry.insert(key("scale"), Value::from(*scale as u64));
                }
                remote.push(Value::Mapping(entry));
            }
            Icon::Local { .. } => {}
        }
    }
    let mut icons = Mapping::new();
    if let Some(name) = stock {
        icons.insert(key("stock"), Value::from(name));
    }
    if !cached.is_empty() {
        icons.insert(key("cached"), Value::Sequence(cached));
    }
    if !remote.is_empty() {
        icons.insert(key("remote"), Value::Sequence(remote));
    }
    if !icons.is_empty() {
        map.insert(key("Icon"), Value::Mapping(icons));
    }
}

fn insert_launchables(map: &mut Mapping, cpt: &Component) {
    if cpt.launchables.is_empty() {
        return;
    }
    let mut grouped: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for launchable in &cpt.launchables {
        grouped
            .entry(launchable.kind.as_str())
            .or_default()
            .push(Value::from(launchable.value.as_str()));
    }
    let mut value = Mapping::new();
    for (kind, values) in grouped {
        value.insert(key(kind), Value::Sequence(values));
    }
    map.insert(key("Launchable"), Value::Mapping(value));
}

fn insert_provides(map: &mut Mapping, cpt: &Component) {
    if cpt.provides.is_empty() {
        return;
    }
    let mut grouped: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for provided in &cpt.provides {
        let group = match provided.kind {
            ProvidedKind::MediaType => "mediatypes",
            ProvidedKind::Library => "libraries",
            ProvidedKind::Binary => "binaries",
            ProvidedKind::Font => "fonts",
            ProvidedKind::Modalias => "modaliases",
            ProvidedKind::DBus => "dbus",
            ProvidedKind::Firmware => "firmware",
        };
        grouped
            .entry(group)
            .or_default()
            .push(Value::from(provided.value.as_str()));
    }
    let mut value = Mapping::new();
    for (group, values) in grouped {
        value.insert(key(group), Value::Sequence(values));
    }
    map.insert(key("Provides"), Value::Mapping(value));
}

fn insert_screenshots(map: &mut Mapping, cpt: &Component) {
    if cpt.screenshots.is_empty() {
        return;
    }
    let shots: Vec<Value> = cpt
        .screenshots
        .iter()
        .map(|shot| {
            let mut entry = Mapping::new();
            if shot.default {
                entry.insert(key("default"), Value::from(true));
            }
            if !shot.captions.is_empty() {
                let mut captions = Mapping::new();
                for (locale, caption) in &shot.captions {
                    captions.insert(key(locale), Value::from(caption.as_str()));
                }
                entry.insert(key("caption"), Value::Mapping(captions));
            }
            for image in &shot.images {
                if image.kind == ImageKind::Source {
                    entry.insert(key("source-image"), image_value(image));
                }
            }
            let thumbs: Vec<Value> = shot
                .images
                .iter()
                .filter(|i| i.kind == ImageKind::Thumbnail)
                .map(image_value)
                .collect();
            if !thumbs.is_empty() {
                entry.insert(key("thumbnails"), Value::Sequence(thumbs));
            }
            Value::Mapping(entry)
        })
        .collect();
    map.insert(key("Screenshots"), Value::Sequence(shots));
}

fn image_value(image: &crate::component::Image) -> Value {
    let mut entry = Mapping::new();
    entry.insert(key("url"), Value::from(image.url.as_str()));
    if let Some(width) = image.width {
        entry.insert(key("width"), Value::from(width as u64));
    }
    if let Some(height) = image.height {
        entry.insert(key("height"), Value::from(height as u64));
    }
    Value::Mapping(entry)
}

fn insert_releases(map: &mut Mapping, cpt: &Component) {
    if cpt.releases.is_empty() {
        return;
    }
    let releases: Vec<Value> = cpt
        .releases
        .iter()
        .map(|release| {
            let mut entry = Mapping::new();
            entry.insert(key("version"), Value::from(release.version.as_str()));
            if let Some(ts) = release.timestamp {
                entry.insert(key("unix-timestamp"), Value::from(ts));
            }
            if let Some(kind) = &release.kind {
                entry.insert(key("type"), Value::from(kind.as_str()));
            }
            if let Some(urgency) = &release.urgency {
                entry.insert(key("urgency"), Value::from(urgency.as_str()));
            }
            if !release.description.is_empty() {
                let mut desc = Mapping::new();
                for (locale, markup) in &release.description {
                    desc.insert(key(locale), Value::from(markup.as_str()));
                }
                entry.insert(key("description"), Value::Mapping(desc));
            }
            Value::Mapping(entry)
        })
        .collect();
    map.insert(key("Releases"), Value::Sequence(releases));
}

fn insert_translated(
    map: &mut Mapping,
    name: &str,
    translated: &crate::component::TranslatedString,
) {
    if translated.is_empty() {
        return;
    }
    let mut value = Mapping::new();
    for (locale, text) in translated {
        value.insert(key(locale), Value::from(text.as_str()));
    }
    map.insert(key(name), Value::Mapping(value));
}

fn key(name: &str) -> Value {
    Value::from(name)
}

fn str_seq(values: &[String]) -> Value {
    Value::Sequence(values.iter().map(|v| Value::from(v.as_str())).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::component::{Component, ComponentKind, Image, Screenshot};

    #[test]
    fn header_fields() {
        let header = catalog_header("asgen-sid-main", Some("https://m.example"), "amd64", 5, None);
        let text = serde_yaml::to_string(&header).unwrap();
        assert!(text.contains("File: DEP-11"));
        assert!(text.contains("Origin: asgen-sid-main"));
        assert!(text.contains("Priority: 5"));
    }

    #[test]
    fn component_document_carries_core_fields() {
        let mut cpt = Component::new("org.example.Foo", ComponentKind::DesktopApplication);
        cpt.name.insert("C".to_string(), "Foo".to_string());
        cpt.pkgname = Some("foo".to_string());
        cpt.categories.push("Utility".to_string());
        cpt.screenshots.push(Screenshot {
            default: true,
            images: vec![Image {
                kind: ImageKind::Source,
                url: "https://example.org/shot.png".to_string(),
                width: Some(1024),
                height: Some(576),
            }],
            ..Screenshot::default()
        });
        let text = serde_yaml::to_string(&component_to_yaml(&cpt)).unwrap();
        assert!(text.contains("Type: desktop-application"));
        assert!(text.contains("ID: org.example.Foo"));
        assert!(text.contains("Package: foo"));
        assert!(text.contains("source-image"));
    }

    #[test]
    fn removal_stub_document() {
        let text = serde_yaml::to_string(&removal_stub_yaml("org.example.Gone")).unwrap();
        assert!(text.contains("Merge: remove-component"));
    }

    #[test]
    fn icons_group_by_flavor() {
        use crate::component::Icon;
        let mut cpt = Component::new("org.example.Foo", ComponentKind::DesktopApplication);
        cpt.name.insert("C".to_string(), "Foo".to_string());
        cpt.icons.push(Icon::Stock {
            name: "foo".to_string(),
        });
        cpt.icons.push(Icon::Cached {
            name: "org.example.Foo.png".to_string(),
            width: 64,
            height: 64,
            scale: 1,
        });
        cpt.icons.push(Icon::Cached {
            name: "org.example.Foo.png".to_string(),
            width: 64,
            height: 64,
            scale: 2,
        });
        cpt.icons.push(Icon::Remote {
            url: "or/org.example.Foo/1.0/x/icons/128x128/org.example.Foo.png".to_string(),
            width: 128,
            height: 128,
            scale: 1,
        });
        let text = serde_yaml::to_string(&component_to_yaml(&cpt)).unwrap();
        assert!(text.contains("stock: foo"));
        assert!(text.contains("cached:"));
        assert!(text.contains("remote:"));
        assert!(text.contains("scale: 2"));
    }

    #[test]
    fn launchables_and_provides_group_by_kind() {
        use crate::component::{Launchable, LaunchableKind, Provided, ProvidedKind};
        let mut cpt = Component::new("org.example.Foo", ComponentKind::DesktopApplication);
        cpt.name.insert("C".to_string(), "Foo".to_string());
        cpt.launchables.push(Launchable {
            kind: LaunchableKind::DesktopId,
            value: "org.example.Foo.desktop".to_string(),
        });
        cpt.provides.push(Provided {
            kind: ProvidedKind::Binary,
            value: "foo".to_string(),
        });
        cpt.provides.push(Provided {
            kind: ProvidedKind::MediaType,
            value: "text/x-foo".to_string(),
        });
        let text = serde_yaml::to_string(&component_to_yaml(&cpt)).unwrap();
        assert!(text.contains("Launchable:"));
        assert!(text.contains("desktop-id:"));
        assert!(text.contains("- org.example.Foo.desktop"));
        assert!(text.contains("binaries:"));
        assert!(text.contains("mediatypes:"));
    }

    #[test]
    fn releases_carry_timestamps_and_descriptions() {
        use crate::component::Release;
        let mut cpt = Component::new("org.example.Foo", ComponentKind::Generic);
        cpt.name.insert("C".to_string(), "Foo".to_string());
        let mut description = std::collections::BTreeMap::new();
        description.insert("C".to_string(), "<p>Fixes.</p>".to_string());
        cpt.releases.push(Release {
            version: "1.2".to_string(),
            timestamp: Some(1709251200),
            urgency: Some("high".to_string()),
            description,
            ..Release::default()
        });
        let text = serde_yaml::to_string(&component_to_yaml(&cpt)).unwrap();
        assert!(text.contains("version: '1.2'") || text.contains("version: 1.2"));
        assert!(text.contains("unix-timestamp: 1709251200"));
        assert!(text.contains("urgency: high"));
        assert!(text.contains("<p>Fixes.</p>"));
    }

    #[test]
    fn languages_serialize_with_percentages() {
        let mut cpt = Component::new("org.example.Foo", ComponentKind::Generic);
        cpt.name.insert("C".to_string(), "Foo".to_string());
        cpt.languages.insert("de".to_string(), 96);
        cpt.languages.insert("fr".to_string(), 48);
        let text = serde_yaml::to_string(&component_to_yaml(&cpt)).unwrap();
        assert!(text.contains("locale: de"));
        assert!(text.contains("percentage: 96"));
        assert!(text.contains("locale: fr"));
    }
}
