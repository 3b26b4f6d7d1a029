//! Catalog XML emission.
//!
//! The emitter is hand-rolled rather than driven by the DOM library's
//! writer: attribute order must be sorted and field order fixed, because
//! the serialized bytes are the input to GCID hashing and have to be
//! byte-identical across runs and machines.

use crate::component::{Component, Icon, ImageKind, Release};
use std::fmt::Write as _;
use xmltree::{Element, XMLNode};

/// Format version stamped into catalog headers.
pub const FORMAT_VERSION: &str = "0.16";

/// Serialize one component to its canonical catalog form.
pub fn component_to_xml(cpt: &Component) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<component type=\"{}\">", cpt.kind.as_str());

    simple(&mut out, "id", &cpt.id);
    for (locale, value) in &cpt.name {
        localized(&mut out, "name", locale, value);
    }
    for (locale, value) in &cpt.summary {
        localized(&mut out, "summary", locale, value);
    }
    for (locale, value) in &cpt.developer_name {
        localized(&mut out, "developer_name", locale, value);
    }
    if let Some(pkgname) = &cpt.pkgname {
        simple(&mut out, "pkgname", pkgname);
    }
    if let Some(source) = &cpt.source_pkgname {
        simple(&mut out, "source_pkgname", source);
    }
    if let Some(license) = &cpt.project_license {
        simple(&mut out, "project_license", license);
    }
    if let Some(group) = &cpt.project_group {
        simple(&mut out, "project_group", group);
    }

    for (locale, markup) in &cpt.description {
        if locale == "C" {
            let _ = writeln!(out, "  <description>{}</description>", markup);
        } else {
            let _ = writeln!(
                out,
                "  <description xml:lang=\"{}\">{}</description>",
                escape_attr(locale),
                markup
            );
        }
    }

    if !cpt.categories.is_empty() {
        let _ = writeln!(out, "  <categories>");
        for category in &cpt.categories {
            let _ = writeln!(out, "    <category>{}</category>", escape_text(category));
        }
        let _ = writeln!(out, "  </categories>");
    }

    if !cpt.keywords.is_empty() {
        let _ = writeln!(out, "  <keywords>");
        for (locale, words) in &cpt.keywords {
            for word in words {
                if locale == "C" {
                    let _ = writeln!(out, "    <keyword>{}</keyword>", escape_text(word));
                } else {
                    let _ = writeln!(
                        out,
                        "    <keyword xml:lang=\"{}\">{}</keyword>",
                        escape_attr(locale),
                        escape_text(word)
                    );
                }
            }
        }
        let _ = writeln!(out, "  </keywords>");
    }

    for (kind, value) in &cpt.urls {
        let _ = writeln!(
            out,
            "  <url type=\"{}\">{}</url>",
            escape_attr(kind),
            escape_text(value)
        );
    }

    for launchable in &cpt.launchables {
        let _ = writeln!(
            out,
            "  <launchable type=\"{}\">{}</launchable>",
            launchable.kind.as_str(),
            escape_text(&launchable.value)
        );
    }

    for icon in &cpt.icons {
        write_icon(&mut out, icon);
    }

    if !cpt.provides.is_empty() {
        let _ = writeln!(out, "  <provides>");
        for provided in &cpt.provides {
            let _ = writeln!(
                out,
                "    <{0}>{1}</{0}>",
                provided.kind.element_name(),
                escape_text(&provided.value)
            );
        }
        let _ = writeln!(out, "  </provides>");
    }

    for extended in &cpt.extends {
        simple(&mut out, "extends", extended);
    }
    for desktop in &cpt.compulsory_for_desktops {
        simple(&mut out, "compulsory_for_desktop", desktop);
    }

    if !cpt.screenshots.is_empty() {
        let _ = writeln!(out, "  <screenshots>");
        for shot in &cpt.screenshots {
            if shot.default {
                let _ = writeln!(out, "    <screenshot type=\"default\">");
            } else {
                let _ = writeln!(out, "    <screenshot>");
            }
            for (locale, caption) in &shot.captions {
                if locale == "C" {
                    let _ = writeln!(out, "      <caption>{}</caption>", escape_text(caption));
                } else {
                    let _ = writeln!(
                        out,
                        "      <caption xml:lang=\"{}\">{}</caption>",
                        escape_attr(locale),
                        escape_text(caption)
                    );
                }
            }
            for image in &shot.images {
                let kind = match image.kind {
                    ImageKind::Source => "source",
                    ImageKind::Thumbnail => "thumbnail",
                };
                let mut dims = String::new();
                if let Some(width) = image.width {
                    let _ = write!(dims, " width=\"{}\"", width);
                }
                if let Some(height) = image.height {
                    let _ = write!(dims, " height=\"{}\"", height);
                }
                let _ = writeln!(
                    out,
                    "      <image type=\"{}\"{}>{}</image>",
                    kind,
                    dims,
                    escape_text(&image.url)
                );
            }
            for video in &shot.videos {
                let mut attrs = String::new();
                if let Some(codec) = &video.codec {
                    let _ = write!(attrs, " codec=\"{}\"", escape_attr(codec));
                }
                if let Some(container) = &video.container {
                    let _ = write!(attrs, " container=\"{}\"", escape_attr(container));
                }
                let _ = writeln!(
                    out,
                    "      <video{}>{}</video>",
                    attrs,
                    escape_text(&video.url)
                );
            }
            let _ = writeln!(out, "    </screenshot>");
        }
        let _ = writeln!(out, "  </screenshots>");
    }

    if !cpt.releases.is_empty() {
        let _ = writeln!(out, "  <releases>");
        for release in &cpt.releases {
            write_release(&mut out, release);
        }
        let _ = writeln!(out, "  </releases>");
    }

    if !cpt.languages.is_empty() {
        let _ = writeln!(out, "  <languages>");
        for (locale, percentage) in &cpt.languages {
            let _ = writeln!(
                out,
                "    <lang percentage=\"{}\">{}</lang>",
                percentage,
                escape_text(locale)
            );
        }
        let _ = writeln!(out, "  </languages>");
    }

    if !cpt.custom.is_empty() {
        let _ = writeln!(out, "  <custom>");
        for (key, value) in &cpt.custom {
            let _ = writeln!(
                out,
                "    <value key=\"{}\">{}</value>",
                escape_attr(key),
                escape_text(value)
            );
        }
        let _ = writeln!(out, "  </custom>");
    }

    out.push_str("</component>\n");
    out
}

fn simple(out: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let _ = writeln!(out, "  <{0}>{1}</{0}>", name, escape_text(value));
}

fn localized(out: &mut String, name: &str, locale: &str, value: &str) {
    if locale == "C" {
        let _ = writeln!(out, "  <{0}>{1}</{0}>", name, escape_text(value));
    } else {
        let _ = writeln!(
            out,
            "  <{0} xml:lang=\"{2}\">{1}</{0}>",
            name,
            escape_text(value),
            escape_attr(locale)
        );
    }
}

fn write_icon(out: &mut String, icon: &Icon) {
    match icon {
        Icon::Stock { name } => {
            let _ = writeln!(out, "  <icon type=\"stock\">{}</icon>", escape_text(name));
        }
        Icon::Cached {
            name,
            width,
            height,
            scale,
        } => {
            let scale_attr = if *scale > 1 {
                format!(" scale=\"{}\"", scale)
            } else {
                String::new()
            };
            let _ = writeln!(
                out,
                "  <icon type=\"cached\" width=\"{}\" height=\"{}\"{}>{}</icon>",
                width,
                height,
                scale_attr,
                escape_text(name)
            );
        }
        Icon::Remote {
            url,
            width,
            height,
            scale,
        } => {
            let scale_attr = if *scale > 1 {
                format!(" scale=\"{}\"", scale)
            } else {
                String::new()
            };
            let _ = writeln!(
                out,
                "  <icon type=\"remote\" width=\"{}\" height=\"{}\"{}>{}</icon>",
                width,
                height,
                scale_attr,
                escape_text(url)
            );
        }
        Icon::Local {
            path,
            width,
            height,
        } => {
            let _ = writeln!(
                out,
                "  <icon type=\"local\" width=\"{}\" height=\"{}\">{}</icon>",
                width,
                height,
                escape_text(path)
            );
        }
    }
}

fn write_release(out: &mut String, release: &Release) {
    let mut attrs = format!(" version=\"{}\"", escape_attr(&release.version));
    if let Some(ts) = release.timestamp {
        let _ = write!(attrs, " timestamp=\"{}\"", ts);
    }
    if let Some(kind) = &release.kind {
        let _ = write!(attrs, " type=\"{}\"", escape_attr(kind));
    }
    if let Some(urgency) = &release.urgency {
        let _ = write!(attrs, " urgency=\"{}\"", escape_attr(urgency));
    }
    if release.description.is_empty() {
        let _ = writeln!(out, "    <release{}/>", attrs);
    } else {
        let _ = writeln!(out, "    <release{}>", attrs);
        for (locale, markup) in &release.description {
            if locale == "C" {
                let _ = writeln!(out, "      <description>{}</description>", markup);
            } else {
                let _ = writeln!(
                    out,
                    "      <description xml:lang=\"{}\">{}</description>",
                    escape_attr(locale),
                    markup
                );
            }
        }
        let _ = writeln!(out, "    </release>");
    }
}

/// Assemble a full catalog document from pre-serialized components.
/// `time` is omitted when metadata timestamps are suppressed, keeping
/// repeated runs byte-identical.
pub fn catalog_document(
    origin: &str,
    media_baseurl: Option<&str>,
    arch: &str,
    priority: i32,
    time: Option<&str>,
    components: &[String],
) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = write!(
        out,
        "<components version=\"{}\" origin=\"{}\" architecture=\"{}\"",
        FORMAT_VERSION,
        escape_attr(origin),
        escape_attr(arch)
    );
    if let Some(url) = media_baseurl {
        let _ = write!(out, " media_baseurl=\"{}\"", escape_attr(url));
    }
    if priority != 0 {
        let _ = write!(out, " priority=\"{}\"", priority);
    }
    if let Some(time) = time {
        let _ = write!(out, " time=\"{}\"", escape_attr(time));
    }
    out.push_str(">\n");
    for component in components {
        for line in component.lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str("</components>\n");
    out
}

/// A removal stub: tells clients merging this suite over a lower-priority
/// one to hide the named component.
pub fn removal_stub_xml(cid: &str) -> String {
    format!(
        "<component merge=\"remove-component\">\n  <id>{}</id>\n</component>\n",
        escape_text(cid)
    )
}

/// Serialize a parsed element back to a string, attributes in sorted
/// order. Used for description markup blocks.
pub fn element_to_string(el: &Element) -> String {
    let mut out = String::new();
    write_node(&mut out, el);
    out
}

fn write_node(out: &mut String, el: &Element) {
    out.push('<');
    out.push_str(&el.name);
    let mut attrs: Vec<(&String, &String)> = el.attributes.iter().collect();
    attrs.sort();
    for (key, value) in attrs {
        // xmltree strips the namespace prefix from xml:lang on parse.
        let name = if key == "lang" { "xml:lang" } else { key.as_str() };
        let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            XMLNode::Element(child) => write_node(out, child),
            XMLNode::Text(text) => out.push_str(&escape_text(text)),
            XMLNode::CData(text) => out.push_str(&escape_text(text)),
            _ => {}
        }
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

pub fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
