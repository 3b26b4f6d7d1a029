//! Synthetic codec components for GStreamer packages.
//!
//! Backends that know the capability lists of multimedia packages report
//! them on the package handle; each such package yields one `codec`
//! component describing what it can decode and encode.

use asgen_backends::GstreamerInfo;
use asgen_model::component::{Component, ComponentKind, Provided, ProvidedKind};

/// Build the codec component for a package, or `None` when the package
/// reports no capabilities.
pub fn build_codec_component(
    pkg_name: &str,
    summary: Option<&str>,
    gst: &GstreamerInfo,
) -> Option<Component> {
    if gst.is_empty() {
        return None;
    }

    let cid = format!("org.freedesktop.gstreamer.{}", sanitize_id(pkg_name));
    let mut cpt = Component::new(&cid, ComponentKind::Codec);
    cpt.name.insert(
        "C".to_string(),
        summary
            .map(str::to_string)
            .unwrap_or_else(|| format!("GStreamer multimedia plugins ({})", pkg_name)),
    );
    cpt.summary.insert(
        "C".to_string(),
        "Multimedia playback and creation support".to_string(),
    );

    for cap in gst.decoders.iter().chain(&gst.encoders) {
        cpt.provides.push(Provided {
            kind: ProvidedKind::MediaType,
            value: cap.clone(),
        });
    }
    for element in &gst.element_names {
        cpt.provides.push(Provided {
            kind: ProvidedKind::DBus,
            value: element.clone(),
        });
    }
    // URI handlers ride along as media types too; clients match them the
    // same way.
    for uri in gst.uri_sources.iter().chain(&gst.uri_sinks) {
        cpt.provides.push(Provided {
            kind: ProvidedKind::MediaType,
            value: format!("x-scheme-handler/{}", uri),
        });
    }

    Some(cpt)
}

fn sanitize_id(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn capabilities_become_provides() {
        let gst = GstreamerInfo {
            decoders: vec!["audio/mpeg".to_string()],
            encoders: vec!["audio/x-vorbis".to_string()],
            uri_sources: vec!["rtsp".to_string()],
            ..GstreamerInfo::default()
        };
        let cpt = build_codec_component("gst-plugins-good", Some("Good plugins"), &gst).unwrap();
        assert_eq!(cpt.kind, ComponentKind::Codec);
        assert_eq!(cpt.id, "org.freedesktop.gstreamer.gst-plugins-good");
        assert_eq!(cpt.name.get("C").unwrap(), "Good plugins");
        assert_eq!(cpt.provides.len(), 3);
        assert!(cpt
            .provides
            .iter()
            .any(|p| p.value == "x-scheme-handler/rtsp"));
    }

    #[test]
    fn empty_capabilities_yield_nothing() {
        assert!(build_codec_component("x", None, &GstreamerInfo::default()).is_none());
    }

    #[test]
    fn odd_package_names_are_sanitized() {
        let gst = GstreamerInfo {
            decoders: vec!["a/b".to_string()],
            ..GstreamerInfo::default()
        };
        let cpt = build_codec_component("weird_name+x", None, &gst).unwrap();
        assert_eq!(cpt.id, "org.freedesktop.gstreamer.weird-name-x");
    }
}
