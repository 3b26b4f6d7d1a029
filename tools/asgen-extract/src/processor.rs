//! The per-package unit of work.
//!
//! Components move through a small state machine: DISCOVERED when their
//! metainfo file is found, PARSED after XML parsing and the kind/license
//! gates, VALIDATED after the validator pass, ENRICHED once icons, fonts,
//! screenshots and language data are attached, and STORED when they are
//! final in the result. Any error-severity hint short-circuits to
//! IGNORED. The package itself never fails the run; archive-level
//! problems abort only this package.

use crate::downloader::Downloader;
use crate::fonts::FontService;
use crate::icons::IconHandler;
use crate::screenshots::ScreenshotContext;
use crate::validator::ValidatorPool;
use crate::{gstreamer, locale, media, screenshots};
use asgen_backends::Package;
use asgen_config::Config;
use asgen_model::component::{Component, ComponentKind, Launchable, LaunchableKind};
use asgen_model::desktop::{self, DesktopRejection};
use asgen_model::{catalog, gcid, metainfo, spdx, GeneratorResult};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Resolves pkids to live package handles for cross-package reads.
pub type PackageMap = BTreeMap<String, Arc<dyn Package>>;

/// Cooperative cancellation token for one engine run.
#[derive(Clone, Default)]
pub struct RunToken(Arc<AtomicBool>);

impl RunToken {
    pub fn new() -> RunToken {
        RunToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read-only state shared by all workers of one (suite, section, arch)
/// seed.
pub struct ExtractorShared {
    pub config: Arc<Config>,
    pub icon_handler: Arc<IconHandler>,
    pub downloader: Arc<dyn Downloader>,
    pub fonts: Arc<FontService>,
    pub validators: Arc<ValidatorPool>,
    /// Locale file path → owning pkid, across the package set.
    pub locale_paths: Arc<BTreeMap<String, String>>,
    pub token: RunToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Discovered,
    Parsed,
    Validated,
    Enriched,
    Stored,
    Ignored,
}

fn transition(cid: &str, from: UnitState, to: UnitState) -> UnitState {
    trace!("component {}: {:?} -> {:?}", cid, from, to);
    to
}

/// Process one package into a `GeneratorResult`. The package handle is
/// released on every exit path.
pub fn process_package(
    shared: &ExtractorShared,
    pkg: &dyn Package,
    pkg_map: &PackageMap,
) -> GeneratorResult {
    let result = process_inner(shared, pkg, pkg_map);
    pkg.finish();
    result
}

fn process_inner(
    shared: &ExtractorShared,
    pkg: &dyn Package,
    pkg_map: &PackageMap,
) -> GeneratorResult {
    let pkid = pkg.id();
    let mut res = GeneratorResult::new(&pkid, pkg.name());
    debug!("Processing package {}", pkid);

    let contents = match pkg.contents() {
        Ok(contents) => contents,
        Err(e) => {
            res.add_hint(None, "pkg-extract-error", &[("msg", &e.to_string())]);
            return res;
        }
    };

    let worker_index = rayon::current_thread_index().unwrap_or(0);

    // Component discovery: current metainfo location first, then the
    // legacy appdata location.
    for path in &contents {
        if shared.token.is_cancelled() {
            res.add_hint(None, "processing-cancelled", &[]);
            return res;
        }
        let (is_metainfo, ancient_location) =
            if path.starts_with("/usr/share/metainfo/") && path.ends_with(".xml") {
                (true, false)
            } else if path.starts_with("/usr/share/appdata/")
                && (path.ends_with(".xml") || path.ends_with(".xml.in"))
            {
                (true, true)
            } else {
                (false, false)
            };
        if is_metainfo {
            process_metainfo_file(
                shared,
                pkg,
                &mut res,
                &contents,
                path,
                ancient_location,
                worker_index,
            );
        }
    }

    if shared.config.features.process_gstreamer {
        if let Some(gst) = pkg.gst() {
            if let Some(cpt) = gstreamer::build_codec_component(
                pkg.name(),
                pkg.summary().get("C").map(String::as_str),
                gst,
            ) {
                trace!("component {}: synthesized from GStreamer data", cpt.id);
                res.add_component(cpt);
            }
        }
    }

    // Enrichment: everything that needs the full package set or media
    // output. Components are drained and re-added so hints can be
    // recorded while they are being reworked.
    let components = res.take_components();
    for mut cpt in components {
        let cid = cpt.id.clone();
        if res.is_ignored(&cid) {
            continue;
        }
        if shared.token.is_cancelled() {
            res.add_hint(None, "processing-cancelled", &[]);
            break;
        }
        let mut state = UnitState::Validated;

        cpt.filter_custom(&shared.config.allowed_custom_keys);
        cpt.pkgname = Some(pkg.name().to_string());

        if cpt.kind == ComponentKind::DesktopApplication {
            cpt.categories = desktop::filter_categories(&cpt.categories);
            if cpt.categories.is_empty() {
                res.add_hint(Some(&cid), "desktop-app-without-category", &[]);
                transition(&cid, state, UnitState::Ignored);
                continue;
            }
        }
        // Applications without an upstream description fall back to the
        // packager's long description, which is what the backend's
        // long-description flag fetches.
        if cpt.description.is_empty() {
            for (locale, text) in pkg.description() {
                let markup = format!("<p>{}</p>", catalog::escape_text(text));
                cpt.description.insert(locale.clone(), markup);
            }
        }
        if cpt.description.is_empty()
            && matches!(
                cpt.kind,
                ComponentKind::DesktopApplication | ComponentKind::ConsoleApplication
            )
        {
            res.add_hint(Some(&cid), "description-missing", &[]);
        }

        // The content hash covers the component before media enrichment;
        // media paths embed the GCID and therefore cannot be part of it.
        let canonical = catalog::component_to_xml(&cpt);
        let cpt_gcid = gcid::build_gcid(&cid, pkg.version(), canonical.as_bytes());
        res.set_gcid(&cid, cpt_gcid.clone());

        let media_root = shared.config.export_dirs.media.clone();

        if cpt.kind == ComponentKind::Font {
            if shared.config.features.process_fonts
                && !process_font_component(shared, &contents, pkg, &mut res, &mut cpt, &cpt_gcid)
            {
                transition(&cid, state, UnitState::Ignored);
                continue;
            }
        } else if !shared.icon_handler.process_icons(
            &mut cpt,
            &mut res,
            pkg_map,
            &media_root,
            &cpt_gcid,
        ) {
            transition(&cid, state, UnitState::Ignored);
            continue;
        }

        let ctx = ScreenshotContext {
            downloader: shared.downloader.as_ref(),
            media_root: &media_root,
            store_screenshots: shared.config.features.store_screenshots,
            allow_videos: shared.config.features.screenshot_videos,
            no_downloads: shared.config.features.no_downloads,
            optimize_png: shared.config.features.optimize_png_size,
        };
        screenshots::process_screenshots(&mut cpt, &mut res, &ctx, &cpt_gcid);

        if shared.config.features.process_locale {
            locale::process_locale(&mut cpt, &mut res, &shared.locale_paths);
        }

        state = transition(&cid, state, UnitState::Enriched);
        if res.is_ignored(&cid) {
            transition(&cid, state, UnitState::Ignored);
            continue;
        }
        if !cpt.is_valid() {
            res.add_hint(
                Some(&cid),
                "internal-error",
                &[("msg", "component is incomplete after enrichment")],
            );
            transition(&cid, state, UnitState::Ignored);
            continue;
        }
        transition(&cid, state, UnitState::Stored);
        res.add_component(cpt);
    }

    res
}

#[allow(clippy::too_many_arguments)]
fn process_metainfo_file(
    shared: &ExtractorShared,
    pkg: &dyn Package,
    res: &mut GeneratorResult,
    contents: &[String],
    path: &str,
    ancient_location: bool,
    worker_index: usize,
) {
    let fname = path;
    let data = match pkg.file_data(path) {
        Ok(data) => data,
        Err(e) => {
            res.add_hint(
                None,
                "metainfo-parsing-error",
                &[("fname", fname), ("msg", &e.to_string())],
            );
            return;
        }
    };

    let parsed = match metainfo::parse_metainfo(&data) {
        Ok(parsed) => parsed,
        Err(e) => {
            res.add_hint(
                None,
                "metainfo-parsing-error",
                &[("fname", fname), ("msg", &e.to_string())],
            );
            return;
        }
    };
    let mut cpt = parsed.component;
    if cpt.id.is_empty() {
        res.add_hint(None, "metainfo-no-id", &[("fname", fname)]);
        return;
    }
    let cid = cpt.id.clone();
    let mut state = transition(&cid, UnitState::Discovered, UnitState::Parsed);

    if ancient_location || parsed.ancient {
        res.add_hint(Some(&cid), "ancient-metadata", &[("fname", fname)]);
    }

    if cpt.kind == ComponentKind::Unknown {
        res.add_hint(
            Some(&cid),
            "metainfo-unknown-type",
            &[("kind", "unknown")],
        );
        transition(&cid, state, UnitState::Ignored);
        return;
    }

    let license = cpt.metadata_license.clone().unwrap_or_default();
    if !spdx::is_metadata_license(&license) {
        let shown = if license.is_empty() {
            "(none)"
        } else {
            license.as_str()
        };
        res.add_hint(
            Some(&cid),
            "metainfo-license-invalid",
            &[("license", shown)],
        );
        transition(&cid, state, UnitState::Ignored);
        return;
    }

    if shared.config.features.validate_metainfo {
        for issue in shared.validators.validate(worker_index, &data) {
            let line = issue.line.map(|l| l.to_string()).unwrap_or_default();
            res.add_hint(
                Some(&cid),
                &issue.tag,
                &[("fname", fname), ("line", &line)],
            );
        }
        state = transition(&cid, state, UnitState::Validated);
    }

    if cpt.kind == ComponentKind::DesktopApplication && shared.config.features.process_desktop {
        fuse_desktop_file(pkg, res, contents, &mut cpt);
        if res.is_ignored(&cid) {
            transition(&cid, state, UnitState::Ignored);
            return;
        }
    }

    trace!("component {}: registered in state {:?}", cid, state);
    res.add_component(cpt);
}

/// Look up and merge the launcher entry belonging to a desktop
/// application.
fn fuse_desktop_file(
    pkg: &dyn Package,
    res: &mut GeneratorResult,
    contents: &[String],
    cpt: &mut Component,
) {
    let cid = cpt.id.clone();
    let desktop_id = cpt
        .desktop_launchable()
        .map(str::to_string)
        .unwrap_or_else(|| {
            // Legacy metainfo omits the launchable; derive it from the id.
            if cid.ends_with(".desktop") {
                cid.clone()
            } else {
                format!("{}.desktop", cid)
            }
        });
    let desktop_path = format!("/usr/share/applications/{}", desktop_id);

    if !contents.iter().any(|p| p == &desktop_path) {
        res.add_hint(
            Some(&cid),
            "missing-desktop-file",
            &[("desktop_id", desktop_id.as_str())],
        );
        return;
    }

    let data = match pkg.file_data(&desktop_path) {
        Ok(data) => data,
        Err(e) => {
            res.add_hint(
                Some(&cid),
                "desktop-file-error",
                &[("fname", desktop_path.as_str()), ("msg", &e.to_string())],
            );
            return;
        }
    };
    let text = String::from_utf8_lossy(&data);
    let entry = match desktop::parse_desktop_data(&text) {
        Ok(entry) => entry,
        Err(e) => {
            res.add_hint(
                Some(&cid),
                "desktop-file-error",
                &[("fname", desktop_path.as_str()), ("msg", &e.to_string())],
            );
            return;
        }
    };

    match entry.rejection() {
        Some(DesktopRejection::NoDisplay) => {
            res.add_hint(Some(&cid), "desktop-app-ignored-nodisplay", &[]);
            res.ignore_component(&cid);
            return;
        }
        Some(DesktopRejection::AppStreamIgnore) => {
            res.add_hint(Some(&cid), "desktop-app-ignored-x-appstream", &[]);
            res.ignore_component(&cid);
            return;
        }
        Some(DesktopRejection::OnlyShowIn(desktops)) => {
            res.add_hint(
                Some(&cid),
                "desktop-app-hidden-onlyshowin",
                &[("desktops", desktops.join(";").as_str())],
            );
            res.ignore_component(&cid);
            return;
        }
        None => {}
    }

    desktop::fuse_desktop_entry(cpt, &entry);

    if cpt.desktop_launchable().is_none() {
        cpt.launchables.push(Launchable {
            kind: LaunchableKind::DesktopId,
            value: desktop_id.clone(),
        });
    }

    // Ecosystems shipping translations outside the package can layer
    // them over the fused launcher strings.
    for (field, source) in [
        (&mut cpt.name, entry.name.get("C")),
        (&mut cpt.summary, entry.summary.get("C")),
    ] {
        let Some(text) = source else { continue };
        for (locale, translated) in pkg.desktop_file_translations(&desktop_id, text) {
            field.entry(locale).or_insert(translated);
        }
    }
}

/// Analyze the package's font files, register them, and render the
/// sample icon and screenshot. Returns `false` when the component became
/// invalid.
fn process_font_component(
    shared: &ExtractorShared,
    contents: &[String],
    pkg: &dyn Package,
    res: &mut GeneratorResult,
    cpt: &mut Component,
    cpt_gcid: &str,
) -> bool {
    use asgen_model::component::{
        Icon, Image, ImageKind, Provided, ProvidedKind, Screenshot,
    };

    let cid = cpt.id.clone();
    let font_paths: Vec<&String> = contents
        .iter()
        .filter(|p| {
            let lower = p.to_lowercase();
            lower.ends_with(".ttf") || lower.ends_with(".otf")
        })
        .collect();
    if font_paths.is_empty() {
        res.add_hint(Some(&cid), "font-metainfo-but-no-font", &[]);
        return true;
    }

    let mut rendered = false;
    for path in font_paths {
        let data = match pkg.file_data(path) {
            Ok(data) => data,
            Err(e) => {
                res.add_hint(
                    Some(&cid),
                    "font-load-error",
                    &[("fname", path.as_str()), ("msg", &e.to_string())],
                );
                continue;
            }
        };
        let loaded = match shared.fonts.analyze(&data) {
            Ok(loaded) => loaded,
            Err(msg) => {
                res.add_hint(
                    Some(&cid),
                    "font-load-error",
                    &[("fname", path.as_str()), ("msg", &msg)],
                );
                continue;
            }
        };

        cpt.provides.push(Provided {
            kind: ProvidedKind::Font,
            value: loaded.full_name.clone(),
        });
        for lang in &loaded.languages {
            cpt.languages.entry(lang.clone()).or_insert(100);
        }
        if !cpt.name.contains_key("C") {
            cpt.name.insert("C".to_string(), loaded.family.clone());
        }

        if rendered {
            continue;
        }

        // The first renderable font provides the visual sample.
        let optimize = shared.config.features.optimize_png_size;
        let media_root = &shared.config.export_dirs.media;
        let mut icon_ok = true;
        for size in shared.config.icons.cached_sizes() {
            let png = match shared.fonts.render_icon(&loaded, size.pixels(), optimize) {
                Ok(png) => png,
                Err(_) => {
                    icon_ok = false;
                    break;
                }
            };
            let rel = media::pool_relative(cpt_gcid, &format!("icons/{}/{}.png", size, cid));
            if media::write_file(&media_root.join(&rel), &png).is_err() {
                icon_ok = false;
                break;
            }
            cpt.icons.push(Icon::Cached {
                name: format!("{}.png", cid),
                width: size.size,
                height: size.size,
                scale: size.scale,
            });
        }
        if let Ok((png, width, height)) = shared.fonts.render_sample(&loaded, optimize) {
            let rel = media::pool_relative(cpt_gcid, "screenshots/image-1_orig.png");
            if media::write_file(&media_root.join(&rel), &png).is_ok() {
                cpt.screenshots = vec![Screenshot {
                    default: true,
                    images: vec![Image {
                        kind: ImageKind::Source,
                        url: rel,
                        width: Some(width),
                        height: Some(height),
                    }],
                    ..Screenshot::default()
                }];
            }
        }
        rendered = icon_ok;
    }

    if !rendered {
        res.add_hint(Some(&cid), "icon-not-found", &[("icon_name", cid.as_str())]);
        return false;
    }
    true
}
