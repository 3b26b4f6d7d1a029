//! Cross-package icon resolution and icon output.
//!
//! The handler owns the theme registry for one (suite, section, arch)
//! seed: themes are looked up once from the packages that ship them and
//! never mutated afterwards, so workers share the handler by reference.
//! Candidate paths are produced lazily and matched against the contents
//! index's icon projection to find the owning package.

pub mod theme;

use crate::media;
use crate::processor::PackageMap;
use crate::render::{self, IconSourceKind};
use asgen_backends::Package;
use asgen_config::{IconPolicy, IconSize};
use asgen_model::component::{Component, ComponentKind, Icon};
use asgen_model::GeneratorResult;
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;
use theme::Theme;

/// Extension preference when several flavors of one icon exist.
const EXTENSION_ORDER: &[&str] = &["png", "svgz", "svg", "xpm"];

/// Themes consulted in order; the configured theme slots in after
/// hicolor.
const FALLBACK_THEMES: &[&str] = &["Adwaita", "breeze"];

/// Where an icon file lives: owning package and path inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconLocation {
    pub pkid: String,
    pub path: String,
}

pub struct IconHandler {
    themes: Vec<Theme>,
    icon_files: BTreeMap<String, String>,
    policy: IconPolicy,
    allow_upscaling: bool,
    optimize_png: bool,
}

impl IconHandler {
    /// Build the handler for one seed. `icon_files` is the inverted icon
    /// projection over the full package set (including the base suite),
    /// `pkg_map` resolves owners for reading theme indices.
    pub fn create(
        icon_files: BTreeMap<String, String>,
        pkg_map: &PackageMap,
        preferred_theme: Option<&str>,
        policy: IconPolicy,
        allow_upscaling: bool,
        optimize_png: bool,
    ) -> IconHandler {
        let mut wanted_themes: Vec<&str> = vec!["hicolor"];
        if let Some(name) = preferred_theme {
            if !wanted_themes.contains(&name) {
                wanted_themes.push(name);
            }
        }
        for name in FALLBACK_THEMES {
            if !wanted_themes.contains(name) {
                wanted_themes.push(name);
            }
        }

        let mut themes = Vec::new();
        for name in wanted_themes {
            let index_path = format!("/usr/share/icons/{}/index.theme", name);
            let parsed = icon_files.get(&index_path).and_then(|pkid| {
                let pkg = pkg_map.get(pkid)?;
                let data = pkg.file_data(&index_path).ok()?;
                let text = String::from_utf8(data).ok()?;
                match Theme::parse(name, &text) {
                    Ok(theme) => Some(theme),
                    Err(e) => {
                        debug!("Unable to parse index.theme of '{}': {}", name, e);
                        None
                    }
                }
            });
            match parsed {
                Some(theme) => themes.push(theme),
                None if name == "hicolor" => {
                    info!("No hicolor index.theme in the package set, using built-in index");
                    themes.push(Theme::builtin_hicolor());
                }
                None => debug!("Icon theme '{}' is not available, skipping", name),
            }
        }

        IconHandler {
            themes,
            icon_files,
            policy,
            allow_upscaling,
            optimize_png,
        }
    }

    /// Resolve an icon name to concrete files for the wanted sizes.
    /// Candidates in `preferred_pkid` win over other packages.
    pub fn find_icons(
        &self,
        icon_name: &str,
        sizes: &[IconSize],
        preferred_pkid: Option<&str>,
    ) -> BTreeMap<IconSize, IconLocation> {
        let stem = strip_icon_extension(icon_name);
        let mut found = BTreeMap::new();
        for size in sizes {
            if let Some(location) = self.find_one(stem, *size, preferred_pkid) {
                found.insert(*size, location);
            }
        }
        found
    }

    fn find_one(
        &self,
        stem: &str,
        size: IconSize,
        preferred_pkid: Option<&str>,
    ) -> Option<IconLocation> {
        let mut first_match: Option<IconLocation> = None;
        for path in self.candidate_paths(stem, size) {
            let Some(pkid) = self.icon_files.get(&path) else {
                continue;
            };
            let location = IconLocation {
                pkid: pkid.clone(),
                path,
            };
            if Some(pkid.as_str()) == preferred_pkid {
                return Some(location);
            }
            if first_match.is_none() {
                first_match = Some(location);
            }
        }
        first_match
    }

    /// Candidate paths for one size, lazily, best candidates first:
    /// themes in priority order, then the pixmaps fallback.
    fn candidate_paths<'a>(
        &'a self,
        stem: &'a str,
        size: IconSize,
    ) -> impl Iterator<Item = String> + 'a {
        let themed = self.themes.iter().flat_map(move |theme| {
            theme
                .matching_directories(size)
                .into_iter()
                .map(|d| d.path.clone())
                .collect::<Vec<_>>()
                .into_iter()
                .flat_map(move |dir| {
                    EXTENSION_ORDER.iter().map(move |ext| {
                        format!("/usr/share/icons/{}/{}/{}.{}", theme.name, dir, stem, ext)
                    })
                })
        });
        let pixmaps = EXTENSION_ORDER
            .iter()
            .map(move |ext| format!("/usr/share/pixmaps/{}.{}", stem, ext));
        themed.chain(pixmaps)
    }

    /// Resolve, render, and store all policy icons for a component.
    /// Returns `false` when the component ended up without the mandatory
    /// 64×64 cached icon (a fatal hint has then been recorded).
    pub fn process_icons(
        &self,
        cpt: &mut Component,
        res: &mut GeneratorResult,
        pkg_map: &PackageMap,
        media_root: &Path,
        gcid: &str,
    ) -> bool {
        let cid = cpt.id.clone();
        let self_pkid = res.pkid.clone();

        // An absolute Icon= path refers to a concrete file in the same
        // package and serves every size by scaling.
        let local_source = cpt.icons.iter().find_map(|icon| match icon {
            Icon::Local { path, .. } => Some(IconLocation {
                pkid: self_pkid.clone(),
                path: path.clone(),
            }),
            _ => None,
        });

        let icon_name = cpt.stock_icon_name().map(str::to_string);
        if icon_name.is_none() && local_source.is_none() {
            if cpt.kind == ComponentKind::DesktopApplication {
                res.add_hint(Some(&cid), "icon-not-found", &[("icon_name", "(none)")]);
                return false;
            }
            return true;
        }

        let wanted = self.policy.wanted_sizes();
        let mut found = match &icon_name {
            Some(name) => self.find_icons(name, &wanted, Some(&self_pkid)),
            None => BTreeMap::new(),
        };
        if let Some(local) = &local_source {
            for size in &wanted {
                found.entry(*size).or_insert_with(|| local.clone());
            }
        }

        let mut produced_base = false;
        let mut unsupported_reported = false;
        let base = IconSize::new(64, 1);

        for size in &wanted {
            // Prefer an exact hit, then the smallest larger source for
            // downscaling. Upscaling exists only for 48 → 64.
            let mut upscale = false;
            let source = found.get(size).cloned().or_else(|| {
                let bigger = wanted
                    .iter()
                    .filter(|s| s.scale == size.scale && s.size > size.size)
                    .filter_map(|s| found.get(s))
                    .next()
                    .cloned();
                if bigger.is_some() {
                    return bigger;
                }
                if *size == base && self.allow_upscaling {
                    let small = found.get(&IconSize::new(48, 1)).cloned();
                    if small.is_some() {
                        upscale = true;
                    }
                    return small;
                }
                None
            });
            let Some(location) = source else {
                continue;
            };

            let extension = location.path.rsplit('.').next().unwrap_or_default();
            let Some(kind) = IconSourceKind::from_extension(extension) else {
                continue;
            };
            if !kind.publishable() {
                if !unsupported_reported {
                    res.add_hint(
                        Some(&cid),
                        "icon-format-unsupported",
                        &[("fname", location.path.as_str()), ("format", extension)],
                    );
                    unsupported_reported = true;
                }
                continue;
            }

            let data = match read_package_file(pkg_map, &location) {
                Ok(data) => data,
                Err(msg) => {
                    debug!("Unable to read icon {}: {}", location.path, msg);
                    continue;
                }
            };

            let png = match render::render_icon_png(
                &data,
                kind,
                size.pixels(),
                upscale,
                self.optimize_png,
            ) {
                Ok(png) => png,
                Err(msg) => {
                    debug!("Unable to render icon {}: {}", location.path, msg);
                    continue;
                }
            };

            if upscale {
                if let Some(name) = &icon_name {
                    res.add_hint(Some(&cid), "icon-scaled-up", &[("icon_name", name)]);
                }
            }

            let entry = self.policy.entry(*size).expect("wanted size has an entry");
            let file_name = format!("{}.png", cid);
            let rel = media::pool_relative(gcid, &format!("icons/{}/{}", size, file_name));
            if entry.cached || entry.remote {
                let target = media_root.join(&rel);
                if media::write_file(&target, &png).is_err() {
                    continue;
                }
            }
            if entry.cached {
                cpt.icons.push(Icon::Cached {
                    name: file_name,
                    width: size.size,
                    height: size.size,
                    scale: size.scale,
                });
                if *size == base {
                    produced_base = true;
                }
            }
            if entry.remote {
                cpt.icons.push(Icon::Remote {
                    url: rel,
                    width: size.size,
                    height: size.size,
                    scale: size.scale,
                });
            }
        }

        // The 64x64 cached icon is mandatory; a resolution that cannot
        // provide it fails the component regardless of what else it
        // found.
        if !produced_base {
            let name = icon_name.as_deref().unwrap_or("(local)");
            res.add_hint(Some(&cid), "icon-not-found", &[("icon_name", name)]);
            return false;
        }
        true
    }
}

fn read_package_file(pkg_map: &PackageMap, location: &IconLocation) -> Result<Vec<u8>, String> {
    let pkg = pkg_map
        .get(&location.pkid)
        .ok_or_else(|| format!("package {} not in the current set", location.pkid))?;
    pkg.file_data(&location.path)
        .map_err(|e| e.to_string())
}

fn strip_icon_extension(name: &str) -> &str {
    for ext in EXTENSION_ORDER {
        if let Some(stem) = name.strip_suffix(&format!(".{}", ext)) {
            return stem;
        }
    }
    name
}
