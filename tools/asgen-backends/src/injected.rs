//! Extra-metainfo injection.
//!
//! Maintainers can drop metainfo XML (plus icon files and a
//! `removed-components.json` list) into
//! `extra-metainfo/<suite>/<section>[/<arch>]`. The XML and icons are
//! collected into one synthetic package per triple, which then runs
//! through the regular processor like any other package.

use crate::fake::FakePackage;
use crate::{error, Result};
use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Deterministic name of the synthetic package.
pub const INJECTED_PKG_NAME: &str = "asgen-injected";

/// Extensions picked up as icon payloads next to the XML files.
const ICON_EXTENSIONS: &[&str] = &["png", "svg", "svgz"];

/// Build the synthetic package for one (suite, section, arch). Returns
/// `None` when the directories exist but hold no metainfo.
pub fn load_injected_package(
    extra_metainfo_dir: &Path,
    suite: &str,
    section: &str,
    arch: &str,
) -> Result<Option<FakePackage>> {
    let section_dir = extra_metainfo_dir.join(suite).join(section);
    let mut roots = vec![section_dir.clone()];
    roots.push(section_dir.join(arch));

    let mut pkg = FakePackage::new(
        INJECTED_PKG_NAME,
        &format!("{}-{}", suite, section),
        arch,
    );
    pkg.set_summary("C", "Synthetic package carrying injected metainfo");
    let mut found_any = false;

    for root in roots {
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root).max_depth(1) {
            let entry = entry.context(error::DirScanSnafu { path: &root })?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();

            if extension == "xml" {
                let data = fs::read(path).context(error::FileReadSnafu { path })?;
                pkg.add_file(&format!("/usr/share/metainfo/{}", file_name), data);
                found_any = true;
            } else if ICON_EXTENSIONS.contains(&extension) {
                let data = fs::read(path).context(error::FileReadSnafu { path })?;
                // Pixmaps are found by the resolver's theme-independent
                // fallback, so injected icons need no theme structure.
                pkg.add_file(&format!("/usr/share/pixmaps/{}", file_name), data);
            }
        }
    }

    Ok(if found_any { Some(pkg) } else { None })
}

/// Path of the removal overlay for a suite/section, if present.
pub fn removed_components_path(
    extra_metainfo_dir: &Path,
    suite: &str,
    section: &str,
) -> Option<PathBuf> {
    let path = extra_metainfo_dir
        .join(suite)
        .join(section)
        .join("removed-components.json");
    path.is_file().then_some(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Package;

    #[test]
    fn collects_xml_and_icons() {
        let dir = tempfile::tempdir().unwrap();
        let section_dir = dir.path().join("sid/main");
        fs::create_dir_all(&section_dir).unwrap();
        fs::write(
            section_dir.join("org.example.Web.metainfo.xml"),
            "<component/>",
        )
        .unwrap();
        fs::write(section_dir.join("web-icon.png"), b"png-bytes").unwrap();
        fs::write(section_dir.join("notes.txt"), "ignored").unwrap();

        let pkg = load_injected_package(dir.path(), "sid", "main", "amd64")
            .unwrap()
            .unwrap();
        assert_eq!(pkg.id(), "asgen-injected/sid-main/amd64");
        let contents = pkg.contents().unwrap();
        assert!(contents.contains(&"/usr/share/metainfo/org.example.Web.metainfo.xml".to_string()));
        assert!(contents.contains(&"/usr/share/pixmaps/web-icon.png".to_string()));
        assert_eq!(contents.len(), 2);
    }

    #[test]
    fn arch_subdir_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let arch_dir = dir.path().join("sid/main/amd64");
        fs::create_dir_all(&arch_dir).unwrap();
        fs::write(arch_dir.join("org.example.A.metainfo.xml"), "<component/>").unwrap();

        let pkg = load_injected_package(dir.path(), "sid", "main", "amd64")
            .unwrap()
            .unwrap();
        assert_eq!(pkg.contents().unwrap().len(), 1);
    }

    #[test]
    fn empty_directories_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sid/main")).unwrap();
        assert!(load_injected_package(dir.path(), "sid", "main", "amd64")
            .unwrap()
            .is_none());
    }

    #[test]
    fn removal_overlay_path() {
        let dir = tempfile::tempdir().unwrap();
        let section_dir = dir.path().join("sid/main");
        fs::create_dir_all(&section_dir).unwrap();
        assert!(removed_components_path(dir.path(), "sid", "main").is_none());
        fs::write(section_dir.join("removed-components.json"), "[]").unwrap();
        assert!(removed_components_path(dir.path(), "sid", "main").is_some());
    }
}
