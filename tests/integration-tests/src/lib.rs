#![cfg(test)]

//! End-to-end scenarios: throwaway repositories are built under a temp
//! dir, the engine runs against them through the `plain` backend, and
//! the published artifacts are inspected.

mod scenarios;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One package archive under construction: path → payload.
#[derive(Clone, Default)]
pub struct PackageFixture {
    pub name: String,
    pub version: String,
    pub summary: String,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl PackageFixture {
    pub fn new(name: &str, version: &str) -> PackageFixture {
        PackageFixture {
            name: name.to_string(),
            version: version.to_string(),
            summary: format!("The {} package", name),
            ..PackageFixture::default()
        }
    }

    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> PackageFixture {
        self.files.insert(path.to_string(), data.into());
        self
    }
}

/// A repository root with helpers to write suite indices and archives.
pub struct TestRepo {
    pub dir: TempDir,
}

impl TestRepo {
    pub fn new() -> TestRepo {
        TestRepo {
            dir: TempDir::new().expect("temp dir for repo"),
        }
    }

    pub fn archive_root(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("workspace")
    }

    /// Write the packages and index for one (suite, section, arch).
    pub fn write_triple(&self, suite: &str, section: &str, arch: &str, pkgs: &[PackageFixture]) {
        let dir = self.archive_root().join(suite).join(section).join(arch);
        fs::create_dir_all(&dir).unwrap();

        let mut index = Vec::new();
        for pkg in pkgs {
            let archive_name = format!("{}_{}.tar.gz", pkg.name, pkg.version);
            write_archive(&dir.join(&archive_name), &pkg.files);
            index.push(serde_json::json!({
                "name": pkg.name,
                "version": pkg.version,
                "summary": pkg.summary,
                "filename": archive_name,
            }));
        }
        fs::write(
            dir.join("index.json"),
            serde_json::to_string_pretty(&index).unwrap(),
        )
        .unwrap();
    }

    /// Write the generator configuration and return its path. Downloads
    /// and timestamps are off so runs are hermetic and byte-stable.
    pub fn write_config(&self, suites_json: serde_json::Value) -> PathBuf {
        self.write_config_with_extra(suites_json, None)
    }

    pub fn write_config_with_extra(
        &self,
        suites_json: serde_json::Value,
        extra_metainfo_dir: Option<&Path>,
    ) -> PathBuf {
        let mut config = serde_json::json!({
            "ProjectName": "TestDistro",
            "Backend": "plain",
            "MetadataType": "XML",
            "ArchiveRoot": self.archive_root().to_str().unwrap(),
            "WorkspaceDir": self.workspace().to_str().unwrap(),
            "Suites": suites_json,
            "Features": {
                "noDownloads": true,
                "metadataTimestamps": false,
                "optimizePNGSize": false,
            },
        });
        if let Some(dir) = extra_metainfo_dir {
            config["ExtraMetainfoDir"] = serde_json::json!(dir.to_str().unwrap());
        }
        let path = self.dir.path().join("asgen-config.json");
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        path
    }

    pub fn run_engine(&self, config_path: &Path, suite: &str, force: bool) {
        let mut config = asgen_config::Config::load(config_path, None).unwrap();
        config.force = force;
        let engine = asgen::engine::Engine::new(config).unwrap();
        engine.run(suite, None).unwrap();
    }

    pub fn cleanup_engine(&self, config_path: &Path) {
        let config = asgen_config::Config::load(config_path, None).unwrap();
        let engine = asgen::engine::Engine::new(config).unwrap();
        engine.cleanup().unwrap();
    }

    pub fn catalog_path(&self, suite: &str, section: &str, arch: &str) -> PathBuf {
        self.workspace()
            .join("export/data")
            .join(suite)
            .join(section)
            .join(format!("Components-{}.xml.gz", arch))
    }

    pub fn read_catalog(&self, suite: &str, section: &str, arch: &str) -> String {
        read_gz(&self.catalog_path(suite, section, arch))
    }

    pub fn read_cid_gcid(&self, suite: &str, section: &str, arch: &str) -> serde_json::Value {
        let path = self
            .workspace()
            .join("export/data")
            .join(suite)
            .join(section)
            .join(format!("CID-GCID-{}.gz", arch));
        serde_json::from_str(&read_gz(&path)).unwrap()
    }

    pub fn read_hints(&self, suite: &str, section: &str, arch: &str) -> serde_json::Value {
        let path = self
            .workspace()
            .join("export/hints")
            .join(suite)
            .join(section)
            .join(format!("Hints-{}.json.gz", arch));
        serde_json::from_str(&read_gz(&path)).unwrap()
    }

    pub fn media_dir(&self) -> PathBuf {
        self.workspace().join("export/media")
    }
}

pub fn read_gz(path: &Path) -> String {
    let file = File::open(path).unwrap_or_else(|e| panic!("open {}: {}", path.display(), e));
    let mut decoder = GzDecoder::new(file);
    let mut out = String::new();
    decoder.read_to_string(&mut out).unwrap();
    out
}

fn write_archive(path: &Path, files: &BTreeMap<String, Vec<u8>>) {
    let file = File::create(path).unwrap();
    let encoder = GzEncoder::new(file, Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    for (entry_path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                entry_path.trim_start_matches('/'),
                data.as_slice(),
            )
            .unwrap();
    }
    builder
        .into_inner()
        .unwrap()
        .finish()
        .unwrap()
        .flush()
        .unwrap();
}

/// A solid-color PNG at the requested square size.
pub fn png_icon(size: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(size, size, image::Rgba([30, 90, 160, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

pub fn metainfo_xml(cid: &str, license: &str, with_launchable: bool) -> String {
    let launchable = if with_launchable {
        format!(
            "<launchable type=\"desktop-id\">{}.desktop</launchable>",
            cid
        )
    } else {
        String::new()
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<component type="desktop-application">
  <id>{cid}</id>
  <name>Foo</name>
  <summary>A sample application</summary>
  <metadata_license>{license}</metadata_license>
  <project_license>GPL-3.0+</project_license>
  <description><p>A long description of the application.</p></description>
  <categories><category>Utility</category></categories>
  <icon type="stock">foo</icon>
  {launchable}
</component>
"#
    )
}

pub fn desktop_file(name: &str, icon: &str) -> String {
    format!(
        "[Desktop Entry]\nType=Application\nName={}\nComment=Do sample things\n\
         Categories=Utility;\nIcon={}\n",
        name, icon
    )
}
