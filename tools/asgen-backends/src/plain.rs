//! The `plain` filesystem backend.
//!
//! Repository layout: `<root>/<suite>/<section>/<arch>/index.json` plus
//! one tar(.gz) archive per package next to it. The index lists package
//! records with name, version, and the archive file name. This backend
//! serves small repositories and the test suite; real distribution index
//! formats plug in through the same trait.

use crate::archive::ArchiveDecompressor;
use crate::{error, Backend, Package, PackageKind, Result};
use asgen_store::DataStore;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    version: String,
    #[serde(default)]
    maintainer: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    filename: String,
}

pub struct PlainPackage {
    name: String,
    version: String,
    arch: String,
    maintainer: String,
    summary: BTreeMap<String, String>,
    description: BTreeMap<String, String>,
    path: PathBuf,
    contents_cache: Mutex<Option<Vec<String>>>,
}

impl Package for PlainPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn kind(&self) -> PackageKind {
        PackageKind::Physical
    }

    fn maintainer(&self) -> &str {
        &self.maintainer
    }

    fn summary(&self) -> &BTreeMap<String, String> {
        &self.summary
    }

    fn description(&self) -> &BTreeMap<String, String> {
        &self.description
    }

    fn filename(&self) -> Result<PathBuf> {
        Ok(self.path.clone())
    }

    fn contents(&self) -> Result<Vec<String>> {
        let mut cache = self.contents_cache.lock().expect("contents cache poisoned");
        if let Some(contents) = cache.as_ref() {
            return Ok(contents.clone());
        }
        let contents = ArchiveDecompressor::new(&self.path).read_contents()?;
        *cache = Some(contents.clone());
        Ok(contents)
    }

    fn file_data(&self, path: &str) -> Result<Vec<u8>> {
        ArchiveDecompressor::new(&self.path).read_data(path)
    }

    fn finish(&self) {
        self.contents_cache
            .lock()
            .expect("contents cache poisoned")
            .take();
    }
}

pub struct PlainBackend {
    root: PathBuf,
}

impl PlainBackend {
    pub fn new(root: &Path) -> PlainBackend {
        PlainBackend {
            root: root.to_path_buf(),
        }
    }

    fn index_path(&self, suite: &str, section: &str, arch: &str) -> PathBuf {
        self.root
            .join(suite)
            .join(section)
            .join(arch)
            .join("index.json")
    }

    fn read_index(&self, suite: &str, section: &str, arch: &str) -> Result<Vec<IndexEntry>> {
        let path = self.index_path(suite, section, arch);
        let data = fs::read_to_string(&path).context(error::IndexReadSnafu { path: &path })?;
        serde_json::from_str(&data).context(error::IndexParseSnafu { path })
    }

    fn make_package(
        &self,
        entry: &IndexEntry,
        suite: &str,
        section: &str,
        arch: &str,
        with_long_descs: bool,
    ) -> Arc<dyn Package> {
        let dir = self.root.join(suite).join(section).join(arch);
        let mut summary = BTreeMap::new();
        if let Some(text) = &entry.summary {
            summary.insert("C".to_string(), text.clone());
        }
        let mut description = BTreeMap::new();
        if with_long_descs {
            if let Some(text) = &entry.description {
                description.insert("C".to_string(), text.clone());
            }
        }
        Arc::new(PlainPackage {
            name: entry.name.clone(),
            version: entry.version.clone(),
            arch: arch.to_string(),
            maintainer: entry.maintainer.clone(),
            summary,
            description,
            path: dir.join(&entry.filename),
            contents_cache: Mutex::new(None),
        })
    }

    fn index_fingerprint(&self, suite: &str, section: &str, arch: &str) -> Option<String> {
        let path = self.index_path(suite, section, arch);
        let meta = fs::metadata(&path).ok()?;
        let mtime = meta
            .modified()
            .ok()?
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();
        Some(format!("{}-{}", meta.len(), mtime))
    }
}

impl Backend for PlainBackend {
    fn packages_for(
        &self,
        suite: &str,
        section: &str,
        arch: &str,
        with_long_descs: bool,
    ) -> Result<Vec<Arc<dyn Package>>> {
        let entries = self.read_index(suite, section, arch)?;
        Ok(entries
            .iter()
            .map(|entry| self.make_package(entry, suite, section, arch, with_long_descs))
            .collect())
    }

    fn package_for_file(
        &self,
        path: &Path,
        suite: Option<&str>,
        section: Option<&str>,
    ) -> Result<Option<Arc<dyn Package>>> {
        let (Some(suite), Some(section)) = (suite, section) else {
            return Ok(None);
        };
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        let section_dir = self.root.join(suite).join(section);
        let Ok(arch_dirs) = fs::read_dir(&section_dir) else {
            return Ok(None);
        };
        for arch_dir in arch_dirs.flatten() {
            let Some(arch) = arch_dir.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Ok(entries) = self.read_index(suite, section, &arch) else {
                continue;
            };
            if let Some(entry) = entries.iter().find(|e| e.filename == file_name) {
                return Ok(Some(self.make_package(entry, suite, section, &arch, true)));
            }
        }
        Ok(None)
    }

    fn has_changes(
        &self,
        dstore: &DataStore,
        suite: &str,
        section: &str,
        arch: &str,
    ) -> Result<bool> {
        // An unreadable index always counts as changed so the seeding
        // step surfaces the actual error instead of silently skipping.
        let Some(current) = self.index_fingerprint(suite, section, arch) else {
            return Ok(true);
        };
        let stored = dstore.repo_info(suite, section, arch)?;
        let stored_fp = stored
            .as_ref()
            .and_then(|v| v.get("index"))
            .and_then(|v| v.as_str());

        if stored_fp == Some(current.as_str()) {
            return Ok(false);
        }

        // Record the new state, preserving unrelated fields.
        let mut info = stored.unwrap_or_else(|| serde_json::json!({}));
        info["index"] = serde_json::Value::String(current);
        dstore.set_repo_info(suite, section, arch, &info)?;
        Ok(true)
    }

    fn release(&self) {}
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs::File;
    use std::io::Write;

    fn build_repo(root: &Path) {
        let dir = root.join("sid").join("main").join("amd64");
        fs::create_dir_all(&dir).unwrap();

        let file = File::create(dir.join("foo_1.0.tar.gz")).unwrap();
        let encoder = GzEncoder::new(file, Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        let data = b"<component/>";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                "usr/share/metainfo/org.example.Foo.metainfo.xml",
                &data[..],
            )
            .unwrap();
        builder
            .into_inner()
            .unwrap()
            .finish()
            .unwrap()
            .flush()
            .unwrap();

        fs::write(
            dir.join("index.json"),
            r#"[{"name": "foo", "version": "1.0", "summary": "A test package",
                 "description": "Long text.", "filename": "foo_1.0.tar.gz"}]"#,
        )
        .unwrap();
    }

    #[test]
    fn enumerates_and_reads_packages() {
        let dir = tempfile::tempdir().unwrap();
        build_repo(dir.path());
        let backend = PlainBackend::new(dir.path());
        let packages = backend.packages_for("sid", "main", "amd64", true).unwrap();
        assert_eq!(packages.len(), 1);
        let pkg = &packages[0];
        assert_eq!(pkg.id(), "foo/1.0/amd64");
        assert_eq!(pkg.summary().get("C").unwrap(), "A test package");
        let contents = pkg.contents().unwrap();
        assert_eq!(contents.len(), 1);
        let data = pkg
            .file_data("/usr/share/metainfo/org.example.Foo.metainfo.xml")
            .unwrap();
        assert_eq!(data, b"<component/>");
        pkg.finish();
    }

    #[test]
    fn long_descriptions_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        build_repo(dir.path());
        let backend = PlainBackend::new(dir.path());
        let packages = backend.packages_for("sid", "main", "amd64", false).unwrap();
        assert!(packages[0].description().is_empty());
    }

    #[test]
    fn missing_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = PlainBackend::new(dir.path());
        assert!(backend.packages_for("sid", "main", "amd64", true).is_err());
    }

    #[test]
    fn change_detection_records_state() {
        let dir = tempfile::tempdir().unwrap();
        build_repo(dir.path());
        let backend = PlainBackend::new(dir.path());
        let dstore = DataStore::open(&dir.path().join("metadata.redb")).unwrap();

        assert!(backend.has_changes(&dstore, "sid", "main", "amd64").unwrap());
        assert!(!backend.has_changes(&dstore, "sid", "main", "amd64").unwrap());

        // Grow the index; the fingerprint length component changes.
        let index = dir.path().join("sid/main/amd64/index.json");
        let mut data = fs::read_to_string(&index).unwrap();
        data.push(' ');
        fs::write(&index, data).unwrap();
        assert!(backend.has_changes(&dstore, "sid", "main", "amd64").unwrap());
    }

    #[test]
    fn package_for_file_searches_the_section() {
        let dir = tempfile::tempdir().unwrap();
        build_repo(dir.path());
        let backend = PlainBackend::new(dir.path());
        let found = backend
            .package_for_file(Path::new("foo_1.0.tar.gz"), Some("sid"), Some("main"))
            .unwrap();
        assert_eq!(found.unwrap().id(), "foo/1.0/amd64");
        let missing = backend
            .package_for_file(Path::new("nope.tar.gz"), Some("sid"), Some("main"))
            .unwrap();
        assert!(missing.is_none());
    }
}
