//! In-memory packages.
//!
//! Fake packages carry their file payloads directly and exist only for
//! the duration of a run. The extra-data injector builds one per
//! (suite, section, arch); tests use them to drive the processor without
//! touching archives.

use crate::{error, GstreamerInfo, Package, PackageKind, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct FakePackage {
    name: String,
    version: String,
    arch: String,
    maintainer: String,
    summary: BTreeMap<String, String>,
    description: BTreeMap<String, String>,
    files: BTreeMap<String, Vec<u8>>,
    gst: Option<GstreamerInfo>,
}

impl FakePackage {
    pub fn new(name: &str, version: &str, arch: &str) -> FakePackage {
        FakePackage {
            name: name.to_string(),
            version: version.to_string(),
            arch: arch.to_string(),
            ..FakePackage::default()
        }
    }

    pub fn set_maintainer(&mut self, maintainer: &str) {
        self.maintainer = maintainer.to_string();
    }

    pub fn set_summary(&mut self, locale: &str, text: &str) {
        self.summary.insert(locale.to_string(), text.to_string());
    }

    pub fn set_description(&mut self, locale: &str, text: &str) {
        self.description.insert(locale.to_string(), text.to_string());
    }

    pub fn add_file(&mut self, path: &str, data: Vec<u8>) {
        self.files.insert(path.to_string(), data);
    }

    pub fn set_gst(&mut self, gst: GstreamerInfo) {
        self.gst = Some(gst);
    }
}

impl Package for FakePackage {
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
        PackageKind::Fake
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
        error::NoLocalFileSnafu { pkid: self.id() }.fail()
    }

    fn contents(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn file_data(&self, path: &str) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            error::FileNotInArchiveSnafu {
                path: PathBuf::from("<memory>"),
                name: path,
            }
            .build()
        })
    }

    fn finish(&self) {}

    fn gst(&self) -> Option<&GstreamerInfo> {
        self.gst.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fake_package_serves_files() {
        let mut pkg = FakePackage::new("fake", "1.0", "amd64");
        pkg.add_file("/usr/share/metainfo/a.xml", b"<component/>".to_vec());
        assert_eq!(pkg.id(), "fake/1.0/amd64");
        assert_eq!(pkg.kind(), PackageKind::Fake);
        assert_eq!(
            pkg.contents().unwrap(),
            vec!["/usr/share/metainfo/a.xml".to_string()]
        );
        assert_eq!(
            pkg.file_data("/usr/share/metainfo/a.xml").unwrap(),
            b"<component/>"
        );
        assert!(pkg.file_data("/missing").is_err());
        assert!(pkg.filename().is_err());
    }
}
