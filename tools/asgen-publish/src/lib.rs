/*!
Publication of per-suite catalogs, hint exports, HTML reports, icon
tarballs, and run statistics.

A suite view (the backend's current pkid set for one suite/section/arch)
is joined against the data store to collect component GCIDs; the stored
canonical XML is spliced into a catalog document or re-parsed for DEP-11
YAML output. All file writes are staged and atomically renamed, and
immutable suites refuse to overwrite existing output.
*/

pub mod reports;
pub mod tarballs;

use asgen_config::{Config, MetadataType, Suite};
use asgen_model::{catalog, metainfo, yaml};
use asgen_store::DataStore;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};
use serde_json::json;
use snafu::ResultExt;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub enum Error {
        #[snafu(display("unable to write output {}: {source}", path.display()))]
        WriteOutput {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("unable to read overlay {}: {source}", path.display()))]
        OverlayRead {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("unable to parse overlay {}: {source}", path.display()))]
        OverlayParse {
            path: PathBuf,
            source: serde_json::Error,
        },

        #[snafu(display("template error: {source}"))]
        Template { source: tinytemplate::error::Error },

        #[snafu(context(false), display("store error: {source}"))]
        Store { source: asgen_store::Error },
    }
}
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// One (suite, section, arch) publication unit: the suite definition and
/// the backend's current package set.
pub struct SuiteView {
    pub suite: Suite,
    pub section: String,
    pub arch: String,
    pub pkids: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct PublishSummary {
    pub components: usize,
    pub removals: usize,
    pub refused_immutable: bool,
}

pub struct Publisher<'a> {
    config: &'a Config,
    dstore: &'a DataStore,
}

impl<'a> Publisher<'a> {
    pub fn new(config: &'a Config, dstore: &'a DataStore) -> Publisher<'a> {
        Publisher { config, dstore }
    }

    /// Publish one suite view: catalog, CID↔GCID table, hints, HTML
    /// report, and statistics.
    pub fn publish(&self, view: &SuiteView) -> Result<PublishSummary> {
        let mut summary = PublishSummary::default();

        let data_dir = self
            .config
            .export_dirs
            .data
            .join(&view.suite.name)
            .join(&view.section);
        let catalog_name = match self.config.metadata_type {
            MetadataType::Xml => format!("Components-{}.xml.gz", view.arch),
            MetadataType::Yaml => format!("Components-{}.yml.gz", view.arch),
        };
        let catalog_path = data_dir.join(&catalog_name);

        if view.suite.immutable
            && self.config.features.immutable_suites
            && catalog_path.exists()
        {
            warn!(
                "Suite {} is immutable and {} already exists; refusing to rewrite it",
                view.suite.name,
                catalog_path.display()
            );
            summary.refused_immutable = true;
            return Ok(summary);
        }

        let gcids = self.dstore.gcids_for_packages(&view.pkids)?;
        let removed = self.removed_components(&view.suite.name, &view.section)?;
        summary.removals = removed.len();

        let origin = self.config.origin(&view.suite.name, &view.section);
        let time = self
            .config
            .features
            .metadata_timestamps
            .then(|| Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());

        let mut xml_chunks = Vec::new();
        let mut parsed_components = Vec::new();
        let mut kind_counts: std::collections::BTreeMap<String, usize> = Default::default();
        for gcid in &gcids {
            let Some(data) = self.dstore.get_metadata(gcid)? else {
                warn!("GCID {} is referenced but has no stored metadata", gcid);
                continue;
            };
            if self.config.metadata_type == MetadataType::Yaml {
                if let Ok(el) = xmltree::Element::parse(data.as_bytes()) {
                    let cpt = metainfo::parse_component_element(&el);
                    *kind_counts.entry(cpt.kind.as_str().to_string()).or_insert(0) += 1;
                    parsed_components.push(cpt);
                }
            } else {
                let kind = extract_kind(&data);
                *kind_counts.entry(kind).or_insert(0) += 1;
                xml_chunks.push(data);
            }
            summary.components += 1;
        }

        match self.config.metadata_type {
            MetadataType::Xml => {
                for cid in &removed {
                    xml_chunks.push(catalog::removal_stub_xml(cid));
                }
                let document = catalog::catalog_document(
                    &origin,
                    self.config.media_base_url.as_deref(),
                    &view.arch,
                    view.suite.data_priority,
                    time.as_deref(),
                    &xml_chunks,
                );
                write_gz_atomic(&catalog_path, document.as_bytes())?;
            }
            MetadataType::Yaml => {
                let mut documents = vec![serde_yaml::to_string(&yaml::catalog_header(
                    &origin,
                    self.config.media_base_url.as_deref(),
                    &view.arch,
                    view.suite.data_priority,
                    time.as_deref(),
                ))
                .expect("header serializes")];
                for cpt in &parsed_components {
                    documents.push(
                        serde_yaml::to_string(&yaml::component_to_yaml(cpt))
                            .expect("component serializes"),
                    );
                }
                for cid in &removed {
                    documents.push(
                        serde_yaml::to_string(&yaml::removal_stub_yaml(cid))
                            .expect("stub serializes"),
                    );
                }
                let mut stream = String::new();
                for doc in documents {
                    stream.push_str("---\n");
                    stream.push_str(&doc);
                }
                write_gz_atomic(&catalog_path, stream.as_bytes())?;
            }
        }
        info!(
            "Published {} components for {}/{} [{}]",
            summary.components, view.suite.name, view.section, view.arch
        );

        // CID → GCID cross-reference.
        let cid_map = self.dstore.cid_gcid_map_for_packages(&view.pkids)?;
        let cid_table = serde_json::to_string_pretty(&cid_map).expect("map serializes");
        write_gz_atomic(
            &data_dir.join(format!("CID-GCID-{}.gz", view.arch)),
            cid_table.as_bytes(),
        )?;

        // Hints and reports.
        let hint_docs = reports::collect_hint_documents(self.dstore, &view.pkids)?;
        let hints_dir = self
            .config
            .export_dirs
            .hints
            .join(&view.suite.name)
            .join(&view.section);
        write_gz_atomic(
            &hints_dir.join(format!("Hints-{}.json.gz", view.arch)),
            serde_json::to_string_pretty(&hint_docs)
                .expect("hints serialize")
                .as_bytes(),
        )?;
        let html_dir = self
            .config
            .export_dirs
            .html
            .join(&view.suite.name)
            .join(&view.section);
        reports::render_html_report(self.config, view, &hint_docs, &html_dir)?;

        // Per-size icon tarballs for mirror syncing.
        tarballs::build_icon_tarballs(&self.config.export_dirs.media, &self.config.icons, &gcids)?;

        // Statistics entry for this publication.
        let severity_counts = reports::severity_counts(&hint_docs);
        self.dstore.add_statistic(
            Utc::now().timestamp(),
            &json!({
                "suite": &view.suite.name,
                "section": &view.section,
                "arch": &view.arch,
                "totalComponents": summary.components,
                "componentKinds": kind_counts,
                "hintSeverities": severity_counts,
            }),
        )?;

        Ok(summary)
    }

    /// Component ids listed in the suite's removal overlay.
    fn removed_components(&self, suite: &str, section: &str) -> Result<Vec<String>> {
        let Some(extra_dir) = &self.config.extra_metainfo_dir else {
            return Ok(Vec::new());
        };
        let path = extra_dir
            .join(suite)
            .join(section)
            .join("removed-components.json");
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&path).context(error::OverlayReadSnafu { path: &path })?;
        serde_json::from_str(&data).context(error::OverlayParseSnafu { path })
    }
}

/// Pull the component kind out of canonical serialization without a full
/// parse; the first line always carries the type attribute.
fn extract_kind(xml: &str) -> String {
    xml.lines()
        .next()
        .and_then(|line| {
            let start = line.find("type=\"")? + 6;
            let end = line[start..].find('"')? + start;
            Some(line[start..end].to_string())
        })
        .unwrap_or_else(|| "generic".to_string())
}

/// Gzip-compress and write atomically: staged sibling, then rename.
pub fn write_gz_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).context(error::WriteOutputSnafu { path })?;
    let staged = staging_name(path);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .context(error::WriteOutputSnafu { path })?;
    let compressed = encoder
        .finish()
        .context(error::WriteOutputSnafu { path })?;

    fs::write(&staged, compressed).context(error::WriteOutputSnafu { path: &staged })?;
    fs::rename(&staged, path).context(error::WriteOutputSnafu { path })?;
    Ok(())
}

fn staging_name(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".new");
    path.with_file_name(name)
}
