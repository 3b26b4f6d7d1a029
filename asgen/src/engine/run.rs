//! Processing one (suite, section, arch) triple.
//!
//! Work is split into three passes: contents ingestion for the whole
//! package set (so the icon projection is complete before any metadata
//! work starts), parallel per-package processing, and serial commits on
//! a single writer thread fed by a bounded queue. Publication follows
//! directly after a successful pass.

use super::semaphore::Semaphore;
use super::Engine;
use anyhow::{bail, Result};
use asgen_backends::Package;
use asgen_config::Suite;
use asgen_extract::fonts::FontService;
use asgen_extract::icons::IconHandler;
use asgen_extract::processor::{process_package, ExtractorShared, PackageMap};
use asgen_extract::validator::ValidatorPool;
use asgen_model::{catalog, GeneratorResult};
use asgen_publish::{Publisher, SuiteView};
use asgen_store::{ComponentUpdate, PackageUpdate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc;
use std::sync::Arc;

/// Concurrent archive extractions are capped independently of the
/// worker count to bound disk pressure.
const MAX_CONCURRENT_EXTRACTIONS: usize = 4;

impl Engine {
    pub(super) fn process_triple(&self, suite: &Suite, section: &str, arch: &str) -> Result<()> {
        let fingerprint = self.config.features.fingerprint();
        let stored_info = self.dstore.repo_info(&suite.name, section, arch)?;
        let features_unchanged = stored_info
            .as_ref()
            .and_then(|v| v.get("features"))
            .and_then(|v| v.as_str())
            == Some(fingerprint.as_str());
        let index_changed = self
            .backend
            .has_changes(&self.dstore, &suite.name, section, arch)?;
        if !self.config.force && !index_changed && features_unchanged {
            info!(
                "Index of {}/{} [{}] is unchanged, skipping",
                suite.name, section, arch
            );
            return Ok(());
        }

        let packages = match self.seed_packages(suite, section, arch, true, true) {
            Ok(packages) => packages,
            Err(e) => {
                warn!(
                    "Repository of {}/{} [{}] is unavailable: {}",
                    suite.name, section, arch, e
                );
                self.record_suite_error(suite, section, arch, &e.to_string())?;
                return Ok(());
            }
        };
        info!(
            "Seeded {} packages for {}/{} [{}]",
            packages.len(),
            suite.name,
            section,
            arch
        );

        let base_packages = self.seed_base_packages(suite, arch);
        let mut pkg_map: PackageMap = BTreeMap::new();
        for pkg in packages.iter().chain(base_packages.iter()) {
            pkg_map.insert(pkg.id(), pkg.clone());
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_EXTRACTIONS));
        self.ingest_contents(&pkg_map, &semaphore)?;

        let all_pkids: BTreeSet<String> = pkg_map.keys().cloned().collect();
        let current_pkids = Self::pkid_set(&packages);
        let icon_files = self.cstore.icon_files_map(&all_pkids)?;
        let locale_paths = self.cstore.locale_paths_map(&current_pkids)?;

        let workers = num_cpus::get();
        let shared = ExtractorShared {
            config: self.config.clone(),
            icon_handler: Arc::new(IconHandler::create(
                icon_files,
                &pkg_map,
                suite.icon_theme.as_deref(),
                self.config.icons.clone(),
                self.config.features.allow_icon_upscaling,
                self.config.features.optimize_png_size,
            )),
            downloader: self.downloader.clone(),
            fonts: Arc::new(FontService::new()),
            validators: Arc::new(ValidatorPool::new(workers)),
            locale_paths: Arc::new(locale_paths),
            token: self.token.clone(),
        };

        // Fast path: packages already indexed and committed keep their
        // stored results verbatim.
        let mut units = Vec::new();
        for pkg in &packages {
            let pkid = pkg.id();
            if !self.config.force
                && self.cstore.contains(&pkid)?
                && self.dstore.package_exists(&pkid)?
            {
                debug!("Reusing stored data for {}", pkid);
                continue;
            }
            units.push(pkg.clone());
        }
        info!(
            "Processing {} packages ({} unchanged)",
            units.len(),
            packages.len() - units.len()
        );

        if !units.is_empty() {
            self.process_units(&units, &pkg_map, &shared, &semaphore, workers)?;
        }

        // Stamp the feature fingerprint so a later flag change defeats
        // the skip paths.
        let mut info_value = self
            .dstore
            .repo_info(&suite.name, section, arch)?
            .unwrap_or_else(|| json!({}));
        info_value["features"] = json!(fingerprint);
        self.dstore
            .set_repo_info(&suite.name, section, arch, &info_value)?;

        let publisher = Publisher::new(&self.config, &self.dstore);
        let view = SuiteView {
            suite: suite.clone(),
            section: section.to_string(),
            arch: arch.to_string(),
            pkids: current_pkids,
        };
        publisher.publish(&view)?;

        for pkg in pkg_map.values() {
            pkg.finish();
        }
        self.backend.release();
        Ok(())
    }

    /// Pass 1: make sure every package of the set (including the base
    /// suite) has its file listing in the contents store.
    fn ingest_contents(&self, pkg_map: &PackageMap, semaphore: &Arc<Semaphore>) -> Result<()> {
        let mut to_index = Vec::new();
        for pkg in pkg_map.values() {
            if self.config.force || !self.cstore.contains(&pkg.id())? {
                to_index.push(pkg.clone());
            }
        }
        if to_index.is_empty() {
            return Ok(());
        }
        debug!("Indexing contents of {} packages", to_index.len());

        let listings: Vec<(String, Result<Vec<String>, String>)> = to_index
            .par_iter()
            .map(|pkg| {
                let _permit = semaphore.acquire();
                (pkg.id(), pkg.contents().map_err(|e| e.to_string()))
            })
            .collect();

        // Writes stay on this thread: one writer, many readers.
        for (pkid, listing) in listings {
            match listing {
                Ok(files) => self.cstore.put(&pkid, &files)?,
                Err(e) => warn!("Unable to read contents of {}: {}", pkid, e),
            }
        }
        Ok(())
    }

    /// Pass 2/3: parallel processing with a bounded queue into the
    /// single commit thread.
    fn process_units(
        &self,
        units: &[Arc<dyn Package>],
        pkg_map: &PackageMap,
        shared: &ExtractorShared,
        semaphore: &Arc<Semaphore>,
        workers: usize,
    ) -> Result<()> {
        let progress = ProgressBar::new(units.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .expect("progress template is valid"),
        );

        let (sender, receiver) = mpsc::sync_channel::<GeneratorResult>(workers * 2);
        let dstore = self.dstore.clone();
        let writer_progress = progress.clone();
        let writer = std::thread::spawn(move || -> asgen_store::Result<()> {
            for res in receiver {
                let mut components = Vec::new();
                for cpt in res.components() {
                    let Some(gcid) = res.gcid_for(&cpt.id) else {
                        continue;
                    };
                    components.push(ComponentUpdate {
                        gcid: gcid.to_string(),
                        metadata_xml: Some(catalog::component_to_xml(cpt)),
                        hints_json: res.component_hints_json(&cpt.id).to_string(),
                    });
                }
                let update = PackageUpdate {
                    pkid: res.pkid.clone(),
                    ignore: components.is_empty(),
                    components,
                    hints_doc: res
                        .has_hints()
                        .then(|| res.hints_document().to_string()),
                };
                dstore.apply(&update)?;
                writer_progress.inc(1);
            }
            Ok(())
        });

        units.par_iter().for_each_with(sender, |sender, pkg| {
            if shared.token.is_cancelled() {
                return;
            }
            let _permit = semaphore.acquire();
            let result = process_package(shared, pkg.as_ref(), pkg_map);
            let _ = sender.send(result);
        });

        match writer.join() {
            Ok(result) => result?,
            Err(_) => bail!("the commit thread panicked"),
        }
        progress.finish_and_clear();
        Ok(())
    }

    /// Record a suite-level failure as a hint so reports can show it.
    fn record_suite_error(
        &self,
        suite: &Suite,
        section: &str,
        arch: &str,
        msg: &str,
    ) -> Result<()> {
        let pkid = format!("asgen-suite/{}-{}/{}", suite.name, section, arch);
        let mut res = GeneratorResult::new(&pkid, "asgen-suite");
        res.add_hint(
            None,
            "backend-unavailable",
            &[
                ("suite", suite.name.as_str()),
                ("section", section),
                ("arch", arch),
                ("msg", msg),
            ],
        );
        self.dstore.apply(&PackageUpdate {
            pkid,
            components: Vec::new(),
            ignore: true,
            hints_doc: Some(res.hints_document().to_string()),
        })?;
        Ok(())
    }
}
