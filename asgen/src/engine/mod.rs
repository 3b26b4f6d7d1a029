//! The engine: seeding, scheduling, commit, publish, and cleanup.

mod cleanup;
mod run;
mod semaphore;

use crate::cmd::user_error;
use anyhow::{Context, Result};
use asgen_backends::{backend_by_name, injected, Backend, Package};
use asgen_config::{Config, Suite};
use asgen_extract::{Downloader, HttpDownloader, RunToken};
use asgen_model::vercmp;
use asgen_publish::{Publisher, SuiteView};
use asgen_store::{ContentsStore, DataStore};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::sync::Arc;

pub struct Engine {
    config: Arc<Config>,
    backend: Arc<dyn Backend>,
    cstore: Arc<ContentsStore>,
    dstore: Arc<DataStore>,
    downloader: Arc<dyn Downloader>,
    token: RunToken,
}

impl Engine {
    pub fn new(config: Config) -> Result<Engine> {
        for dir in [
            &config.workspace_dir,
            &config.database_dir(),
            &config.export_dirs.media,
            &config.export_dirs.data,
            &config.export_dirs.hints,
            &config.export_dirs.html,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("unable to create {}", dir.display()))?;
        }

        let backend = backend_by_name(&config.backend, &config.archive_root)
            .map_err(|e| user_error(e.to_string()))?;
        let cstore = ContentsStore::open(&config.database_dir().join("contents.redb"))?;
        let dstore = DataStore::open(&config.database_dir().join("metadata.redb"))?;
        let downloader: Arc<dyn Downloader> =
            Arc::new(HttpDownloader::new(config.ca_info.as_deref()).map_err(user_error)?);

        Ok(Engine {
            config: Arc::new(config),
            backend,
            cstore: Arc::new(cstore),
            dstore: Arc::new(dstore),
            downloader,
            token: RunToken::new(),
        })
    }

    pub fn token(&self) -> RunToken {
        self.token.clone()
    }

    fn resolve_suite(&self, name: &str) -> Result<Suite> {
        self.config
            .suite(name)
            .cloned()
            .ok_or_else(|| user_error(format!("suite '{}' is not configured", name)))
    }

    fn sections_of<'a>(&self, suite: &'a Suite, filter: Option<&str>) -> Result<Vec<&'a str>> {
        match filter {
            None => Ok(suite.sections.iter().map(String::as_str).collect()),
            Some(wanted) => {
                if suite.sections.iter().any(|s| s == wanted) {
                    Ok(vec![suite
                        .sections
                        .iter()
                        .find(|s| s.as_str() == wanted)
                        .expect("just checked")
                        .as_str()])
                } else {
                    Err(user_error(format!(
                        "section '{}' is not part of suite '{}'",
                        wanted, suite.name
                    )))
                }
            }
        }
    }

    /// Enumerate packages for a triple, deduplicated by name with the
    /// highest version winning, plus the injected synthetic package.
    fn seed_packages(
        &self,
        suite: &Suite,
        section: &str,
        arch: &str,
        with_long_descs: bool,
        with_injected: bool,
    ) -> asgen_backends::Result<Vec<Arc<dyn Package>>> {
        let raw = self
            .backend
            .packages_for(&suite.name, section, arch, with_long_descs)?;
        let mut by_name: BTreeMap<String, Arc<dyn Package>> = BTreeMap::new();
        for pkg in raw {
            match by_name.get(pkg.name()) {
                Some(existing) if !vercmp::version_newer(pkg.version(), existing.version()) => {}
                _ => {
                    by_name.insert(pkg.name().to_string(), pkg);
                }
            }
        }
        let mut packages: Vec<Arc<dyn Package>> = by_name.into_values().collect();

        if with_injected {
            if let Some(extra_dir) = &self.config.extra_metainfo_dir {
                match injected::load_injected_package(extra_dir, &suite.name, section, arch) {
                    Ok(Some(pkg)) => {
                        info!(
                            "Injecting extra metainfo package {} for {}/{}",
                            pkg.id(),
                            suite.name,
                            section
                        );
                        packages.push(Arc::new(pkg));
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Unable to load extra metainfo: {}", e),
                }
            }
        }
        Ok(packages)
    }

    /// The base suite's main section packages, used for icon resolution
    /// only. Failures here degrade icon lookups instead of failing the
    /// run.
    fn seed_base_packages(&self, suite: &Suite, arch: &str) -> Vec<Arc<dyn Package>> {
        let Some(base_name) = &suite.base_suite else {
            return Vec::new();
        };
        let Some(base) = self.config.suite(base_name) else {
            return Vec::new();
        };
        let section = if base.sections.iter().any(|s| s == "main") {
            "main".to_string()
        } else {
            match base.sections.first() {
                Some(section) => section.clone(),
                None => return Vec::new(),
            }
        };
        match self.seed_packages(base, &section, arch, false, false) {
            Ok(packages) => packages,
            Err(e) => {
                warn!(
                    "Unable to seed base suite '{}' for icon lookups: {}",
                    base_name, e
                );
                Vec::new()
            }
        }
    }

    fn pkid_set(packages: &[Arc<dyn Package>]) -> BTreeSet<String> {
        packages.iter().map(|p| p.id()).collect()
    }

    /// Process and publish a suite.
    pub fn run(&self, suite_name: &str, section_filter: Option<&str>) -> Result<()> {
        let suite = self.resolve_suite(suite_name)?;
        let sections: Vec<String> = self
            .sections_of(&suite, section_filter)?
            .into_iter()
            .map(str::to_string)
            .collect();

        for section in &sections {
            for arch in &suite.architectures {
                if self.token.is_cancelled() {
                    warn!("Run cancelled, stopping before {}/{}", section, arch);
                    return Ok(());
                }
                self.process_triple(&suite, section, arch)?;
            }
        }
        self.cstore.sync()?;
        self.dstore.sync()?;
        Ok(())
    }

    /// Re-publish from stored data without processing packages.
    pub fn publish(&self, suite_name: &str, section_filter: Option<&str>) -> Result<()> {
        let suite = self.resolve_suite(suite_name)?;
        let sections: Vec<String> = self
            .sections_of(&suite, section_filter)?
            .into_iter()
            .map(str::to_string)
            .collect();

        let publisher = Publisher::new(&self.config, &self.dstore);
        for section in &sections {
            for arch in &suite.architectures {
                let packages = match self.seed_packages(&suite, section, arch, false, true) {
                    Ok(packages) => packages,
                    Err(e) => {
                        warn!(
                            "Skipping publication of {}/{} [{}]: {}",
                            suite.name, section, arch, e
                        );
                        continue;
                    }
                };
                let view = SuiteView {
                    suite: suite.clone(),
                    section: section.clone(),
                    arch: arch.clone(),
                    pkids: Self::pkid_set(&packages),
                };
                publisher.publish(&view)?;
            }
        }
        Ok(())
    }

    pub fn cleanup(&self) -> Result<()> {
        cleanup::cleanup(self)
    }

    /// Remove all stored data for the packages currently in a suite.
    pub fn remove_found(&self, suite_name: &str) -> Result<()> {
        let suite = self.resolve_suite(suite_name)?;
        let mut pkids = BTreeSet::new();
        for section in &suite.sections {
            for arch in &suite.architectures {
                match self.seed_packages(&suite, section, arch, false, true) {
                    Ok(packages) => pkids.extend(packages.iter().map(|p| p.id())),
                    Err(e) => warn!(
                        "Unable to enumerate {}/{} [{}]: {}",
                        suite.name, section, arch, e
                    ),
                }
            }
        }
        info!("Removing data of {} packages", pkids.len());
        self.cstore.remove_many(&pkids)?;
        self.dstore.remove_packages(&pkids)?;
        cleanup::remove_orphaned_components(self)?;
        Ok(())
    }

    /// Forget everything about packages whose pkid starts with a prefix.
    pub fn forget(&self, pkid_prefix: &str) -> Result<()> {
        let mut matched: BTreeSet<String> = BTreeSet::new();
        for pkid in self.cstore.package_id_set()? {
            if pkid.starts_with(pkid_prefix) {
                matched.insert(pkid);
            }
        }
        for pkid in self.dstore.package_id_set()? {
            if pkid.starts_with(pkid_prefix) {
                matched.insert(pkid);
            }
        }
        if matched.is_empty() {
            return Err(user_error(format!(
                "no stored package matches '{}'",
                pkid_prefix
            )));
        }
        for pkid in &matched {
            info!("Forgetting {}", pkid);
        }
        self.cstore.remove_many(&matched)?;
        self.dstore.remove_packages(&matched)?;
        cleanup::remove_orphaned_components(self)?;
        Ok(())
    }

    /// Print stored information about one package.
    pub fn info(&self, pkid: &str) -> Result<()> {
        let mut found = false;
        if let Some(contents) = self.cstore.contents(pkid)? {
            found = true;
            println!("Package: {}", pkid);
            println!("Indexed files: {}", contents.len());
        }
        let gcids = self.dstore.package_value(pkid)?;
        if !gcids.is_empty() {
            found = true;
            println!("Components:");
            for gcid in &gcids {
                println!("  {}", gcid);
            }
        } else if self.dstore.package_exists(pkid)? {
            found = true;
            println!("Components: none (package is marked as ignored)");
        }
        if let Some(hints) = self.dstore.package_hints(pkid)? {
            found = true;
            println!(
                "Hints:\n{}",
                serde_json::to_string_pretty(&hints).expect("hints serialize")
            );
        }
        if !found {
            return Err(user_error(format!("nothing is stored for '{}'", pkid)));
        }
        Ok(())
    }
}
