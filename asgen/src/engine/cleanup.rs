//! Garbage collection of store entries and media.
//!
//! The live set is the union of the backend's current package
//! enumeration across every configured suite, immutable suites
//! included: a frozen snapshot keeps its pkids and GCIDs (and their
//! media) alive until no suite of either kind references them. When a
//! repository index cannot be read the cleanup aborts rather than treat
//! the triple as empty and delete live data.

use super::Engine;
use anyhow::{Context, Result};
use asgen_backends::Package;
use asgen_extract::media;
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs;

pub(super) fn cleanup(engine: &Engine) -> Result<()> {
    let mut live: BTreeSet<String> = BTreeSet::new();
    for suite in &engine.config.suites {
        for section in &suite.sections {
            for arch in &suite.architectures {
                let packages = engine
                    .seed_packages(suite, section, arch, false, true)
                    .with_context(|| {
                        format!(
                            "unable to enumerate {}/{} [{}]; aborting cleanup to avoid \
                             removing live data",
                            suite.name, section, arch
                        )
                    })?;
                live.extend(packages.iter().map(|p| p.id()));
                for pkg in packages {
                    pkg.finish();
                }
            }
        }
    }
    info!("Live package set has {} entries", live.len());

    let dead_contents: BTreeSet<String> = engine
        .cstore
        .package_id_set()?
        .difference(&live)
        .cloned()
        .collect();
    if !dead_contents.is_empty() {
        info!(
            "Removing {} stale entries from the contents store",
            dead_contents.len()
        );
        engine.cstore.remove_many(&dead_contents)?;
    }

    let dead_packages: BTreeSet<String> = engine
        .dstore
        .package_id_set()?
        .difference(&live)
        .cloned()
        .collect();
    if !dead_packages.is_empty() {
        info!(
            "Removing {} stale package records from the data store",
            dead_packages.len()
        );
        engine.dstore.remove_packages(&dead_packages)?;
    }

    remove_orphaned_components(engine)?;

    engine.cstore.sync()?;
    engine.dstore.sync()?;
    Ok(())
}

/// Drop components no remaining package resolves to, along with their
/// media directories.
pub(super) fn remove_orphaned_components(engine: &Engine) -> Result<()> {
    let remaining = engine.dstore.package_id_set()?;
    let live_gcids = engine.dstore.gcids_for_packages(&remaining)?;
    let dead: BTreeSet<String> = engine
        .dstore
        .gcid_set()?
        .difference(&live_gcids)
        .cloned()
        .collect();
    if dead.is_empty() {
        return Ok(());
    }

    info!("Removing {} orphaned components", dead.len());
    engine.dstore.remove_components(&dead)?;
    for gcid in &dead {
        let dir = media::component_media_dir(&engine.config.export_dirs.media, gcid);
        if dir.exists() {
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!("Unable to remove media of {}: {}", gcid, e);
            }
        }
    }
    Ok(())
}
