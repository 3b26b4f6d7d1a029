//! Per-size icon tarballs.
//!
//! Mirrors prefer syncing one archive per icon size over millions of tiny
//! files. For every pool prefix touched by the published GCIDs, the icons
//! of each policy size are bundled into
//! `media/<prefix>/icons/icons-<size>.tar.gz`.

use crate::{error, Result};
use asgen_config::IconPolicy;
use asgen_model::gcid;
use flate2::write::GzEncoder;
use flate2::Compression;
use snafu::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Build the icon bundles for the given published GCID set.
pub fn build_icon_tarballs(
    media_root: &Path,
    policy: &IconPolicy,
    gcids: &BTreeSet<String>,
) -> Result<()> {
    // prefix → gcids below it
    let mut by_prefix: BTreeMap<String, Vec<&String>> = BTreeMap::new();
    for gcid_str in gcids {
        let cid = gcid_str.split('/').next().unwrap_or("");
        by_prefix
            .entry(gcid::gcid_prefix(cid))
            .or_default()
            .push(gcid_str);
    }

    for (prefix, members) in by_prefix {
        for entry in policy.entries() {
            if !entry.cached {
                continue;
            }
            let size_dir = entry.size.to_string();
            let mut files: Vec<(String, Vec<u8>)> = Vec::new();
            for gcid_str in &members {
                let icons_dir = media_root
                    .join(gcid::media_path(gcid_str))
                    .join("icons")
                    .join(&size_dir);
                let Ok(dir_entries) = fs::read_dir(&icons_dir) else {
                    continue;
                };
                for file in dir_entries.flatten() {
                    let path = file.path();
                    if !path.is_file() {
                        continue;
                    }
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    let Ok(data) = fs::read(&path) else {
                        continue;
                    };
                    files.push((name.to_string(), data));
                }
            }
            if files.is_empty() {
                continue;
            }
            files.sort_by(|a, b| a.0.cmp(&b.0));

            let out_dir = media_root.join(&prefix).join("icons");
            fs::create_dir_all(&out_dir).context(error::WriteOutputSnafu { path: &out_dir })?;
            let out_path = out_dir.join(format!("icons-{}.tar.gz", size_dir));
            let staged = out_path.with_extension("gz.new");

            let out_file =
                fs::File::create(&staged).context(error::WriteOutputSnafu { path: &staged })?;
            let encoder = GzEncoder::new(out_file, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            for (name, data) in &files {
                let mut header = tar::Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder
                    .append_data(&mut header, name, data.as_slice())
                    .context(error::WriteOutputSnafu { path: &out_path })?;
            }
            builder
                .into_inner()
                .and_then(|encoder| encoder.finish())
                .context(error::WriteOutputSnafu { path: &out_path })?;
            fs::rename(&staged, &out_path)
                .context(error::WriteOutputSnafu { path: &out_path })?;
        }
    }
    Ok(())
}
