//! The data store: GCID → serialized component data and hints, plus the
//! pkid → GCID join, repository snapshots, and run statistics.

use crate::{db, ensure_parent_dir, error, Result};
use redb::{Database, ReadableTable, TableDefinition};
use snafu::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Bump when the table layout changes; older caches are rejected.
pub const SCHEMA_VERSION: u32 = 1;

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const METADATA: TableDefinition<&str, &str> = TableDefinition::new("metadata");
const HINTS: TableDefinition<&str, &str> = TableDefinition::new("hints");
const PACKAGES: TableDefinition<&str, &str> = TableDefinition::new("packages");
const PACKAGE_HINTS: TableDefinition<&str, &str> = TableDefinition::new("package_hints");
const STATISTICS: TableDefinition<&str, &str> = TableDefinition::new("statistics");
const REPO_INFO: TableDefinition<&str, &str> = TableDefinition::new("repo_info");

/// Marker for packages that produced no components; lets the fast path
/// skip them on the next run without re-reading the archive.
const IGNORE_MARKER: &str = "ignore";

/// One component's contribution inside a package commit. `metadata_xml`
/// is `None` when the GCID already exists and only the join needs update.
#[derive(Debug)]
pub struct ComponentUpdate {
    pub gcid: String,
    pub metadata_xml: Option<String>,
    pub hints_json: String,
}

/// Everything one processed package writes, applied in one transaction.
#[derive(Debug)]
pub struct PackageUpdate {
    pub pkid: String,
    pub components: Vec<ComponentUpdate>,
    pub ignore: bool,
    /// The package's full hint document, exported per-pkid at publish
    /// time. `None` when the package produced no hints at all.
    pub hints_doc: Option<String>,
}

pub struct DataStore {
    db: Database,
}

impl DataStore {
    pub fn open(path: &Path) -> Result<DataStore> {
        let path = path.to_path_buf();
        ensure_parent_dir(&path)?;
        let database = Database::create(&path).context(error::OpenSnafu { path })?;

        let write = db(database.begin_write())?;
        let found_version = {
            let mut meta = db(write.open_table(META))?;
            db(write.open_table(METADATA))?;
            db(write.open_table(HINTS))?;
            db(write.open_table(PACKAGES))?;
            db(write.open_table(PACKAGE_HINTS))?;
            db(write.open_table(STATISTICS))?;
            db(write.open_table(REPO_INFO))?;

            let found = db(meta.get("schema_version"))?
                .map(|guard| guard.value().parse::<u32>().unwrap_or(0));
            if found.is_none() {
                db(meta.insert("schema_version", SCHEMA_VERSION.to_string().as_str()))?;
            }
            found
        };
        db(write.commit())?;

        if let Some(found) = found_version {
            if found != SCHEMA_VERSION {
                return error::SchemaVersionSnafu {
                    found,
                    expected: SCHEMA_VERSION,
                }
                .fail();
            }
        }

        Ok(DataStore { db: database })
    }

    /// Apply one package's results atomically.
    pub fn apply(&self, update: &PackageUpdate) -> Result<()> {
        let write = db(self.db.begin_write())?;
        {
            let mut metadata = db(write.open_table(METADATA))?;
            let mut hints = db(write.open_table(HINTS))?;
            let mut packages = db(write.open_table(PACKAGES))?;
            let mut package_hints = db(write.open_table(PACKAGE_HINTS))?;

            for component in &update.components {
                if let Some(xml) = &component.metadata_xml {
                    db(metadata.insert(component.gcid.as_str(), xml.as_str()))?;
                }
                db(hints.insert(component.gcid.as_str(), component.hints_json.as_str()))?;
            }

            if update.ignore {
                db(packages.insert(update.pkid.as_str(), IGNORE_MARKER))?;
            } else {
                let gcids: Vec<&str> = update
                    .components
                    .iter()
                    .map(|c| c.gcid.as_str())
                    .collect();
                let value = serde_json::to_string(&gcids).expect("gcid list serializes");
                db(packages.insert(update.pkid.as_str(), value.as_str()))?;
            }

            match &update.hints_doc {
                Some(doc) => {
                    db(package_hints.insert(update.pkid.as_str(), doc.as_str()))?;
                }
                None => {
                    db(package_hints.remove(update.pkid.as_str()))?;
                }
            }
        }
        db(write.commit())
    }

    pub fn set_metadata(&self, gcid: &str, xml: &str) -> Result<()> {
        let write = db(self.db.begin_write())?;
        {
            let mut table = db(write.open_table(METADATA))?;
            db(table.insert(gcid, xml))?;
        }
        db(write.commit())
    }

    pub fn get_metadata(&self, gcid: &str) -> Result<Option<String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(METADATA))?;
        Ok(db(table.get(gcid))?.map(|guard| guard.value().to_string()))
    }

    pub fn has_metadata(&self, gcid: &str) -> Result<bool> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(METADATA))?;
        Ok(db(table.get(gcid))?.is_some())
    }

    pub fn set_hints(&self, gcid: &str, hints_json: &str) -> Result<()> {
        let write = db(self.db.begin_write())?;
        {
            let mut table = db(write.open_table(HINTS))?;
            db(table.insert(gcid, hints_json))?;
        }
        db(write.commit())
    }

    pub fn get_hints(&self, gcid: &str) -> Result<Option<String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(HINTS))?;
        Ok(db(table.get(gcid))?.map(|guard| guard.value().to_string()))
    }

    pub fn set_package_value(&self, pkid: &str, gcids: &[String]) -> Result<()> {
        let write = db(self.db.begin_write())?;
        {
            let mut table = db(write.open_table(PACKAGES))?;
            let value = serde_json::to_string(gcids).expect("gcid list serializes");
            db(table.insert(pkid, value.as_str()))?;
        }
        db(write.commit())
    }

    pub fn set_package_ignore(&self, pkid: &str) -> Result<()> {
        let write = db(self.db.begin_write())?;
        {
            let mut table = db(write.open_table(PACKAGES))?;
            db(table.insert(pkid, IGNORE_MARKER))?;
        }
        db(write.commit())
    }

    /// The ordered GCID list a package resolves to. Empty for unknown and
    /// for ignored packages.
    pub fn package_value(&self, pkid: &str) -> Result<Vec<String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(PACKAGES))?;
        let Some(guard) = db(table.get(pkid))? else {
            return Ok(Vec::new());
        };
        let raw = guard.value();
        if raw == IGNORE_MARKER {
            return Ok(Vec::new());
        }
        serde_json::from_str(raw).context(error::BadStoredJsonSnafu { key: pkid })
    }

    /// Whether the package has any record, including the ignore marker.
    pub fn package_exists(&self, pkid: &str) -> Result<bool> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(PACKAGES))?;
        Ok(db(table.get(pkid))?.is_some())
    }

    pub fn package_id_set(&self) -> Result<BTreeSet<String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(PACKAGES))?;
        let mut set = BTreeSet::new();
        for entry in db(table.iter())? {
            let (key, _) = db(entry)?;
            set.insert(key.value().to_string());
        }
        Ok(set)
    }

    /// Publish-time join: the GCIDs the given package set resolves to.
    pub fn gcids_for_packages(&self, pkids: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(PACKAGES))?;
        let mut gcids = BTreeSet::new();
        for pkid in pkids {
            let Some(guard) = db(table.get(pkid.as_str()))? else {
                continue;
            };
            let raw = guard.value();
            if raw == IGNORE_MARKER {
                continue;
            }
            let list: Vec<String> =
                serde_json::from_str(raw).context(error::BadStoredJsonSnafu { key: pkid })?;
            gcids.extend(list);
        }
        Ok(gcids)
    }

    /// Component-id → GCIDs cross-reference over a package set, for the
    /// published CID↔GCID table and duplicate detection.
    pub fn cid_gcid_map_for_packages(
        &self,
        pkids: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for gcid in self.gcids_for_packages(pkids)? {
            let cid = gcid.split('/').next().unwrap_or("").to_string();
            map.entry(cid).or_default().push(gcid);
        }
        Ok(map)
    }

    /// All GCIDs with stored metadata.
    pub fn gcid_set(&self) -> Result<BTreeSet<String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(METADATA))?;
        let mut set = BTreeSet::new();
        for entry in db(table.iter())? {
            let (key, _) = db(entry)?;
            set.insert(key.value().to_string());
        }
        Ok(set)
    }

    /// The stored per-package hint document.
    pub fn package_hints(&self, pkid: &str) -> Result<Option<serde_json::Value>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(PACKAGE_HINTS))?;
        let Some(guard) = db(table.get(pkid))? else {
            return Ok(None);
        };
        let parsed =
            serde_json::from_str(guard.value()).context(error::BadStoredJsonSnafu { key: pkid })?;
        Ok(Some(parsed))
    }

    pub fn remove_packages(&self, pkids: &BTreeSet<String>) -> Result<()> {
        let write = db(self.db.begin_write())?;
        {
            let mut table = db(write.open_table(PACKAGES))?;
            let mut hints = db(write.open_table(PACKAGE_HINTS))?;
            for pkid in pkids {
                db(table.remove(pkid.as_str()))?;
                db(hints.remove(pkid.as_str()))?;
            }
        }
        db(write.commit())
    }

    pub fn remove_components(&self, gcids: &BTreeSet<String>) -> Result<()> {
        let write = db(self.db.begin_write())?;
        {
            let mut metadata = db(write.open_table(METADATA))?;
            let mut hints = db(write.open_table(HINTS))?;
            for gcid in gcids {
                db(metadata.remove(gcid.as_str()))?;
                db(hints.remove(gcid.as_str()))?;
            }
        }
        db(write.commit())
    }

    /// Append one statistics entry. Entries are never overwritten; when
    /// several land on the same timestamp (clock skew, fast runs) they
    /// get consecutive sequence numbers.
    pub fn add_statistic(&self, timestamp: i64, value: &serde_json::Value) -> Result<()> {
        let serialized = value.to_string();
        let write = db(self.db.begin_write())?;
        {
            let mut table = db(write.open_table(STATISTICS))?;
            let mut seq = 0u32;
            loop {
                let key = statistic_key(timestamp, seq);
                if db(table.get(key.as_str()))?.is_none() {
                    db(table.insert(key.as_str(), serialized.as_str()))?;
                    break;
                }
                seq += 1;
            }
        }
        db(write.commit())
    }

    /// All statistics entries in chronological order.
    pub fn statistics(&self) -> Result<Vec<(i64, serde_json::Value)>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(STATISTICS))?;
        let mut entries = Vec::new();
        for entry in db(table.iter())? {
            let (key, value) = db(entry)?;
            let key_string = key.value().to_string();
            let timestamp = key_string
                .split('-')
                .next()
                .and_then(|t| t.parse::<i64>().ok())
                .unwrap_or(0);
            let parsed = serde_json::from_str(value.value())
                .context(error::BadStoredJsonSnafu { key: key_string })?;
            entries.push((timestamp, parsed));
        }
        Ok(entries)
    }

    /// Last-seen state of a repository index, used for change detection.
    pub fn repo_info(
        &self,
        suite: &str,
        section: &str,
        arch: &str,
    ) -> Result<Option<serde_json::Value>> {
        let key = repo_key(suite, section, arch);
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(REPO_INFO))?;
        let Some(guard) = db(table.get(key.as_str()))? else {
            return Ok(None);
        };
        let parsed =
            serde_json::from_str(guard.value()).context(error::BadStoredJsonSnafu { key })?;
        Ok(Some(parsed))
    }

    pub fn set_repo_info(
        &self,
        suite: &str,
        section: &str,
        arch: &str,
        value: &serde_json::Value,
    ) -> Result<()> {
        let key = repo_key(suite, section, arch);
        let serialized = value.to_string();
        let write = db(self.db.begin_write())?;
        {
            let mut table = db(write.open_table(REPO_INFO))?;
            db(table.insert(key.as_str(), serialized.as_str()))?;
        }
        db(write.commit())
    }

    pub fn sync(&self) -> Result<()> {
        let write = db(self.db.begin_write())?;
        db(write.commit())
    }
}

fn statistic_key(timestamp: i64, seq: u32) -> String {
    format!("{:020}-{:06}", timestamp.max(0), seq)
}

fn repo_key(suite: &str, section: &str, arch: &str) -> String {
    format!("{}/{}/{}", suite, section, arch)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(&dir.path().join("metadata.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn apply_writes_everything_at_once() {
        let (_dir, store) = store();
        let update = PackageUpdate {
            pkid: "foo/1.0/amd64".to_string(),
            components: vec![ComponentUpdate {
                gcid: "org.example.Foo/1.0/abcd".to_string(),
                metadata_xml: Some("<component/>".to_string()),
                hints_json: "[]".to_string(),
            }],
            ignore: false,
            hints_doc: Some(r#"{"package": "foo/1.0/amd64", "hints": {}}"#.to_string()),
        };
        store.apply(&update).unwrap();
        assert!(store.package_hints("foo/1.0/amd64").unwrap().is_some());
        assert!(store.has_metadata("org.example.Foo/1.0/abcd").unwrap());
        assert_eq!(
            store.package_value("foo/1.0/amd64").unwrap(),
            vec!["org.example.Foo/1.0/abcd".to_string()]
        );
        assert_eq!(store.get_hints("org.example.Foo/1.0/abcd").unwrap().unwrap(), "[]");
    }

    #[test]
    fn ignore_marker_hides_gcids_but_keeps_existence() {
        let (_dir, store) = store();
        store.set_package_ignore("foo/1.0/amd64").unwrap();
        assert!(store.package_exists("foo/1.0/amd64").unwrap());
        assert!(store.package_value("foo/1.0/amd64").unwrap().is_empty());
        let mut pkids = BTreeSet::new();
        pkids.insert("foo/1.0/amd64".to_string());
        assert!(store.gcids_for_packages(&pkids).unwrap().is_empty());
    }

    #[test]
    fn join_is_scoped_to_requested_packages() {
        let (_dir, store) = store();
        store
            .set_package_value("foo/1.0/amd64", &["a/1.0/x1".to_string()])
            .unwrap();
        store
            .set_package_value("bar/2.0/amd64", &["b/2.0/x2".to_string()])
            .unwrap();
        let mut pkids = BTreeSet::new();
        pkids.insert("foo/1.0/amd64".to_string());
        let gcids = store.gcids_for_packages(&pkids).unwrap();
        assert_eq!(gcids.len(), 1);
        assert!(gcids.contains("a/1.0/x1"));
    }

    #[test]
    fn cid_gcid_map_groups_by_component() {
        let (_dir, store) = store();
        store
            .set_package_value(
                "foo/1.0/amd64",
                &[
                    "org.example.A/1.0/x1".to_string(),
                    "org.example.B/1.0/x2".to_string(),
                ],
            )
            .unwrap();
        let mut pkids = BTreeSet::new();
        pkids.insert("foo/1.0/amd64".to_string());
        let map = store.cid_gcid_map_for_packages(&pkids).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("org.example.A").unwrap().len(), 1);
    }

    #[test]
    fn statistics_tolerate_identical_timestamps() {
        let (_dir, store) = store();
        store.add_statistic(100, &json!({"n": 1})).unwrap();
        store.add_statistic(100, &json!({"n": 2})).unwrap();
        store.add_statistic(50, &json!({"n": 0})).unwrap();
        let entries = store.statistics().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, 50);
        assert_eq!(entries[1].1["n"], 1);
        assert_eq!(entries[2].1["n"], 2);
    }

    #[test]
    fn repo_info_roundtrip() {
        let (_dir, store) = store();
        assert!(store.repo_info("sid", "main", "amd64").unwrap().is_none());
        store
            .set_repo_info("sid", "main", "amd64", &json!({"mtime": 12345}))
            .unwrap();
        let info = store.repo_info("sid", "main", "amd64").unwrap().unwrap();
        assert_eq!(info["mtime"], 12345);
    }

    #[test]
    fn remove_components_drops_metadata_and_hints() {
        let (_dir, store) = store();
        store.set_metadata("a/1/x", "<component/>").unwrap();
        store.set_hints("a/1/x", "[]").unwrap();
        let mut gone = BTreeSet::new();
        gone.insert("a/1/x".to_string());
        store.remove_components(&gone).unwrap();
        assert!(!store.has_metadata("a/1/x").unwrap());
        assert!(store.get_hints("a/1/x").unwrap().is_none());
    }

    #[test]
    fn schema_version_is_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.redb");
        {
            DataStore::open(&path).unwrap();
        }
        // Re-open validates the stamp instead of rejecting its own file.
        DataStore::open(&path).unwrap();
    }
}
