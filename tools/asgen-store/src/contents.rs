//! The contents store: pkid → file listing, with icon and locale
//! projections maintained on write.

use crate::{db, ensure_parent_dir, error, Result};
use redb::{Database, ReadableTable, TableDefinition};
use snafu::ResultExt;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const CONTENTS: TableDefinition<&str, &str> = TableDefinition::new("contents");
const ICON_FILES: TableDefinition<&str, &str> = TableDefinition::new("icon_files");
const LOCALE_FILES: TableDefinition<&str, &str> = TableDefinition::new("locale_files");

/// Path prefixes that classify a file into the icon projection.
const ICON_PREFIXES: &[&str] = &["/usr/share/icons/", "/usr/share/pixmaps/"];

/// Locale data lives under /usr/share/locale* and must be a translation
/// catalog of a known flavor.
const LOCALE_PREFIX: &str = "/usr/share/locale";
const LOCALE_EXTENSIONS: &[&str] = &[".mo", ".qm", ".pak"];

pub struct ContentsStore {
    db: Database,
}

impl ContentsStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<ContentsStore> {
        let path = path.to_path_buf();
        ensure_parent_dir(&path)?;
        let database = Database::create(&path).context(error::OpenSnafu { path })?;

        // Make sure all tables exist so later read transactions never
        // race table creation.
        let write = db(database.begin_write())?;
        {
            db(write.open_table(CONTENTS))?;
            db(write.open_table(ICON_FILES))?;
            db(write.open_table(LOCALE_FILES))?;
        }
        db(write.commit())?;

        Ok(ContentsStore { db: database })
    }

    /// Record the file listing of a package. The icon and locale
    /// projections are derived here; all three tables update in one
    /// transaction.
    pub fn put(&self, pkid: &str, files: &[String]) -> Result<()> {
        let all = files.join("\n");
        let icons: Vec<&str> = files
            .iter()
            .map(String::as_str)
            .filter(|f| ICON_PREFIXES.iter().any(|p| f.starts_with(p)))
            .collect();
        let locale: Vec<&str> = files
            .iter()
            .map(String::as_str)
            .filter(|f| {
                f.starts_with(LOCALE_PREFIX)
                    && LOCALE_EXTENSIONS.iter().any(|ext| f.ends_with(ext))
            })
            .collect();

        let write = db(self.db.begin_write())?;
        {
            let mut table = db(write.open_table(CONTENTS))?;
            db(table.insert(pkid, all.as_str()))?;

            let mut table = db(write.open_table(ICON_FILES))?;
            if icons.is_empty() {
                db(table.remove(pkid))?;
            } else {
                db(table.insert(pkid, icons.join("\n").as_str()))?;
            }

            let mut table = db(write.open_table(LOCALE_FILES))?;
            if locale.is_empty() {
                db(table.remove(pkid))?;
            } else {
                db(table.insert(pkid, locale.join("\n").as_str()))?;
            }
        }
        db(write.commit())
    }

    pub fn contains(&self, pkid: &str) -> Result<bool> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(CONTENTS))?;
        Ok(db(table.get(pkid))?.is_some())
    }

    /// The full file listing of a package, if recorded.
    pub fn contents(&self, pkid: &str) -> Result<Option<Vec<String>>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(CONTENTS))?;
        Ok(db(table.get(pkid))?.map(|guard| split_lines(guard.value())))
    }

    pub fn remove(&self, pkid: &str) -> Result<()> {
        let mut set = BTreeSet::new();
        set.insert(pkid.to_string());
        self.remove_many(&set)
    }

    /// Drop several packages in one transaction.
    pub fn remove_many(&self, pkids: &BTreeSet<String>) -> Result<()> {
        let write = db(self.db.begin_write())?;
        {
            let mut contents = db(write.open_table(CONTENTS))?;
            let mut icons = db(write.open_table(ICON_FILES))?;
            let mut locale = db(write.open_table(LOCALE_FILES))?;
            for pkid in pkids {
                db(contents.remove(pkid.as_str()))?;
                db(icons.remove(pkid.as_str()))?;
                db(locale.remove(pkid.as_str()))?;
            }
        }
        db(write.commit())
    }

    /// All pkids known to the store.
    pub fn package_id_set(&self) -> Result<BTreeSet<String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(CONTENTS))?;
        let mut set = BTreeSet::new();
        for entry in db(table.iter())? {
            let (key, _) = db(entry)?;
            set.insert(key.value().to_string());
        }
        Ok(set)
    }

    /// Inverted icon-file index over the given package set: path → owning
    /// pkid. Later packages win on collision, which is harmless since any
    /// owner of the same path serves the same lookup.
    pub fn icon_files_map(&self, pkids: &BTreeSet<String>) -> Result<BTreeMap<String, String>> {
        self.files_map(ICON_FILES, pkids, false)
    }

    /// Inverted locale-file index keyed by basename; translation domain
    /// names are assumed unique per package.
    pub fn locale_files_map(&self, pkids: &BTreeSet<String>) -> Result<BTreeMap<String, String>> {
        self.files_map(LOCALE_FILES, pkids, true)
    }

    /// Locale file paths per package, used for language statistics.
    pub fn locale_files_of(&self, pkid: &str) -> Result<Vec<String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(LOCALE_FILES))?;
        Ok(db(table.get(pkid))?
            .map(|guard| split_lines(guard.value()))
            .unwrap_or_default())
    }

    /// All locale file paths across a package set, with their owners.
    pub fn locale_paths_map(&self, pkids: &BTreeSet<String>) -> Result<BTreeMap<String, String>> {
        self.files_map(LOCALE_FILES, pkids, false)
    }

    fn files_map(
        &self,
        table_def: TableDefinition<'static, &'static str, &'static str>,
        pkids: &BTreeSet<String>,
        key_by_basename: bool,
    ) -> Result<BTreeMap<String, String>> {
        let read = db(self.db.begin_read())?;
        let table = db(read.open_table(table_def))?;
        let mut map = BTreeMap::new();
        for pkid in pkids {
            let Some(guard) = db(table.get(pkid.as_str()))? else {
                continue;
            };
            for path in guard.value().lines() {
                let key = if key_by_basename {
                    path.rsplit('/').next().unwrap_or(path)
                } else {
                    path
                };
                map.insert(key.to_string(), pkid.clone());
            }
        }
        Ok(map)
    }

    /// Durable flush. redb commits are durable already; this is an empty
    /// write transaction acting as a barrier.
    pub fn sync(&self) -> Result<()> {
        let write = db(self.db.begin_write())?;
        db(write.commit())
    }
}

fn split_lines(value: &str) -> Vec<String> {
    value
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn store() -> (tempfile::TempDir, ContentsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentsStore::open(&dir.path().join("contents.redb")).unwrap();
        (dir, store)
    }

    fn files() -> Vec<String> {
        vec![
            "/usr/bin/foo".to_string(),
            "/usr/share/icons/hicolor/64x64/apps/foo.png".to_string(),
            "/usr/share/pixmaps/foo.xpm".to_string(),
            "/usr/share/locale/de/LC_MESSAGES/foo.mo".to_string(),
            "/usr/share/locale/fr/LC_MESSAGES/foo.mo".to_string(),
            "/usr/share/doc/foo/README".to_string(),
        ]
    }

    #[test]
    fn put_and_read_back() {
        let (_dir, store) = store();
        store.put("foo/1.0/amd64", &files()).unwrap();
        assert!(store.contains("foo/1.0/amd64").unwrap());
        assert_eq!(store.contents("foo/1.0/amd64").unwrap().unwrap().len(), 6);
        assert!(!store.contains("bar/1.0/amd64").unwrap());
    }

    #[test]
    fn icon_projection() {
        let (_dir, store) = store();
        store.put("foo/1.0/amd64", &files()).unwrap();
        let mut pkids = BTreeSet::new();
        pkids.insert("foo/1.0/amd64".to_string());
        let map = store.icon_files_map(&pkids).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("/usr/share/icons/hicolor/64x64/apps/foo.png").unwrap(),
            "foo/1.0/amd64"
        );
    }

    #[test]
    fn locale_projection_keys_by_basename() {
        let (_dir, store) = store();
        store.put("foo/1.0/amd64", &files()).unwrap();
        let mut pkids = BTreeSet::new();
        pkids.insert("foo/1.0/amd64".to_string());
        let map = store.locale_files_map(&pkids).unwrap();
        assert_eq!(map.get("foo.mo").unwrap(), "foo/1.0/amd64");
    }

    #[test]
    fn files_map_is_scoped_to_requested_packages() {
        let (_dir, store) = store();
        store.put("foo/1.0/amd64", &files()).unwrap();
        store
            .put(
                "bar/2.0/amd64",
                &["/usr/share/icons/hicolor/64x64/apps/bar.png".to_string()],
            )
            .unwrap();
        let mut pkids = BTreeSet::new();
        pkids.insert("bar/2.0/amd64".to_string());
        let map = store.icon_files_map(&pkids).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("/usr/share/icons/hicolor/64x64/apps/bar.png"));
    }

    #[test]
    fn remove_clears_all_projections() {
        let (_dir, store) = store();
        store.put("foo/1.0/amd64", &files()).unwrap();
        store.remove("foo/1.0/amd64").unwrap();
        assert!(!store.contains("foo/1.0/amd64").unwrap());
        let mut pkids = BTreeSet::new();
        pkids.insert("foo/1.0/amd64".to_string());
        assert!(store.icon_files_map(&pkids).unwrap().is_empty());
        assert!(store.locale_files_map(&pkids).unwrap().is_empty());
    }

    #[test]
    fn package_id_set_lists_everything() {
        let (_dir, store) = store();
        store.put("a/1/amd64", &files()).unwrap();
        store.put("b/2/i386", &files()).unwrap();
        let set = store.package_id_set().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("a/1/amd64"));
    }

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contents.redb");
        {
            let store = ContentsStore::open(&path).unwrap();
            store.put("foo/1.0/amd64", &files()).unwrap();
            store.sync().unwrap();
        }
        let store = ContentsStore::open(&path).unwrap();
        assert!(store.contains("foo/1.0/amd64").unwrap());
    }
}
