use crate::{desktop_file, metainfo_xml, png_icon, PackageFixture, TestRepo};
use asgen_store::{ContentsStore, DataStore};
use serde_json::json;
use std::fs;

fn one_suite() -> serde_json::Value {
    json!({
        "sid": {
            "sections": ["main"],
            "architectures": ["amd64"],
        }
    })
}

fn theme_package() -> PackageFixture {
    PackageFixture::new("hicolor-icon-theme", "1.0")
        .with_file("/usr/share/icons/hicolor/64x64/apps/foo.png", png_icon(64))
        .with_file("/usr/share/icons/hicolor/128x128/apps/foo.png", png_icon(128))
}

fn foo_package() -> PackageFixture {
    PackageFixture::new("foo", "1.0-1")
        .with_file(
            "/usr/share/metainfo/org.example.Foo.metainfo.xml",
            metainfo_xml("org.example.Foo", "FSFAP", true),
        )
        .with_file(
            "/usr/share/applications/org.example.Foo.desktop",
            desktop_file("Foo", "foo"),
        )
}

fn generic_metainfo(cid: &str, summary: &str) -> String {
    format!(
        "<component type=\"generic\"><id>{cid}</id><name>{cid}</name>\
         <summary>{summary}</summary><metadata_license>FSFAP</metadata_license></component>"
    )
}

#[test]
fn simple_desktop_app_is_published_with_icons() {
    let repo = TestRepo::new();
    repo.write_triple("sid", "main", "amd64", &[foo_package(), theme_package()]);
    let config = repo.write_config(one_suite());
    repo.run_engine(&config, "sid", false);

    let catalog = repo.read_catalog("sid", "main", "amd64");
    assert!(catalog.contains("<id>org.example.Foo</id>"));
    assert!(catalog.contains("type=\"desktop-application\""));
    assert!(catalog.contains("<icon type=\"cached\" width=\"64\" height=\"64\">org.example.Foo.png</icon>"));
    assert!(catalog.contains("<icon type=\"cached\" width=\"128\" height=\"128\">org.example.Foo.png</icon>"));
    assert!(catalog.contains("<pkgname>foo</pkgname>"));

    // The media pool holds the rendered icon under the component's GCID.
    let cid_gcid = repo.read_cid_gcid("sid", "main", "amd64");
    let gcid = cid_gcid["org.example.Foo"][0].as_str().unwrap();
    let icon = repo
        .media_dir()
        .join("or")
        .join(gcid)
        .join("icons/64x64/org.example.Foo.png");
    assert!(icon.is_file(), "missing {}", icon.display());
}

#[test]
fn gcids_are_stable_across_independent_runs() {
    let gcid_of = |repo: &TestRepo| -> String {
        repo.write_triple("sid", "main", "amd64", &[foo_package(), theme_package()]);
        let config = repo.write_config(one_suite());
        repo.run_engine(&config, "sid", false);
        repo.read_cid_gcid("sid", "main", "amd64")["org.example.Foo"][0]
            .as_str()
            .unwrap()
            .to_string()
    };
    let first = gcid_of(&TestRepo::new());
    let second = gcid_of(&TestRepo::new());
    assert_eq!(first, second);
}

#[test]
fn rerunning_with_force_is_byte_identical() {
    let repo = TestRepo::new();
    repo.write_triple("sid", "main", "amd64", &[foo_package(), theme_package()]);
    let config = repo.write_config(one_suite());

    repo.run_engine(&config, "sid", false);
    let first = repo.read_catalog("sid", "main", "amd64");

    repo.run_engine(&config, "sid", true);
    let second = repo.read_catalog("sid", "main", "amd64");
    assert_eq!(first, second);
}

#[test]
fn unchanged_rerun_skips_processing() {
    let repo = TestRepo::new();
    repo.write_triple("sid", "main", "amd64", &[foo_package(), theme_package()]);
    let config = repo.write_config(one_suite());

    repo.run_engine(&config, "sid", false);
    let mtime = fs::metadata(repo.catalog_path("sid", "main", "amd64"))
        .unwrap()
        .modified()
        .unwrap();

    // Without --force and with an unchanged index, the triple is skipped
    // and the catalog file is left untouched.
    repo.run_engine(&config, "sid", false);
    let mtime_after = fs::metadata(repo.catalog_path("sid", "main", "amd64"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(mtime, mtime_after);
}

#[test]
fn disallowed_metadata_license_is_rejected() {
    let repo = TestRepo::new();
    let bad = PackageFixture::new("foo", "1.0-1").with_file(
        "/usr/share/metainfo/org.example.Foo.metainfo.xml",
        metainfo_xml("org.example.Foo", "Proprietary", true),
    );
    repo.write_triple("sid", "main", "amd64", &[bad, theme_package()]);
    let config = repo.write_config(one_suite());
    repo.run_engine(&config, "sid", false);

    let catalog = repo.read_catalog("sid", "main", "amd64");
    assert!(!catalog.contains("org.example.Foo"));

    let hints = repo.read_hints("sid", "main", "amd64");
    let doc = hints
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["package"] == "foo/1.0-1/amd64")
        .expect("hint document for foo");
    let tags: Vec<&str> = doc["hints"]["org.example.Foo"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["tag"].as_str().unwrap())
        .collect();
    assert!(tags.contains(&"metainfo-license-invalid"));
}

#[test]
fn missing_desktop_file_is_a_warning_only() {
    let repo = TestRepo::new();
    let no_desktop = PackageFixture::new("foo", "1.0-1").with_file(
        "/usr/share/metainfo/org.example.Foo.metainfo.xml",
        metainfo_xml("org.example.Foo", "FSFAP", true),
    );
    repo.write_triple("sid", "main", "amd64", &[no_desktop, theme_package()]);
    let config = repo.write_config(one_suite());
    repo.run_engine(&config, "sid", false);

    // The component survives and keeps the metainfo name.
    let catalog = repo.read_catalog("sid", "main", "amd64");
    assert!(catalog.contains("<id>org.example.Foo</id>"));
    assert!(catalog.contains("<name>Foo</name>"));

    let hints = repo.read_hints("sid", "main", "amd64");
    let doc = hints
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["package"] == "foo/1.0-1/amd64")
        .expect("hint document for foo");
    let entries = doc["hints"]["org.example.Foo"].as_array().unwrap();
    let missing = entries
        .iter()
        .find(|h| h["tag"] == "missing-desktop-file")
        .expect("missing-desktop-file hint");
    assert_eq!(missing["severity"], "warning");
}

#[test]
fn higher_priority_suite_carries_the_priority_tag() {
    let repo = TestRepo::new();
    let base_pkg = PackageFixture::new("c", "1.0").with_file(
        "/usr/share/metainfo/org.example.C.metainfo.xml",
        generic_metainfo("org.example.C", "Version one"),
    );
    let updates_pkg = PackageFixture::new("c", "1.1").with_file(
        "/usr/share/metainfo/org.example.C.metainfo.xml",
        generic_metainfo("org.example.C", "Version two"),
    );
    repo.write_triple("base", "main", "amd64", &[base_pkg]);
    repo.write_triple("updates", "main", "amd64", &[updates_pkg]);
    let config = repo.write_config(json!({
        "base": {"sections": ["main"], "architectures": ["amd64"], "dataPriority": 0},
        "updates": {
            "sections": ["main"],
            "architectures": ["amd64"],
            "dataPriority": 10,
            "baseSuite": "base"
        },
    }));

    repo.run_engine(&config, "base", false);
    repo.run_engine(&config, "updates", false);

    let base_catalog = repo.read_catalog("base", "main", "amd64");
    assert!(base_catalog.contains("Version one"));
    assert!(!base_catalog.contains("priority="));

    let updates_catalog = repo.read_catalog("updates", "main", "amd64");
    assert!(updates_catalog.contains("Version two"));
    assert!(updates_catalog.contains("priority=\"10\""));

    // Different content, different GCIDs.
    let base_gcid = repo.read_cid_gcid("base", "main", "amd64")["org.example.C"][0].clone();
    let updates_gcid = repo.read_cid_gcid("updates", "main", "amd64")["org.example.C"][0].clone();
    assert_ne!(base_gcid, updates_gcid);
}

#[test]
fn removal_overlay_emits_merge_stubs() {
    let repo = TestRepo::new();
    repo.write_triple("sid", "main", "amd64", &[foo_package(), theme_package()]);

    let extra_dir = repo.dir.path().join("extra-metainfo");
    let section_dir = extra_dir.join("sid/main");
    fs::create_dir_all(&section_dir).unwrap();
    fs::write(
        section_dir.join("removed-components.json"),
        r#"["org.example.Gone"]"#,
    )
    .unwrap();

    let config = repo.write_config_with_extra(one_suite(), Some(&extra_dir));
    repo.run_engine(&config, "sid", false);

    let catalog = repo.read_catalog("sid", "main", "amd64");
    assert!(catalog.contains("merge=\"remove-component\""));
    assert!(catalog.contains("<id>org.example.Gone</id>"));
    // The regular component is still published alongside the stub.
    assert!(catalog.contains("<id>org.example.Foo</id>"));
}

#[test]
fn cleanup_drops_data_of_vanished_packages() {
    let repo = TestRepo::new();
    let p = PackageFixture::new("p", "1.0").with_file(
        "/usr/share/metainfo/org.example.P.metainfo.xml",
        generic_metainfo("org.example.P", "Stays around"),
    );
    repo.write_triple(
        "sid",
        "main",
        "amd64",
        &[p.clone(), foo_package(), theme_package()],
    );
    let config = repo.write_config(one_suite());
    repo.run_engine(&config, "sid", false);

    let cid_gcid = repo.read_cid_gcid("sid", "main", "amd64");
    let foo_gcid = cid_gcid["org.example.Foo"][0].as_str().unwrap().to_string();
    let p_gcid = cid_gcid["org.example.P"][0].as_str().unwrap().to_string();
    let foo_media = repo.media_dir().join("or").join(&foo_gcid);
    assert!(foo_media.is_dir());

    // Drop the foo package from the repository and re-run, then clean.
    repo.write_triple(
        "sid",
        "main",
        "amd64",
        &[p.clone(), theme_package()],
    );
    repo.run_engine(&config, "sid", false);
    repo.cleanup_engine(&config);

    // Removing one package must not disturb the other's entries.
    let cid_gcid = repo.read_cid_gcid("sid", "main", "amd64");
    assert_eq!(cid_gcid["org.example.P"][0].as_str().unwrap(), p_gcid);

    let db_dir = repo.workspace().join("db");
    let cstore = ContentsStore::open(&db_dir.join("contents.redb")).unwrap();
    let dstore = DataStore::open(&db_dir.join("metadata.redb")).unwrap();

    assert!(!cstore.contains("foo/1.0-1/amd64").unwrap());
    assert!(!dstore.package_exists("foo/1.0-1/amd64").unwrap());
    assert!(cstore.contains("p/1.0/amd64").unwrap());
    assert!(dstore.package_exists("p/1.0/amd64").unwrap());
    assert!(!dstore.has_metadata(&foo_gcid).unwrap());
    assert!(!foo_media.exists());
}

#[test]
fn maintenance_commands_operate_on_the_stores() {
    let repo = TestRepo::new();
    repo.write_triple("sid", "main", "amd64", &[foo_package(), theme_package()]);
    let config_path = repo.write_config(one_suite());
    repo.run_engine(&config_path, "sid", false);

    let make_engine = || {
        let config = asgen_config::Config::load(&config_path, None).unwrap();
        asgen::engine::Engine::new(config).unwrap()
    };

    // `info` succeeds for a stored package and fails for garbage.
    make_engine().info("foo/1.0-1/amd64").unwrap();
    assert!(make_engine().info("ghost/0/amd64").is_err());

    // `forget` drops the package and sweeps its orphaned components.
    make_engine().forget("foo/").unwrap();
    {
        let db_dir = repo.workspace().join("db");
        let dstore = DataStore::open(&db_dir.join("metadata.redb")).unwrap();
        assert!(!dstore.package_exists("foo/1.0-1/amd64").unwrap());
        let cstore = ContentsStore::open(&db_dir.join("contents.redb")).unwrap();
        assert!(!cstore.contains("foo/1.0-1/amd64").unwrap());
    }
    assert!(make_engine().forget("foo/").is_err());

    // Re-process, then `remove-found` clears everything the suite has.
    repo.run_engine(&config_path, "sid", true);
    make_engine().remove_found("sid").unwrap();
    let db_dir = repo.workspace().join("db");
    let dstore = DataStore::open(&db_dir.join("metadata.redb")).unwrap();
    assert!(dstore.package_id_set().unwrap().is_empty());
}
