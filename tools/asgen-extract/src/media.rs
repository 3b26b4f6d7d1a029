//! Media-pool writes.
//!
//! Files land under `media/<prefix>/<gcid>/...`. Writes are staged next
//! to the final name and renamed into place, so readers of an exported
//! pool never observe partial files.

use asgen_model::gcid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Absolute directory for a component's media, `<root>/<prefix>/<gcid>`.
pub fn component_media_dir(media_root: &Path, gcid_str: &str) -> PathBuf {
    media_root.join(gcid::media_path(gcid_str))
}

/// Pool-relative path for a media file, usable as a catalog URL joined
/// with the media base URL.
pub fn pool_relative(gcid_str: &str, rest: &str) -> String {
    format!("{}/{}", gcid::media_path(gcid_str).display(), rest)
}

/// Write one file atomically: staged sibling, then rename.
pub fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = staging_path(path);
    fs::write(&staged, data)?;
    fs::rename(&staged, path)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pool_paths_nest_the_prefix() {
        let dir = component_media_dir(Path::new("/pool"), "org.example.Foo/1.0/abcd");
        assert_eq!(
            dir,
            PathBuf::from("/pool/or/org.example.Foo/1.0/abcd")
        );
        assert_eq!(
            pool_relative("org.example.Foo/1.0/abcd", "icons/64x64/org.example.Foo.png"),
            "or/org.example.Foo/1.0/abcd/icons/64x64/org.example.Foo.png"
        );
    }

    #[test]
    fn writes_are_staged() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/file.png");
        write_file(&target, b"data").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"data");
        assert!(!staging_path(&target).exists());
    }
}
