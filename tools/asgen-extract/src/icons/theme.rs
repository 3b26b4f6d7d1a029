//! XDG icon-theme index handling.
//!
//! A theme's `index.theme` declares sized subdirectories; each directory
//! record is one of three kinds, which decides how it matches a wanted
//! size. A built-in hicolor index covers repositories that do not ship
//! the hicolor package itself.

use asgen_config::IconSize;
use configparser::ini::Ini;

/// How a theme directory declares its size coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryKind {
    Fixed { size: u32 },
    Scalable { min: u32, max: u32 },
    Threshold { size: u32, threshold: u32 },
}

#[derive(Debug, Clone)]
pub struct ThemeDirectory {
    /// Path relative to the theme root, e.g. `64x64/apps`.
    pub path: String,
    pub kind: DirectoryKind,
    pub scale: u32,
}

impl ThemeDirectory {
    /// Whether this directory can serve the wanted size.
    pub fn matches_size(&self, wanted: IconSize) -> bool {
        if self.scale != wanted.scale {
            return false;
        }
        match self.kind {
            DirectoryKind::Fixed { size } => size == wanted.size,
            DirectoryKind::Scalable { min, max } => min <= wanted.size && wanted.size <= max,
            DirectoryKind::Threshold { size, threshold } => {
                size.abs_diff(wanted.size) <= threshold
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub directories: Vec<ThemeDirectory>,
}

/// Minimal hicolor index used when no package ships one.
const BUILTIN_HICOLOR_INDEX: &str = "\
[Icon Theme]
Name=Hicolor
Directories=48x48/apps,48x48@2/apps,64x64/apps,64x64@2/apps,128x128/apps,128x128@2/apps,256x256/apps,256x256@2/apps,scalable/apps

[48x48/apps]
Size=48
Type=Threshold

[48x48@2/apps]
Size=48
Scale=2
Type=Threshold

[64x64/apps]
Size=64
Type=Threshold

[64x64@2/apps]
Size=64
Scale=2
Type=Threshold

[128x128/apps]
Size=128
Type=Threshold

[128x128@2/apps]
Size=128
Scale=2
Type=Threshold

[256x256/apps]
Size=256
Type=Threshold

[256x256@2/apps]
Size=256
Scale=2
Type=Threshold

[scalable/apps]
Size=128
MinSize=8
MaxSize=512
Type=Scalable
";

impl Theme {
    /// Parse an `index.theme` document.
    pub fn parse(name: &str, index_data: &str) -> Result<Theme, String> {
        let mut ini = Ini::new_cs();
        let map = ini.read(index_data.to_string())?;

        let listed: Vec<String> = map
            .get("Icon Theme")
            .and_then(|g| g.get("Directories").cloned().flatten())
            .map(|dirs| {
                dirs.split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut directories = Vec::new();
        for dir in listed {
            let Some(group) = map.get(&dir) else {
                continue;
            };
            let get_u32 = |key: &str| -> Option<u32> {
                group.get(key).cloned().flatten()?.trim().parse::<u32>().ok()
            };
            let Some(size) = get_u32("Size") else {
                continue;
            };
            let scale = get_u32("Scale").unwrap_or(1);
            let kind_name = group
                .get("Type")
                .cloned()
                .flatten()
                .unwrap_or_else(|| "Threshold".to_string());
            let kind = match kind_name.as_str() {
                "Fixed" => DirectoryKind::Fixed { size },
                "Scalable" => DirectoryKind::Scalable {
                    min: get_u32("MinSize").unwrap_or(size),
                    max: get_u32("MaxSize").unwrap_or(size),
                },
                _ => DirectoryKind::Threshold {
                    size,
                    threshold: get_u32("Threshold").unwrap_or(2),
                },
            };
            directories.push(ThemeDirectory {
                path: dir,
                kind,
                scale,
            });
        }

        Ok(Theme {
            name: name.to_string(),
            directories,
        })
    }

    /// The fallback hicolor definition.
    pub fn builtin_hicolor() -> Theme {
        Theme::parse("hicolor", BUILTIN_HICOLOR_INDEX)
            .expect("built-in hicolor index parses")
    }

    /// Directories able to serve the wanted size, in declaration order.
    pub fn matching_directories(&self, wanted: IconSize) -> Vec<&ThemeDirectory> {
        self.directories
            .iter()
            .filter(|d| d.matches_size(wanted))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtin_hicolor_covers_the_policy_sizes() {
        let theme = Theme::builtin_hicolor();
        for size in [
            IconSize::new(48, 1),
            IconSize::new(64, 1),
            IconSize::new(128, 2),
            IconSize::new(256, 1),
        ] {
            assert!(
                !theme.matching_directories(size).is_empty(),
                "no directory for {}",
                size
            );
        }
    }

    #[test]
    fn fixed_matches_exactly() {
        let dir = ThemeDirectory {
            path: "64x64/apps".to_string(),
            kind: DirectoryKind::Fixed { size: 64 },
            scale: 1,
        };
        assert!(dir.matches_size(IconSize::new(64, 1)));
        assert!(!dir.matches_size(IconSize::new(48, 1)));
        assert!(!dir.matches_size(IconSize::new(64, 2)));
    }

    #[test]
    fn scalable_matches_a_range() {
        let dir = ThemeDirectory {
            path: "scalable/apps".to_string(),
            kind: DirectoryKind::Scalable { min: 16, max: 512 },
            scale: 1,
        };
        assert!(dir.matches_size(IconSize::new(64, 1)));
        assert!(dir.matches_size(IconSize::new(256, 1)));
        assert!(!dir.matches_size(IconSize::new(8, 1)));
    }

    #[test]
    fn threshold_matches_nearby() {
        let dir = ThemeDirectory {
            path: "22x22/apps".to_string(),
            kind: DirectoryKind::Threshold {
                size: 22,
                threshold: 2,
            },
            scale: 1,
        };
        assert!(dir.matches_size(IconSize::new(24, 1)));
        assert!(dir.matches_size(IconSize::new(20, 1)));
        assert!(!dir.matches_size(IconSize::new(48, 1)));
    }

    #[test]
    fn parses_a_real_index() {
        let data = "\
[Icon Theme]
Name=Test
Directories=16x16/apps,scalable/apps

[16x16/apps]
Size=16
Type=Fixed

[scalable/apps]
Size=64
MinSize=8
MaxSize=256
Type=Scalable
";
        let theme = Theme::parse("test", data).unwrap();
        assert_eq!(theme.directories.len(), 2);
        assert!(matches!(
            theme.directories[0].kind,
            DirectoryKind::Fixed { size: 16 }
        ));
        assert!(matches!(
            theme.directories[1].kind,
            DirectoryKind::Scalable { min: 8, max: 256 }
        ));
    }
}
