//! Icon policy: which sizes are cached into the media pool and which may
//! be referenced remotely.

use log::warn;
use std::fmt;

/// An icon size with its HiDPI scale factor, e.g. `64x64` or `128x128@2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IconSize {
    pub size: u32,
    pub scale: u32,
}

impl IconSize {
    pub const fn new(size: u32, scale: u32) -> IconSize {
        IconSize { size, scale }
    }

    /// Pixel edge length including the scale factor.
    pub fn pixels(self) -> u32 {
        self.size * self.scale
    }

    /// Parse `"64x64"` or `"64x64@2"`.
    pub fn parse(value: &str) -> Option<IconSize> {
        let (dims, scale) = match value.split_once('@') {
            Some((dims, scale)) => (dims, scale.parse::<u32>().ok()?),
            None => (value, 1),
        };
        let (w, h) = dims.split_once('x')?;
        let w = w.parse::<u32>().ok()?;
        let h = h.parse::<u32>().ok()?;
        if w != h || scale == 0 {
            return None;
        }
        Some(IconSize { size: w, scale })
    }
}

impl fmt::Display for IconSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale > 1 {
            write!(f, "{0}x{0}@{1}", self.size, self.scale)
        } else {
            write!(f, "{0}x{0}", self.size)
        }
    }
}

/// The sizes a policy may mention at all. Anything else is discarded even
/// if icons for it exist.
pub const RECOGNIZED_SIZES: &[IconSize] = &[
    IconSize::new(48, 1),
    IconSize::new(64, 1),
    IconSize::new(128, 1),
    IconSize::new(48, 2),
    IconSize::new(64, 2),
    IconSize::new(128, 2),
    IconSize::new(256, 1),
    IconSize::new(256, 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconPolicyEntry {
    pub size: IconSize,
    pub cached: bool,
    pub remote: bool,
}

/// The full policy. Invariant: the 64×64 entry exists and is cached; the
/// constructor repairs and warns if the configuration violates that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconPolicy {
    entries: Vec<IconPolicyEntry>,
}

impl Default for IconPolicy {
    fn default() -> IconPolicy {
        IconPolicy {
            entries: vec![
                IconPolicyEntry {
                    size: IconSize::new(48, 1),
                    cached: true,
                    remote: false,
                },
                IconPolicyEntry {
                    size: IconSize::new(64, 1),
                    cached: true,
                    remote: false,
                },
                IconPolicyEntry {
                    size: IconSize::new(128, 1),
                    cached: true,
                    remote: false,
                },
            ],
        }
    }
}

impl IconPolicy {
    /// Build a policy from raw `(size-string, cached, remote)` triples.
    pub fn from_raw<'a>(raw: impl Iterator<Item = (&'a str, bool, bool)>) -> IconPolicy {
        let mut entries: Vec<IconPolicyEntry> = Vec::new();
        for (size_str, cached, remote) in raw {
            let size = match IconSize::parse(size_str) {
                Some(size) if RECOGNIZED_SIZES.contains(&size) => size,
                _ => {
                    warn!("Ignoring unrecognized icon size '{}' in policy", size_str);
                    continue;
                }
            };
            entries.retain(|e| e.size != size);
            entries.push(IconPolicyEntry {
                size,
                cached,
                remote,
            });
        }
        if entries.is_empty() {
            return IconPolicy::default();
        }

        let mut policy = IconPolicy { entries };
        policy.repair();
        policy
    }

    fn repair(&mut self) {
        let base = IconSize::new(64, 1);
        match self.entries.iter_mut().find(|e| e.size == base) {
            Some(entry) => {
                if !entry.cached {
                    warn!("Icon policy did not cache 64x64 icons; repaired, 64x64 is mandatory");
                    entry.cached = true;
                }
            }
            None => {
                warn!("Icon policy had no 64x64 entry; added one, 64x64 is mandatory");
                self.entries.push(IconPolicyEntry {
                    size: base,
                    cached: true,
                    remote: false,
                });
            }
        }
        self.entries.sort_by_key(|e| e.size);
    }

    pub fn entry(&self, size: IconSize) -> Option<&IconPolicyEntry> {
        self.entries.iter().find(|e| e.size == size)
    }

    pub fn entries(&self) -> &[IconPolicyEntry] {
        &self.entries
    }

    /// All sizes the resolver should look for.
    pub fn wanted_sizes(&self) -> Vec<IconSize> {
        self.entries
            .iter()
            .filter(|e| e.cached || e.remote)
            .map(|e| e.size)
            .collect()
    }

    pub fn cached_sizes(&self) -> Vec<IconSize> {
        self.entries
            .iter()
            .filter(|e| e.cached)
            .map(|e| e.size)
            .collect()
    }
}
