/*!
The shared data model of the generator: the AppStream component entity and
its serialized forms, the issue-hint registry, the metadata-license gate,
Debian version ordering, and global content-identifier construction.

Everything in this crate is deterministic: components keep their localized
fields in ordered maps and the catalog emitter writes attributes in sorted
order, so serializing the same component twice yields byte-identical
output. That property is what makes content-addressed component ids stable
across runs and across machines.
*/

pub mod catalog;
pub mod component;
pub mod desktop;
pub mod gcid;
pub mod hints;
pub mod metainfo;
pub mod result;
pub mod spdx;
pub mod vercmp;
pub mod yaml;

pub use component::{
    Component, ComponentKind, Icon, Image, ImageKind, Launchable, LaunchableKind, Provided,
    ProvidedKind, Release, Screenshot, TranslatedString, Video,
};
pub use hints::{Hint, HintSeverity};
pub use result::GeneratorResult;
