/*!
The per-package extraction pipeline.

A worker takes one package, discovers its metainfo, fuses desktop data,
resolves icons across the package set, renders font samples, fetches and
thumbnails screenshots, validates, and emits a `GeneratorResult` ready for
the commit thread. Everything here is pure computation plus media-pool
writes; the stores are only read.
*/

pub mod downloader;
pub mod fonts;
pub mod gstreamer;
pub mod icons;
pub mod locale;
pub mod media;
pub mod processor;
pub mod render;
pub mod screenshots;
pub mod validator;

pub use downloader::{Downloader, HttpDownloader};
pub use processor::{process_package, ExtractorShared, PackageMap, RunToken};
