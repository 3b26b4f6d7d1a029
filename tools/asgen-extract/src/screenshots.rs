//! Screenshot retrieval and thumbnailing.
//!
//! Remote screenshot sources are fetched, measured, and (when the
//! screenshot store is enabled) saved into the media pool along with
//! downscaled thumbnails. Thumbnails are never upscaled; a source smaller
//! than every thumbnail size ships as-is.

use crate::downloader::Downloader;
use crate::media;
use crate::render;
use asgen_model::component::{Component, Image, ImageKind, Screenshot};
use asgen_model::GeneratorResult;
use std::path::Path;

/// Thumbnail sizes, largest first.
pub const THUMBNAIL_SIZES: &[(u32, u32)] = &[(1248, 702), (752, 423), (624, 351), (224, 126)];

pub struct ScreenshotContext<'a> {
    pub downloader: &'a dyn Downloader,
    pub media_root: &'a Path,
    pub store_screenshots: bool,
    pub allow_videos: bool,
    pub no_downloads: bool,
    pub optimize_png: bool,
}

/// Process all screenshots of a component in place.
pub fn process_screenshots(
    cpt: &mut Component,
    res: &mut GeneratorResult,
    ctx: &ScreenshotContext<'_>,
    gcid: &str,
) {
    if cpt.screenshots.is_empty() {
        return;
    }
    let cid = cpt.id.clone();
    let shots = std::mem::take(&mut cpt.screenshots);
    let mut kept = Vec::new();

    for (index, mut shot) in shots.into_iter().enumerate() {
        if !ctx.allow_videos {
            shot.videos.clear();
        }

        let Some(source) = shot.source_image().cloned() else {
            if !shot.videos.is_empty() {
                kept.push(shot);
            }
            continue;
        };

        if ctx.no_downloads {
            // Without network access the original URL is recorded
            // verbatim and no dimensions are probed.
            kept.push(shot);
            continue;
        }

        match fetch_and_store(&mut shot, &source, index + 1, ctx, gcid, &cid, res) {
            Ok(()) => kept.push(shot),
            Err(()) => {}
        }
    }

    cpt.screenshots = kept;
    // Clients want exactly one default screenshot.
    if !cpt.screenshots.is_empty() && !cpt.screenshots.iter().any(|s| s.default) {
        cpt.screenshots[0].default = true;
    }
}

fn fetch_and_store(
    shot: &mut Screenshot,
    source: &Image,
    number: usize,
    ctx: &ScreenshotContext<'_>,
    gcid: &str,
    cid: &str,
    res: &mut GeneratorResult,
) -> Result<(), ()> {
    let url = source.url.clone();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        res.add_hint(
            Some(cid),
            "screenshot-download-error",
            &[("url", url.as_str()), ("msg", "unsupported URL scheme")],
        );
        return Err(());
    }

    let data = match ctx.downloader.download(&url) {
        Ok(data) => data,
        Err(msg) => {
            let tag = if msg.contains("downgrades") {
                "screenshot-download-insecure"
            } else {
                "screenshot-download-error"
            };
            res.add_hint(Some(cid), tag, &[("url", url.as_str()), ("msg", &msg)]);
            return Err(());
        }
    };

    let img = match render::decode(&data) {
        Ok(img) => img,
        Err(msg) => {
            res.add_hint(
                Some(cid),
                "screenshot-save-error",
                &[("url", url.as_str()), ("msg", &msg)],
            );
            return Err(());
        }
    };
    let (src_w, src_h) = (image_width(&img), image_height(&img));

    if !ctx.store_screenshots {
        // Keep the remote reference, just enrich it with dimensions.
        shot.images = vec![Image {
            kind: ImageKind::Source,
            url,
            width: Some(src_w),
            height: Some(src_h),
        }];
        return Ok(());
    }

    let orig_rel = media::pool_relative(gcid, &format!("screenshots/image-{}_orig.png", number));
    let orig_png = match render::encode_png(&img, ctx.optimize_png) {
        Ok(png) => png,
        Err(msg) => {
            res.add_hint(
                Some(cid),
                "screenshot-save-error",
                &[("url", url.as_str()), ("msg", &msg)],
            );
            return Err(());
        }
    };
    if let Err(e) = media::write_file(&ctx.media_root.join(&orig_rel), &orig_png) {
        res.add_hint(
            Some(cid),
            "screenshot-save-error",
            &[("url", url.as_str()), ("msg", &e.to_string())],
        );
        return Err(());
    }

    let mut images = vec![Image {
        kind: ImageKind::Source,
        url: orig_rel,
        width: Some(src_w),
        height: Some(src_h),
    }];

    let mut thumbnails = 0;
    for (w, h) in THUMBNAIL_SIZES {
        if src_w < *w {
            continue;
        }
        let Ok((png, out_w, out_h)) = render::scale_to_fit(&img, *w, *h, false, ctx.optimize_png)
        else {
            continue;
        };
        let rel = media::pool_relative(
            gcid,
            &format!("screenshots/image-{}_{}x{}.png", number, w, h),
        );
        if media::write_file(&ctx.media_root.join(&rel), &png).is_err() {
            continue;
        }
        images.push(Image {
            kind: ImageKind::Thumbnail,
            url: rel,
            width: Some(out_w),
            height: Some(out_h),
        });
        thumbnails += 1;
    }
    if thumbnails == 0 {
        res.add_hint(
            Some(cid),
            "screenshot-no-thumbnails",
            &[("url", url.as_str())],
        );
    }

    shot.images = images;
    Ok(())
}

fn image_width(img: &image::DynamicImage) -> u32 {
    use image::GenericImageView;
    img.dimensions().0
}

fn image_height(img: &image::DynamicImage) -> u32 {
    use image::GenericImageView;
    img.dimensions().1
}

#[cfg(test)]
mod test {
    use super::*;
    use asgen_model::component::ComponentKind;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubDownloader {
        responses: Mutex<HashMap<String, Result<Vec<u8>, String>>>,
    }

    impl StubDownloader {
        fn new(entries: Vec<(&str, Result<Vec<u8>, String>)>) -> StubDownloader {
            StubDownloader {
                responses: Mutex::new(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect(),
                ),
            }
        }
    }

    impl Downloader for StubDownloader {
        fn download(&self, url: &str) -> Result<Vec<u8>, String> {
            self.responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err("no stub response".to_string()))
        }
    }

    fn shot_with_source(url: &str) -> Screenshot {
        Screenshot {
            default: true,
            images: vec![Image {
                kind: ImageKind::Source,
                url: url.to_string(),
                width: None,
                height: None,
            }],
            ..Screenshot::default()
        }
    }

    fn test_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([90, 120, 30, 255]));
        render::encode_png(&image::DynamicImage::ImageRgba8(img), false).unwrap()
    }

    #[test]
    fn stores_source_and_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://example.org/shot.png";
        let downloader = StubDownloader::new(vec![(url, Ok(test_png(1300, 731)))]);
        let ctx = ScreenshotContext {
            downloader: &downloader,
            media_root: dir.path(),
            store_screenshots: true,
            allow_videos: false,
            no_downloads: false,
            optimize_png: false,
        };
        let mut cpt = Component::new("org.example.Foo", ComponentKind::DesktopApplication);
        cpt.screenshots.push(shot_with_source(url));
        let mut res = GeneratorResult::new("foo/1.0/amd64", "foo");
        process_screenshots(&mut cpt, &mut res, &ctx, "org.example.Foo/1.0/abcd");

        assert_eq!(cpt.screenshots.len(), 1);
        let images = &cpt.screenshots[0].images;
        assert!(images[0].url.ends_with("image-1_orig.png"));
        assert_eq!(images[0].width, Some(1300));
        // All four thumbnail sizes fit under a 1300px source.
        assert_eq!(images.len(), 1 + THUMBNAIL_SIZES.len());
        assert!(dir
            .path()
            .join("or/org.example.Foo/1.0/abcd/screenshots/image-1_orig.png")
            .is_file());
    }

    #[test]
    fn small_source_gets_no_thumbnails_hint() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://example.org/tiny.png";
        let downloader = StubDownloader::new(vec![(url, Ok(test_png(100, 56)))]);
        let ctx = ScreenshotContext {
            downloader: &downloader,
            media_root: dir.path(),
            store_screenshots: true,
            allow_videos: false,
            no_downloads: false,
            optimize_png: false,
        };
        let mut cpt = Component::new("org.example.Foo", ComponentKind::DesktopApplication);
        cpt.screenshots.push(shot_with_source(url));
        let mut res = GeneratorResult::new("foo/1.0/amd64", "foo");
        process_screenshots(&mut cpt, &mut res, &ctx, "org.example.Foo/1.0/abcd");

        assert_eq!(cpt.screenshots.len(), 1);
        let hints: Vec<_> = res.all_hints().map(|(_, h)| h.tag.clone()).collect();
        assert!(hints.contains(&"screenshot-no-thumbnails".to_string()));
    }

    #[test]
    fn failed_download_drops_the_shot() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://example.org/gone.png";
        let downloader = StubDownloader::new(vec![(url, Err("server returned 404".to_string()))]);
        let ctx = ScreenshotContext {
            downloader: &downloader,
            media_root: dir.path(),
            store_screenshots: true,
            allow_videos: false,
            no_downloads: false,
            optimize_png: false,
        };
        let mut cpt = Component::new("org.example.Foo", ComponentKind::DesktopApplication);
        cpt.screenshots.push(shot_with_source(url));
        let mut res = GeneratorResult::new("foo/1.0/amd64", "foo");
        process_screenshots(&mut cpt, &mut res, &ctx, "org.example.Foo/1.0/abcd");

        assert!(cpt.screenshots.is_empty());
        let hints: Vec<_> = res.all_hints().map(|(_, h)| h.tag.clone()).collect();
        assert!(hints.contains(&"screenshot-download-error".to_string()));
    }

    #[test]
    fn no_downloads_keeps_original_urls() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://example.org/shot.png";
        let downloader = StubDownloader::new(vec![]);
        let ctx = ScreenshotContext {
            downloader: &downloader,
            media_root: dir.path(),
            store_screenshots: true,
            allow_videos: false,
            no_downloads: true,
            optimize_png: false,
        };
        let mut cpt = Component::new("org.example.Foo", ComponentKind::DesktopApplication);
        cpt.screenshots.push(shot_with_source(url));
        let mut res = GeneratorResult::new("foo/1.0/amd64", "foo");
        process_screenshots(&mut cpt, &mut res, &ctx, "org.example.Foo/1.0/abcd");

        assert_eq!(cpt.screenshots[0].images[0].url, url);
        assert!(!res.has_hints());
    }
}
