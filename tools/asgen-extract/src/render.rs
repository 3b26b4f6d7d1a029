//! Image decoding and rasterization.
//!
//! Raster formats go through the `image` crate, vector icons through
//! resvg. Everything comes back out as PNG bytes; scaling preserves the
//! aspect ratio and only ever shrinks unless the caller explicitly allows
//! an upscale.

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// Source flavors the icon pipeline can encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconSourceKind {
    Png,
    Svg,
    Svgz,
    Xpm,
}

impl IconSourceKind {
    pub fn from_extension(ext: &str) -> Option<IconSourceKind> {
        match ext {
            "png" => Some(IconSourceKind::Png),
            "svg" => Some(IconSourceKind::Svg),
            "svgz" => Some(IconSourceKind::Svgz),
            "xpm" => Some(IconSourceKind::Xpm),
            _ => None,
        }
    }

    /// Whether the format may be published. XPM is only accepted for
    /// resolution and never emitted.
    pub fn publishable(self) -> bool {
        self != IconSourceKind::Xpm
    }
}

/// Decode raster data and report its dimensions.
pub fn probe_dimensions(data: &[u8]) -> Result<(u32, u32), String> {
    let img = image::load_from_memory(data).map_err(|e| format!("undecodable image: {}", e))?;
    Ok(img.dimensions())
}

/// Decode any supported raster image.
pub fn decode(data: &[u8]) -> Result<DynamicImage, String> {
    image::load_from_memory(data).map_err(|e| format!("undecodable image: {}", e))
}

/// Encode to PNG. `optimize` trades encoding time for smaller files.
pub fn encode_png(img: &DynamicImage, optimize: bool) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    if optimize {
        let encoder = PngEncoder::new_with_quality(
            Cursor::new(&mut buf),
            CompressionType::Best,
            PngFilterType::Adaptive,
        );
        img.write_with_encoder(encoder)
            .map_err(|e| format!("PNG encoding failed: {}", e))?;
    } else {
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| format!("PNG encoding failed: {}", e))?;
    }
    Ok(buf)
}

/// Scale a decoded image to fit into `width`×`height`, downscale-only
/// unless `allow_upscale` is set. Returns PNG bytes and the resulting
/// dimensions.
pub fn scale_to_fit(
    img: &DynamicImage,
    width: u32,
    height: u32,
    allow_upscale: bool,
    optimize: bool,
) -> Result<(Vec<u8>, u32, u32), String> {
    let (src_w, src_h) = img.dimensions();
    let scaled = if src_w <= width && src_h <= height && !allow_upscale {
        img.clone()
    } else {
        img.resize(width, height, FilterType::Lanczos3)
    };
    let (out_w, out_h) = scaled.dimensions();
    let png = encode_png(&scaled, optimize)?;
    Ok((png, out_w, out_h))
}

/// Render an icon source to an exact square size. Vector sources render
/// at the target size directly; raster sources are resized.
pub fn render_icon_png(
    data: &[u8],
    kind: IconSourceKind,
    px: u32,
    allow_upscale: bool,
    optimize: bool,
) -> Result<Vec<u8>, String> {
    match kind {
        IconSourceKind::Png => {
            let img = decode(data)?;
            let (w, h) = img.dimensions();
            if (w < px || h < px) && !allow_upscale {
                return Err(format!(
                    "source is {}x{}, smaller than the requested {}x{}",
                    w, h, px, px
                ));
            }
            let resized = if (w, h) == (px, px) {
                img
            } else {
                img.resize_exact(px, px, FilterType::Lanczos3)
            };
            encode_png(&resized, optimize)
        }
        IconSourceKind::Svg => render_svg_png(data, px, optimize),
        IconSourceKind::Svgz => {
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut raw = Vec::new();
            std::io::Read::read_to_end(&mut decoder, &mut raw)
                .map_err(|e| format!("undecodable svgz: {}", e))?;
            render_svg_png(&raw, px, optimize)
        }
        IconSourceKind::Xpm => Err("XPM icons can not be rendered".to_string()),
    }
}

fn render_svg_png(data: &[u8], px: u32, optimize: bool) -> Result<Vec<u8>, String> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(data, &options)
        .map_err(|e| format!("unparsable SVG: {}", e))?;
    let size = tree.size();
    let mut pixmap = tiny_skia::Pixmap::new(px, px).ok_or("invalid pixmap size")?;
    let scale_x = px as f32 / size.width();
    let scale_y = px as f32 / size.height();
    let transform = tiny_skia::Transform::from_scale(scale_x, scale_y);
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    let png = pixmap
        .encode_png()
        .map_err(|e| format!("PNG encoding failed: {}", e))?;
    if optimize {
        // Re-encode through the optimizing encoder for consistent output.
        let img = decode(&png)?;
        encode_png(&img, true)
    } else {
        Ok(png)
    }
}
