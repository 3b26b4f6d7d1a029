//! Font analysis and sample rendering.
//!
//! The service is deliberately serialized: the underlying font machinery
//! mirrors a binding that is not reentrant, so workers funnel their font
//! work through one mutex instead of calling concurrently. Face metadata
//! comes from fontdb, glyph rasterization from rusttype.

use crate::render;
use image::{DynamicImage, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use std::sync::Mutex;

/// Language-tagged pangrams for coverage probing and sample rendering.
/// English is preferred for the rendered sample when covered.
const PANGRAMS: &[(&str, &str)] = &[
    ("en", "The quick brown fox jumps over the lazy dog"),
    ("de", "Zwölf Boxkämpfer jagen Viktor quer über den großen Sylter Deich"),
    ("fr", "Portez ce vieux whisky au juge blond qui fume"),
    ("es", "El veloz murciélago hindú comía feliz cardillo y kiwi"),
    ("it", "Pranzo d'acqua fa volti sghembi"),
    ("pt", "Luís argüia à Júlia que brações, fé, chá, óxido, pôr, zângão eram palavras do português"),
    ("nl", "Pa's wijze lynx bezag vroom het fikse aquaduct"),
];

/// Pixel dimensions of the rendered sample screenshot.
const SAMPLE_WIDTH: u32 = 1024;
const SAMPLE_HEIGHT: u32 = 78;

/// A font opened for rendering, with the metadata the catalog needs.
pub struct LoadedFont {
    font: Font<'static>,
    pub family: String,
    pub style: String,
    pub full_name: String,
    pub languages: Vec<String>,
    pub sample_text: String,
}

/// Serialized font sub-service owned by the engine; workers enqueue font
/// work here rather than touching the binding directly.
pub struct FontService {
    lock: Mutex<()>,
}

impl Default for FontService {
    fn default() -> FontService {
        FontService::new()
    }
}

impl FontService {
    pub fn new() -> FontService {
        FontService {
            lock: Mutex::new(()),
        }
    }

    /// Open a TTF/OTF payload and derive names, style, and language
    /// coverage.
    pub fn analyze(&self, data: &[u8]) -> Result<LoadedFont, String> {
        let _guard = self.lock.lock().expect("font service poisoned");

        let mut db = fontdb::Database::new();
        db.load_font_data(data.to_vec());
        let face = db.faces().next().ok_or("no font face in file")?;

        let family = face
            .families
            .first()
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| face.post_script_name.clone());
        let mut style = match face.style {
            fontdb::Style::Italic => "Italic".to_string(),
            fontdb::Style::Oblique => "Oblique".to_string(),
            fontdb::Style::Normal => "Regular".to_string(),
        };
        if face.weight.0 >= 700 {
            style = if style == "Regular" {
                "Bold".to_string()
            } else {
                format!("Bold {}", style)
            };
        }
        let full_name = if style == "Regular" {
            family.clone()
        } else {
            format!("{} {}", family, style)
        };

        let font =
            Font::try_from_vec(data.to_vec()).ok_or("font data is not renderable")?;

        let mut languages = Vec::new();
        for (lang, pangram) in PANGRAMS {
            if covers_text(&font, pangram) {
                languages.push((*lang).to_string());
            }
        }
        let sample_text = languages
            .iter()
            .find(|l| l.as_str() == "en")
            .or_else(|| languages.first())
            .and_then(|lang| {
                PANGRAMS
                    .iter()
                    .find(|(l, _)| l == lang)
                    .map(|(_, p)| (*p).to_string())
            })
            .unwrap_or_else(|| PANGRAMS[0].1.to_string());

        Ok(LoadedFont {
            font,
            family,
            style,
            full_name,
            languages,
            sample_text,
        })
    }

    /// Render a square icon showing "Aa".
    pub fn render_icon(
        &self,
        loaded: &LoadedFont,
        px: u32,
        optimize: bool,
    ) -> Result<Vec<u8>, String> {
        let _guard = self.lock.lock().expect("font service poisoned");
        let img = draw_text(&loaded.font, "Aa", px, px, px as f32 * 0.55);
        render::encode_png(&DynamicImage::ImageRgba8(img), optimize)
    }

    /// Render the pangram sample used as the font's screenshot. Returns
    /// PNG bytes with the image dimensions.
    pub fn render_sample(
        &self,
        loaded: &LoadedFont,
        optimize: bool,
    ) -> Result<(Vec<u8>, u32, u32), String> {
        let _guard = self.lock.lock().expect("font service poisoned");
        let img = draw_text(
            &loaded.font,
            &loaded.sample_text,
            SAMPLE_WIDTH,
            SAMPLE_HEIGHT,
            40.0,
        );
        let png = render::encode_png(&DynamicImage::ImageRgba8(img), optimize)?;
        Ok((png, SAMPLE_WIDTH, SAMPLE_HEIGHT))
    }
}

fn covers_text(font: &Font<'_>, text: &str) -> bool {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .all(|c| font.glyph(c).id().0 != 0)
}

fn draw_text(font: &Font<'_>, text: &str, width: u32, height: u32, size: f32) -> RgbaImage {
    let scale = Scale::uniform(size);
    let v_metrics = font.v_metrics(scale);

    // First pass measures, second pass draws centered.
    let measured: Vec<_> = font.layout(text, scale, point(0.0, v_metrics.ascent)).collect();
    let text_width = measured
        .iter()
        .rev()
        .find_map(|g| g.pixel_bounding_box().map(|bb| bb.max.x))
        .unwrap_or(0)
        .max(0) as f32;
    let x_offset = ((width as f32 - text_width) / 2.0).max(0.0);
    let y_offset = (height as f32 - (v_metrics.ascent - v_metrics.descent)) / 2.0;

    let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    for glyph in font.layout(
        text,
        scale,
        point(x_offset, y_offset.max(0.0) + v_metrics.ascent),
    ) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, coverage| {
                let x = gx as i32 + bb.min.x;
                let y = gy as i32 + bb.min.y;
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    let shade = (255.0 * (1.0 - coverage)) as u8;
                    img.put_pixel(x as u32, y as u32, Rgba([shade, shade, shade, 255]));
                }
            });
        }
    }
    img
}
