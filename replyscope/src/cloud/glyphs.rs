//! Text measurement and drawing
//!
//! Glyph sources, in order of preference:
//! 1. the configured outline font (TTF/OTF/TTC), rendered with `ab_glyph`
//! 2. an installed CJK-capable system font, found with `fontdb`
//! 3. a built-in 8x8 bitmap font scaled to the requested size
//!
//! The bitmap font covers Latin, Greek and Hiragana only. Callers check
//! [`GlyphRenderer::covers`] before drawing; nothing is ever drawn as a
//! placeholder box.

use super::RenderError;
use ab_glyph::{Font, FontVec, PxScale};
use font8x8::{UnicodeFonts, BASIC_FONTS, GREEK_FONTS, HIRAGANA_FONTS, LATIN_FONTS};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

/// System font families able to draw Chinese text, most preferred first
const CJK_FAMILIES: &[&str] = &[
    "Microsoft YaHei",
    "PingFang SC",
    "Noto Sans CJK SC",
    "Noto Sans SC",
    "Source Han Sans SC",
    "Source Han Sans CN",
    "WenQuanYi Micro Hei",
    "WenQuanYi Zen Hei",
    "Hiragino Sans GB",
    "SimHei",
    "Noto Sans CJK JP",
];

/// Measures and draws a single line of text
pub trait GlyphRenderer: Send + Sync {
    /// Bounding box `(width, height)` of `text` at `size` pixels
    fn measure(&self, text: &str, size: u32) -> (u32, u32);

    /// Draw `text` with its top-left corner at `(x, y)`
    fn draw(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, size: u32, color: Rgb<u8>);

    /// Whether every visible character of `text` has a glyph
    fn covers(&self, text: &str) -> bool;

    /// Short description for logs and errors
    fn describe(&self) -> String;
}

/// Outline font loaded from disk
pub struct FontGlyphs {
    font: FontVec,
    path: PathBuf,
}

impl FontGlyphs {
    /// Load a font file; collections (`.ttc`) use their first face
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        Self::load_face(path, 0)
    }

    /// Load face `index` of a font file or collection
    pub fn load_face(path: &Path, index: u32) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|e| RenderError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let font = FontVec::try_from_vec_and_index(data, index).map_err(|e| RenderError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::info!(font = %path.display(), face = index, "Loaded word cloud font");
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }
}

impl GlyphRenderer for FontGlyphs {
    fn measure(&self, text: &str, size: u32) -> (u32, u32) {
        let (width, height) = text_size(PxScale::from(size as f32), &self.font, text);
        (width.max(1), height.max(size / 2).max(1))
    }

    fn draw(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, size: u32, color: Rgb<u8>) {
        draw_text_mut(canvas, color, x, y, PxScale::from(size as f32), &self.font, text);
    }

    fn covers(&self, text: &str) -> bool {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .all(|c| self.font.glyph_id(c).0 != 0)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Built-in 8x8 bitmap font
#[derive(Debug, Default, Clone, Copy)]
pub struct BitmapGlyphs;

impl BitmapGlyphs {
    const CELL: u32 = 8;

    fn scale(size: u32) -> u32 {
        (size / Self::CELL).max(1)
    }

    fn glyph(c: char) -> Option<[u8; 8]> {
        BASIC_FONTS
            .get(c)
            .or_else(|| LATIN_FONTS.get(c))
            .or_else(|| GREEK_FONTS.get(c))
            .or_else(|| HIRAGANA_FONTS.get(c))
    }
}

impl GlyphRenderer for BitmapGlyphs {
    fn measure(&self, text: &str, size: u32) -> (u32, u32) {
        let advance = Self::CELL * Self::scale(size);
        let chars = text.chars().count().max(1) as u32;
        (chars * advance, advance)
    }

    fn draw(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, size: u32, color: Rgb<u8>) {
        let scale = Self::scale(size);
        let advance = (Self::CELL * scale) as i32;

        for (index, c) in text.chars().enumerate() {
            let origin_x = x + index as i32 * advance;
            // Uncovered characters are rejected before layout
            let Some(rows) = Self::glyph(c) else {
                continue;
            };
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..Self::CELL {
                    if bits & (1 << col) == 0 {
                        continue;
                    }
                    let px = origin_x + (col * scale) as i32;
                    let py = y + (row as u32 * scale) as i32;
                    draw_filled_rect_mut(canvas, Rect::at(px, py).of_size(scale, scale), color);
                }
            }
        }
    }

    fn covers(&self, text: &str) -> bool {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .all(|c| Self::glyph(c).is_some())
    }

    fn describe(&self) -> String {
        "built-in 8x8 bitmap font".to_string()
    }
}

/// Path and face index of the most preferred installed CJK font
pub fn find_system_cjk_font() -> Option<(PathBuf, u32)> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    CJK_FAMILIES.iter().find_map(|wanted| {
        db.faces()
            .filter(|face| {
                face.families
                    .iter()
                    .any(|(family, _)| family.eq_ignore_ascii_case(wanted))
            })
            .find_map(|face| match &face.source {
                fontdb::Source::File(path) => Some((path.clone(), face.index)),
                _ => None,
            })
    })
}

/// Glyph source for a cloud
///
/// A configured font that fails to load is an error. Without one, an
/// installed CJK font is preferred over the bitmap font.
pub fn glyphs_for(font_path: Option<&Path>) -> Result<Box<dyn GlyphRenderer>, RenderError> {
    if let Some(path) = font_path {
        return Ok(Box::new(FontGlyphs::load(path)?));
    }

    if let Some((path, index)) = find_system_cjk_font() {
        match FontGlyphs::load_face(&path, index) {
            Ok(glyphs) => return Ok(Box::new(glyphs)),
            Err(e) => tracing::warn!(error = %e, "Skipping unusable system font"),
        }
    }

    tracing::info!("No CJK font found, using the built-in bitmap font");
    Ok(Box::new(BitmapGlyphs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_measure_scales_with_size() {
        let glyphs = BitmapGlyphs;
        assert_eq!(glyphs.measure("abc", 8), (24, 8));
        assert_eq!(glyphs.measure("abc", 32), (96, 32));
        // Below one cell still draws at scale 1
        assert_eq!(glyphs.measure("ab", 3), (16, 8));
        // Non-Latin characters take one cell each
        assert_eq!(glyphs.measure("好看", 16), (32, 16));
    }

    #[test]
    fn test_bitmap_measure_non_decreasing() {
        let glyphs = BitmapGlyphs;
        let mut previous = (0, 0);
        for size in 1..200 {
            let current = glyphs.measure("word", size);
            assert!(current.0 >= previous.0 && current.1 >= previous.1);
            previous = current;
        }
    }

    #[test]
    fn test_bitmap_draw_stays_inside_measured_box() {
        let mut canvas = RgbImage::from_pixel(64, 32, Rgb([255, 255, 255]));
        let glyphs = BitmapGlyphs;
        let (w, h) = glyphs.measure("Hi", 16);

        glyphs.draw(&mut canvas, "Hi", 4, 4, 16, Rgb([0, 0, 0]));

        let mut inked = 0;
        for (x, y, pixel) in canvas.enumerate_pixels() {
            if pixel.0 != [255, 255, 255] {
                inked += 1;
                assert!(x >= 4 && x < 4 + w, "x={x} outside box");
                assert!(y >= 4 && y < 4 + h, "y={y} outside box");
            }
        }
        assert!(inked > 0);
    }

    #[test]
    fn test_bitmap_coverage() {
        assert!(BitmapGlyphs.covers("hello World"));
        assert!(BitmapGlyphs.covers("café αβγ ひらがな"));
        assert!(!BitmapGlyphs.covers("好看"));
        assert!(!BitmapGlyphs.covers("rust 难看"));
    }

    #[test]
    fn test_uncovered_characters_leave_no_marks() {
        let mut canvas = RgbImage::from_pixel(64, 32, Rgb([255, 255, 255]));
        BitmapGlyphs.draw(&mut canvas, "好看", 0, 0, 16, Rgb([0, 0, 0]));
        assert!(canvas.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_drawing_off_canvas_is_clipped() {
        let mut canvas = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        BitmapGlyphs.draw(&mut canvas, "clip", -20, -20, 64, Rgb([0, 0, 0]));
        BitmapGlyphs.draw(&mut canvas, "clip", 6, 6, 64, Rgb([0, 0, 0]));
    }

    #[test]
    fn test_missing_font_file_is_font_error() {
        let result = glyphs_for(Some(Path::new("/nonexistent/replyscope-font.ttf")));
        assert!(matches!(result, Err(RenderError::Font { .. })));
    }

    #[test]
    fn test_default_source_without_cjk_font_is_bitmap() {
        let glyphs = glyphs_for(None).unwrap();
        if find_system_cjk_font().is_none() {
            assert_eq!(glyphs.describe(), BitmapGlyphs.describe());
        } else {
            // A discovered system font must draw Chinese
            assert!(glyphs.covers("好看"));
        }
    }
}
