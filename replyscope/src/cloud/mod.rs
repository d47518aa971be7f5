//! Word cloud rendering
//!
//! Builds a fixed-size PNG from a normalized corpus. Guarantees:
//! - every term with a positive weight is drawn at least once
//! - a term never appears smaller than a term with a lower weight
//! - an empty corpus is an error, not a blank image
//! - a term the glyph source cannot draw is an error, not a placeholder
//!
//! A term wider than the canvas even at the minimum font size is still
//! drawn, anchored at the left edge and clipped on the right.
//!
//! Placement is deterministic for a given corpus, configuration and glyph
//! source.

pub mod glyphs;
pub mod layout;
pub mod terms;

use glyphs::{glyphs_for, GlyphRenderer};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageError, Rgb, RgbImage};
use layout::{Slot, SpiralLayout};
use replyscope_common::config::{CloudConfig, PngCompression};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use terms::{font_size_for, weigh_terms};
use thiserror::Error;

pub use terms::TermWeight;

/// Term colours, cycled by rank
const PALETTE: [[u8; 3]; 8] = [
    [0x1F, 0x4E, 0x79],
    [0x46, 0x82, 0xB4],
    [0xC0, 0x39, 0x2B],
    [0x27, 0xAE, 0x60],
    [0x8E, 0x44, 0xAD],
    [0xD3, 0x54, 0x00],
    [0x16, 0xA0, 0x85],
    [0x2C, 0x3E, 0x50],
];

/// Word cloud errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tokenization left nothing to draw
    #[error("Corpus contains no terms")]
    EmptyCorpus,

    #[error("Failed to write {}: {source}", .path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot use font {}: {reason}", .path.display())]
    Font { path: PathBuf, reason: String },

    /// The glyph source has no glyphs for some characters of a term
    #[error("{font} cannot draw '{term}'; set cloud.font_path to a font covering it")]
    MissingGlyphs { term: String, font: String },

    #[error("Invalid canvas {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("Invalid background colour: {0}")]
    InvalidColor(String),
}

/// A term as drawn on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedTerm {
    pub term: String,
    pub count: usize,
    pub weight: f32,
    pub font_size: u32,
    pub slot: Slot,
    /// Drawn on top of other terms because no free spot was left
    pub overlapping: bool,
}

/// Placement of all weighted terms, before rasterization
#[derive(Debug, Clone)]
pub struct CloudLayout {
    pub width: u32,
    pub height: u32,
    pub terms: Vec<PlacedTerm>,
}

/// Written image
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub terms: Vec<PlacedTerm>,
}

/// Word cloud renderer
pub struct WordCloud {
    config: CloudConfig,
    background: Rgb<u8>,
    glyphs: Box<dyn GlyphRenderer>,
}

impl WordCloud {
    pub fn new(config: CloudConfig) -> Result<Self, RenderError> {
        let glyphs = glyphs_for(config.font_path.as_deref())?;
        Self::with_glyphs(config, glyphs)
    }

    /// Renderer with an explicit glyph source
    pub fn with_glyphs(
        config: CloudConfig,
        glyphs: Box<dyn GlyphRenderer>,
    ) -> Result<Self, RenderError> {
        if config.width == 0 || config.height == 0 {
            return Err(RenderError::InvalidCanvas {
                width: config.width,
                height: config.height,
            });
        }
        let background = config
            .background_rgb()
            .map_err(|e| RenderError::InvalidColor(e.to_string()))?;

        Ok(Self {
            config,
            background: Rgb(background),
            glyphs,
        })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Weigh the corpus and place every positively weighted term
    pub fn layout(&self, corpus: &str) -> Result<CloudLayout, RenderError> {
        let weighted: Vec<TermWeight> = weigh_terms(corpus, self.config.max_words)
            .into_iter()
            .filter(|t| t.weight > 0.0)
            .collect();
        if weighted.is_empty() {
            return Err(RenderError::EmptyCorpus);
        }
        if let Some(uncovered) = weighted.iter().find(|t| !self.glyphs.covers(&t.term)) {
            return Err(RenderError::MissingGlyphs {
                term: uncovered.term.clone(),
                font: self.glyphs.describe(),
            });
        }

        let min_size = self.config.min_font_size.max(1);
        let max_size = self.config.effective_max_font_size();
        let mut layout = SpiralLayout::new(self.config.width, self.config.height);
        // Sizes only ever shrink along the ranking
        let mut size_cap = max_size;
        let mut placed = Vec::with_capacity(weighted.len());

        for term in weighted {
            let mut size = font_size_for(term.weight, min_size, max_size, self.config.relative_scaling)
                .min(size_cap);

            let (slot, overlapping) = loop {
                let (width, height) = self.glyphs.measure(&term.term, size);
                if let Some(slot) = layout.find_on_spiral(width, height) {
                    break (slot, false);
                }
                if size > min_size {
                    size = ((size as f32 * 0.85) as u32).clamp(min_size, size - 1);
                    continue;
                }
                if let Some(slot) = layout.find_by_scan(width, height) {
                    break (slot, false);
                }
                tracing::warn!(
                    term = %term.term,
                    font_size = size,
                    "No free space left, drawing term over others"
                );
                break (layout.centre(width, height), true);
            };

            layout.occupy(&slot);
            size_cap = size;
            placed.push(PlacedTerm {
                term: term.term,
                count: term.count,
                weight: term.weight,
                font_size: size,
                slot,
                overlapping,
            });
        }

        Ok(CloudLayout {
            width: self.config.width,
            height: self.config.height,
            terms: placed,
        })
    }

    /// Rasterize a layout
    pub fn draw(&self, layout: &CloudLayout) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(layout.width, layout.height, self.background);
        for (rank, term) in layout.terms.iter().enumerate() {
            let color = Rgb(PALETTE[rank % PALETTE.len()]);
            self.glyphs.draw(
                &mut canvas,
                &term.term,
                term.slot.x,
                term.slot.y,
                term.font_size,
                color,
            );
        }
        canvas
    }

    /// Lay out, draw and write the cloud for `corpus` to `output_path`
    ///
    /// Nothing is written when the corpus has no terms.
    pub fn render(&self, corpus: &str, output_path: &Path) -> Result<RenderedImage, RenderError> {
        let layout = self.layout(corpus)?;
        let canvas = self.draw(&layout);
        write_png(&canvas, output_path, self.config.compression)?;

        tracing::info!(
            path = %output_path.display(),
            terms = layout.terms.len(),
            width = layout.width,
            height = layout.height,
            "Word cloud written"
        );

        Ok(RenderedImage {
            path: output_path.to_path_buf(),
            width: layout.width,
            height: layout.height,
            terms: layout.terms,
        })
    }
}

fn io_failure(path: &Path, source: std::io::Error) -> RenderError {
    RenderError::IoFailure {
        path: path.to_path_buf(),
        source,
    }
}

/// Encode `canvas` as PNG into `path` via a sibling temp file
///
/// The temp file is removed again when anything fails.
fn write_png(canvas: &RgbImage, path: &Path, compression: PngCompression) -> Result<(), RenderError> {
    let tmp_path = path.with_extension("png.tmp");
    let result = encode_png(canvas, path, &tmp_path, compression)
        .and_then(|()| std::fs::rename(&tmp_path, path).map_err(|e| io_failure(path, e)));
    if result.is_err() && tmp_path.exists() {
        if let Err(e) = std::fs::remove_file(&tmp_path) {
            tracing::warn!(path = %tmp_path.display(), error = %e, "Failed to remove temp image");
        }
    }
    result
}

fn encode_png(
    canvas: &RgbImage,
    path: &Path,
    tmp_path: &Path,
    compression: PngCompression,
) -> Result<(), RenderError> {
    let compression = match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    };

    let file = File::create(tmp_path).map_err(|e| io_failure(path, e))?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new_with_quality(&mut writer, compression, FilterType::Adaptive)
        .write_image(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| match e {
            ImageError::IoError(source) => io_failure(path, source),
            other => io_failure(path, std::io::Error::other(other)),
        })?;
    writer.flush().map_err(|e| io_failure(path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| io_failure(path, e.into_error()))?;
    file.sync_all().map_err(|e| io_failure(path, e))
}
