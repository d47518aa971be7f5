//! Deterministic term placement
//!
//! Boxes are tried along an elliptical Archimedean spiral starting at the
//! canvas centre. A coarse occupancy grid (cells of a few pixels) rejects
//! overlaps; a box counts as free when none of the cells it touches is taken.

use std::f64::consts::PI;

/// Axis-aligned box on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Occupancy-tracking placer for one canvas
pub struct SpiralLayout {
    width: u32,
    height: u32,
    cell: u32,
    cols: u32,
    rows: u32,
    taken: Vec<bool>,
}

impl SpiralLayout {
    pub fn new(width: u32, height: u32) -> Self {
        let cell = (width.min(height) / 500).max(2);
        let cols = width.div_ceil(cell);
        let rows = height.div_ceil(cell);
        Self {
            width,
            height,
            cell,
            cols,
            rows,
            taken: vec![false; (cols * rows) as usize],
        }
    }

    fn cell_span(&self, slot: &Slot) -> (u32, u32, u32, u32) {
        let x0 = slot.x as u32 / self.cell;
        let y0 = slot.y as u32 / self.cell;
        let x1 = ((slot.x as u32 + slot.width - 1) / self.cell).min(self.cols - 1);
        let y1 = ((slot.y as u32 + slot.height - 1) / self.cell).min(self.rows - 1);
        (x0, y0, x1, y1)
    }

    fn inside(&self, slot: &Slot) -> bool {
        slot.x >= 0
            && slot.y >= 0
            && slot.width > 0
            && slot.height > 0
            && slot.x as u64 + slot.width as u64 <= self.width as u64
            && slot.y as u64 + slot.height as u64 <= self.height as u64
    }

    /// Whether `slot` lies on the canvas and overlaps nothing placed so far
    pub fn is_free(&self, slot: &Slot) -> bool {
        if !self.inside(slot) {
            return false;
        }
        let (x0, y0, x1, y1) = self.cell_span(slot);
        for row in y0..=y1 {
            let base = (row * self.cols) as usize;
            if self.taken[base + x0 as usize..=base + x1 as usize]
                .iter()
                .any(|&t| t)
            {
                return false;
            }
        }
        true
    }

    /// Mark `slot` as taken (clipped to the canvas)
    pub fn occupy(&mut self, slot: &Slot) {
        let clipped = Slot {
            x: slot.x.max(0),
            y: slot.y.max(0),
            width: slot
                .width
                .min(self.width.saturating_sub(slot.x.max(0) as u32)),
            height: slot
                .height
                .min(self.height.saturating_sub(slot.y.max(0) as u32)),
        };
        if clipped.width == 0 || clipped.height == 0 {
            return;
        }
        let (x0, y0, x1, y1) = self.cell_span(&clipped);
        for row in y0..=y1 {
            let base = (row * self.cols) as usize;
            for flag in &mut self.taken[base + x0 as usize..=base + x1 as usize] {
                *flag = true;
            }
        }
    }

    /// First free position along the spiral for a `width` x `height` box
    pub fn find_on_spiral(&self, width: u32, height: u32) -> Option<Slot> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }

        let cx = self.width as f64 / 2.0;
        let cy = self.height as f64 / 2.0;
        let aspect = self.width as f64 / self.height as f64;
        let step = self.cell as f64;
        let ring_gap = step * 2.0;
        // In aspect-scaled space the farthest corner sits at height/sqrt(2)
        let limit = self.height as f64 * 0.75;

        let mut theta = 0.0_f64;
        loop {
            let radius = ring_gap * theta / (2.0 * PI);
            if radius > limit {
                return None;
            }

            let slot = Slot {
                x: (cx + radius * theta.cos() * aspect - width as f64 / 2.0).round() as i32,
                y: (cy + radius * theta.sin() - height as f64 / 2.0).round() as i32,
                width,
                height,
            };
            if self.is_free(&slot) {
                return Some(slot);
            }

            theta += step / radius.max(step);
        }
    }

    /// Exhaustive row-major scan, used when the spiral finds nothing
    pub fn find_by_scan(&self, width: u32, height: u32) -> Option<Slot> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }
        let mut y = 0;
        while y + height <= self.height {
            let mut x = 0;
            while x + width <= self.width {
                let slot = Slot {
                    x: x as i32,
                    y: y as i32,
                    width,
                    height,
                };
                if self.is_free(&slot) {
                    return Some(slot);
                }
                x += self.cell;
            }
            y += self.cell;
        }
        None
    }

    /// Centred slot regardless of occupancy
    pub fn centre(&self, width: u32, height: u32) -> Slot {
        Slot {
            x: (self.width.saturating_sub(width) / 2) as i32,
            y: (self.height.saturating_sub(height) / 2) as i32,
            width,
            height,
        }
    }
}
