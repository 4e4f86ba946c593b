//! PPTX (PowerPoint) template editing.
//!
//! This module opens an Office Open XML presentation, locates `{{Token}}`
//! placeholders in text shapes, rewrites text frames and adds table slides.

mod presentation;
mod starter;
pub mod table;
pub mod text;

pub use presentation::{Presentation, ShapeRef};
pub use starter::starter_template;

/// English Metric Units per point.
pub const EMU_PER_PT: i64 = 12700;

/// English Metric Units per inch.
pub const EMU_PER_INCH: i64 = 914400;

/// 16:9 slide width used when `p:sldSz` is absent.
pub const DEFAULT_SLIDE_WIDTH: i64 = 12192000;

/// 16:9 slide height used when `p:sldSz` is absent.
pub const DEFAULT_SLIDE_HEIGHT: i64 = 6858000;

/// Position and size of a shape in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bbox {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl Bbox {
    /// Width in points.
    pub fn width_pt(&self) -> f64 {
        self.width as f64 / EMU_PER_PT as f64
    }

    /// Height in points.
    pub fn height_pt(&self) -> f64 {
        self.height as f64 / EMU_PER_PT as f64
    }
}
