use rayon::prelude::*;

use crate::frame::Frame;

/// Face presence by skin-colored pixel ratio.
///
/// Crude, but needs no model: a frame "has a face" when more than
/// `ratio_threshold` of its pixels pass the RGB skin rule.
#[derive(Debug, Clone, Copy)]
pub struct SkinToneHeuristic {
    ratio_threshold: f32,
}

impl SkinToneHeuristic {
    pub const DEFAULT_RATIO_THRESHOLD: f32 = 0.08;

    pub fn new(ratio_threshold: f32) -> Self {
        Self { ratio_threshold }
    }

    pub fn ratio_threshold(&self) -> f32 {
        self.ratio_threshold
    }

    /// Fraction of pixels classified as skin, in [0, 1]. Empty frames give 0.
    pub fn skin_ratio(&self, frame: &Frame) -> f32 {
        let total = frame.pixel_count();
        if total == 0 {
            return 0.0;
        }

        let skin = frame
            .as_raw()
            .par_chunks_exact(3)
            .filter(|rgb| is_skin(rgb[0], rgb[1], rgb[2]))
            .count();

        skin as f32 / total as f32
    }

    pub fn is_face_present(&self, frame: &Frame) -> bool {
        self.skin_ratio(frame) > self.ratio_threshold
    }
}

impl Default for SkinToneHeuristic {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATIO_THRESHOLD)
    }
}

/// Fixed RGB skin rule: minimum channel levels, enough spread, red dominant.
pub fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    r > 95
        && g > 40
        && b > 20
        && max - min > 15
        && r.abs_diff(g) > 15
        && r > g
        && r > b
}
