//! Plausibility checks run on raw detector output before tracking.

use crate::bbox::{BBox, Ltrb};
use crate::config::FilterConfig;
use crate::detection::Detection;
use crate::detector::non_maximum_suppression;

#[derive(Debug, Clone)]
pub struct GeometricFilter {
    config: FilterConfig,
    /// Weakest detection still handed to the tracker.
    min_confidence: f32,
}

impl GeometricFilter {
    pub fn new(config: FilterConfig, min_confidence: f32) -> Self {
        Self {
            config,
            min_confidence,
        }
    }

    /// True when the box could be a standing human figure.
    pub fn accepts(&self, bbox: &BBox<Ltrb>) -> bool {
        passes_geometry(&self.config, bbox)
    }

    /// Keeps plausible person candidates and drops duplicates of stronger ones.
    pub fn apply(&self, detections: &[Detection]) -> Vec<Detection> {
        let kept: Vec<Detection> = detections
            .iter()
            .filter(|d| d.is_person())
            .filter(|d| d.confidence >= self.min_confidence)
            .filter(|d| d.bbox.is_finite() && self.accepts(&d.bbox))
            .copied()
            .collect();

        non_maximum_suppression(kept, self.config.nms_iou)
    }
}

pub fn passes_geometry(config: &FilterConfig, bbox: &BBox<Ltrb>) -> bool {
    let (w, h) = (bbox.width(), bbox.height());

    if w < config.min_box_w || h < config.min_box_h {
        return false;
    }

    if w * h < config.min_area {
        return false;
    }

    let hw_ratio = h / w.max(1.0);

    (config.min_hw_ratio..=config.max_hw_ratio).contains(&hw_ratio)
}
