use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// COCO class index of "person".
pub const PERSON_CLASS: i32 = 0;

/// Detector candidate in frame pixel coordinates
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c", default)]
    pub class: i32,
}

impl Detection {
    #[inline]
    pub fn new(bbox: BBox<Ltrb>, confidence: f32, class: i32) -> Self {
        Self {
            bbox,
            confidence,
            class,
        }
    }

    #[inline]
    pub fn person(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self::new(BBox::ltrb(x1, y1, x2, y2), confidence, PERSON_CLASS)
    }

    #[inline(always)]
    pub fn is_person(&self) -> bool {
        self.class == PERSON_CLASS
    }

    #[inline]
    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox.iou(&other.bbox)
    }
}
