use nalgebra as na;

use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;
use crate::stabilizer::Stability;

pub type TrackId = u32;

#[derive(Debug, Clone)]
pub struct Track {
    pub track_id: TrackId,
    pub class: i32,
    /// Confidence of the last matched detection.
    pub confidence: f32,
    /// Last observed (unsmoothed) box.
    pub bbox: BBox<Ltrb>,
    pub first_seen: u64,
    pub last_seen: u64,
    pub hits: u32,

    // px per frame
    pub velocity: na::Vector2<f32>,

    pub stability: Stability,
}

impl Track {
    pub(crate) fn new(track_id: TrackId, frame_index: u64, det: &Detection) -> Self {
        Self {
            track_id,
            class: det.class,
            confidence: det.confidence,
            bbox: det.bbox,
            first_seen: frame_index,
            last_seen: frame_index,
            hits: 1,
            velocity: na::Vector2::zeros(),
            stability: Stability::default(),
        }
    }

    #[inline]
    pub fn frames_since_seen(&self, frame_index: u64) -> u64 {
        frame_index.saturating_sub(self.last_seen)
    }

    #[inline]
    pub fn is_matched_at(&self, frame_index: u64) -> bool {
        self.last_seen == frame_index
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.stability.confirmed
    }

    /// Last box shifted by the constant-velocity estimate.
    pub fn predicted(&self, frame_index: u64) -> BBox<Ltrb> {
        let dt = self.frames_since_seen(frame_index) as f32;
        let shift = self.velocity * dt;

        self.bbox.translate(shift.x, shift.y)
    }

    pub(crate) fn apply_match(&mut self, frame_index: u64, det: &Detection, velocity_alpha: f32) {
        let dt = self.frames_since_seen(frame_index).max(1) as f32;
        let displacement = (det.bbox.center() - self.bbox.center()) / dt;

        self.velocity = if self.hits > 1 {
            self.velocity * (1.0 - velocity_alpha) + displacement * velocity_alpha
        } else {
            displacement
        };

        self.bbox = det.bbox;
        self.confidence = det.confidence;
        self.class = det.class;
        self.last_seen = frame_index;
        self.hits += 1;
    }
}
