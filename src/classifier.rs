//! Per-box region classifiers feeding the label debouncer.
//!
//! Two heuristics ship with the crate: a field-side position guess from the
//! box geometry, and a jersey colour test in HSV with referee rejection.

use image::{imageops, Rgb, RgbImage};
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::error::Error;
use crate::preprocess::crop;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Labels each box of a frame. `None` means no opinion for that box.
///
/// The returned vector is parallel to `boxes`.
pub trait RegionClassifier: Send {
    fn classify(
        &mut self,
        image: &RgbImage,
        boxes: &[BBox<Ltrb>],
    ) -> Result<Vec<Option<Classification>>, Error>;
}

/// Rough position from where the box sits on screen.
#[derive(Debug, Clone)]
pub struct FieldSideClassifier {
    /// Max distance of the box centre from the frame centre, as a fraction of width.
    pub center_band: f32,
    /// Min height/width for the centre label.
    pub min_center_hw: f32,
}

impl Default for FieldSideClassifier {
    fn default() -> Self {
        Self {
            center_band: 0.12,
            min_center_hw: 1.4,
        }
    }
}

impl FieldSideClassifier {
    pub fn label(&self, frame_width: f32, bbox: &BBox<Ltrb>) -> Classification {
        let cx = bbox.center().x;
        let mid = frame_width / 2.0;
        let hw = bbox.height() / bbox.width().max(1.0);

        if (cx - mid).abs() < self.center_band * frame_width && hw > self.min_center_hw {
            Classification::new("QB", 0.75)
        } else if cx < mid {
            Classification::new("WR-L", 0.60)
        } else {
            Classification::new("WR-R", 0.60)
        }
    }
}

impl RegionClassifier for FieldSideClassifier {
    fn classify(
        &mut self,
        image: &RgbImage,
        boxes: &[BBox<Ltrb>],
    ) -> Result<Vec<Option<Classification>>, Error> {
        let width = image.width() as f32;

        Ok(boxes
            .iter()
            .map(|b| b.is_finite().then(|| self.label(width, b)))
            .collect())
    }
}

/// Inclusive HSV box, OpenCV scale: H in `0..=180`, S and V in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub name: String,
    /// A pixel matches if it falls in any of these.
    pub ranges: Vec<HsvRange>,
    /// Share of torso pixels needed, exclusive.
    pub min_ratio: f32,
}

impl TeamProfile {
    /// Midnight green.
    pub fn eagles() -> Self {
        Self {
            name: "Eagles".to_string(),
            ranges: vec![
                HsvRange::new([35, 40, 20], [75, 255, 150]),
                HsvRange::new([30, 30, 30], [80, 255, 180]),
            ],
            min_ratio: 0.15,
        }
    }

    /// White and silver.
    pub fn cowboys() -> Self {
        Self {
            name: "Cowboys".to_string(),
            ranges: vec![
                HsvRange::new([0, 0, 160], [180, 30, 255]),
                HsvRange::new([0, 0, 120], [180, 40, 220]),
            ],
            min_ratio: 0.20,
        }
    }

    fn matches(&self, hsv: [u8; 3]) -> bool {
        self.ranges.iter().any(|r| r.contains(hsv))
    }
}

/// Jersey colour classifier. Profiles are tried in order; referees get no label.
#[derive(Debug, Clone)]
pub struct TeamColorClassifier {
    profiles: Vec<TeamProfile>,
    stripe_step: f32,
    stripe_ratio: f32,
}

impl Default for TeamColorClassifier {
    fn default() -> Self {
        Self::new(vec![TeamProfile::eagles(), TeamProfile::cowboys()])
    }
}

impl TeamColorClassifier {
    pub fn new(profiles: Vec<TeamProfile>) -> Self {
        Self {
            profiles,
            stripe_step: 30.0,
            stripe_ratio: 0.3,
        }
    }

    pub fn classify_region(&self, region: &RgbImage) -> Option<Classification> {
        if self.is_referee(region) {
            log::debug!("striped shirt, skipping team colour");
            return None;
        }

        let h = region.height();
        let (y0, y1) = ((h as f32 * 0.2) as u32, (h as f32 * 0.7) as u32);
        if y1 <= y0 || region.width() == 0 {
            return None;
        }

        let mut counts = vec![0u32; self.profiles.len()];
        let mut total = 0u32;
        for y in y0..y1 {
            for x in 0..region.width() {
                let hsv = rgb_to_hsv(*region.get_pixel(x, y));
                total += 1;
                for (count, profile) in counts.iter_mut().zip(&self.profiles) {
                    if profile.matches(hsv) {
                        *count += 1;
                    }
                }
            }
        }

        self.profiles
            .iter()
            .zip(counts)
            .map(|(p, count)| (p, count as f32 / total.max(1) as f32))
            .find(|(p, ratio)| *ratio > p.min_ratio)
            .map(|(p, ratio)| Classification::new(p.name.clone(), ratio.min(1.0)))
    }

    /// Horizontal stripes show up as many large jumps in the row-mean brightness.
    pub fn is_referee(&self, region: &RgbImage) -> bool {
        let gray = imageops::grayscale(region);
        let (w, h) = gray.dimensions();
        let (y0, y1) = ((h as f32 * 0.2) as u32, (h as f32 * 0.6) as u32);
        if w == 0 || y1 <= y0 {
            return false;
        }

        let profile: Vec<f32> = (y0..y1)
            .map(|y| (0..w).map(|x| gray.get_pixel(x, y)[0] as f32).sum::<f32>() / w as f32)
            .collect();

        let transitions = profile
            .windows(2)
            .filter(|p| (p[1] - p[0]).abs() > self.stripe_step)
            .count();

        transitions as f32 / profile.len() as f32 > self.stripe_ratio
    }
}

impl RegionClassifier for TeamColorClassifier {
    fn classify(
        &mut self,
        image: &RgbImage,
        boxes: &[BBox<Ltrb>],
    ) -> Result<Vec<Option<Classification>>, Error> {
        Ok(boxes
            .iter()
            .map(|b| crop(image, b).and_then(|region| self.classify_region(&region)))
            .collect())
    }
}

/// RGB to HSV on the OpenCV 8-bit scale.
pub fn rgb_to_hsv(px: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = px.0.map(|c| c as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta) + 120.0
    } else {
        60.0 * ((r - g) / delta) + 240.0
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round() as u8,
        max as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_matches_opencv_scale() {
        assert_eq!(rgb_to_hsv(Rgb([255, 0, 0])), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([0, 255, 0])), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 255])), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([200, 200, 200])), [0, 0, 200]);
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 0])), [0, 0, 0]);
    }

    #[test]
    fn field_side_labels() {
        let c = FieldSideClassifier::default();
        let centre = c.label(1000.0, &BBox::ltrb(460.0, 100.0, 540.0, 300.0));
        assert_eq!(centre, Classification::new("QB", 0.75));

        // centred but squat
        let squat = c.label(1000.0, &BBox::ltrb(430.0, 100.0, 550.0, 220.0));
        assert_eq!(squat.label, "WR-L");

        let left = c.label(1000.0, &BBox::ltrb(10.0, 100.0, 90.0, 300.0));
        assert_eq!(left.label, "WR-L");
        let right = c.label(1000.0, &BBox::ltrb(900.0, 100.0, 980.0, 300.0));
        assert_eq!(right, Classification::new("WR-R", 0.60));
    }

    #[test]
    fn classify_is_parallel_to_boxes() {
        let img = RgbImage::new(1000, 500);
        let boxes = [
            BBox::ltrb(10.0, 100.0, 90.0, 300.0),
            BBox::ltrb(f32::NAN, 0.0, 1.0, 1.0),
        ];
        let out = FieldSideClassifier::default().classify(&img, &boxes).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].is_some());
        assert!(out[1].is_none());
    }

    #[test]
    fn green_jersey_is_eagles() {
        // midnight green: hue ~ 90 deg, dark
        let region = RgbImage::from_pixel(40, 100, Rgb([0, 80, 40]));
        let c = TeamColorClassifier::default().classify_region(&region).unwrap();
        assert_eq!(c.label, "Eagles");
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn white_jersey_is_cowboys() {
        let region = RgbImage::from_pixel(40, 100, Rgb([235, 235, 240]));
        let c = TeamColorClassifier::default().classify_region(&region).unwrap();
        assert_eq!(c.label, "Cowboys");
    }

    #[test]
    fn crowd_colours_get_no_label() {
        let region = RgbImage::from_pixel(40, 100, Rgb([200, 30, 30]));
        assert!(TeamColorClassifier::default()
            .classify_region(&region)
            .is_none());
    }

    #[test]
    fn striped_shirt_is_referee() {
        let region = RgbImage::from_fn(40, 100, |_, y| {
            if (y / 2) % 2 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([10, 10, 10])
            }
        });

        let c = TeamColorClassifier::default();
        assert!(c.is_referee(&region));
        assert!(c.classify_region(&region).is_none());

        let plain = RgbImage::from_pixel(40, 100, Rgb([250, 250, 250]));
        assert!(!c.is_referee(&plain));
    }
}
