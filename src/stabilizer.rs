//! Box smoothing and the persistence gate in front of downstream consumers.

use serde_derive::Serialize;

use crate::bbox::{BBox, Ltrb, Ltwh};
use crate::config::StabilizerConfig;
use crate::track::{Track, TrackId};

/// Per-track smoothing and persistence state.
#[derive(Debug, Clone, Default)]
pub struct Stability {
    pub smoothed: Option<BBox<Ltwh>>,
    /// Consecutive frames matched, 1 after a gap.
    pub consecutive: u32,
    pub last_observed: Option<u64>,
    /// Sticky once set.
    pub confirmed: bool,
}

/// A confirmed track as surfaced for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StableTrack {
    pub track_id: TrackId,
    pub bbox: BBox<Ltwh>,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct Stabilizer {
    config: StabilizerConfig,
}

impl Stabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self { config }
    }

    /// Folds a matched observation into the track's state and returns the smoothed box.
    pub fn observe(&self, state: &mut Stability, raw: &BBox<Ltrb>, frame_index: u64) -> BBox<Ltwh> {
        state.consecutive = match state.last_observed {
            Some(prev) if prev + 1 == frame_index => state.consecutive.saturating_add(1),
            Some(prev) if prev == frame_index => state.consecutive,
            _ => 1,
        };
        state.last_observed = Some(frame_index);

        if state.consecutive >= self.config.min_track_persistence {
            state.confirmed = true;
        }

        let alpha = self.config.ema_alpha;
        let current = raw.as_ltwh().as_vector();
        let smoothed = match &state.smoothed {
            Some(prev) => current * alpha + prev.as_vector() * (1.0 - alpha),
            None => current,
        };

        let bbox = BBox::from_vector(&smoothed);
        state.smoothed = Some(bbox);
        bbox
    }

    /// Confirmed tracks matched in `frame_index`, in track id order.
    pub fn emit<'a, I>(&self, tracks: I, frame_index: u64) -> Vec<StableTrack>
    where
        I: IntoIterator<Item = &'a Track>,
    {
        let mut out: Vec<StableTrack> = tracks
            .into_iter()
            .filter(|t| t.is_matched_at(frame_index) && t.is_confirmed())
            .filter(|t| t.bbox.area() >= self.config.min_track_box_area)
            .filter_map(|t| {
                t.stability.smoothed.map(|bbox| StableTrack {
                    track_id: t.track_id,
                    bbox,
                    confidence: t.confidence,
                })
            })
            .collect();

        out.sort_by_key(|s| s.track_id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stabilizer() -> Stabilizer {
        Stabilizer::new(StabilizerConfig::default())
    }

    #[test]
    fn first_observation_is_used_as_is() {
        let mut state = Stability::default();
        let b = stabilizer().observe(&mut state, &BBox::ltrb(10.0, 20.0, 110.0, 220.0), 1);
        assert_eq!(b.as_slice(), &[10.0, 20.0, 100.0, 200.0]);
    }

    #[test]
    fn ema_blends_each_coordinate() {
        let s = stabilizer();
        let mut state = Stability::default();
        s.observe(&mut state, &BBox::ltrb(0.0, 0.0, 100.0, 200.0), 1);
        let b = s.observe(&mut state, &BBox::ltrb(10.0, 20.0, 120.0, 240.0), 2);

        let expected = [6.0, 12.0, 106.0, 212.0];
        for (got, want) in b.as_slice().iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-4, "{} != {}", got, want);
        }
    }

    #[test]
    fn confirms_after_exact_persistence() {
        let s = stabilizer();
        let mut state = Stability::default();
        let b = BBox::ltrb(0.0, 0.0, 100.0, 200.0);

        for frame in 1..=4 {
            s.observe(&mut state, &b, frame);
            assert!(!state.confirmed, "confirmed early at frame {}", frame);
        }

        s.observe(&mut state, &b, 5);
        assert!(state.confirmed);
    }

    #[test]
    fn gap_resets_persistence() {
        let s = stabilizer();
        let mut state = Stability::default();
        let b = BBox::ltrb(0.0, 0.0, 100.0, 200.0);

        for frame in [1, 2, 3, 4, 6, 7, 8, 9] {
            s.observe(&mut state, &b, frame);
            assert!(!state.confirmed, "confirmed with a gap at frame {}", frame);
        }
        assert_eq!(state.consecutive, 4);

        s.observe(&mut state, &b, 10);
        assert!(state.confirmed);
    }

    #[test]
    fn confirmation_is_sticky() {
        let s = stabilizer();
        let mut state = Stability::default();
        let b = BBox::ltrb(0.0, 0.0, 100.0, 200.0);

        for frame in 1..=5 {
            s.observe(&mut state, &b, frame);
        }
        s.observe(&mut state, &b, 20);

        assert_eq!(state.consecutive, 1);
        assert!(state.confirmed);
    }
}
