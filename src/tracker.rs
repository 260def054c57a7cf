//! IoU multi-object tracker.
//!
//! Association runs in two passes, ByteTrack style: confident detections
//! against every live track, then weak detections against the tracks that
//! were matched on the previous frame and are still unclaimed. Each pass is an
//! optimal assignment over `1 - IoU` between constant-velocity predictions and
//! detections. Only confident leftovers open new tracks.

use munkres::{solve_assignment, WeightMatrix};

use crate::config::TrackerConfig;
use crate::detection::Detection;
use crate::track::{Track, TrackId};

const GATED_COST: f64 = 1.0e4;
// Below IoU resolution, used only to order otherwise equal overlaps.
const CONFIDENCE_TIE_WEIGHT: f64 = 1.0e-4;
const MAX_ASSIGNMENT_SIZE: usize = 256;

/// What one `update` did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerUpdate {
    /// (track, detection index) pairs.
    pub matched: Vec<(TrackId, usize)>,
    pub created: Vec<TrackId>,
    pub removed: Vec<TrackId>,
}

impl TrackerUpdate {
    /// Tracks that got a box this frame, both continued and new.
    pub fn observed(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.matched
            .iter()
            .map(|(id, _)| *id)
            .chain(self.created.iter().copied())
    }
}

pub struct Tracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: TrackId,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(64),
            next_id: 1,
        }
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_id == id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.track_id == id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn update(&mut self, frame_index: u64, detections: &[Detection]) -> TrackerUpdate {
        let mut result = TrackerUpdate::default();

        let mut high = Vec::new();
        let mut low = Vec::new();
        for (idx, det) in detections.iter().enumerate() {
            if !det.bbox.is_finite() {
                continue;
            }

            if det.confidence >= self.config.track_thresh {
                high.push(idx);
            } else if det.confidence >= self.config.low_thresh {
                low.push(idx);
            }
        }

        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        let (first, unmatched_tracks, unmatched_high) =
            self.associate(frame_index, detections, &all_tracks, &high);

        let recent: Vec<usize> = unmatched_tracks
            .into_iter()
            .filter(|&ti| self.tracks[ti].frames_since_seen(frame_index) == 1)
            .collect();
        let (second, _, _) = self.associate(frame_index, detections, &recent, &low);

        for (ti, di) in first.into_iter().chain(second) {
            let track = &mut self.tracks[ti];
            track.apply_match(frame_index, &detections[di], self.config.velocity_alpha);
            result.matched.push((track.track_id, di));
        }

        let buffer = self.config.track_buffer;
        self.tracks.retain(|t| {
            let keep = t.frames_since_seen(frame_index) <= buffer;
            if !keep {
                log::debug!(
                    "track {} removed after {} unmatched frames",
                    t.track_id,
                    t.frames_since_seen(frame_index)
                );
                result.removed.push(t.track_id);
            }
            keep
        });

        for di in unmatched_high {
            let id = self.next_id;
            self.next_id += 1;

            log::debug!("track {} started at frame {}", id, frame_index);
            self.tracks.push(Track::new(id, frame_index, &detections[di]));
            result.created.push(id);
        }

        result
    }

    /// Matches `track_idx` against `det_idx`.
    /// Returns matched (track, detection) indices plus the unmatched of each side.
    fn associate(
        &self,
        frame_index: u64,
        detections: &[Detection],
        track_idx: &[usize],
        det_idx: &[usize],
    ) -> (Vec<(usize, usize)>, Vec<usize>, Vec<usize>) {
        if track_idx.is_empty() || det_idx.is_empty() {
            return (Vec::new(), track_idx.to_vec(), det_idx.to_vec());
        }

        let predicted: Vec<_> = track_idx
            .iter()
            .map(|&ti| self.tracks[ti].predicted(frame_index))
            .collect();

        let mut candidates = Vec::new();
        for (r, pred) in predicted.iter().enumerate() {
            for (c, &di) in det_idx.iter().enumerate() {
                let iou = pred.iou(&detections[di].bbox);
                if iou >= self.config.match_iou && iou > 0.0 {
                    candidates.push((r, c, iou, detections[di].confidence));
                }
            }
        }

        let pairs = if candidates.is_empty() {
            Vec::new()
        } else {
            let n = track_idx.len().max(det_idx.len());
            if n > MAX_ASSIGNMENT_SIZE {
                log::warn!(
                    "assignment of size {} exceeds {}, matching greedily",
                    n,
                    MAX_ASSIGNMENT_SIZE
                );
                greedy_assignment(candidates)
            } else {
                optimal_assignment(n, candidates)
            }
        };

        let mut track_taken = vec![false; track_idx.len()];
        let mut det_taken = vec![false; det_idx.len()];
        let mut matched = Vec::with_capacity(pairs.len());
        for (r, c) in pairs {
            track_taken[r] = true;
            det_taken[c] = true;
            matched.push((track_idx[r], det_idx[c]));
        }

        let unmatched_tracks = track_idx
            .iter()
            .zip(track_taken)
            .filter_map(|(&ti, taken)| (!taken).then_some(ti))
            .collect();
        let unmatched_dets = det_idx
            .iter()
            .zip(det_taken)
            .filter_map(|(&di, taken)| (!taken).then_some(di))
            .collect();

        (matched, unmatched_tracks, unmatched_dets)
    }
}

/// Hungarian assignment over gated candidates `(row, col, iou, confidence)`.
fn optimal_assignment(n: usize, candidates: Vec<(usize, usize, f32, f32)>) -> Vec<(usize, usize)> {
    let mut costs = vec![GATED_COST; n * n];
    for &(r, c, iou, conf) in &candidates {
        costs[r * n + c] = 1.0 - iou as f64 - CONFIDENCE_TIE_WEIGHT * conf as f64;
    }

    let mut mat = WeightMatrix::from_fn(n, |(r, c)| costs[r * n + c]);

    match solve_assignment(&mut mat) {
        Ok(positions) => positions
            .into_iter()
            .filter(|p| costs[p.row * n + p.column] < GATED_COST)
            .map(|p| (p.row, p.column))
            .collect(),
        Err(_) => {
            log::warn!("assignment could not be solved, matching greedily");
            greedy_assignment(candidates)
        }
    }
}

/// Highest overlap first, then highest confidence.
fn greedy_assignment(mut candidates: Vec<(usize, usize, f32, f32)>) -> Vec<(usize, usize)> {
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2).then(b.3.total_cmp(&a.3)));

    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut pairs = Vec::new();
    for (r, c, _, _) in candidates {
        if !rows.contains(&r) && !cols.contains(&c) {
            rows.push(r);
            cols.push(c);
            pairs.push((r, c));
        }
    }

    pairs
}
