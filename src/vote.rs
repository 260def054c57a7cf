//! Per-track confidence-weighted vote over recent jersey readings.

use std::collections::HashMap;

use crate::circular_queue::CircularQueue;
use crate::config::VoteConfig;
use crate::track::TrackId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub number: u8,
    /// Winner's share of the summed confidence in the window.
    pub weight: f32,
}

/// Jersey number as resolved for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JerseyReading {
    pub number: Option<u8>,
    pub confidence: f32,
}

impl JerseyReading {
    pub const UNKNOWN: JerseyReading = JerseyReading {
        number: None,
        confidence: 0.0,
    };
}

#[derive(Debug, Clone)]
pub struct MajorityVoter {
    config: VoteConfig,
    windows: HashMap<TrackId, CircularQueue<(u8, f32)>>,
}

impl MajorityVoter {
    pub fn new(config: VoteConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    pub fn push(&mut self, track_id: TrackId, number: u8, confidence: f32) {
        let window = self.config.majority_window;

        self.windows
            .entry(track_id)
            .or_insert_with(|| CircularQueue::with_capacity(window))
            .push((number, confidence.max(0.0)));
    }

    /// Number with the highest summed confidence. Equal sums go to the most recent reading.
    pub fn stable(&self, track_id: TrackId) -> Option<Vote> {
        let window = self.windows.get(&track_id)?;

        // number -> (summed confidence, last position)
        let mut scores: Vec<(u8, f32, usize)> = Vec::new();
        let mut total = 0.0f32;
        for (pos, &(number, conf)) in window.iter().enumerate() {
            total += conf;
            match scores.iter_mut().find(|s| s.0 == number) {
                Some(entry) => {
                    entry.1 += conf;
                    entry.2 = pos;
                }
                None => scores.push((number, conf, pos)),
            }
        }

        if total <= 0.0 {
            return None;
        }

        scores
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)))
            .map(|(number, sum, _)| Vote {
                number,
                weight: sum / total,
            })
    }

    /// Stable vote when it is strong enough, else this frame's raw reading, else unknown.
    pub fn resolve(&self, track_id: TrackId, raw: Option<(u8, f32)>) -> JerseyReading {
        match self.stable(track_id) {
            Some(vote) if vote.weight >= self.config.accept_weight => JerseyReading {
                number: Some(vote.number),
                confidence: vote.weight,
            },
            _ => match raw {
                Some((number, confidence)) => JerseyReading {
                    number: Some(number),
                    confidence,
                },
                None => JerseyReading::UNKNOWN,
            },
        }
    }

    pub fn window_len(&self, track_id: TrackId) -> usize {
        self.windows.get(&track_id).map(|w| w.len()).unwrap_or(0)
    }

    pub fn forget(&mut self, track_id: TrackId) {
        self.windows.remove(&track_id);
    }

    pub fn retain<F: FnMut(TrackId) -> bool>(&mut self, mut keep: F) {
        self.windows.retain(|id, _| keep(*id));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter() -> MajorityVoter {
        MajorityVoter::new(VoteConfig::default())
    }

    #[test]
    fn weighted_vote_beats_single_strong_read() {
        let mut v = voter();
        v.push(1, 12, 0.9);
        v.push(1, 12, 0.8);
        v.push(1, 87, 0.95);

        let vote = v.stable(1).unwrap();
        assert_eq!(vote.number, 12);
        assert!((vote.weight - 1.7 / 2.65).abs() < 1e-4);
        assert!((vote.weight - 0.64).abs() < 0.01);
    }

    #[test]
    fn empty_window_is_unknown() {
        let v = voter();
        assert_eq!(v.stable(5), None);
        assert_eq!(v.resolve(5, None), JerseyReading::UNKNOWN);
    }

    #[test]
    fn window_is_bounded() {
        let mut v = MajorityVoter::new(VoteConfig {
            majority_window: 3,
            accept_weight: 0.5,
        });
        v.push(1, 7, 0.9);
        v.push(1, 7, 0.9);
        v.push(1, 7, 0.9);
        v.push(1, 23, 0.9);
        v.push(1, 23, 0.9);
        v.push(1, 23, 0.9);

        assert_eq!(v.window_len(1), 3);
        assert_eq!(v.stable(1).unwrap().number, 23);
        assert_eq!(v.stable(1).unwrap().weight, 1.0);
    }

    #[test]
    fn weak_majority_falls_back_to_raw() {
        let mut v = voter();
        v.push(1, 10, 0.7);
        v.push(1, 11, 0.65);
        v.push(1, 18, 0.6);

        let reading = v.resolve(1, Some((18, 0.6)));
        assert_eq!(reading.number, Some(18));
        assert_eq!(reading.confidence, 0.6);

        assert_eq!(v.resolve(1, None), JerseyReading::UNKNOWN);
    }

    #[test]
    fn ties_go_to_most_recent() {
        let mut v = voter();
        v.push(1, 4, 0.8);
        v.push(1, 40, 0.8);
        assert_eq!(v.stable(1).unwrap().number, 40);
        v.push(1, 4, 0.0);
        assert_eq!(v.stable(1).unwrap().number, 4);
    }

    #[test]
    fn strong_vote_wins_over_raw() {
        let mut v = voter();
        v.push(1, 9, 0.9);
        v.push(1, 9, 0.9);
        v.push(1, 6, 0.7);

        let reading = v.resolve(1, Some((6, 0.7)));
        assert_eq!(reading.number, Some(9));
    }
}
