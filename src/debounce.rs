//! Turns the per-frame position classifier signal into a low-churn label.
//!
//! A new label is accepted only after `required_consec` agreeing observations,
//! and never sooner than `min_secs_between_flips` after the previous change.
//! Observations gathered during the cooldown still count toward the next
//! change.

use std::collections::HashMap;

use serde_derive::Serialize;

use crate::config::DebounceConfig;
use crate::track::TrackId;

/// Displayed label of one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StableLabel {
    pub label: String,
    pub confidence: f32,
    /// Timestamp of the accepted change.
    pub since: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelState {
    pub stable: Option<StableLabel>,
    pub pending_label: Option<String>,
    pub pending_count: u32,
}

impl LabelState {
    fn bump_pending(&mut self, label: &str) {
        if self.pending_label.as_deref() == Some(label) {
            self.pending_count += 1;
        } else {
            self.pending_label = Some(label.to_string());
            self.pending_count = 1;
        }
    }

    fn clear_pending(&mut self) {
        self.pending_label = None;
        self.pending_count = 0;
    }
}

#[derive(Debug, Clone)]
pub struct LabelDebouncer {
    config: DebounceConfig,
    states: HashMap<TrackId, LabelState>,
}

impl LabelDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    /// Feeds one raw classifier observation taken at `now` (seconds).
    pub fn observe(
        &mut self,
        track_id: TrackId,
        label: &str,
        confidence: f32,
        now: f64,
    ) -> Option<&StableLabel> {
        let config = &self.config;
        let state = self.states.entry(track_id).or_default();

        let label = label.trim();
        if label.is_empty() || !(confidence >= config.min_conf) {
            return state.stable.as_ref();
        }

        if state.stable.as_ref().map(|s| s.label.as_str()) == Some(label) {
            state.clear_pending();
            return state.stable.as_ref();
        }

        state.bump_pending(label);

        let cooling_down = state
            .stable
            .as_ref()
            .map(|s| now - s.since < config.min_secs_between_flips)
            .unwrap_or(false);

        if !cooling_down && state.pending_count >= config.required_consec {
            log::debug!(
                "track {} label {:?} -> {:?}",
                track_id,
                state.stable.as_ref().map(|s| s.label.as_str()),
                label
            );

            state.stable = Some(StableLabel {
                label: label.to_string(),
                confidence,
                since: now,
            });
            state.clear_pending();
        }

        state.stable.as_ref()
    }

    /// Current label without an observation, for frames the classifier skipped.
    pub fn current(&self, track_id: TrackId) -> Option<&StableLabel> {
        self.states.get(&track_id).and_then(|s| s.stable.as_ref())
    }

    pub fn state(&self, track_id: TrackId) -> Option<&LabelState> {
        self.states.get(&track_id)
    }

    pub fn forget(&mut self, track_id: TrackId) {
        self.states.remove(&track_id);
    }

    /// Keeps only the tracks for which `keep` holds.
    pub fn retain<F: FnMut(TrackId) -> bool>(&mut self, mut keep: F) {
        self.states.retain(|id, _| keep(*id));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
