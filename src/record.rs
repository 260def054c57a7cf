use serde_derive::{Deserialize, Serialize};

use crate::debounce::StableLabel;
use crate::roster::PlayerInfo;
use crate::stabilizer::StableTrack;
use crate::track::TrackId;
use crate::vote::JerseyReading;

/// Per-track output row for one frame. Unknown values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_id: TrackId,
    /// `[x, y, w, h]`, smoothed.
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub jersey_number: Option<u8>,
    pub jersey_confidence: f32,
    pub position_label: Option<String>,
    pub position_confidence: f32,
    pub player: Option<PlayerInfo>,
}

pub fn merge(
    track: &StableTrack,
    label: Option<&StableLabel>,
    jersey: JerseyReading,
    player: Option<PlayerInfo>,
) -> TrackRecord {
    TrackRecord {
        track_id: track.track_id,
        bbox: track.bbox.into(),
        confidence: track.confidence,
        jersey_number: jersey.number,
        jersey_confidence: if jersey.number.is_some() {
            jersey.confidence
        } else {
            0.0
        },
        position_label: label.map(|l| l.label.clone()),
        position_confidence: label.map_or(0.0, |l| l.confidence),
        player,
    }
}
