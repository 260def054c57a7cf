//! Static tunables of the pipeline.
//!
//! Every section deserializes with defaults, so a config file only needs the
//! values it overrides. Files ending in `.json` are parsed as JSON, anything
//! else as TOML.

use serde_derive::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

pub const CONFIG_ENV: &str = "FIELDTRACK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum score the YOLO decoder keeps.
    pub confidence_threshold: f32,
    /// Square model input side.
    pub input_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.30,
            input_size: 960,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Frames whose shorter side is below this are upscaled.
    pub min_side: u32,
    pub equalize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_side: 640,
            equalize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_box_w: f32,
    pub min_box_h: f32,
    pub min_area: f32,
    pub min_hw_ratio: f32,
    pub max_hw_ratio: f32,
    /// Duplicate suppression overlap.
    pub nms_iou: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_box_w: 80.0,
            min_box_h: 80.0,
            min_area: 80.0 * 80.0,
            min_hw_ratio: 0.35,
            max_hw_ratio: 3.0,
            nms_iou: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections at or above this open the first association pass and may spawn tracks.
    pub track_thresh: f32,
    /// Detections below this are ignored by the tracker.
    pub low_thresh: f32,
    /// Minimum IoU for a detection-to-track match.
    pub match_iou: f32,
    /// Frames a track may stay unmatched before it is removed.
    pub track_buffer: u64,
    /// Smoothing of the per-track velocity estimate.
    pub velocity_alpha: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.30,
            low_thresh: 0.10,
            match_iou: 0.2,
            track_buffer: 30,
            velocity_alpha: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Weight of the current observation in the box EMA.
    pub ema_alpha: f32,
    pub min_track_persistence: u32,
    pub min_track_box_area: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.6,
            min_track_persistence: 5,
            min_track_box_area: 80.0 * 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// The position classifier runs on frames whose index is a multiple of this.
    pub run_every: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { run_every: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub min_conf: f32,
    pub required_consec: u32,
    pub min_secs_between_flips: f64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            min_conf: 0.35,
            required_consec: 2,
            min_secs_between_flips: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// OCR runs on frames whose index is a multiple of this.
    pub run_every: u64,
    pub min_digit_conf: f32,
    pub allowed_lengths: Vec<usize>,
    /// Crop upscale factor before OCR.
    pub upscale: f32,
    pub top_frac: f32,
    pub bottom_frac: f32,
    pub left_frac: f32,
    pub right_frac: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            run_every: 1,
            min_digit_conf: 0.60,
            allowed_lengths: vec![1, 2],
            upscale: 1.8,
            top_frac: 0.30,
            bottom_frac: 0.88,
            left_frac: 0.15,
            right_frac: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteConfig {
    pub majority_window: usize,
    pub accept_weight: f32,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            majority_window: 12,
            accept_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Team code used for roster lookups.
    pub team: String,
    pub cache_ttl_secs: u64,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            team: "PHI".to_string(),
            cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub preprocess: PreprocessConfig,
    pub filter: FilterConfig,
    pub tracker: TrackerConfig,
    pub stabilizer: StabilizerConfig,
    pub classifier: ClassifierConfig,
    pub debounce: DebounceConfig,
    pub ocr: OcrConfig,
    pub vote: VoteConfig,
    pub roster: RosterConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("failed to read {}: {}", path.display(), err))
        })?;

        let cfg: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            _ => toml::from_str(&raw)?,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads the file named by `FIELDTRACK_CONFIG`, or defaults when unset.
    pub fn load_from_env() -> Result<Self, Error> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim())),
            _ => {
                let cfg = Self::default();
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        fn unit(name: &str, v: f32) -> Result<(), Error> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be within [0, 1], got {}", name, v)))
            }
        }

        unit("detector.confidence_threshold", self.detector.confidence_threshold)?;
        unit("tracker.track_thresh", self.tracker.track_thresh)?;
        unit("tracker.low_thresh", self.tracker.low_thresh)?;
        unit("tracker.match_iou", self.tracker.match_iou)?;
        unit("tracker.velocity_alpha", self.tracker.velocity_alpha)?;
        unit("filter.nms_iou", self.filter.nms_iou)?;
        unit("debounce.min_conf", self.debounce.min_conf)?;
        unit("ocr.min_digit_conf", self.ocr.min_digit_conf)?;
        unit("vote.accept_weight", self.vote.accept_weight)?;

        if self.detector.input_size == 0 {
            return Err(Error::Config("detector.input_size must be > 0".into()));
        }

        if self.tracker.low_thresh > self.tracker.track_thresh {
            return Err(Error::Config(
                "tracker.low_thresh must not exceed tracker.track_thresh".into(),
            ));
        }

        if !(self.stabilizer.ema_alpha > 0.0 && self.stabilizer.ema_alpha <= 1.0) {
            return Err(Error::Config(format!(
                "stabilizer.ema_alpha must be within (0, 1], got {}",
                self.stabilizer.ema_alpha
            )));
        }

        if self.stabilizer.min_track_persistence == 0 {
            return Err(Error::Config(
                "stabilizer.min_track_persistence must be > 0".into(),
            ));
        }

        if self.filter.min_hw_ratio > self.filter.max_hw_ratio {
            return Err(Error::Config(
                "filter.min_hw_ratio must not exceed filter.max_hw_ratio".into(),
            ));
        }

        if self.classifier.run_every == 0 || self.ocr.run_every == 0 {
            return Err(Error::Config("run_every cadences must be > 0".into()));
        }

        if self.debounce.required_consec == 0 {
            return Err(Error::Config("debounce.required_consec must be > 0".into()));
        }

        if !(self.debounce.min_secs_between_flips >= 0.0) {
            return Err(Error::Config(
                "debounce.min_secs_between_flips must not be negative".into(),
            ));
        }

        if self.vote.majority_window == 0 {
            return Err(Error::Config("vote.majority_window must be > 0".into()));
        }

        if self.ocr.allowed_lengths.is_empty()
            || self.ocr.allowed_lengths.iter().any(|&l| l == 0 || l > 2)
        {
            return Err(Error::Config(
                "ocr.allowed_lengths must list digit counts of 1 or 2".into(),
            ));
        }

        let o = &self.ocr;
        if !(0.0 <= o.left_frac && o.left_frac < o.right_frac && o.right_frac <= 1.0)
            || !(0.0 <= o.top_frac && o.top_frac < o.bottom_frac && o.bottom_frac <= 1.0)
        {
            return Err(Error::Config("ocr crop fractions are not ordered".into()));
        }

        if o.upscale <= 0.0 {
            return Err(Error::Config("ocr.upscale must be > 0".into()));
        }

        Ok(())
    }
}
