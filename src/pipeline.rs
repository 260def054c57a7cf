//! Frame-at-a-time driver wiring every stage together.
//!
//! One `Pipeline` per video stream. All per-track state (tracks, labels,
//! jersey windows, roster cache) lives in the instance.

use std::time::{Duration, Instant};

use serde_derive::Serialize;

use crate::bbox::{BBox, Ltrb};
use crate::classifier::RegionClassifier;
use crate::config::Config;
use crate::debounce::LabelDebouncer;
use crate::detector::PersonDetector;
use crate::error::Error;
use crate::filter::GeometricFilter;
use crate::frame::Frame;
use crate::math::Ema;
use crate::ocr::{JerseyReader, TextRecognizer};
use crate::preprocess::FramePreprocessor;
use crate::record::{merge, TrackRecord};
use crate::roster::RosterLookup;
use crate::stabilizer::{StableTrack, Stabilizer};
use crate::stage::StageResult;
use crate::track::TrackId;
use crate::tracker::Tracker;
use crate::vote::MajorityVoter;

const STATS_ALPHA: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutput {
    pub frame_index: u64,
    pub timestamp: f64,
    pub detections: Vec<TrackRecord>,
}

/// Running processing statistics.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub frames: u64,
    pub detector_failures: u64,
    pub classifier_failures: u64,
    pub ocr_failures: u64,
    latency_ms: Ema<f64>,
    fps: Ema<f64>,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self {
            frames: 0,
            detector_failures: 0,
            classifier_failures: 0,
            ocr_failures: 0,
            latency_ms: Ema::new(STATS_ALPHA),
            fps: Ema::new(STATS_ALPHA),
        }
    }
}

impl PipelineStats {
    fn record(&mut self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();

        self.frames += 1;
        self.latency_ms.push(secs * 1000.0);
        if secs > 0.0 {
            self.fps.push(1.0 / secs);
        }
    }

    /// Smoothed per-frame processing time.
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms.value()
    }

    /// Smoothed frames per second the pipeline sustains.
    pub fn fps(&self) -> Option<f64> {
        self.fps.value()
    }
}

pub struct Pipeline {
    config: Config,
    preprocessor: FramePreprocessor,
    detector: Box<dyn PersonDetector>,
    filter: GeometricFilter,
    tracker: Tracker,
    stabilizer: Stabilizer,
    classifier: Box<dyn RegionClassifier>,
    debouncer: LabelDebouncer,
    reader: JerseyReader,
    recognizer: Box<dyn TextRecognizer>,
    voter: MajorityVoter,
    roster: Box<dyn RosterLookup>,
    last_index: Option<u64>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        config: Config,
        detector: Box<dyn PersonDetector>,
        classifier: Box<dyn RegionClassifier>,
        recognizer: Box<dyn TextRecognizer>,
        roster: Box<dyn RosterLookup>,
    ) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            preprocessor: FramePreprocessor::new(config.preprocess.clone()),
            detector,
            // weak boxes go through, the tracker only uses them to extend tracks
            filter: GeometricFilter::new(config.filter.clone(), config.tracker.low_thresh),
            tracker: Tracker::new(config.tracker.clone()),
            stabilizer: Stabilizer::new(config.stabilizer.clone()),
            classifier,
            debouncer: LabelDebouncer::new(config.debounce.clone()),
            reader: JerseyReader::new(config.ocr.clone()),
            recognizer,
            voter: MajorityVoter::new(config.vote.clone()),
            roster,
            last_index: None,
            stats: PipelineStats::default(),
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[inline]
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    #[inline]
    pub fn last_index(&self) -> Option<u64> {
        self.last_index
    }

    pub fn process(&mut self, frame: &Frame) -> Result<FrameOutput, Error> {
        self.check_frame(frame)?;
        self.last_index = Some(frame.index);

        let started = Instant::now();

        let prepared = self.preprocessor.prepare(frame);
        let detected = StageResult::from_vec(self.detector.detect(&prepared));
        if detected.is_failed() {
            self.stats.detector_failures += 1;
        }
        let detections = detected.observation("detector").unwrap_or_default();

        let candidates = self.filter.apply(&detections);
        let update = self.tracker.update(frame.index, &candidates);

        let observed: Vec<TrackId> = update.observed().collect();
        for id in observed {
            if let Some(track) = self.tracker.get_mut(id) {
                let raw = track.bbox;
                self.stabilizer.observe(&mut track.stability, &raw, frame.index);
            }
        }

        for id in &update.removed {
            self.debouncer.forget(*id);
            self.voter.forget(*id);
        }

        let stable = self.stabilizer.emit(self.tracker.tracks(), frame.index);

        if frame.index % self.config.classifier.run_every == 0 {
            self.classify(frame, &stable);
        }

        let raw_numbers = if frame.index % self.config.ocr.run_every == 0 {
            self.read_numbers(frame, &stable)
        } else {
            vec![None; stable.len()]
        };

        let team = self.config.roster.team.clone();
        let detections: Vec<TrackRecord> = stable
            .iter()
            .zip(raw_numbers)
            .map(|(track, raw)| {
                let jersey = self.voter.resolve(track.track_id, raw);
                let player = jersey
                    .number
                    .and_then(|number| self.roster.lookup(&team, number));

                merge(
                    track,
                    self.debouncer.current(track.track_id),
                    jersey,
                    player,
                )
            })
            .collect();

        self.stats.record(started.elapsed());

        log::debug!(
            "frame {}: {} detections, {} candidates, {} tracks, {} confirmed",
            frame.index,
            detections.len(),
            candidates.len(),
            self.tracker.len(),
            stable.len()
        );

        Ok(FrameOutput {
            frame_index: frame.index,
            timestamp: frame.timestamp,
            detections,
        })
    }

    fn check_frame(&self, frame: &Frame) -> Result<(), Error> {
        let (w, h) = frame.dims();
        if w == 0 || h == 0 {
            return Err(Error::InvalidFrame(format!(
                "frame {} has empty dimensions",
                frame.index
            )));
        }

        if !frame.timestamp.is_finite() {
            return Err(Error::InvalidFrame(format!(
                "frame {} has non-finite timestamp",
                frame.index
            )));
        }

        match self.last_index {
            Some(last) if frame.index <= last => Err(Error::OutOfOrderFrame {
                got: frame.index,
                last,
            }),
            _ => Ok(()),
        }
    }

    fn classify(&mut self, frame: &Frame, stable: &[StableTrack]) {
        if stable.is_empty() {
            return;
        }

        let boxes: Vec<BBox<Ltrb>> = stable.iter().map(|s| s.bbox.as_ltrb()).collect();
        let result = match self.classifier.classify(frame.image(), &boxes) {
            Ok(labels) if labels.len() != boxes.len() => Err(Error::model(
                "classifier",
                format!("{} labels for {} boxes", labels.len(), boxes.len()),
            )),
            other => other,
        };

        let result = StageResult::from_vec(result);
        if result.is_failed() {
            self.stats.classifier_failures += 1;
        }

        let labels = match result.observation("classifier") {
            Some(labels) => labels,
            None => return,
        };

        for (track, label) in stable.iter().zip(labels) {
            if let Some(label) = label {
                self.debouncer
                    .observe(track.track_id, &label.label, label.confidence, frame.timestamp);
            }
        }
    }

    fn read_numbers(&mut self, frame: &Frame, stable: &[StableTrack]) -> Vec<Option<(u8, f32)>> {
        let mut out = Vec::with_capacity(stable.len());

        for track in stable {
            let bbox = track.bbox.as_ltrb();
            let result: StageResult<_> = self
                .reader
                .read(self.recognizer.as_mut(), frame.image(), &bbox)
                .into();

            if result.is_failed() {
                self.stats.ocr_failures += 1;
            }

            let raw = result
                .observation("ocr")
                .map(|reading| (reading.number, reading.confidence));

            if let Some((number, confidence)) = raw {
                self.voter.push(track.track_id, number, confidence);
            }

            out.push(raw);
        }

        out
    }
}
