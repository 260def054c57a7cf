use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use ndarray::prelude::*;

use crate::bbox::BBox;
use crate::config::DetectorConfig;
use crate::detection::{Detection, PERSON_CLASS};
use crate::error::Error;
use crate::preprocess::PreparedFrame;

/// Source of person candidates for a prepared frame.
///
/// Returned boxes are in source frame coordinates.
pub trait PersonDetector: Send {
    fn detect(&mut self, frame: &PreparedFrame) -> Result<Vec<Detection>, Error>;
}

/// An inference backend producing a `[batch, preds, 4 + classes]` tensor.
pub trait TensorModel: Send {
    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<Array3<f32>, Error>;
}

#[derive(Debug, Clone)]
pub struct YoloDecoderConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub classes: Vec<i32>,
}

impl YoloDecoderConfig {
    pub fn new(confidence_threshold: f32, classes: Vec<i32>) -> Self {
        Self {
            confidence_threshold,
            iou_threshold: 0.5,
            classes,
        }
    }
}

impl Default for YoloDecoderConfig {
    fn default() -> Self {
        Self::new(0.30, vec![PERSON_CLASS])
    }
}

impl From<&DetectorConfig> for YoloDecoderConfig {
    fn from(config: &DetectorConfig) -> Self {
        Self::new(config.confidence_threshold, vec![PERSON_CLASS])
    }
}

/// Turns raw YOLO predictions into detections.
///
/// Each prediction row is `[cx, cy, w, h, score_0, .., score_n]` with the box
/// normalized to the model input.
#[derive(Debug, Clone, Default)]
pub struct YoloDecoder {
    config: YoloDecoderConfig,
}

impl YoloDecoder {
    pub fn new(config: YoloDecoderConfig) -> Self {
        Self { config }
    }

    pub fn decode(
        &self,
        view: ArrayView3<'_, f32>,
        frame: &PreparedFrame,
    ) -> Result<Vec<Vec<Detection>>, Error> {
        let shape = view.shape();
        let (nbatches, npreds, pred_size) = (shape[0], shape[1], shape[2]);
        if pred_size < 5 {
            return Err(Error::model(
                "detector",
                format!("prediction size {} is too small", pred_size),
            ));
        }

        let (pw, ph) = frame.dims();
        let (ow, oh) = (pw as f32, ph as f32);
        let mut results: Vec<Vec<Detection>> = (0..nbatches).map(|_| vec![]).collect();

        for (batch, results) in results.iter_mut().enumerate() {
            let preds = view.index_axis(Axis(0), batch);

            // grouped by class
            let mut grouped: HashMap<i32, Vec<Detection>> = HashMap::new();

            for index in 0..npreds {
                let row = preds.index_axis(Axis(0), index);

                let (cx, cy, w, h) = (row[0] * ow, row[1] * oh, row[2] * ow, row[3] * oh);

                let mut class_index = -1;
                let mut confidence = 0.0;
                for (idx, val) in row.iter().skip(4).copied().enumerate() {
                    if val > confidence {
                        class_index = idx as i32;
                        confidence = val;
                    }
                }

                if class_index < 0 || confidence < self.config.confidence_threshold {
                    continue;
                }

                if !self.config.classes.contains(&class_index) {
                    continue;
                }

                let bbox = frame.to_frame_coords(&BBox::xywh(cx, cy, w, h).as_ltrb());
                if !bbox.is_finite() {
                    continue;
                }

                grouped
                    .entry(class_index)
                    .or_default()
                    .push(Detection::new(bbox, confidence, class_index));
            }

            let mut classes: Vec<_> = grouped.into_iter().collect();
            classes.sort_by_key(|(class, _)| *class);

            for (_, dets) in classes {
                results.extend(non_maximum_suppression(dets, self.config.iou_threshold));
            }
        }

        Ok(results)
    }
}

/// Greedy NMS, highest confidence first.
pub fn non_maximum_suppression(mut dets: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if dets.len() < 2 {
        return dets;
    }

    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = vec![true; dets.len()];
    for idx in 0..dets.len() - 1 {
        if !keep[idx] {
            continue;
        }

        for other in idx + 1..dets.len() {
            if keep[other] && dets[idx].iou(&dets[other]) > iou_threshold {
                keep[other] = false;
            }
        }
    }

    dets.into_iter()
        .zip(keep)
        .filter_map(|(det, keep)| keep.then_some(det))
        .collect()
}

/// Runs a tensor model on the prepared frame and decodes its output.
pub struct YoloDetector<M> {
    model: M,
    decoder: YoloDecoder,
    input_size: u32,
}

impl<M: TensorModel> YoloDetector<M> {
    pub fn new(model: M, decoder: YoloDecoder, input_size: u32) -> Self {
        Self {
            model,
            decoder,
            input_size,
        }
    }
}

impl<M: TensorModel> PersonDetector for YoloDetector<M> {
    fn detect(&mut self, frame: &PreparedFrame) -> Result<Vec<Detection>, Error> {
        let input = frame.tensor(self.input_size);
        let output = self.model.run(input.view())?;

        Ok(self
            .decoder
            .decode(output.view(), frame)?
            .into_iter()
            .next()
            .unwrap_or_default())
    }
}

/// Serves recorded detections by frame index.
///
/// Dump lines look like `<frame_index>:<json array of detections>`. Blank
/// lines and lines starting with `#` are skipped.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    frames: HashMap<u64, Vec<Detection>>,
}

impl ReplayDetector {
    pub fn new(frames: HashMap<u64, Vec<Detection>>) -> Self {
        Self { frames }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut frames = HashMap::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (index, payload) = line.split_once(':').ok_or_else(|| {
                Error::Parse(format!("line {}: expected `<frame>:<detections>`", lineno + 1))
            })?;

            let index: u64 = index.trim().parse().map_err(|err| {
                Error::Parse(format!("line {}: bad frame index: {}", lineno + 1, err))
            })?;

            let dets: Vec<Detection> = serde_json::from_str(payload.trim())
                .map_err(|err| Error::Parse(format!("line {}: {}", lineno + 1, err)))?;

            frames.insert(index, dets);
        }

        Ok(Self { frames })
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Highest recorded frame index.
    pub fn last_frame(&self) -> Option<u64> {
        self.frames.keys().copied().max()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl PersonDetector for ReplayDetector {
    fn detect(&mut self, frame: &PreparedFrame) -> Result<Vec<Detection>, Error> {
        Ok(self.frames.get(&frame.index).cloned().unwrap_or_default())
    }
}
