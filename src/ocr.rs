//! Jersey number reading from the torso of a tracked box.

use image::{DynamicImage, RgbImage};
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::config::OcrConfig;
use crate::error::Error;
use crate::preprocess::{crop, ocr_variants};

const MAX_JERSEY: u8 = 99;

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub confidence: f32,
}

impl TextLine {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

pub trait TextRecognizer: Send {
    fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<TextLine>, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberReading {
    pub number: u8,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct JerseyReader {
    config: OcrConfig,
}

impl JerseyReader {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Number region of a player box, clipped to the frame.
    pub fn torso_box(&self, bbox: &BBox<Ltrb>, width: u32, height: u32) -> BBox<Ltrb> {
        let c = &self.config;

        bbox.fraction(c.left_frac, c.top_frac, c.right_frac, c.bottom_frac)
            .clip(width as f32, height as f32)
    }

    /// Reads the jersey number inside `bbox`.
    ///
    /// Variants the recognizer fails on are skipped. An error is returned only
    /// when every variant failed.
    pub fn read(
        &self,
        recognizer: &mut dyn TextRecognizer,
        image: &RgbImage,
        bbox: &BBox<Ltrb>,
    ) -> Result<Option<NumberReading>, Error> {
        let torso = self.torso_box(bbox, image.width(), image.height());
        let region = match crop(image, &torso) {
            Some(region) => region,
            None => return Ok(None),
        };

        let mut lines = Vec::new();
        let mut last_err = None;
        let mut succeeded = 0;

        for (idx, variant) in ocr_variants(&region, self.config.upscale).iter().enumerate() {
            match recognizer.recognize(variant) {
                Ok(mut found) => {
                    succeeded += 1;
                    lines.append(&mut found);
                }
                Err(err) => {
                    log::debug!("ocr variant {} failed: {}", idx, err);
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) if succeeded == 0 => Err(err),
            _ => Ok(best_number(&lines, &self.config)),
        }
    }
}

/// Strongest plausible number among `lines`, preferring two digits over one.
pub fn best_number(lines: &[TextLine], config: &OcrConfig) -> Option<NumberReading> {
    let mut best: Option<NumberReading> = None;
    let mut best_two: Option<NumberReading> = None;

    for line in lines {
        if !(line.confidence >= config.min_digit_conf) {
            continue;
        }

        let digits: String = line.text.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || !config.allowed_lengths.contains(&digits.len()) {
            continue;
        }

        let number = match digits.parse::<u8>() {
            Ok(number) if number <= MAX_JERSEY => number,
            _ => continue,
        };

        let reading = NumberReading {
            number,
            confidence: line.confidence,
        };

        if digits.len() == 2 && best_two.map_or(true, |b| reading.confidence > b.confidence) {
            best_two = Some(reading);
        }

        if best.map_or(true, |b| reading.confidence > b.confidence) {
            best = Some(reading);
        }
    }

    best_two.or(best)
}
