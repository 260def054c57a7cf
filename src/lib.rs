pub mod bbox;
pub mod circular_queue;
pub mod classifier;
pub mod config;
pub mod debounce;
pub mod detection;
pub mod detector;
pub mod error;
pub mod filter;
pub mod frame;
pub mod math;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod record;
pub mod roster;
pub mod stabilizer;
pub mod stage;
pub mod tracker;
pub mod vote;

mod track;

pub use bbox::{BBox, Ltrb, Ltwh, Xywh};
pub use classifier::{Classification, FieldSideClassifier, RegionClassifier, TeamColorClassifier};
pub use config::Config;
pub use detection::Detection;
pub use detector::{PersonDetector, ReplayDetector, YoloDecoder, YoloDetector};
pub use error::Error;
pub use frame::Frame;
pub use ocr::{TextLine, TextRecognizer};
pub use pipeline::{FrameOutput, Pipeline, PipelineStats};
pub use preprocess::PreparedFrame;
pub use record::TrackRecord;
pub use roster::{CachedRoster, PlayerInfo, RosterLookup, StaticRoster};
pub use track::{Track, TrackId};
