//! Disease detection pipeline: fetch, prompt, generate, normalize, persist.

pub mod detector;

pub use detector::{DetectorConfig, DiseaseDetector};
