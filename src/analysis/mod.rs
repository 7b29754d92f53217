mod client;
pub mod dto;
#[cfg(test)]
pub(crate) mod fake;

pub use client::{
    AnalysisClient, HttpAnalysisClient, ANALYZE_IMAGE_PATH, IMAGE_FIELD, RECOMMENDATIONS_PATH,
};
