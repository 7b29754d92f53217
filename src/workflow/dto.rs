use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::WorkflowError;
use super::machine::{Phase, WorkflowState};

/// A single recognized food entry with its calorie estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    #[serde(rename = "food_item_name")]
    pub name: String,
    pub calories: f64,
}

impl FoodItem {
    pub fn new(name: impl Into<String>, calories: f64) -> Self {
        Self {
            name: name.into(),
            calories,
        }
    }
}

/// A suggested activity derived from a set of food items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecommendation {
    #[serde(rename = "exercise_name")]
    pub name: String,
    /// Minutes.
    pub duration: f64,
    pub calories_burned: f64,
}

impl ExerciseRecommendation {
    pub fn new(name: impl Into<String>, duration: f64, calories_burned: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            calories_burned,
        }
    }
}

pub const DEFAULT_FILE_NAME: &str = "photo.jpg";

/// Image picked or captured by the user. Lives in memory for one workflow run.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

impl ImageAsset {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn upload_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(DEFAULT_FILE_NAME)
    }
}

pub fn total_calories(items: &[FoodItem]) -> f64 {
    items.iter().map(|i| i.calories).sum()
}

pub fn total_calories_burned(recs: &[ExerciseRecommendation]) -> f64 {
    recs.iter().map(|r| r.calories_burned).sum()
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageMeta {
    pub content_type: String,
    pub size: u64,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorView {
    pub kind: &'static str,
    pub message: String,
}

/// Everything a client surface needs to render the workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowView {
    pub phase: Phase,
    pub is_loading: bool,
    pub error: Option<ErrorView>,
    pub image: Option<ImageMeta>,
    pub food_items: Vec<FoodItem>,
    pub recommendations: Vec<ExerciseRecommendation>,
    pub total_calories: f64,
    pub total_calories_burned: f64,
}

impl From<&WorkflowError> for ErrorView {
    fn from(e: &WorkflowError) -> Self {
        Self {
            kind: e.kind(),
            message: e.user_message(),
        }
    }
}

impl From<&WorkflowState> for WorkflowView {
    fn from(st: &WorkflowState) -> Self {
        Self {
            phase: st.phase,
            is_loading: st.phase.is_in_flight(),
            error: st.error.as_ref().map(ErrorView::from),
            image: st.image.as_ref().map(|img| ImageMeta {
                content_type: img.content_type.clone(),
                size: img.size(),
                file_name: img.file_name.clone(),
            }),
            food_items: st.food_items.clone(),
            recommendations: st.recommendations.clone(),
            total_calories: st.total_calories(),
            total_calories_burned: st.total_calories_burned(),
        }
    }
}
