use serde::{Deserialize, Serialize};

use crate::workflow::dto::{ExerciseRecommendation, FoodItem};

/// Body returned by `analyze-image`.
#[derive(Debug, Deserialize)]
pub struct AnalyzeImageResponse {
    pub food_items: Vec<FoodItem>,
}

/// Body sent to `get_exercise_recommendations`.
#[derive(Debug, Serialize)]
pub struct RecommendationRequest<'a> {
    pub food_items: &'a [FoodItem],
}

/// Body returned by `get_exercise_recommendations`.
#[derive(Debug, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<ExerciseRecommendation>,
}
