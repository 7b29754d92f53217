use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::AnalysisClient;
use crate::workflow::dto::{ExerciseRecommendation, FoodItem, ImageAsset};
use crate::workflow::error::WorkflowError;

/// Scripted stand-in for the remote service. Unscripted calls succeed with an empty list.
#[derive(Default)]
pub struct FakeAnalysisClient {
    analyze_results: Mutex<VecDeque<Result<Vec<FoodItem>, WorkflowError>>>,
    recommend_results: Mutex<VecDeque<Result<Vec<ExerciseRecommendation>, WorkflowError>>>,
    received_food: Mutex<Vec<Vec<FoodItem>>>,
    analyze_calls: AtomicUsize,
    recommend_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeAnalysisClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_analysis(&self, result: Result<Vec<FoodItem>, WorkflowError>) -> &Self {
        self.analyze_results.lock().unwrap().push_back(result);
        self
    }

    pub fn push_recommendation(
        &self,
        result: Result<Vec<ExerciseRecommendation>, WorkflowError>,
    ) -> &Self {
        self.recommend_results.lock().unwrap().push_back(result);
        self
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn recommend_calls(&self) -> usize {
        self.recommend_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.analyze_calls() + self.recommend_calls()
    }

    /// Food lists passed to `recommend_exercise`, in call order.
    pub fn received_food(&self) -> Vec<Vec<FoodItem>> {
        self.received_food.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl AnalysisClient for FakeAnalysisClient {
    async fn analyze_image(&self, _image: &ImageAsset) -> Result<Vec<FoodItem>, WorkflowError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let next = self.analyze_results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn recommend_exercise(
        &self,
        food_items: &[FoodItem],
    ) -> Result<Vec<ExerciseRecommendation>, WorkflowError> {
        self.recommend_calls.fetch_add(1, Ordering::SeqCst);
        self.received_food.lock().unwrap().push(food_items.to_vec());
        self.pause().await;
        let next = self.recommend_results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}
